// ==========================================
// 快智造制造管理平台 - 统一需求数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 行级自由函数入参 &Connection, 供引擎事务复用
// ==========================================

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::demand::{Demand, DemandItem};
use crate::domain::types::{
    BusinessMode, DemandType, DocumentKind, DocumentStatus, ReviewStatus,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{
    dt_to_sql, opt_date_to_sql, opt_dt_to_sql, sql_to_dec, sql_to_dt, sql_to_opt_date,
    sql_to_opt_dec, sql_to_opt_dt,
};

/// 需求列表查询条件
#[derive(Debug, Clone, Default)]
pub struct DemandQuery {
    pub demand_type: Option<DemandType>,
    pub status: Option<DocumentStatus>,
    pub review_status: Option<ReviewStatus>,
    pub keyword: Option<String>, // 匹配编码或名称
    pub page: u32,               // 从1开始, 0视为1
    pub page_size: u32,          // 0视为20
}

const DEMAND_COLS: &str = "id, tenant_id, uuid, demand_code, demand_name, demand_type, \
     business_mode, source_type, source_id, start_date, end_date, order_date, delivery_date, \
     customer_id, customer_name, forecast_period, total_quantity, total_amount, status, \
     review_status, reviewer_id, reviewer_name, review_time, review_remarks, submit_time, \
     pushed_to_computation, computation_id, computation_code, priority, notes, \
     created_by, created_by_name, updated_by, updated_by_name, created_at, updated_at, deleted_at";

fn map_demand(row: &rusqlite::Row) -> rusqlite::Result<Demand> {
    let demand_type_s: String = row.get(5)?;
    let business_mode_s: String = row.get(6)?;
    let source_type_s: Option<String> = row.get(7)?;
    let status_s: String = row.get(18)?;
    let review_status_s: String = row.get(19)?;

    let invalid = |idx: usize, v: &str| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("无法识别的枚举值: {}", v).into(),
        )
    };

    Ok(Demand {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        uuid: row.get(2)?,
        demand_code: row.get(3)?,
        demand_name: row.get(4)?,
        demand_type: DemandType::parse(&demand_type_s).ok_or_else(|| invalid(5, &demand_type_s))?,
        business_mode: BusinessMode::parse(&business_mode_s)
            .ok_or_else(|| invalid(6, &business_mode_s))?,
        source_type: source_type_s
            .map(|s| DocumentKind::parse(&s).ok_or_else(|| invalid(7, &s)))
            .transpose()?,
        source_id: row.get(8)?,
        start_date: sql_to_opt_date(9, row.get(9)?)?,
        end_date: sql_to_opt_date(10, row.get(10)?)?,
        order_date: sql_to_opt_date(11, row.get(11)?)?,
        delivery_date: sql_to_opt_date(12, row.get(12)?)?,
        customer_id: row.get(13)?,
        customer_name: row.get(14)?,
        forecast_period: row.get(15)?,
        total_quantity: sql_to_dec(16, row.get(16)?)?,
        total_amount: sql_to_dec(17, row.get(17)?)?,
        status: DocumentStatus::parse(&status_s).ok_or_else(|| invalid(18, &status_s))?,
        review_status: ReviewStatus::parse(&review_status_s)
            .ok_or_else(|| invalid(19, &review_status_s))?,
        reviewer_id: row.get(20)?,
        reviewer_name: row.get(21)?,
        review_time: sql_to_opt_dt(22, row.get(22)?)?,
        review_remarks: row.get(23)?,
        submit_time: sql_to_opt_dt(24, row.get(24)?)?,
        pushed_to_computation: row.get::<_, i64>(25)? != 0,
        computation_id: row.get(26)?,
        computation_code: row.get(27)?,
        priority: row.get(28)?,
        notes: row.get(29)?,
        created_by: row.get(30)?,
        created_by_name: row.get(31)?,
        updated_by: row.get(32)?,
        updated_by_name: row.get(33)?,
        created_at: sql_to_dt(34, row.get(34)?)?,
        updated_at: sql_to_dt(35, row.get(35)?)?,
        deleted_at: sql_to_opt_dt(36, row.get(36)?)?,
    })
}

fn map_item(row: &rusqlite::Row) -> rusqlite::Result<DemandItem> {
    Ok(DemandItem {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        demand_id: row.get(2)?,
        material_id: row.get(3)?,
        material_code: row.get(4)?,
        material_name: row.get(5)?,
        material_spec: row.get(6)?,
        unit: row.get(7)?,
        required_quantity: sql_to_dec(8, row.get(8)?)?,
        delivery_date: sql_to_opt_date(9, row.get(9)?)?,
        forecast_date: sql_to_opt_date(10, row.get(10)?)?,
        unit_price: sql_to_opt_dec(11, row.get(11)?)?,
        item_amount: sql_to_opt_dec(12, row.get(12)?)?,
        remaining_quantity: sql_to_opt_dec(13, row.get(13)?)?,
        delivered_quantity: sql_to_opt_dec(14, row.get(14)?)?,
        delivery_status: row.get(15)?,
        created_at: sql_to_dt(16, row.get(16)?)?,
        updated_at: sql_to_dt(17, row.get(17)?)?,
    })
}

const ITEM_COLS: &str = "id, tenant_id, demand_id, material_id, material_code, material_name, \
     material_spec, unit, required_quantity, delivery_date, forecast_date, unit_price, \
     item_amount, remaining_quantity, delivered_quantity, delivery_status, created_at, updated_at";

// ==========================================
// 行级操作 (引擎事务内复用)
// ==========================================

pub(crate) fn insert_demand(conn: &Connection, demand: &Demand) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO demand (
            tenant_id, uuid, demand_code, demand_name, demand_type, business_mode,
            source_type, source_id, start_date, end_date, order_date, delivery_date,
            customer_id, customer_name, forecast_period, total_quantity, total_amount,
            status, review_status, reviewer_id, reviewer_name, review_time, review_remarks,
            submit_time, pushed_to_computation, computation_id, computation_code,
            priority, notes, created_by, created_by_name, updated_by, updated_by_name,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            demand.tenant_id,
            &demand.uuid,
            &demand.demand_code,
            &demand.demand_name,
            demand.demand_type.as_str(),
            demand.business_mode.as_str(),
            demand.source_type.map(|k| k.as_str()),
            demand.source_id,
            opt_date_to_sql(&demand.start_date),
            opt_date_to_sql(&demand.end_date),
            opt_date_to_sql(&demand.order_date),
            opt_date_to_sql(&demand.delivery_date),
            demand.customer_id,
            &demand.customer_name,
            &demand.forecast_period,
            demand.total_quantity.to_string(),
            demand.total_amount.to_string(),
            demand.status.as_str(),
            demand.review_status.as_str(),
            demand.reviewer_id,
            &demand.reviewer_name,
            opt_dt_to_sql(&demand.review_time),
            &demand.review_remarks,
            opt_dt_to_sql(&demand.submit_time),
            demand.pushed_to_computation as i64,
            demand.computation_id,
            &demand.computation_code,
            &demand.priority,
            &demand.notes,
            demand.created_by,
            &demand.created_by_name,
            demand.updated_by,
            &demand.updated_by_name,
            dt_to_sql(&demand.created_at),
            dt_to_sql(&demand.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_demand_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<Demand>> {
    let sql = format!(
        "SELECT {} FROM demand WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        DEMAND_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_demand)
        .optional()?)
}

pub(crate) fn find_demand_by_source(
    conn: &Connection,
    tenant_id: i64,
    source_type: DocumentKind,
    source_id: i64,
) -> RepositoryResult<Option<Demand>> {
    let sql = format!(
        "SELECT {} FROM demand \
         WHERE tenant_id = ? AND source_type = ? AND source_id = ? AND deleted_at IS NULL",
        DEMAND_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, source_type.as_str(), source_id], map_demand)
        .optional()?)
}

pub(crate) fn list_demands(
    conn: &Connection,
    tenant_id: i64,
    query: &DemandQuery,
) -> RepositoryResult<(Vec<Demand>, i64)> {
    let mut where_sql = String::from("tenant_id = ? AND deleted_at IS NULL");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(tenant_id)];

    if let Some(dt) = query.demand_type {
        where_sql.push_str(" AND demand_type = ?");
        args.push(Box::new(dt.as_str().to_string()));
    }
    if let Some(st) = query.status {
        where_sql.push_str(" AND status = ?");
        args.push(Box::new(st.as_str().to_string()));
    }
    if let Some(rs) = query.review_status {
        where_sql.push_str(" AND review_status = ?");
        args.push(Box::new(rs.as_str().to_string()));
    }
    if let Some(kw) = &query.keyword {
        where_sql.push_str(" AND (demand_code LIKE ? OR demand_name LIKE ?)");
        let pattern = format!("%{}%", kw);
        args.push(Box::new(pattern.clone()));
        args.push(Box::new(pattern));
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM demand WHERE {}", where_sql),
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        |row| row.get(0),
    )?;

    let page = query.page.max(1);
    let page_size = if query.page_size == 0 { 20 } else { query.page_size };
    let offset = (page - 1) * page_size;

    let sql = format!(
        "SELECT {} FROM demand WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        DEMAND_COLS, where_sql
    );
    args.push(Box::new(page_size as i64));
    args.push(Box::new(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let demands = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_demand,
        )?
        .collect::<Result<Vec<Demand>, _>>()?;

    Ok((demands, total))
}

/// 整行更新 (调用方负责刷新 updated_at/updated_by)
pub(crate) fn update_demand(conn: &Connection, demand: &Demand) -> RepositoryResult<()> {
    let changed = conn.execute(
        r#"UPDATE demand SET
            demand_name = ?, demand_type = ?, business_mode = ?,
            source_type = ?, source_id = ?,
            start_date = ?, end_date = ?, order_date = ?, delivery_date = ?,
            customer_id = ?, customer_name = ?, forecast_period = ?,
            total_quantity = ?, total_amount = ?,
            status = ?, review_status = ?, reviewer_id = ?, reviewer_name = ?,
            review_time = ?, review_remarks = ?, submit_time = ?,
            pushed_to_computation = ?, computation_id = ?, computation_code = ?,
            priority = ?, notes = ?,
            updated_by = ?, updated_by_name = ?, updated_at = ?
        WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL"#,
        params![
            &demand.demand_name,
            demand.demand_type.as_str(),
            demand.business_mode.as_str(),
            demand.source_type.map(|k| k.as_str()),
            demand.source_id,
            opt_date_to_sql(&demand.start_date),
            opt_date_to_sql(&demand.end_date),
            opt_date_to_sql(&demand.order_date),
            opt_date_to_sql(&demand.delivery_date),
            demand.customer_id,
            &demand.customer_name,
            &demand.forecast_period,
            demand.total_quantity.to_string(),
            demand.total_amount.to_string(),
            demand.status.as_str(),
            demand.review_status.as_str(),
            demand.reviewer_id,
            &demand.reviewer_name,
            opt_dt_to_sql(&demand.review_time),
            &demand.review_remarks,
            opt_dt_to_sql(&demand.submit_time),
            demand.pushed_to_computation as i64,
            demand.computation_id,
            &demand.computation_code,
            &demand.priority,
            &demand.notes,
            demand.updated_by,
            &demand.updated_by_name,
            dt_to_sql(&demand.updated_at),
            demand.tenant_id,
            demand.id,
        ],
    )?;
    if changed == 0 {
        return Err(RepositoryError::NotFound {
            entity: "Demand".to_string(),
            id: demand.id.to_string(),
        });
    }
    Ok(())
}

/// 更新计划前向链接 (下推/撤回运算)
pub(crate) fn set_push_state(
    conn: &Connection,
    tenant_id: i64,
    demand_id: i64,
    pushed: bool,
    computation_id: Option<i64>,
    computation_code: Option<&str>,
) -> RepositoryResult<()> {
    let now = dt_to_sql(&Local::now().naive_local());
    conn.execute(
        r#"UPDATE demand SET pushed_to_computation = ?, computation_id = ?,
               computation_code = ?, updated_at = ?
           WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL"#,
        params![pushed as i64, computation_id, computation_code, now, tenant_id, demand_id],
    )?;
    Ok(())
}

/// 硬删除需求 (明细随外键级联删除)
pub(crate) fn hard_delete_demand(
    conn: &Connection,
    tenant_id: i64,
    demand_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        "DELETE FROM demand WHERE tenant_id = ? AND id = ?",
        params![tenant_id, demand_id],
    )?;
    Ok(())
}

/// 孤儿需求: 来源单据已被删除(或软删)的需求
pub(crate) fn list_orphan_demands(
    conn: &Connection,
    tenant_id: i64,
) -> RepositoryResult<Vec<Demand>> {
    let sql = format!(
        "SELECT {} FROM demand d \
         WHERE d.tenant_id = ? AND d.deleted_at IS NULL \
           AND d.source_type IS NOT NULL AND d.source_id IS NOT NULL \
           AND ( \
               (d.source_type = 'sales_order' AND NOT EXISTS ( \
                   SELECT 1 FROM sales_order s \
                   WHERE s.tenant_id = d.tenant_id AND s.id = d.source_id \
                     AND s.deleted_at IS NULL)) \
            OR (d.source_type = 'sales_forecast' AND NOT EXISTS ( \
                   SELECT 1 FROM sales_forecast f \
                   WHERE f.tenant_id = d.tenant_id AND f.id = d.source_id \
                     AND f.deleted_at IS NULL)) \
           )",
        DEMAND_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let demands = stmt
        .query_map(params![tenant_id], map_demand)?
        .collect::<Result<Vec<Demand>, _>>()?;
    Ok(demands)
}

// ===== 明细行级操作 =====

pub(crate) fn insert_item(conn: &Connection, item: &DemandItem) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO demand_item (
            tenant_id, demand_id, material_id, material_code, material_name,
            material_spec, unit, required_quantity, delivery_date, forecast_date,
            unit_price, item_amount, remaining_quantity, delivered_quantity,
            delivery_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.demand_id,
            item.material_id,
            &item.material_code,
            &item.material_name,
            &item.material_spec,
            &item.unit,
            item.required_quantity.to_string(),
            opt_date_to_sql(&item.delivery_date),
            opt_date_to_sql(&item.forecast_date),
            item.unit_price.map(|d| d.to_string()),
            item.item_amount.map(|d| d.to_string()),
            item.remaining_quantity.map(|d| d.to_string()),
            item.delivered_quantity.map(|d| d.to_string()),
            &item.delivery_status,
            dt_to_sql(&item.created_at),
            dt_to_sql(&item.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_item_by_id(
    conn: &Connection,
    tenant_id: i64,
    item_id: i64,
) -> RepositoryResult<Option<DemandItem>> {
    let sql = format!(
        "SELECT {} FROM demand_item WHERE tenant_id = ? AND id = ?",
        ITEM_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, item_id], map_item)
        .optional()?)
}

pub(crate) fn list_items_by_demand(
    conn: &Connection,
    tenant_id: i64,
    demand_id: i64,
) -> RepositoryResult<Vec<DemandItem>> {
    let sql = format!(
        "SELECT {} FROM demand_item WHERE tenant_id = ? AND demand_id = ? ORDER BY id",
        ITEM_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![tenant_id, demand_id], map_item)?
        .collect::<Result<Vec<DemandItem>, _>>()?;
    Ok(items)
}

pub(crate) fn update_item(conn: &Connection, item: &DemandItem) -> RepositoryResult<()> {
    let changed = conn.execute(
        r#"UPDATE demand_item SET
            material_id = ?, material_code = ?, material_name = ?, material_spec = ?,
            unit = ?, required_quantity = ?, delivery_date = ?, forecast_date = ?,
            unit_price = ?, item_amount = ?, remaining_quantity = ?,
            delivered_quantity = ?, delivery_status = ?, updated_at = ?
        WHERE tenant_id = ? AND id = ?"#,
        params![
            item.material_id,
            &item.material_code,
            &item.material_name,
            &item.material_spec,
            &item.unit,
            item.required_quantity.to_string(),
            opt_date_to_sql(&item.delivery_date),
            opt_date_to_sql(&item.forecast_date),
            item.unit_price.map(|d| d.to_string()),
            item.item_amount.map(|d| d.to_string()),
            item.remaining_quantity.map(|d| d.to_string()),
            item.delivered_quantity.map(|d| d.to_string()),
            &item.delivery_status,
            dt_to_sql(&item.updated_at),
            item.tenant_id,
            item.id,
        ],
    )?;
    if changed == 0 {
        return Err(RepositoryError::NotFound {
            entity: "DemandItem".to_string(),
            id: item.id.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn delete_item(
    conn: &Connection,
    tenant_id: i64,
    item_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        "DELETE FROM demand_item WHERE tenant_id = ? AND id = ?",
        params![tenant_id, item_id],
    )?;
    Ok(())
}

pub(crate) fn delete_items_by_demand(
    conn: &Connection,
    tenant_id: i64,
    demand_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        "DELETE FROM demand_item WHERE tenant_id = ? AND demand_id = ?",
        params![tenant_id, demand_id],
    )?;
    Ok(())
}

// ==========================================
// DemandRepository - 统一需求仓储
// ==========================================
pub struct DemandRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DemandRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create(&self, demand: &Demand) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_demand(&conn, demand)
    }

    pub fn find_by_id(&self, tenant_id: i64, id: i64) -> RepositoryResult<Option<Demand>> {
        let conn = self.get_conn()?;
        find_demand_by_id(&conn, tenant_id, id)
    }

    pub fn find_by_source(
        &self,
        tenant_id: i64,
        source_type: DocumentKind,
        source_id: i64,
    ) -> RepositoryResult<Option<Demand>> {
        let conn = self.get_conn()?;
        find_demand_by_source(&conn, tenant_id, source_type, source_id)
    }

    /// 分页列表, 返回 (当前页, 总数)
    pub fn list(&self, tenant_id: i64, query: &DemandQuery) -> RepositoryResult<(Vec<Demand>, i64)> {
        let conn = self.get_conn()?;
        list_demands(&conn, tenant_id, query)
    }

    pub fn update(&self, demand: &Demand) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        update_demand(&conn, demand)
    }

    pub fn set_push_state(
        &self,
        tenant_id: i64,
        demand_id: i64,
        pushed: bool,
        computation_id: Option<i64>,
        computation_code: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        set_push_state(&conn, tenant_id, demand_id, pushed, computation_id, computation_code)
    }

    pub fn hard_delete(&self, tenant_id: i64, demand_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        hard_delete_demand(&conn, tenant_id, demand_id)
    }

    pub fn list_orphans(&self, tenant_id: i64) -> RepositoryResult<Vec<Demand>> {
        let conn = self.get_conn()?;
        list_orphan_demands(&conn, tenant_id)
    }

    // ===== 明细 =====

    pub fn create_item(&self, item: &DemandItem) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_item(&conn, item)
    }

    pub fn find_item(&self, tenant_id: i64, item_id: i64) -> RepositoryResult<Option<DemandItem>> {
        let conn = self.get_conn()?;
        find_item_by_id(&conn, tenant_id, item_id)
    }

    pub fn list_items(&self, tenant_id: i64, demand_id: i64) -> RepositoryResult<Vec<DemandItem>> {
        let conn = self.get_conn()?;
        list_items_by_demand(&conn, tenant_id, demand_id)
    }

    pub fn update_item(&self, item: &DemandItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        update_item(&conn, item)
    }

    pub fn delete_item(&self, tenant_id: i64, item_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        delete_item(&conn, tenant_id, item_id)
    }
}

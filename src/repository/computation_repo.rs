// ==========================================
// 快智造制造管理平台 - 需求运算仓储
// ==========================================
// demand_ids 以 JSON 数组落库 (合并下推时承载多个需求)
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::computation::{ComputationParams, DemandComputation, DemandComputationItem};
use crate::domain::types::ComputationType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{dt_to_sql, opt_date_to_sql, sql_to_dec, sql_to_dt, sql_to_opt_date, sql_to_opt_dt};

const COMPUTATION_COLS: &str = "id, tenant_id, uuid, computation_code, computation_type, \
     computation_params, demand_id, demand_ids, status, needs_recompute, created_by, \
     created_at, updated_at, deleted_at";

fn map_computation(row: &rusqlite::Row) -> rusqlite::Result<DemandComputation> {
    let computation_type_s: String = row.get(4)?;
    let params_json: String = row.get(5)?;
    let demand_ids_json: String = row.get(7)?;

    let json_err = |idx: usize, e: serde_json::Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    };

    let computation_params: ComputationParams =
        serde_json::from_str(&params_json).map_err(|e| json_err(5, e))?;
    let demand_ids: Vec<i64> =
        serde_json::from_str(&demand_ids_json).map_err(|e| json_err(7, e))?;

    Ok(DemandComputation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        uuid: row.get(2)?,
        computation_code: row.get(3)?,
        computation_type: ComputationType::parse(&computation_type_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("无法识别的运算类型: {}", computation_type_s).into(),
            )
        })?,
        computation_params,
        demand_id: row.get(6)?,
        demand_ids,
        status: row.get(8)?,
        needs_recompute: row.get::<_, i64>(9)? != 0,
        created_by: row.get(10)?,
        created_at: sql_to_dt(11, row.get(11)?)?,
        updated_at: sql_to_dt(12, row.get(12)?)?,
        deleted_at: sql_to_opt_dt(13, row.get(13)?)?,
    })
}

const ITEM_COLS: &str = "id, tenant_id, computation_id, material_id, material_code, \
     material_name, unit, required_quantity, suggested_quantity, demand_date, created_at";

fn map_item(row: &rusqlite::Row) -> rusqlite::Result<DemandComputationItem> {
    Ok(DemandComputationItem {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        computation_id: row.get(2)?,
        material_id: row.get(3)?,
        material_code: row.get(4)?,
        material_name: row.get(5)?,
        unit: row.get(6)?,
        required_quantity: sql_to_dec(7, row.get(7)?)?,
        suggested_quantity: sql_to_dec(8, row.get(8)?)?,
        demand_date: sql_to_opt_date(9, row.get(9)?)?,
        created_at: sql_to_dt(10, row.get(10)?)?,
    })
}

// ==========================================
// 行级操作
// ==========================================

pub(crate) fn insert_computation(
    conn: &Connection,
    computation: &DemandComputation,
) -> RepositoryResult<i64> {
    let params_json = serde_json::to_string(&computation.computation_params)
        .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
    let demand_ids_json = serde_json::to_string(&computation.demand_ids)
        .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

    conn.execute(
        r#"INSERT INTO demand_computation (
            tenant_id, uuid, computation_code, computation_type, computation_params,
            demand_id, demand_ids, status, needs_recompute, created_by,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            computation.tenant_id,
            &computation.uuid,
            &computation.computation_code,
            computation.computation_type.as_str(),
            params_json,
            computation.demand_id,
            demand_ids_json,
            &computation.status,
            computation.needs_recompute as i64,
            computation.created_by,
            dt_to_sql(&computation.created_at),
            dt_to_sql(&computation.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_computation_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<DemandComputation>> {
    let sql = format!(
        "SELECT {} FROM demand_computation \
         WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        COMPUTATION_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_computation)
        .optional()?)
}

pub(crate) fn set_needs_recompute(
    conn: &Connection,
    tenant_id: i64,
    computation_id: i64,
    needs_recompute: bool,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE demand_computation
           SET needs_recompute = ?, updated_at = datetime('now', 'localtime')
           WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL"#,
        params![needs_recompute as i64, tenant_id, computation_id],
    )?;
    Ok(())
}

pub(crate) fn soft_delete_computation(
    conn: &Connection,
    tenant_id: i64,
    computation_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE demand_computation
           SET deleted_at = datetime('now', 'localtime'),
               updated_at = datetime('now', 'localtime')
           WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL"#,
        params![tenant_id, computation_id],
    )?;
    Ok(())
}

/// 撤回时硬删除运算单 (明细随外键级联)
pub(crate) fn hard_delete_computation(
    conn: &Connection,
    tenant_id: i64,
    computation_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        "DELETE FROM demand_computation WHERE tenant_id = ? AND id = ?",
        params![tenant_id, computation_id],
    )?;
    Ok(())
}

pub(crate) fn insert_computation_item(
    conn: &Connection,
    item: &DemandComputationItem,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO demand_computation_item (
            tenant_id, computation_id, material_id, material_code, material_name,
            unit, required_quantity, suggested_quantity, demand_date, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.computation_id,
            item.material_id,
            &item.material_code,
            &item.material_name,
            &item.unit,
            item.required_quantity.to_string(),
            item.suggested_quantity.to_string(),
            opt_date_to_sql(&item.demand_date),
            dt_to_sql(&item.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_items_by_computation(
    conn: &Connection,
    tenant_id: i64,
    computation_id: i64,
) -> RepositoryResult<Vec<DemandComputationItem>> {
    let sql = format!(
        "SELECT {} FROM demand_computation_item \
         WHERE tenant_id = ? AND computation_id = ? ORDER BY id",
        ITEM_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![tenant_id, computation_id], map_item)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

// ==========================================
// ComputationRepository - 需求运算仓储
// ==========================================
pub struct ComputationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ComputationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create(&self, computation: &DemandComputation) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_computation(&conn, computation)
    }

    pub fn find_by_id(&self, tenant_id: i64, id: i64) -> RepositoryResult<Option<DemandComputation>> {
        let conn = self.get_conn()?;
        find_computation_by_id(&conn, tenant_id, id)
    }

    pub fn set_needs_recompute(
        &self,
        tenant_id: i64,
        computation_id: i64,
        needs_recompute: bool,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        set_needs_recompute(&conn, tenant_id, computation_id, needs_recompute)
    }

    pub fn soft_delete(&self, tenant_id: i64, computation_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        soft_delete_computation(&conn, tenant_id, computation_id)
    }

    pub fn create_item(&self, item: &DemandComputationItem) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_computation_item(&conn, item)
    }

    pub fn list_items(
        &self,
        tenant_id: i64,
        computation_id: i64,
    ) -> RepositoryResult<Vec<DemandComputationItem>> {
        let conn = self.get_conn()?;
        list_items_by_computation(&conn, tenant_id, computation_id)
    }
}

// ==========================================
// 快智造制造管理平台 - 销售来源单据仓储
// ==========================================
// 销售订单/销售预测: 同步引擎读投影, 上拉出库引擎读写交付数量
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::sales::{SalesForecast, SalesForecastItem, SalesOrder, SalesOrderItem};
use crate::domain::types::{DocumentStatus, ReviewStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{dt_to_sql, opt_date_to_sql, sql_to_dec, sql_to_dt, sql_to_opt_date, sql_to_opt_dec, sql_to_opt_dt};

fn invalid(idx: usize, v: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("无法识别的枚举值: {}", v).into(),
    )
}

// ==========================================
// 销售订单
// ==========================================

const ORDER_COLS: &str = "id, tenant_id, order_code, order_name, customer_id, customer_name, \
     order_date, delivery_date, status, review_status, created_at, updated_at, deleted_at";

fn map_order(row: &rusqlite::Row) -> rusqlite::Result<SalesOrder> {
    let status_s: String = row.get(8)?;
    let review_s: String = row.get(9)?;
    Ok(SalesOrder {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        order_code: row.get(2)?,
        order_name: row.get(3)?,
        customer_id: row.get(4)?,
        customer_name: row.get(5)?,
        order_date: sql_to_opt_date(6, row.get(6)?)?,
        delivery_date: sql_to_opt_date(7, row.get(7)?)?,
        status: DocumentStatus::parse(&status_s).ok_or_else(|| invalid(8, &status_s))?,
        review_status: ReviewStatus::parse(&review_s).ok_or_else(|| invalid(9, &review_s))?,
        created_at: sql_to_dt(10, row.get(10)?)?,
        updated_at: sql_to_dt(11, row.get(11)?)?,
        deleted_at: sql_to_opt_dt(12, row.get(12)?)?,
    })
}

const ORDER_ITEM_COLS: &str = "id, tenant_id, sales_order_id, material_id, material_code, \
     material_name, material_spec, unit, order_quantity, unit_price, total_amount, \
     delivery_date, remaining_quantity, delivered_quantity, created_at, updated_at";

fn map_order_item(row: &rusqlite::Row) -> rusqlite::Result<SalesOrderItem> {
    Ok(SalesOrderItem {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        sales_order_id: row.get(2)?,
        material_id: row.get(3)?,
        material_code: row.get(4)?,
        material_name: row.get(5)?,
        material_spec: row.get(6)?,
        unit: row.get(7)?,
        order_quantity: sql_to_dec(8, row.get(8)?)?,
        unit_price: sql_to_opt_dec(9, row.get(9)?)?,
        total_amount: sql_to_opt_dec(10, row.get(10)?)?,
        delivery_date: sql_to_opt_date(11, row.get(11)?)?,
        remaining_quantity: sql_to_dec(12, row.get(12)?)?,
        delivered_quantity: sql_to_dec(13, row.get(13)?)?,
        created_at: sql_to_dt(14, row.get(14)?)?,
        updated_at: sql_to_dt(15, row.get(15)?)?,
    })
}

pub(crate) fn insert_sales_order(conn: &Connection, order: &SalesOrder) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO sales_order (
            tenant_id, order_code, order_name, customer_id, customer_name,
            order_date, delivery_date, status, review_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            order.tenant_id,
            &order.order_code,
            &order.order_name,
            order.customer_id,
            &order.customer_name,
            opt_date_to_sql(&order.order_date),
            opt_date_to_sql(&order.delivery_date),
            order.status.as_str(),
            order.review_status.as_str(),
            dt_to_sql(&order.created_at),
            dt_to_sql(&order.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_sales_order_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<SalesOrder>> {
    let sql = format!(
        "SELECT {} FROM sales_order WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        ORDER_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_order)
        .optional()?)
}

pub(crate) fn insert_sales_order_item(
    conn: &Connection,
    item: &SalesOrderItem,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO sales_order_item (
            tenant_id, sales_order_id, material_id, material_code, material_name,
            material_spec, unit, order_quantity, unit_price, total_amount,
            delivery_date, remaining_quantity, delivered_quantity, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.sales_order_id,
            item.material_id,
            &item.material_code,
            &item.material_name,
            &item.material_spec,
            &item.unit,
            item.order_quantity.to_string(),
            item.unit_price.map(|d| d.to_string()),
            item.total_amount.map(|d| d.to_string()),
            opt_date_to_sql(&item.delivery_date),
            item.remaining_quantity.to_string(),
            item.delivered_quantity.to_string(),
            dt_to_sql(&item.created_at),
            dt_to_sql(&item.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_sales_order_items(
    conn: &Connection,
    tenant_id: i64,
    sales_order_id: i64,
) -> RepositoryResult<Vec<SalesOrderItem>> {
    let sql = format!(
        "SELECT {} FROM sales_order_item \
         WHERE tenant_id = ? AND sales_order_id = ? ORDER BY id",
        ORDER_ITEM_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![tenant_id, sales_order_id], map_order_item)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// 出库后更新订单行交付数量
pub(crate) fn update_sales_order_item_delivery(
    conn: &Connection,
    tenant_id: i64,
    item_id: i64,
    remaining_quantity: &rust_decimal::Decimal,
    delivered_quantity: &rust_decimal::Decimal,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE sales_order_item
           SET remaining_quantity = ?, delivered_quantity = ?,
               updated_at = datetime('now', 'localtime')
           WHERE tenant_id = ? AND id = ?"#,
        params![
            remaining_quantity.to_string(),
            delivered_quantity.to_string(),
            tenant_id,
            item_id
        ],
    )?;
    Ok(())
}

// ==========================================
// 销售预测
// ==========================================

const FORECAST_COLS: &str = "id, tenant_id, forecast_code, forecast_name, forecast_period, \
     start_date, end_date, status, review_status, created_at, updated_at, deleted_at";

fn map_forecast(row: &rusqlite::Row) -> rusqlite::Result<SalesForecast> {
    let status_s: String = row.get(7)?;
    let review_s: String = row.get(8)?;
    Ok(SalesForecast {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        forecast_code: row.get(2)?,
        forecast_name: row.get(3)?,
        forecast_period: row.get(4)?,
        start_date: sql_to_opt_date(5, row.get(5)?)?,
        end_date: sql_to_opt_date(6, row.get(6)?)?,
        status: DocumentStatus::parse(&status_s).ok_or_else(|| invalid(7, &status_s))?,
        review_status: ReviewStatus::parse(&review_s).ok_or_else(|| invalid(8, &review_s))?,
        created_at: sql_to_dt(9, row.get(9)?)?,
        updated_at: sql_to_dt(10, row.get(10)?)?,
        deleted_at: sql_to_opt_dt(11, row.get(11)?)?,
    })
}

const FORECAST_ITEM_COLS: &str = "id, tenant_id, sales_forecast_id, material_id, material_code, \
     material_name, material_spec, unit, forecast_quantity, forecast_date, remaining_quantity, \
     created_at, updated_at";

fn map_forecast_item(row: &rusqlite::Row) -> rusqlite::Result<SalesForecastItem> {
    Ok(SalesForecastItem {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        sales_forecast_id: row.get(2)?,
        material_id: row.get(3)?,
        material_code: row.get(4)?,
        material_name: row.get(5)?,
        material_spec: row.get(6)?,
        unit: row.get(7)?,
        forecast_quantity: sql_to_dec(8, row.get(8)?)?,
        forecast_date: sql_to_opt_date(9, row.get(9)?)?,
        remaining_quantity: sql_to_dec(10, row.get(10)?)?,
        created_at: sql_to_dt(11, row.get(11)?)?,
        updated_at: sql_to_dt(12, row.get(12)?)?,
    })
}

pub(crate) fn insert_sales_forecast(
    conn: &Connection,
    forecast: &SalesForecast,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO sales_forecast (
            tenant_id, forecast_code, forecast_name, forecast_period,
            start_date, end_date, status, review_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            forecast.tenant_id,
            &forecast.forecast_code,
            &forecast.forecast_name,
            &forecast.forecast_period,
            opt_date_to_sql(&forecast.start_date),
            opt_date_to_sql(&forecast.end_date),
            forecast.status.as_str(),
            forecast.review_status.as_str(),
            dt_to_sql(&forecast.created_at),
            dt_to_sql(&forecast.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_sales_forecast_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<SalesForecast>> {
    let sql = format!(
        "SELECT {} FROM sales_forecast WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        FORECAST_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_forecast)
        .optional()?)
}

pub(crate) fn insert_sales_forecast_item(
    conn: &Connection,
    item: &SalesForecastItem,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO sales_forecast_item (
            tenant_id, sales_forecast_id, material_id, material_code, material_name,
            material_spec, unit, forecast_quantity, forecast_date, remaining_quantity,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.sales_forecast_id,
            item.material_id,
            &item.material_code,
            &item.material_name,
            &item.material_spec,
            &item.unit,
            item.forecast_quantity.to_string(),
            opt_date_to_sql(&item.forecast_date),
            item.remaining_quantity.to_string(),
            dt_to_sql(&item.created_at),
            dt_to_sql(&item.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_sales_forecast_items(
    conn: &Connection,
    tenant_id: i64,
    sales_forecast_id: i64,
) -> RepositoryResult<Vec<SalesForecastItem>> {
    let sql = format!(
        "SELECT {} FROM sales_forecast_item \
         WHERE tenant_id = ? AND sales_forecast_id = ? ORDER BY id",
        FORECAST_ITEM_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![tenant_id, sales_forecast_id], map_forecast_item)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// 出库后更新预测行剩余数量
pub(crate) fn update_sales_forecast_item_remaining(
    conn: &Connection,
    tenant_id: i64,
    item_id: i64,
    remaining_quantity: &rust_decimal::Decimal,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE sales_forecast_item
           SET remaining_quantity = ?, updated_at = datetime('now', 'localtime')
           WHERE tenant_id = ? AND id = ?"#,
        params![remaining_quantity.to_string(), tenant_id, item_id],
    )?;
    Ok(())
}

// ==========================================
// SalesRepository - 销售来源单据仓储
// ==========================================
pub struct SalesRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SalesRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create_order(&self, order: &SalesOrder) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_sales_order(&conn, order)
    }

    pub fn find_order(&self, tenant_id: i64, id: i64) -> RepositoryResult<Option<SalesOrder>> {
        let conn = self.get_conn()?;
        find_sales_order_by_id(&conn, tenant_id, id)
    }

    pub fn create_order_item(&self, item: &SalesOrderItem) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_sales_order_item(&conn, item)
    }

    pub fn list_order_items(
        &self,
        tenant_id: i64,
        sales_order_id: i64,
    ) -> RepositoryResult<Vec<SalesOrderItem>> {
        let conn = self.get_conn()?;
        list_sales_order_items(&conn, tenant_id, sales_order_id)
    }

    pub fn create_forecast(&self, forecast: &SalesForecast) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_sales_forecast(&conn, forecast)
    }

    pub fn find_forecast(&self, tenant_id: i64, id: i64) -> RepositoryResult<Option<SalesForecast>> {
        let conn = self.get_conn()?;
        find_sales_forecast_by_id(&conn, tenant_id, id)
    }

    pub fn create_forecast_item(&self, item: &SalesForecastItem) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_sales_forecast_item(&conn, item)
    }

    pub fn list_forecast_items(
        &self,
        tenant_id: i64,
        sales_forecast_id: i64,
    ) -> RepositoryResult<Vec<SalesForecastItem>> {
        let conn = self.get_conn()?;
        list_sales_forecast_items(&conn, tenant_id, sales_forecast_id)
    }
}

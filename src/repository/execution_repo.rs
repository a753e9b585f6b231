// ==========================================
// 快智造制造管理平台 - 下游执行单据仓储
// ==========================================
// 下推/上拉/撤回引擎所需的最小读写面:
// 工单/报工, 生产计划, 采购申请, 采购单/入库单, 出库单, 仓库
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::execution::{
    ProductionPlan, PurchaseOrder, PurchaseOrderItem, PurchaseReceipt, PurchaseReceiptItem,
    PurchaseRequisition, PurchaseRequisitionItem, ReportingRecord, SalesDelivery,
    SalesDeliveryItem, Warehouse, WorkOrder,
};
use crate::domain::types::{DocumentStatus, ReviewStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{dt_to_sql, sql_to_dec, sql_to_dt, sql_to_opt_dec, sql_to_opt_dt};

fn invalid(idx: usize, v: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("无法识别的枚举值: {}", v).into(),
    )
}

// ==========================================
// 工单 / 报工
// ==========================================

const WORK_ORDER_COLS: &str = "id, tenant_id, code, name, product_id, quantity, status, \
     manual_completion, created_at, updated_at, deleted_at";

fn map_work_order(row: &rusqlite::Row) -> rusqlite::Result<WorkOrder> {
    let status_s: String = row.get(6)?;
    Ok(WorkOrder {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        product_id: row.get(4)?,
        quantity: sql_to_dec(5, row.get(5)?)?,
        status: DocumentStatus::parse(&status_s).ok_or_else(|| invalid(6, &status_s))?,
        manual_completion: row.get::<_, i64>(7)? != 0,
        created_at: sql_to_dt(8, row.get(8)?)?,
        updated_at: sql_to_dt(9, row.get(9)?)?,
        deleted_at: sql_to_opt_dt(10, row.get(10)?)?,
    })
}

pub(crate) fn insert_work_order(conn: &Connection, wo: &WorkOrder) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO work_order (
            tenant_id, code, name, product_id, quantity, status,
            manual_completion, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            wo.tenant_id,
            &wo.code,
            &wo.name,
            wo.product_id,
            wo.quantity.to_string(),
            wo.status.as_str(),
            wo.manual_completion as i64,
            dt_to_sql(&wo.created_at),
            dt_to_sql(&wo.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_work_order_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<WorkOrder>> {
    let sql = format!(
        "SELECT {} FROM work_order WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        WORK_ORDER_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_work_order)
        .optional()?)
}

pub(crate) fn count_reporting_records(
    conn: &Connection,
    tenant_id: i64,
    work_order_id: i64,
) -> RepositoryResult<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reporting_record WHERE tenant_id = ? AND work_order_id = ?",
        params![tenant_id, work_order_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// 撤回工单: 先重置回草稿再软删除
pub(crate) fn reset_and_soft_delete_work_order(
    conn: &Connection,
    tenant_id: i64,
    work_order_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE work_order
           SET status = 'DRAFT',
               deleted_at = datetime('now', 'localtime'),
               updated_at = datetime('now', 'localtime')
           WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL"#,
        params![tenant_id, work_order_id],
    )?;
    Ok(())
}

pub(crate) fn insert_reporting_record(
    conn: &Connection,
    record: &ReportingRecord,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO reporting_record (
            tenant_id, work_order_id, reporting_code, quantity, created_at
        ) VALUES (?, ?, ?, ?, ?)"#,
        params![
            record.tenant_id,
            record.work_order_id,
            &record.reporting_code,
            record.quantity.to_string(),
            dt_to_sql(&record.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ==========================================
// 生产计划
// ==========================================

const PLAN_COLS: &str = "id, tenant_id, plan_code, status, execution_status, \
     created_at, updated_at, deleted_at";

fn map_plan(row: &rusqlite::Row) -> rusqlite::Result<ProductionPlan> {
    let status_s: String = row.get(3)?;
    Ok(ProductionPlan {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        plan_code: row.get(2)?,
        status: DocumentStatus::parse(&status_s).ok_or_else(|| invalid(3, &status_s))?,
        execution_status: row.get(4)?,
        created_at: sql_to_dt(5, row.get(5)?)?,
        updated_at: sql_to_dt(6, row.get(6)?)?,
        deleted_at: sql_to_opt_dt(7, row.get(7)?)?,
    })
}

pub(crate) fn insert_production_plan(
    conn: &Connection,
    plan: &ProductionPlan,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO production_plan (
            tenant_id, plan_code, status, execution_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?)"#,
        params![
            plan.tenant_id,
            &plan.plan_code,
            plan.status.as_str(),
            &plan.execution_status,
            dt_to_sql(&plan.created_at),
            dt_to_sql(&plan.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_production_plan_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<ProductionPlan>> {
    let sql = format!(
        "SELECT {} FROM production_plan WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        PLAN_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_plan)
        .optional()?)
}

pub(crate) fn soft_delete_production_plan(
    conn: &Connection,
    tenant_id: i64,
    plan_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE production_plan
           SET deleted_at = datetime('now', 'localtime'),
               updated_at = datetime('now', 'localtime')
           WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL"#,
        params![tenant_id, plan_id],
    )?;
    Ok(())
}

// ==========================================
// 采购申请
// ==========================================

const REQUISITION_COLS: &str = "id, tenant_id, requisition_code, status, conversion_status, \
     created_at, updated_at, deleted_at";

fn map_requisition(row: &rusqlite::Row) -> rusqlite::Result<PurchaseRequisition> {
    let status_s: String = row.get(3)?;
    Ok(PurchaseRequisition {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        requisition_code: row.get(2)?,
        status: DocumentStatus::parse(&status_s).ok_or_else(|| invalid(3, &status_s))?,
        conversion_status: row.get(4)?,
        created_at: sql_to_dt(5, row.get(5)?)?,
        updated_at: sql_to_dt(6, row.get(6)?)?,
        deleted_at: sql_to_opt_dt(7, row.get(7)?)?,
    })
}

pub(crate) fn insert_purchase_requisition(
    conn: &Connection,
    req: &PurchaseRequisition,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO purchase_requisition (
            tenant_id, requisition_code, status, conversion_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?)"#,
        params![
            req.tenant_id,
            &req.requisition_code,
            req.status.as_str(),
            &req.conversion_status,
            dt_to_sql(&req.created_at),
            dt_to_sql(&req.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_purchase_requisition_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<PurchaseRequisition>> {
    let sql = format!(
        "SELECT {} FROM purchase_requisition \
         WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        REQUISITION_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_requisition)
        .optional()?)
}

pub(crate) fn soft_delete_purchase_requisition(
    conn: &Connection,
    tenant_id: i64,
    requisition_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE purchase_requisition
           SET deleted_at = datetime('now', 'localtime'),
               updated_at = datetime('now', 'localtime')
           WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL"#,
        params![tenant_id, requisition_id],
    )?;
    Ok(())
}

pub(crate) fn insert_purchase_requisition_item(
    conn: &Connection,
    item: &PurchaseRequisitionItem,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO purchase_requisition_item (
            tenant_id, requisition_id, material_id, material_code,
            required_quantity, purchase_order_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.requisition_id,
            item.material_id,
            &item.material_code,
            item.required_quantity.to_string(),
            item.purchase_order_id,
            dt_to_sql(&item.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 是否存在已关联采购单的申请明细
pub(crate) fn requisition_has_linked_items(
    conn: &Connection,
    tenant_id: i64,
    requisition_id: i64,
) -> RepositoryResult<bool> {
    let count: i64 = conn.query_row(
        r#"SELECT COUNT(*) FROM purchase_requisition_item
           WHERE tenant_id = ? AND requisition_id = ? AND purchase_order_id IS NOT NULL"#,
        params![tenant_id, requisition_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ==========================================
// 采购订单
// ==========================================

const PO_COLS: &str = "id, tenant_id, order_code, order_name, supplier_id, supplier_name, \
     status, review_status, created_at, updated_at";

fn map_purchase_order(row: &rusqlite::Row) -> rusqlite::Result<PurchaseOrder> {
    let status_s: String = row.get(6)?;
    let review_s: String = row.get(7)?;
    Ok(PurchaseOrder {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        order_code: row.get(2)?,
        order_name: row.get(3)?,
        supplier_id: row.get(4)?,
        supplier_name: row.get(5)?,
        status: DocumentStatus::parse(&status_s).ok_or_else(|| invalid(6, &status_s))?,
        review_status: ReviewStatus::parse(&review_s).ok_or_else(|| invalid(7, &review_s))?,
        created_at: sql_to_dt(8, row.get(8)?)?,
        updated_at: sql_to_dt(9, row.get(9)?)?,
    })
}

const PO_ITEM_COLS: &str = "id, tenant_id, purchase_order_id, material_id, material_code, \
     material_name, unit, order_quantity, received_quantity, unit_price, created_at";

fn map_purchase_order_item(row: &rusqlite::Row) -> rusqlite::Result<PurchaseOrderItem> {
    Ok(PurchaseOrderItem {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        purchase_order_id: row.get(2)?,
        material_id: row.get(3)?,
        material_code: row.get(4)?,
        material_name: row.get(5)?,
        unit: row.get(6)?,
        order_quantity: sql_to_dec(7, row.get(7)?)?,
        received_quantity: sql_to_dec(8, row.get(8)?)?,
        unit_price: sql_to_opt_dec(9, row.get(9)?)?,
        created_at: sql_to_dt(10, row.get(10)?)?,
    })
}

pub(crate) fn insert_purchase_order(
    conn: &Connection,
    order: &PurchaseOrder,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO purchase_order (
            tenant_id, order_code, order_name, supplier_id, supplier_name,
            status, review_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            order.tenant_id,
            &order.order_code,
            &order.order_name,
            order.supplier_id,
            &order.supplier_name,
            order.status.as_str(),
            order.review_status.as_str(),
            dt_to_sql(&order.created_at),
            dt_to_sql(&order.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_purchase_order_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<PurchaseOrder>> {
    let sql = format!(
        "SELECT {} FROM purchase_order WHERE tenant_id = ? AND id = ?",
        PO_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_purchase_order)
        .optional()?)
}

/// 撤回未执行采购单: 硬删除 (明细随外键级联)
pub(crate) fn hard_delete_purchase_order(
    conn: &Connection,
    tenant_id: i64,
    order_id: i64,
) -> RepositoryResult<()> {
    conn.execute(
        "DELETE FROM purchase_order WHERE tenant_id = ? AND id = ?",
        params![tenant_id, order_id],
    )?;
    Ok(())
}

pub(crate) fn insert_purchase_order_item(
    conn: &Connection,
    item: &PurchaseOrderItem,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO purchase_order_item (
            tenant_id, purchase_order_id, material_id, material_code, material_name,
            unit, order_quantity, received_quantity, unit_price, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.purchase_order_id,
            item.material_id,
            &item.material_code,
            &item.material_name,
            &item.unit,
            item.order_quantity.to_string(),
            item.received_quantity.to_string(),
            item.unit_price.map(|d| d.to_string()),
            dt_to_sql(&item.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_purchase_order_items(
    conn: &Connection,
    tenant_id: i64,
    purchase_order_id: i64,
) -> RepositoryResult<Vec<PurchaseOrderItem>> {
    let sql = format!(
        "SELECT {} FROM purchase_order_item \
         WHERE tenant_id = ? AND purchase_order_id = ? ORDER BY id",
        PO_ITEM_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![tenant_id, purchase_order_id], map_purchase_order_item)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub(crate) fn update_purchase_order_item_received(
    conn: &Connection,
    tenant_id: i64,
    item_id: i64,
    received_quantity: &rust_decimal::Decimal,
) -> RepositoryResult<()> {
    conn.execute(
        r#"UPDATE purchase_order_item SET received_quantity = ?
           WHERE tenant_id = ? AND id = ?"#,
        params![received_quantity.to_string(), tenant_id, item_id],
    )?;
    Ok(())
}

// ==========================================
// 采购入库单
// ==========================================

pub(crate) fn insert_purchase_receipt(
    conn: &Connection,
    receipt: &PurchaseReceipt,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO purchase_receipt (
            tenant_id, receipt_code, purchase_order_id, warehouse_id,
            status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        params![
            receipt.tenant_id,
            &receipt.receipt_code,
            receipt.purchase_order_id,
            receipt.warehouse_id,
            receipt.status.as_str(),
            dt_to_sql(&receipt.created_at),
            dt_to_sql(&receipt.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 采购单是否已有入库单 (已执行判定)
pub(crate) fn purchase_order_has_receipts(
    conn: &Connection,
    tenant_id: i64,
    purchase_order_id: i64,
) -> RepositoryResult<bool> {
    let count: i64 = conn.query_row(
        r#"SELECT COUNT(*) FROM purchase_receipt
           WHERE tenant_id = ? AND purchase_order_id = ? AND deleted_at IS NULL"#,
        params![tenant_id, purchase_order_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn insert_purchase_receipt_item(
    conn: &Connection,
    item: &PurchaseReceiptItem,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO purchase_receipt_item (
            tenant_id, receipt_id, purchase_order_item_id, material_id, material_code,
            receipt_quantity, qualified_quantity, unqualified_quantity, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.receipt_id,
            item.purchase_order_item_id,
            item.material_id,
            &item.material_code,
            item.receipt_quantity.to_string(),
            item.qualified_quantity.to_string(),
            item.unqualified_quantity.to_string(),
            dt_to_sql(&item.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ==========================================
// 销售出库单
// ==========================================

pub(crate) fn insert_sales_delivery(
    conn: &Connection,
    delivery: &SalesDelivery,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO sales_delivery (
            tenant_id, delivery_code, source_type, source_id, customer_id,
            customer_name, status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            delivery.tenant_id,
            &delivery.delivery_code,
            &delivery.source_type,
            delivery.source_id,
            delivery.customer_id,
            &delivery.customer_name,
            delivery.status.as_str(),
            dt_to_sql(&delivery.created_at),
            dt_to_sql(&delivery.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_sales_delivery_item(
    conn: &Connection,
    item: &SalesDeliveryItem,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO sales_delivery_item (
            tenant_id, delivery_id, source_item_id, material_id, material_code,
            delivery_quantity, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        params![
            item.tenant_id,
            item.delivery_id,
            item.source_item_id,
            item.material_id,
            &item.material_code,
            item.delivery_quantity.to_string(),
            dt_to_sql(&item.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ==========================================
// 仓库
// ==========================================

pub(crate) fn insert_warehouse(conn: &Connection, warehouse: &Warehouse) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO warehouse (
            tenant_id, warehouse_code, warehouse_name, is_active, created_at
        ) VALUES (?, ?, ?, ?, ?)"#,
        params![
            warehouse.tenant_id,
            &warehouse.warehouse_code,
            &warehouse.warehouse_name,
            warehouse.is_active as i64,
            dt_to_sql(&warehouse.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 默认仓库: 最早创建的启用仓库
pub(crate) fn find_default_warehouse(
    conn: &Connection,
    tenant_id: i64,
) -> RepositoryResult<Option<Warehouse>> {
    Ok(conn
        .query_row(
            r#"SELECT id, tenant_id, warehouse_code, warehouse_name, is_active, created_at
               FROM warehouse
               WHERE tenant_id = ? AND is_active = 1
               ORDER BY id LIMIT 1"#,
            params![tenant_id],
            |row| {
                Ok(Warehouse {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    warehouse_code: row.get(2)?,
                    warehouse_name: row.get(3)?,
                    is_active: row.get::<_, i64>(4)? != 0,
                    created_at: sql_to_dt(5, row.get(5)?)?,
                })
            },
        )
        .optional()?)
}

// ==========================================
// ExecutionRepository - 下游执行单据仓储
// ==========================================
pub struct ExecutionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExecutionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 工单 / 报工 =====

    pub fn create_work_order(&self, wo: &WorkOrder) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_work_order(&conn, wo)
    }

    pub fn find_work_order(&self, tenant_id: i64, id: i64) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;
        find_work_order_by_id(&conn, tenant_id, id)
    }

    pub fn create_reporting_record(&self, record: &ReportingRecord) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_reporting_record(&conn, record)
    }

    // ===== 生产计划 =====

    pub fn create_production_plan(&self, plan: &ProductionPlan) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_production_plan(&conn, plan)
    }

    pub fn find_production_plan(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> RepositoryResult<Option<ProductionPlan>> {
        let conn = self.get_conn()?;
        find_production_plan_by_id(&conn, tenant_id, id)
    }

    // ===== 采购申请 =====

    pub fn create_purchase_requisition(
        &self,
        req: &PurchaseRequisition,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_purchase_requisition(&conn, req)
    }

    pub fn find_purchase_requisition(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> RepositoryResult<Option<PurchaseRequisition>> {
        let conn = self.get_conn()?;
        find_purchase_requisition_by_id(&conn, tenant_id, id)
    }

    pub fn create_purchase_requisition_item(
        &self,
        item: &PurchaseRequisitionItem,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_purchase_requisition_item(&conn, item)
    }

    // ===== 采购订单 =====

    pub fn create_purchase_order(&self, order: &PurchaseOrder) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_purchase_order(&conn, order)
    }

    pub fn find_purchase_order(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> RepositoryResult<Option<PurchaseOrder>> {
        let conn = self.get_conn()?;
        find_purchase_order_by_id(&conn, tenant_id, id)
    }

    pub fn create_purchase_order_item(&self, item: &PurchaseOrderItem) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_purchase_order_item(&conn, item)
    }

    pub fn list_purchase_order_items(
        &self,
        tenant_id: i64,
        purchase_order_id: i64,
    ) -> RepositoryResult<Vec<PurchaseOrderItem>> {
        let conn = self.get_conn()?;
        list_purchase_order_items(&conn, tenant_id, purchase_order_id)
    }

    // ===== 入库单 / 出库单 =====

    pub fn purchase_order_has_receipts(
        &self,
        tenant_id: i64,
        purchase_order_id: i64,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        purchase_order_has_receipts(&conn, tenant_id, purchase_order_id)
    }

    // ===== 仓库 =====

    pub fn create_warehouse(&self, warehouse: &Warehouse) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_warehouse(&conn, warehouse)
    }

    pub fn find_default_warehouse(&self, tenant_id: i64) -> RepositoryResult<Option<Warehouse>> {
        let conn = self.get_conn()?;
        find_default_warehouse(&conn, tenant_id)
    }
}

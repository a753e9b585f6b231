// ==========================================
// 快智造制造管理平台 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - init_schema 幂等建表, main 与测试共用
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 幂等初始化数据库 schema
///
/// 约定:
/// - 数量/金额列统一 TEXT 存 Decimal 字符串, 避免浮点误差
/// - 时间列统一 TEXT, 格式 "%Y-%m-%d %H:%M:%S"
/// - 软删除列 deleted_at 为空表示未删除
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- ========== 统一需求 ==========
        CREATE TABLE IF NOT EXISTS demand (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            uuid TEXT NOT NULL UNIQUE,
            demand_code TEXT NOT NULL,
            demand_name TEXT,
            demand_type TEXT NOT NULL,
            business_mode TEXT NOT NULL,
            source_type TEXT,
            source_id INTEGER,
            start_date TEXT,
            end_date TEXT,
            order_date TEXT,
            delivery_date TEXT,
            customer_id INTEGER,
            customer_name TEXT,
            forecast_period TEXT,
            total_quantity TEXT NOT NULL DEFAULT '0',
            total_amount TEXT NOT NULL DEFAULT '0',
            status TEXT NOT NULL DEFAULT 'DRAFT',
            review_status TEXT NOT NULL DEFAULT 'PENDING',
            reviewer_id INTEGER,
            reviewer_name TEXT,
            review_time TEXT,
            review_remarks TEXT,
            submit_time TEXT,
            pushed_to_computation INTEGER NOT NULL DEFAULT 0,
            computation_id INTEGER,
            computation_code TEXT,
            priority TEXT,
            notes TEXT,
            created_by INTEGER NOT NULL,
            created_by_name TEXT,
            updated_by INTEGER NOT NULL,
            updated_by_name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, demand_code)
        );
        CREATE INDEX IF NOT EXISTS idx_demand_tenant_status
            ON demand(tenant_id, status);
        CREATE INDEX IF NOT EXISTS idx_demand_source
            ON demand(tenant_id, source_type, source_id);

        CREATE TABLE IF NOT EXISTS demand_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            demand_id INTEGER NOT NULL REFERENCES demand(id) ON DELETE CASCADE,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            material_name TEXT,
            material_spec TEXT,
            unit TEXT,
            required_quantity TEXT NOT NULL DEFAULT '0',
            delivery_date TEXT,
            forecast_date TEXT,
            unit_price TEXT,
            item_amount TEXT,
            remaining_quantity TEXT,
            delivered_quantity TEXT,
            delivery_status TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        CREATE INDEX IF NOT EXISTS idx_demand_item_demand
            ON demand_item(demand_id);

        -- ========== 需求快照与重算历史 ==========
        CREATE TABLE IF NOT EXISTS demand_snapshot (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            demand_id INTEGER NOT NULL,
            snapshot_type TEXT NOT NULL,
            snapshot_at TEXT NOT NULL,
            trigger_reason TEXT NOT NULL,
            demand_snapshot TEXT NOT NULL,
            demand_items_snapshot TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        CREATE INDEX IF NOT EXISTS idx_demand_snapshot_demand
            ON demand_snapshot(tenant_id, demand_id);

        CREATE TABLE IF NOT EXISTS demand_recalc_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            demand_id INTEGER NOT NULL,
            recalc_at TEXT NOT NULL,
            trigger_type TEXT NOT NULL,
            source_type TEXT,
            source_id INTEGER,
            trigger_reason TEXT,
            snapshot_id INTEGER,
            operator_id INTEGER NOT NULL,
            result TEXT NOT NULL,
            message TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        CREATE INDEX IF NOT EXISTS idx_demand_recalc_history_demand
            ON demand_recalc_history(tenant_id, demand_id);

        -- ========== 单据关联图 ==========
        CREATE TABLE IF NOT EXISTS document_relation (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            source_type TEXT NOT NULL,
            source_id INTEGER NOT NULL,
            source_code TEXT,
            source_name TEXT,
            target_type TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            target_code TEXT,
            target_name TEXT,
            relation_type TEXT NOT NULL,
            relation_mode TEXT NOT NULL,
            relation_desc TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            UNIQUE(tenant_id, source_type, source_id, target_type, target_id)
        );
        CREATE INDEX IF NOT EXISTS idx_document_relation_source
            ON document_relation(tenant_id, source_type, source_id);
        CREATE INDEX IF NOT EXISTS idx_document_relation_target
            ON document_relation(tenant_id, target_type, target_id);

        -- ========== 状态流转审计 ==========
        CREATE TABLE IF NOT EXISTS document_transition_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            from_state TEXT NOT NULL,
            to_state TEXT NOT NULL,
            operator_id INTEGER NOT NULL,
            operator_name TEXT,
            transition_reason TEXT,
            transition_comment TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        CREATE INDEX IF NOT EXISTS idx_transition_log_entity
            ON document_transition_log(tenant_id, entity_type, entity_id);

        -- ========== 需求运算 ==========
        CREATE TABLE IF NOT EXISTS demand_computation (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            uuid TEXT NOT NULL UNIQUE,
            computation_code TEXT NOT NULL,
            computation_type TEXT NOT NULL,
            computation_params TEXT NOT NULL,
            demand_id INTEGER NOT NULL,
            demand_ids TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            needs_recompute INTEGER NOT NULL DEFAULT 0,
            created_by INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, computation_code)
        );

        CREATE TABLE IF NOT EXISTS demand_computation_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            computation_id INTEGER NOT NULL REFERENCES demand_computation(id) ON DELETE CASCADE,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            material_name TEXT,
            unit TEXT,
            required_quantity TEXT NOT NULL DEFAULT '0',
            suggested_quantity TEXT NOT NULL DEFAULT '0',
            demand_date TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        -- ========== 销售来源单据 ==========
        CREATE TABLE IF NOT EXISTS sales_order (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            order_code TEXT NOT NULL,
            order_name TEXT,
            customer_id INTEGER,
            customer_name TEXT,
            order_date TEXT,
            delivery_date TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            review_status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, order_code)
        );

        CREATE TABLE IF NOT EXISTS sales_order_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            sales_order_id INTEGER NOT NULL REFERENCES sales_order(id) ON DELETE CASCADE,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            material_name TEXT,
            material_spec TEXT,
            unit TEXT,
            order_quantity TEXT NOT NULL DEFAULT '0',
            unit_price TEXT,
            total_amount TEXT,
            delivery_date TEXT,
            remaining_quantity TEXT NOT NULL DEFAULT '0',
            delivered_quantity TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS sales_forecast (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            forecast_code TEXT NOT NULL,
            forecast_name TEXT,
            forecast_period TEXT,
            start_date TEXT,
            end_date TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            review_status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, forecast_code)
        );

        CREATE TABLE IF NOT EXISTS sales_forecast_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            sales_forecast_id INTEGER NOT NULL REFERENCES sales_forecast(id) ON DELETE CASCADE,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            material_name TEXT,
            material_spec TEXT,
            unit TEXT,
            forecast_quantity TEXT NOT NULL DEFAULT '0',
            forecast_date TEXT,
            remaining_quantity TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        -- ========== 下游执行单据 ==========
        CREATE TABLE IF NOT EXISTS work_order (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            code TEXT NOT NULL,
            name TEXT,
            product_id INTEGER NOT NULL,
            quantity TEXT NOT NULL DEFAULT '0',
            status TEXT NOT NULL DEFAULT 'DRAFT',
            manual_completion INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, code)
        );

        CREATE TABLE IF NOT EXISTS reporting_record (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            work_order_id INTEGER NOT NULL,
            reporting_code TEXT NOT NULL,
            quantity TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );
        CREATE INDEX IF NOT EXISTS idx_reporting_record_wo
            ON reporting_record(tenant_id, work_order_id);

        CREATE TABLE IF NOT EXISTS production_plan (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            plan_code TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            execution_status TEXT NOT NULL DEFAULT '未执行',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, plan_code)
        );

        CREATE TABLE IF NOT EXISTS purchase_requisition (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            requisition_code TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            conversion_status TEXT NOT NULL DEFAULT 'none',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, requisition_code)
        );

        CREATE TABLE IF NOT EXISTS purchase_requisition_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            requisition_id INTEGER NOT NULL REFERENCES purchase_requisition(id) ON DELETE CASCADE,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            required_quantity TEXT NOT NULL DEFAULT '0',
            purchase_order_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS purchase_order (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            order_code TEXT NOT NULL,
            order_name TEXT,
            supplier_id INTEGER,
            supplier_name TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            review_status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            UNIQUE(tenant_id, order_code)
        );

        CREATE TABLE IF NOT EXISTS purchase_order_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            purchase_order_id INTEGER NOT NULL REFERENCES purchase_order(id) ON DELETE CASCADE,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            material_name TEXT,
            unit TEXT,
            order_quantity TEXT NOT NULL DEFAULT '0',
            received_quantity TEXT NOT NULL DEFAULT '0',
            unit_price TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS purchase_receipt (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            receipt_code TEXT NOT NULL,
            purchase_order_id INTEGER NOT NULL,
            warehouse_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, receipt_code)
        );

        CREATE TABLE IF NOT EXISTS purchase_receipt_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            receipt_id INTEGER NOT NULL REFERENCES purchase_receipt(id) ON DELETE CASCADE,
            purchase_order_item_id INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            receipt_quantity TEXT NOT NULL DEFAULT '0',
            qualified_quantity TEXT NOT NULL DEFAULT '0',
            unqualified_quantity TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS sales_delivery (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            delivery_code TEXT NOT NULL,
            source_type TEXT,
            source_id INTEGER,
            customer_id INTEGER,
            customer_name TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            deleted_at TEXT,
            UNIQUE(tenant_id, delivery_code)
        );

        CREATE TABLE IF NOT EXISTS sales_delivery_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            delivery_id INTEGER NOT NULL REFERENCES sales_delivery(id) ON DELETE CASCADE,
            source_item_id INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            material_code TEXT NOT NULL,
            delivery_quantity TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS warehouse (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            warehouse_code TEXT NOT NULL,
            warehouse_name TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            UNIQUE(tenant_id, warehouse_code)
        );
        "#,
    )?;
    Ok(())
}

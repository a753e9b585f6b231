// ==========================================
// 集成测试公共辅助
// ==========================================
// 提供: 临时数据库 + AppState 组装, 外部服务假实现,
//       销售/执行单据种子数据
// ==========================================

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Local;
use rust_decimal::Decimal;
use tempfile::TempDir;

use kuaizhizao_core::app::{AppState, ExternalServices};
use kuaizhizao_core::domain::execution::{
    ProductionPlan, PurchaseOrder, PurchaseOrderItem, ReportingRecord, Warehouse, WorkOrder,
};
use kuaizhizao_core::domain::sales::{
    SalesForecast, SalesForecastItem, SalesOrder, SalesOrderItem,
};
use kuaizhizao_core::domain::types::{DocumentStatus, ReviewStatus, PLAN_EXEC_NOT_EXECUTED};
use kuaizhizao_core::external::{
    dated_code, BusinessConfigService, CodeRuleService, ExternalError, MessagingService,
};

pub const TENANT: i64 = 1;
pub const OPERATOR: i64 = 100;

// ==========================================
// 测试环境
// ==========================================

pub struct TestEnv {
    /// 持有临时目录, 析构时自动清理
    pub _dir: TempDir,
    pub state: AppState,
}

/// 默认外部服务 (编码规则不可用 ⇒ 降级编码; 全部要求审核)
pub fn setup() -> TestEnv {
    setup_with(ExternalServices::default())
}

pub fn setup_with(services: ExternalServices) -> TestEnv {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let db_path = dir.path().join("test.db").to_string_lossy().to_string();
    let state = AppState::with_services(db_path, services).expect("初始化AppState失败");
    TestEnv { _dir: dir, state }
}

/// 直连测试数据库 (测试内直接修改来源单据行用)
pub fn raw_conn(env: &TestEnv) -> rusqlite::Connection {
    kuaizhizao_core::db::open_sqlite_connection(&env.state.db_path).expect("打开测试数据库失败")
}

pub fn dec(v: i64) -> Decimal {
    Decimal::from(v)
}

// ==========================================
// 外部服务假实现
// ==========================================

/// 编码规则假实现: 按规则键映射前缀, 生成带日期段的正式编码
pub struct RuleKeyCodeService;

impl CodeRuleService for RuleKeyCodeService {
    fn generate_code(&self, _tenant_id: i64, rule_key: &str) -> Result<String, ExternalError> {
        let prefix = match rule_key {
            "SALES_FORECAST_CODE" => "SF",
            "SALES_ORDER_CODE" => "SO",
            "DEMAND_COMPUTATION_CODE" => "YS",
            "PURCHASE_RECEIPT_CODE" => "RK",
            "SALES_DELIVERY_CODE" => "CK",
            other => {
                return Err(ExternalError::CodeRule(format!("未知规则键: {}", other)));
            }
        };
        Ok(dated_code(prefix))
    }
}

/// 消息服务假实现: 只计数不投递
#[derive(Default)]
pub struct CountingMessagingService {
    pub sent: AtomicUsize,
}

impl MessagingService for CountingMessagingService {
    fn send_message(
        &self,
        _tenant_id: i64,
        _template_key: &str,
        _receiver_id: i64,
        _params: &std::collections::HashMap<String, String>,
    ) -> Result<(), ExternalError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 业务配置假实现: 审核开关与节点开关可配置
pub struct FixedBusinessConfig {
    pub audit_required: bool,
    pub nodes_enabled: bool,
}

impl BusinessConfigService for FixedBusinessConfig {
    fn check_audit_required(
        &self,
        _tenant_id: i64,
        _entity_type: &str,
    ) -> Result<bool, ExternalError> {
        Ok(self.audit_required)
    }

    fn check_node_enabled(&self, _tenant_id: i64, _node_key: &str) -> Result<bool, ExternalError> {
        Ok(self.nodes_enabled)
    }
}

// ==========================================
// 销售来源单据种子
// ==========================================

pub fn seed_sales_order(
    env: &TestEnv,
    code: &str,
    status: DocumentStatus,
    review_status: ReviewStatus,
) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .sales_repo
        .create_order(&SalesOrder {
            id: 0,
            tenant_id: TENANT,
            order_code: code.to_string(),
            order_name: Some(format!("{}号订单", code)),
            customer_id: Some(9),
            customer_name: Some("测试客户".to_string()),
            order_date: Some(now.date()),
            delivery_date: Some(now.date()),
            status,
            review_status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .expect("创建销售订单失败")
}

pub fn seed_sales_order_item(
    env: &TestEnv,
    sales_order_id: i64,
    material_code: &str,
    quantity: i64,
    unit_price: Option<i64>,
) -> i64 {
    let now = Local::now().naive_local();
    let qty = dec(quantity);
    let price = unit_price.map(dec);
    env.state
        .sales_repo
        .create_order_item(&SalesOrderItem {
            id: 0,
            tenant_id: TENANT,
            sales_order_id,
            material_id: 1,
            material_code: material_code.to_string(),
            material_name: Some(format!("物料{}", material_code)),
            material_spec: None,
            unit: Some("个".to_string()),
            order_quantity: qty,
            unit_price: price,
            total_amount: price.map(|p| p * qty),
            delivery_date: Some(now.date()),
            remaining_quantity: qty,
            delivered_quantity: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        })
        .expect("创建销售订单明细失败")
}

pub fn seed_sales_forecast(env: &TestEnv, code: &str, status: DocumentStatus) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .sales_repo
        .create_forecast(&SalesForecast {
            id: 0,
            tenant_id: TENANT,
            forecast_code: code.to_string(),
            forecast_name: Some(format!("{}号预测", code)),
            forecast_period: Some("2026-09".to_string()),
            start_date: Some(now.date()),
            end_date: Some(now.date()),
            status,
            review_status: ReviewStatus::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .expect("创建销售预测失败")
}

pub fn seed_sales_forecast_item(
    env: &TestEnv,
    sales_forecast_id: i64,
    material_code: &str,
    quantity: i64,
) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .sales_repo
        .create_forecast_item(&SalesForecastItem {
            id: 0,
            tenant_id: TENANT,
            sales_forecast_id,
            material_id: 1,
            material_code: material_code.to_string(),
            material_name: Some(format!("物料{}", material_code)),
            material_spec: None,
            unit: Some("个".to_string()),
            forecast_quantity: dec(quantity),
            forecast_date: Some(now.date()),
            remaining_quantity: dec(quantity),
            created_at: now,
            updated_at: now,
        })
        .expect("创建销售预测明细失败")
}

// ==========================================
// 下游执行单据种子
// ==========================================

pub fn seed_work_order(env: &TestEnv, code: &str, status: DocumentStatus) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .execution_repo
        .create_work_order(&WorkOrder {
            id: 0,
            tenant_id: TENANT,
            code: code.to_string(),
            name: Some(format!("{}号工单", code)),
            product_id: 1,
            quantity: dec(10),
            status,
            manual_completion: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .expect("创建工单失败")
}

pub fn seed_reporting_record(env: &TestEnv, work_order_id: i64, code: &str) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .execution_repo
        .create_reporting_record(&ReportingRecord {
            id: 0,
            tenant_id: TENANT,
            work_order_id,
            reporting_code: code.to_string(),
            quantity: dec(5),
            created_at: now,
        })
        .expect("创建报工记录失败")
}

pub fn seed_production_plan(env: &TestEnv, code: &str) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .execution_repo
        .create_production_plan(&ProductionPlan {
            id: 0,
            tenant_id: TENANT,
            plan_code: code.to_string(),
            status: DocumentStatus::Audited,
            execution_status: PLAN_EXEC_NOT_EXECUTED.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
        .expect("创建生产计划失败")
}

pub fn seed_warehouse(env: &TestEnv, code: &str) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .execution_repo
        .create_warehouse(&Warehouse {
            id: 0,
            tenant_id: TENANT,
            warehouse_code: code.to_string(),
            warehouse_name: Some("成品仓".to_string()),
            is_active: true,
            created_at: now,
        })
        .expect("创建仓库失败")
}

pub fn seed_purchase_order(env: &TestEnv, code: &str, status: DocumentStatus) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .execution_repo
        .create_purchase_order(&PurchaseOrder {
            id: 0,
            tenant_id: TENANT,
            order_code: code.to_string(),
            order_name: Some(format!("{}号采购单", code)),
            supplier_id: Some(7),
            supplier_name: Some("测试供应商".to_string()),
            status,
            review_status: ReviewStatus::Approved,
            created_at: now,
            updated_at: now,
        })
        .expect("创建采购单失败")
}

pub fn seed_purchase_order_item(
    env: &TestEnv,
    purchase_order_id: i64,
    material_code: &str,
    quantity: i64,
) -> i64 {
    let now = Local::now().naive_local();
    env.state
        .execution_repo
        .create_purchase_order_item(&PurchaseOrderItem {
            id: 0,
            tenant_id: TENANT,
            purchase_order_id,
            material_id: 1,
            material_code: material_code.to_string(),
            material_name: Some(format!("物料{}", material_code)),
            unit: Some("个".to_string()),
            order_quantity: dec(quantity),
            received_quantity: Decimal::ZERO,
            unit_price: Some(dec(3)),
            created_at: now,
        })
        .expect("创建采购单明细失败")
}

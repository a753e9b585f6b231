// ==========================================
// 快智造制造管理平台 - 销售来源单据领域模型
// ==========================================
// 销售订单(MTO) / 销售预测(MTS) 是统一需求的上游来源
// 核心只读取投影所需字段; 字段级CRUD细节属于外部业务模块
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::{DocumentStatus, ReviewStatus};

// ==========================================
// SalesOrder - 销售订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: i64,
    pub tenant_id: i64,
    pub order_code: String,
    pub order_name: Option<String>,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub status: DocumentStatus,
    pub review_status: ReviewStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderItem {
    pub id: i64,
    pub tenant_id: i64,
    pub sales_order_id: i64,
    pub material_id: i64,
    pub material_code: String,
    pub material_name: Option<String>,
    pub material_spec: Option<String>,
    pub unit: Option<String>,
    pub order_quantity: Decimal,          // 订单数量
    pub unit_price: Option<Decimal>,      // 单价
    pub total_amount: Option<Decimal>,    // 行金额
    pub delivery_date: Option<NaiveDate>, // 行交货日期
    pub remaining_quantity: Decimal,      // 未出库数量 (上拉出库的数量包络)
    pub delivered_quantity: Decimal,      // 已出库数量
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// SalesForecast - 销售预测
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesForecast {
    pub id: i64,
    pub tenant_id: i64,
    pub forecast_code: String,
    pub forecast_name: Option<String>,
    pub forecast_period: Option<String>, // 预测期间 (如 2026-03)
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: DocumentStatus,
    pub review_status: ReviewStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesForecastItem {
    pub id: i64,
    pub tenant_id: i64,
    pub sales_forecast_id: i64,
    pub material_id: i64,
    pub material_code: String,
    pub material_name: Option<String>,
    pub material_spec: Option<String>,
    pub unit: Option<String>,
    pub forecast_quantity: Decimal,       // 预测数量
    pub forecast_date: Option<NaiveDate>, // 预测日期
    pub remaining_quantity: Decimal,      // 未出库数量 (MTS上拉出库用)
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

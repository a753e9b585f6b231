// ==========================================
// 快智造制造管理平台 - 下游执行单据领域模型
// ==========================================
// 下游单据只承载"是否已执行"判定与撤回级联所需的最小字段:
// 工单/报工, 生产计划, 采购申请, 采购单/入库单, 销售出库单, 仓库
// ==========================================

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::{DocumentStatus, ReviewStatus};

// ==========================================
// WorkOrder - 生产工单
// ==========================================
// 已执行判定: 存在报工记录, 或状态 IN_PROGRESS,
// 或 COMPLETED 且非人工完工
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: i64,
    pub tenant_id: i64,
    pub code: String,
    pub name: Option<String>,
    pub product_id: i64,
    pub quantity: Decimal,
    pub status: DocumentStatus,
    pub manual_completion: bool, // 人工完工标记
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

/// 报工记录 (存在即视为工单已执行)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingRecord {
    pub id: i64,
    pub tenant_id: i64,
    pub work_order_id: i64,
    pub reporting_code: String,
    pub quantity: Decimal,
    pub created_at: NaiveDateTime,
}

// ==========================================
// ProductionPlan - 生产计划
// ==========================================
// 已执行判定: execution_status ≠ 未执行, 或已派生工单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub id: i64,
    pub tenant_id: i64,
    pub plan_code: String,
    pub status: DocumentStatus,
    pub execution_status: String, // 未执行 / 执行中 / 已执行
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

// ==========================================
// PurchaseRequisition - 采购申请
// ==========================================
// 已执行判定: 转换状态为部分/全部转换, 或任一明细已关联采购单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequisition {
    pub id: i64,
    pub tenant_id: i64,
    pub requisition_code: String,
    pub status: DocumentStatus,
    pub conversion_status: String, // none / partial / full
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequisitionItem {
    pub id: i64,
    pub tenant_id: i64,
    pub requisition_id: i64,
    pub material_id: i64,
    pub material_code: String,
    pub required_quantity: Decimal,
    pub purchase_order_id: Option<i64>, // 已转采购单则非空
    pub created_at: NaiveDateTime,
}

// ==========================================
// PurchaseOrder - 采购订单
// ==========================================
// 已执行判定: 存在任何入库单; 未执行撤回时硬删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: i64,
    pub tenant_id: i64,
    pub order_code: String,
    pub order_name: Option<String>,
    pub supplier_id: Option<i64>,
    pub supplier_name: Option<String>,
    pub status: DocumentStatus,
    pub review_status: ReviewStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: i64,
    pub tenant_id: i64,
    pub purchase_order_id: i64,
    pub material_id: i64,
    pub material_code: String,
    pub material_name: Option<String>,
    pub unit: Option<String>,
    pub order_quantity: Decimal,    // 订购数量
    pub received_quantity: Decimal, // 已入库数量
    pub unit_price: Option<Decimal>,
    pub created_at: NaiveDateTime,
}

impl PurchaseOrderItem {
    /// 未入库数量 (下推入库单的数量包络)
    pub fn outstanding_quantity(&self) -> Decimal {
        self.order_quantity - self.received_quantity
    }
}

// ==========================================
// PurchaseReceipt - 采购入库单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub id: i64,
    pub tenant_id: i64,
    pub receipt_code: String,
    pub purchase_order_id: i64,
    pub warehouse_id: i64,
    pub status: DocumentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceiptItem {
    pub id: i64,
    pub tenant_id: i64,
    pub receipt_id: i64,
    pub purchase_order_item_id: i64,
    pub material_id: i64,
    pub material_code: String,
    pub receipt_quantity: Decimal,     // 入库数量
    pub qualified_quantity: Decimal,   // 合格数量 (默认=入库数量, 质检后可修订)
    pub unqualified_quantity: Decimal, // 不合格数量 (默认0)
    pub created_at: NaiveDateTime,
}

// ==========================================
// SalesDelivery - 销售出库单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesDelivery {
    pub id: i64,
    pub tenant_id: i64,
    pub delivery_code: String,
    pub source_type: Option<String>, // sales_order / sales_forecast
    pub source_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub status: DocumentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesDeliveryItem {
    pub id: i64,
    pub tenant_id: i64,
    pub delivery_id: i64,
    pub source_item_id: i64, // 来源行ID (订单行或预测行)
    pub material_id: i64,
    pub material_code: String,
    pub delivery_quantity: Decimal,
    pub created_at: NaiveDateTime,
}

// ==========================================
// Warehouse - 仓库 (入库单默认仓库解析用)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i64,
    pub tenant_id: i64,
    pub warehouse_code: String,
    pub warehouse_name: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_outstanding_quantity() {
        let item = PurchaseOrderItem {
            id: 1,
            tenant_id: 1,
            purchase_order_id: 1,
            material_id: 1,
            material_code: "M001".to_string(),
            material_name: None,
            unit: None,
            order_quantity: Decimal::from(10),
            received_quantity: Decimal::from(4),
            unit_price: None,
            created_at: chrono::Local::now().naive_local(),
        };
        assert_eq!(item.outstanding_quantity(), Decimal::from(6));
    }
}

// ==========================================
// 快智造制造管理平台 - 统一需求领域模型
// ==========================================
// 统一需求: 销售预测(MTS)与销售订单(MTO)合并为同一个
// 面向下游计划的实体, 其投影字段在创建与每次重算时刷新
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::{
    BusinessMode, DemandType, DocumentKind, DocumentStatus, ReviewStatus,
};

// ==========================================
// Demand - 统一需求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    // ===== 标识 =====
    pub id: i64,                         // 内部自增ID
    pub tenant_id: i64,                  // 租户ID
    pub uuid: String,                    // 业务UUID (对外标识)
    pub demand_code: String,             // 需求编码 (租户内唯一)
    pub demand_name: Option<String>,     // 需求名称

    // ===== 类型 =====
    pub demand_type: DemandType,         // 需求类型
    pub business_mode: BusinessMode,     // 业务模式 (预测⇒MTS, 订单⇒MTO)

    // ===== 来源单据 (直接创建的需求为空) =====
    pub source_type: Option<DocumentKind>, // 来源单据类型
    pub source_id: Option<i64>,            // 来源单据ID

    // ===== 投影字段 (创建和每次重算时从来源刷新) =====
    pub start_date: Option<NaiveDate>,   // 开始日期
    pub end_date: Option<NaiveDate>,     // 结束日期
    pub order_date: Option<NaiveDate>,   // 下单日期 (MTO)
    pub delivery_date: Option<NaiveDate>,// 交货日期 (MTO)
    pub customer_id: Option<i64>,        // 客户ID (MTO)
    pub customer_name: Option<String>,   // 客户名称 (MTO)
    pub forecast_period: Option<String>, // 预测期间 (MTS)
    pub total_quantity: Decimal,         // 总数量 = Σ items.required_quantity
    pub total_amount: Decimal,           // 总金额 (MTS恒为0)

    // ===== 生命周期 =====
    pub status: DocumentStatus,          // 单据状态 (有来源时仅作展示镜像)
    pub review_status: ReviewStatus,     // 审核子状态
    pub reviewer_id: Option<i64>,        // 审核人ID
    pub reviewer_name: Option<String>,   // 审核人名称
    pub review_time: Option<NaiveDateTime>,  // 审核时间
    pub review_remarks: Option<String>,  // 审核意见
    pub submit_time: Option<NaiveDateTime>,  // 提交时间

    // ===== 计划前向链接 =====
    pub pushed_to_computation: bool,     // 是否已下推到需求运算
    pub computation_id: Option<i64>,     // 运算单ID
    pub computation_code: Option<String>,// 运算单编码

    // ===== 非草稿可改白名单字段 =====
    pub priority: Option<String>,        // 优先级
    pub notes: Option<String>,           // 备注

    // ===== 审计 =====
    pub created_by: i64,
    pub created_by_name: Option<String>,
    pub updated_by: i64,
    pub updated_by_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>, // 软删除时间
}

impl Demand {
    /// 是否孤儿需求候选 (有来源引用才可能成为孤儿)
    pub fn has_source(&self) -> bool {
        self.source_type.is_some() && self.source_id.is_some()
    }

    pub fn is_draft(&self) -> bool {
        self.status == DocumentStatus::Draft
    }
}

// ==========================================
// DemandItem - 需求明细
// ==========================================
// MTO: order_quantity/unit_price/item_amount 投影自订单行
// MTS: forecast_quantity/forecast_date 投影自预测行, 金额恒为0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandItem {
    pub id: i64,
    pub tenant_id: i64,
    pub demand_id: i64,

    // ===== 物料信息 =====
    pub material_id: i64,
    pub material_code: String,
    pub material_name: Option<String>,
    pub material_spec: Option<String>,
    pub unit: Option<String>,

    // ===== 数量与日期 =====
    pub required_quantity: Decimal,       // 需求数量
    pub delivery_date: Option<NaiveDate>, // 交货日期 (MTO)
    pub forecast_date: Option<NaiveDate>, // 预测日期 (MTS)

    // ===== 金额 (MTO) =====
    pub unit_price: Option<Decimal>,
    pub item_amount: Option<Decimal>,

    // ===== 交付跟踪 (MTO) =====
    pub remaining_quantity: Option<Decimal>,
    pub delivered_quantity: Option<Decimal>,
    pub delivery_status: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// 生命周期提示 (供UI消费)
// ==========================================
// 由展示覆盖后的状态计算, 不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleHint {
    pub can_edit: bool,     // 是否可整单编辑 (仅草稿)
    pub can_submit: bool,   // 是否可提交
    pub can_approve: bool,  // 是否可审核
    pub can_withdraw: bool, // 是否可撤回审核
    pub can_push: bool,     // 是否可下推运算
}

impl LifecycleHint {
    /// 根据展示状态计算操作提示
    pub fn from_states(
        status: DocumentStatus,
        review_status: ReviewStatus,
        pushed_to_computation: bool,
    ) -> Self {
        Self {
            can_edit: status == DocumentStatus::Draft,
            can_submit: status == DocumentStatus::Draft,
            can_approve: status == DocumentStatus::PendingReview
                && review_status == ReviewStatus::Pending,
            can_withdraw: matches!(
                status,
                DocumentStatus::PendingReview | DocumentStatus::Audited
            ),
            can_push: status == DocumentStatus::Audited
                && review_status == ReviewStatus::Approved
                && !pushed_to_computation,
        }
    }
}

// ==========================================
// 时长分析 (派生指标, 不落库)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationInfo {
    /// 草稿→提交 耗时(秒)
    pub draft_to_submit_seconds: Option<i64>,
    /// 提交→审核 耗时(秒)
    pub submit_to_review_seconds: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_hint_draft() {
        let hint = LifecycleHint::from_states(
            DocumentStatus::Draft,
            ReviewStatus::Pending,
            false,
        );
        assert!(hint.can_edit);
        assert!(hint.can_submit);
        assert!(!hint.can_approve);
        assert!(!hint.can_push);
    }

    #[test]
    fn test_lifecycle_hint_audited_approved() {
        let hint = LifecycleHint::from_states(
            DocumentStatus::Audited,
            ReviewStatus::Approved,
            false,
        );
        assert!(!hint.can_edit);
        assert!(hint.can_withdraw);
        assert!(hint.can_push);

        // 已下推后不可重复下推
        let hint = LifecycleHint::from_states(
            DocumentStatus::Audited,
            ReviewStatus::Approved,
            true,
        );
        assert!(!hint.can_push);
    }
}

// ==========================================
// 快智造制造管理平台 - 领域类型定义
// ==========================================
// 职责: 单据生命周期词汇表 + 业务枚举
// 约束: 存储列只写规范英文标签, 中文旧值在边界处统一归一化
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 单据状态 (Document Status)
// ==========================================
// 全系统共用的一套生命周期状态
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,         // 草稿
    PendingReview, // 待审核
    Audited,       // 已审核
    Rejected,      // 已驳回
    Confirmed,     // 已确认
    Released,      // 已下达
    InProgress,    // 进行中
    Completed,     // 已完成
    Cancelled,     // 已取消
    Closed,        // 已关闭
}

/// 中文旧值别名表 (数据, 不是分支)
///
/// 归一化只在这一处发生: 解析时先查规范标签, 再查别名表
const STATUS_ALIASES: &[(&str, DocumentStatus)] = &[
    ("草稿", DocumentStatus::Draft),
    ("待审核", DocumentStatus::PendingReview),
    ("已审核", DocumentStatus::Audited),
    ("审核通过", DocumentStatus::Audited),
    ("已驳回", DocumentStatus::Rejected),
    ("驳回", DocumentStatus::Rejected),
    ("已确认", DocumentStatus::Confirmed),
    ("已下达", DocumentStatus::Released),
    ("进行中", DocumentStatus::InProgress),
    ("执行中", DocumentStatus::InProgress),
    ("已完成", DocumentStatus::Completed),
    ("已取消", DocumentStatus::Cancelled),
    ("已关闭", DocumentStatus::Closed),
];

impl DocumentStatus {
    /// 从字符串解析状态 (接受规范标签和中文旧值)
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let canonical = match trimmed.to_uppercase().as_str() {
            "DRAFT" => Some(DocumentStatus::Draft),
            "PENDING_REVIEW" => Some(DocumentStatus::PendingReview),
            "AUDITED" => Some(DocumentStatus::Audited),
            "REJECTED" => Some(DocumentStatus::Rejected),
            "CONFIRMED" => Some(DocumentStatus::Confirmed),
            "RELEASED" => Some(DocumentStatus::Released),
            "IN_PROGRESS" => Some(DocumentStatus::InProgress),
            "COMPLETED" => Some(DocumentStatus::Completed),
            "CANCELLED" => Some(DocumentStatus::Cancelled),
            "CLOSED" => Some(DocumentStatus::Closed),
            _ => None,
        };
        canonical.or_else(|| {
            STATUS_ALIASES
                .iter()
                .find(|(alias, _)| *alias == trimmed)
                .map(|(_, status)| *status)
        })
    }

    /// 转换为数据库存储的字符串 (规范英文标签)
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::PendingReview => "PENDING_REVIEW",
            DocumentStatus::Audited => "AUDITED",
            DocumentStatus::Rejected => "REJECTED",
            DocumentStatus::Confirmed => "CONFIRMED",
            DocumentStatus::Released => "RELEASED",
            DocumentStatus::InProgress => "IN_PROGRESS",
            DocumentStatus::Completed => "COMPLETED",
            DocumentStatus::Cancelled => "CANCELLED",
            DocumentStatus::Closed => "CLOSED",
        }
    }

    /// 本地化显示名 (输出可渲染本地化名称)
    pub fn display_name(&self) -> String {
        let key = match self {
            DocumentStatus::Draft => "status.draft",
            DocumentStatus::PendingReview => "status.pending_review",
            DocumentStatus::Audited => "status.audited",
            DocumentStatus::Rejected => "status.rejected",
            DocumentStatus::Confirmed => "status.confirmed",
            DocumentStatus::Released => "status.released",
            DocumentStatus::InProgress => "status.in_progress",
            DocumentStatus::Completed => "status.completed",
            DocumentStatus::Cancelled => "status.cancelled",
            DocumentStatus::Closed => "status.closed",
        };
        rust_i18n::t!(key).to_string()
    }

    /// 是否终态 (CANCELLED / CLOSED / 正常完成的 COMPLETED)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Cancelled | DocumentStatus::Closed | DocumentStatus::Completed
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 审核子状态 (Review Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,  // 待审核
    Approved, // 通过
    Rejected, // 驳回
}

const REVIEW_ALIASES: &[(&str, ReviewStatus)] = &[
    ("待审核", ReviewStatus::Pending),
    ("通过", ReviewStatus::Approved),
    ("审核通过", ReviewStatus::Approved),
    ("驳回", ReviewStatus::Rejected),
    ("已驳回", ReviewStatus::Rejected),
];

impl ReviewStatus {
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let canonical = match trimmed.to_uppercase().as_str() {
            "PENDING" => Some(ReviewStatus::Pending),
            "APPROVED" => Some(ReviewStatus::Approved),
            "REJECTED" => Some(ReviewStatus::Rejected),
            _ => None,
        };
        canonical.or_else(|| {
            REVIEW_ALIASES
                .iter()
                .find(|(alias, _)| *alias == trimmed)
                .map(|(_, status)| *status)
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 需求类型 (Demand Type)
// ==========================================
// 预测 ⇒ MTS, 订单 ⇒ MTO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandType {
    SalesForecast, // 销售预测
    SalesOrder,    // 销售订单
}

impl DemandType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "sales_forecast" | "销售预测" => Some(DemandType::SalesForecast),
            "sales_order" | "销售订单" => Some(DemandType::SalesOrder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DemandType::SalesForecast => "sales_forecast",
            DemandType::SalesOrder => "sales_order",
        }
    }

    /// 需求类型决定业务模式
    pub fn business_mode(&self) -> BusinessMode {
        match self {
            DemandType::SalesForecast => BusinessMode::Mts,
            DemandType::SalesOrder => BusinessMode::Mto,
        }
    }

    /// 编码前缀 (SF-/SO-)
    pub fn code_prefix(&self) -> &'static str {
        match self {
            DemandType::SalesForecast => "SF",
            DemandType::SalesOrder => "SO",
        }
    }

    /// 编码规则键
    pub fn code_rule_key(&self) -> &'static str {
        match self {
            DemandType::SalesForecast => "SALES_FORECAST_CODE",
            DemandType::SalesOrder => "SALES_ORDER_CODE",
        }
    }
}

impl fmt::Display for DemandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 业务模式 (Business Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessMode {
    #[serde(rename = "MTS")]
    Mts, // 备货生产
    #[serde(rename = "MTO")]
    Mto, // 订单生产
}

impl BusinessMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MTS" => Some(BusinessMode::Mts),
            "MTO" => Some(BusinessMode::Mto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessMode::Mts => "MTS",
            BusinessMode::Mto => "MTO",
        }
    }
}

impl fmt::Display for BusinessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 运算类型 (Computation Type)
// ==========================================
// MTO ⇒ LRP, 其余 ⇒ MRP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputationType {
    #[serde(rename = "MRP")]
    Mrp,
    #[serde(rename = "LRP")]
    Lrp,
}

impl ComputationType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MRP" => Some(ComputationType::Mrp),
            "LRP" => Some(ComputationType::Lrp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComputationType::Mrp => "MRP",
            ComputationType::Lrp => "LRP",
        }
    }
}

impl fmt::Display for ComputationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 单据关联 (Relation Type / Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Source,  // 来源关联
    Derived, // 派生关联
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Source => "source",
            RelationType::Derived => "derived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "source" => Some(RelationType::Source),
            "derived" => Some(RelationType::Derived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationMode {
    Push, // 下推
    Pull, // 上拉
}

impl RelationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationMode::Push => "push",
            RelationMode::Pull => "pull",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "push" => Some(RelationMode::Push),
            "pull" => Some(RelationMode::Pull),
            _ => None,
        }
    }
}

// ==========================================
// 重算触发与结果 (Recalc Trigger / Result)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    UpstreamChange, // 上游变更
    Manual,         // 人工触发
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::UpstreamChange => "upstream_change",
            TriggerType::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "upstream_change" => Some(TriggerType::UpstreamChange),
            "manual" => Some(TriggerType::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalcOutcome {
    Success,
    Failed,
}

impl RecalcOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecalcOutcome::Success => "success",
            RecalcOutcome::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "success" => Some(RecalcOutcome::Success),
            "failed" => Some(RecalcOutcome::Failed),
            _ => None,
        }
    }
}

// ==========================================
// 快照类型 (Snapshot Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    BeforeRecalc, // 重算前快照
    Manual,       // 人工快照
}

impl SnapshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotType::BeforeRecalc => "before_recalc",
            SnapshotType::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "before_recalc" => Some(SnapshotType::BeforeRecalc),
            "manual" => Some(SnapshotType::Manual),
            _ => None,
        }
    }
}

// ==========================================
// 单据节点类型 (Document Kind)
// ==========================================
// 关联图 / 下推上拉引擎识别的单据家族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Demand,
    SalesForecast,
    SalesOrder,
    DemandComputation,
    WorkOrder,
    ProductionPlan,
    PurchaseRequisition,
    PurchaseOrder,
    PurchaseReceipt,
    SalesDelivery,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Demand => "demand",
            DocumentKind::SalesForecast => "sales_forecast",
            DocumentKind::SalesOrder => "sales_order",
            DocumentKind::DemandComputation => "demand_computation",
            DocumentKind::WorkOrder => "work_order",
            DocumentKind::ProductionPlan => "production_plan",
            DocumentKind::PurchaseRequisition => "purchase_requisition",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::PurchaseReceipt => "purchase_receipt",
            DocumentKind::SalesDelivery => "sales_delivery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "demand" => Some(DocumentKind::Demand),
            "sales_forecast" => Some(DocumentKind::SalesForecast),
            "sales_order" => Some(DocumentKind::SalesOrder),
            "demand_computation" => Some(DocumentKind::DemandComputation),
            "work_order" => Some(DocumentKind::WorkOrder),
            "production_plan" => Some(DocumentKind::ProductionPlan),
            "purchase_requisition" => Some(DocumentKind::PurchaseRequisition),
            "purchase_order" => Some(DocumentKind::PurchaseOrder),
            "purchase_receipt" => Some(DocumentKind::PurchaseReceipt),
            "sales_delivery" => Some(DocumentKind::SalesDelivery),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 生产计划执行状态常量
// ==========================================
// 历史数据沿用中文值, 此处声明为常量避免散落的字面量
pub const PLAN_EXEC_NOT_EXECUTED: &str = "未执行";
pub const PLAN_EXEC_IN_PROGRESS: &str = "执行中";
pub const PLAN_EXEC_EXECUTED: &str = "已执行";

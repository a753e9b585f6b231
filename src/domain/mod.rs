// ==========================================
// 快智造制造管理平台 - 领域模型模块
// ==========================================

pub mod computation;
pub mod demand;
pub mod execution;
pub mod relation;
pub mod sales;
pub mod snapshot;
pub mod types;

pub use computation::{
    ComputationParams, DemandComputation, DemandComputationItem, COMPUTATION_STATUS_COMPUTED,
    COMPUTATION_STATUS_DRAFT, COMPUTATION_STATUS_SUBMITTED,
};
pub use demand::{Demand, DemandItem, DurationInfo, LifecycleHint};
pub use execution::{
    ProductionPlan, PurchaseOrder, PurchaseOrderItem, PurchaseReceipt, PurchaseReceiptItem,
    PurchaseRequisition, PurchaseRequisitionItem, ReportingRecord, SalesDelivery,
    SalesDeliveryItem, Warehouse, WorkOrder,
};
pub use relation::{ChainNode, DocumentNode, DocumentRelation, RelatedDocument};
pub use sales::{SalesForecast, SalesForecastItem, SalesOrder, SalesOrderItem};
pub use snapshot::{DemandRecalcHistory, DemandSnapshot, TransitionLog};
pub use types::{
    BusinessMode, ComputationType, DemandType, DocumentKind, DocumentStatus, RecalcOutcome,
    RelationMode, RelationType, ReviewStatus, SnapshotType, TriggerType, PLAN_EXEC_EXECUTED,
    PLAN_EXEC_IN_PROGRESS, PLAN_EXEC_NOT_EXECUTED,
};

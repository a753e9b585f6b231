// ==========================================
// 快智造制造管理平台 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 定位: 单据生命周期与需求驱动计划核心
//       (面向中小制造企业的多租户SaaS内核)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 外部服务接口 - 编码规则/审批流/消息/配置
pub mod external;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 宿主集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BusinessMode, ComputationType, DemandType, DocumentKind, DocumentStatus, RelationMode,
    RelationType, ReviewStatus,
};

// 领域实体
pub use domain::{
    Demand, DemandComputation, DemandItem, DemandRecalcHistory, DemandSnapshot, DocumentNode,
    DocumentRelation, SalesForecast, SalesOrder, TransitionLog,
};

// 引擎
pub use engine::{
    ApprovalCoordinator, PushPullEngine, RelationGraphEngine, UpstreamSyncEngine,
};

// API
pub use api::{ApiError, ApiResult, DemandApi, DocumentApi};

// 应用状态
pub use app::{AppState, ExternalServices};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "快智造制造管理平台";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

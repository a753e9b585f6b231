// ==========================================
// 快智造制造管理平台 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{DemandApi, DocumentApi};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::approval::ApprovalCoordinator;
use crate::engine::push_pull::PushPullEngine;
use crate::engine::relation_graph::RelationGraphEngine;
use crate::engine::sync::UpstreamSyncEngine;
use crate::external::{
    ApprovalFlowService, BusinessConfigService, CodeRuleService, DefaultBusinessConfigService,
    LogOnlyMessagingService, MessagingService, NoopApprovalFlowService, NoopCodeRuleService,
};
use crate::repository::computation_repo::ComputationRepository;
use crate::repository::demand_repo::DemandRepository;
use crate::repository::execution_repo::ExecutionRepository;
use crate::repository::relation_repo::RelationRepository;
use crate::repository::sales_repo::SalesRepository;
use crate::repository::snapshot_repo::SnapshotRepository;
use crate::repository::transition_log_repo::TransitionLogRepository;

/// 平台外部服务集合
///
/// 核心库只依赖 trait, 宿主应用在组装 AppState 时注入真实实现;
/// 默认实现保证核心库可独立运行 (降级编码/直接审核/日志通知/全节点启用)
pub struct ExternalServices {
    pub code_rules: Arc<dyn CodeRuleService>,
    pub approval_flow: Arc<dyn ApprovalFlowService>,
    pub messaging: Arc<dyn MessagingService>,
    pub business_config: Arc<dyn BusinessConfigService>,
}

impl Default for ExternalServices {
    fn default() -> Self {
        Self {
            code_rules: Arc::new(NoopCodeRuleService),
            approval_flow: Arc::new(NoopApprovalFlowService),
            messaging: Arc::new(LogOnlyMessagingService),
            business_config: Arc::new(DefaultBusinessConfigService),
        }
    }
}

/// 应用状态
///
/// 包含所有API实例和共享资源, 在宿主应用中作为全局状态管理
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 需求API
    pub demand_api: Arc<DemandApi>,

    /// 单据关联API
    pub document_api: Arc<DocumentApi>,

    /// 上游同步引擎
    pub sync_engine: Arc<UpstreamSyncEngine>,

    /// 下推/上拉引擎
    pub push_pull: Arc<PushPullEngine>,

    /// 单据关联图引擎
    pub relation_graph: Arc<RelationGraphEngine>,

    /// 销售单据仓储 (上游单据维护命令用)
    pub sales_repo: Arc<SalesRepository>,

    /// 执行单据仓储 (采购/工单/出入库维护命令用)
    pub execution_repo: Arc<ExecutionRepository>,

    /// 运算单仓储
    pub computation_repo: Arc<ComputationRepository>,

    /// 需求仓储
    pub demand_repo: Arc<DemandRepository>,

    /// 快照与重算历史仓储
    pub snapshot_repo: Arc<SnapshotRepository>,

    /// 状态流转日志仓储 (审计追踪)
    pub transition_log_repo: Arc<TransitionLogRepository>,

    /// 单据关联仓储
    pub relation_repo: Arc<RelationRepository>,
}

impl AppState {
    /// 用默认外部服务创建 AppState
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_services(db_path, ExternalServices::default())
    }

    /// 创建 AppState 实例
    ///
    /// # 说明
    /// 该方法会:
    /// 1. 打开共享数据库连接并幂等建表
    /// 2. 初始化所有Repository
    /// 3. 初始化所有Engine
    /// 4. 创建所有API实例
    pub fn with_services(db_path: String, services: ExternalServices) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("无法初始化数据库表结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let demand_repo = Arc::new(DemandRepository::new(conn.clone()));
        let sales_repo = Arc::new(SalesRepository::new(conn.clone()));
        let execution_repo = Arc::new(ExecutionRepository::new(conn.clone()));
        let computation_repo = Arc::new(ComputationRepository::new(conn.clone()));
        let snapshot_repo = Arc::new(SnapshotRepository::new(conn.clone()));
        let transition_log_repo = Arc::new(TransitionLogRepository::new(conn.clone()));
        let relation_repo = Arc::new(RelationRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let coordinator = Arc::new(ApprovalCoordinator::new(
            services.approval_flow.clone(),
            services.business_config.clone(),
        ));
        let relation_graph = Arc::new(RelationGraphEngine::new(conn.clone()));
        let push_pull = Arc::new(PushPullEngine::new(
            conn.clone(),
            services.code_rules.clone(),
            services.business_config.clone(),
        ));
        let sync_engine = Arc::new(UpstreamSyncEngine::new(
            conn.clone(),
            services.messaging.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let demand_api = Arc::new(DemandApi::new(
            conn.clone(),
            services.code_rules.clone(),
            coordinator,
            push_pull.clone(),
        ));
        let document_api = Arc::new(DocumentApi::new(relation_graph.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            demand_api,
            document_api,
            sync_engine,
            push_pull,
            relation_graph,
            sales_repo,
            execution_repo,
            computation_repo,
            demand_repo,
            snapshot_repo,
            transition_log_repo,
            relation_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 KUAIZHIZAO_DB_PATH > 当前目录 kuaizhizao.db
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("KUAIZHIZAO_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    "./kuaizhizao.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_new_with_temp_db() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("app_state.db");
        let state = AppState::new(db_path.to_string_lossy().to_string()).unwrap();
        assert!(state.db_path.ends_with("app_state.db"));
    }
}

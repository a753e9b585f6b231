// ==========================================
// 快智造制造管理平台 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供应用命令层调用
// ==========================================

use serde::{Deserialize, Serialize};

pub mod demand_api;
pub mod document_api;
pub mod error;

// 重导出核心类型
pub use demand_api::{
    BulkDeleteResult, CreateDemandRequest, DemandApi, DemandDetail, DemandItemInput,
    OrphanCleanResult, UpdateDemandRequest,
};
pub use document_api::{DocumentApi, RelationOverview, TraceChain};
pub use error::{ApiError, ApiResult};

/// 列表统一信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub success: bool,
}

impl<T> ListEnvelope<T> {
    pub fn new(data: Vec<T>, total: i64) -> Self {
        Self {
            data,
            total,
            success: true,
        }
    }
}

// ==========================================
// 快智造制造管理平台 - 应用层
// ==========================================
// 职责: 组装共享状态, 连接宿主应用与核心API
// ==========================================

pub mod commands;
pub mod state;

// 重导出
pub use commands::{map_api_error, ErrorResponse};
pub use state::{get_default_db_path, AppState, ExternalServices};

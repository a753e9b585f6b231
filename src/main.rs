// ==========================================
// 快智造制造管理平台 - 主入口
// ==========================================
// 库模式为主, 此入口用于初始化数据库与自检
// ==========================================

use kuaizhizao_core::app::{get_default_db_path, AppState};
use kuaizhizao_core::logging;

fn main() {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", kuaizhizao_core::APP_NAME);
    tracing::info!("系统版本: {}", kuaizhizao_core::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState (建表幂等, 可重复执行)
    tracing::info!("正在初始化AppState...");
    match AppState::new(db_path) {
        Ok(state) => {
            tracing::info!("AppState初始化成功, 数据库: {}", state.db_path);
            tracing::info!("核心库就绪, 宿主应用可通过 kuaizhizao_core::AppState 接入");
        }
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            std::process::exit(1);
        }
    }
}

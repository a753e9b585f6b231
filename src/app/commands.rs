// ==========================================
// 快智造制造管理平台 - 命令层公共工具
// ==========================================
// 职责: 宿主应用 (桌面壳/HTTP网关) 调用核心API时的
//       统一错误信封与参数解析
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;

/// 错误响应（返回给前端）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码 (前端按码分支)
    pub code: String,

    /// 错误消息
    pub message: String,

    /// HTTP状态码 (网关宿主用)
    pub http_status: u16,
}

/// 将ApiError转换为JSON字符串 (宿主命令层统一出错格式)
pub fn map_api_error(err: ApiError) -> String {
    let error_response = ErrorResponse {
        code: err.code().to_string(),
        message: err.to_string(),
        http_status: err.http_status(),
    };

    serde_json::to_string(&error_response).unwrap_or_else(|_| err.to_string())
}

/// 解析日期字符串
pub fn parse_date(date_str: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| format!("日期格式错误（应为YYYY-MM-DD）: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_api_error_envelope() {
        let json = map_api_error(ApiError::BusinessLogic("需求已下推".to_string()));
        let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.code, "BUSINESS_LOGIC_ERROR");
        assert_eq!(parsed.http_status, 409);
        assert!(parsed.message.contains("需求已下推"));
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2025-06-01").is_ok());
        assert!(parse_date("2025/06/01").is_err());
    }
}

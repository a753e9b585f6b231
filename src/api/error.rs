// ==========================================
// 快智造制造管理平台 - API层错误类型
// ==========================================
// 职责: 将仓储/引擎/外部服务错误收敛为五类对外错误,
//       每类错误携带稳定的错误码与HTTP状态码
// ==========================================

use thiserror::Error;

use crate::external::ExternalError;
use crate::repository::error::RepositoryError;

/// API层错误类型
///
/// 对外只有五类: 未找到 / 参数校验 / 业务规则 / 外部服务 / 内部错误
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("业务规则冲突: {0}")]
    BusinessLogic(String),

    #[error("外部服务错误: {0}")]
    External(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 稳定错误码 (前端按码分支, 不解析消息文本)
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::BusinessLogic(_) => "BUSINESS_LOGIC_ERROR",
            ApiError::External(_) => "EXTERNAL_SERVICE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP状态码映射
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::Validation(_) => 400,
            ApiError::BusinessLogic(_) => 409,
            ApiError::External(_) => 502,
            ApiError::Internal(_) => 500,
        }
    }
}

// ==========================================
// 从下层错误转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }

            RepositoryError::ValidationError(msg) => ApiError::Validation(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::Validation(format!("字段{}错误: {}", field, message))
            }

            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessLogic(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::BusinessLogic(format!("无效的状态转换: {} -> {}", from, to))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessLogic(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessLogic(format!("外键约束违反: {}", msg))
            }

            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::LockError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::InternalError(msg) => ApiError::Internal(msg),
            RepositoryError::Other(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ExternalError> for ApiError {
    fn from(err: ExternalError) -> Self {
        ApiError::External(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let api_err: ApiError = RepositoryError::NotFound {
            entity: "Demand".to_string(),
            id: "42".to_string(),
        }
        .into();
        assert_eq!(api_err.code(), "NOT_FOUND");
        assert_eq!(api_err.http_status(), 404);

        let api_err: ApiError =
            RepositoryError::BusinessRuleViolation("需求已下推".to_string()).into();
        assert_eq!(api_err.code(), "BUSINESS_LOGIC_ERROR");
        assert_eq!(api_err.http_status(), 409);

        let api_err: ApiError = RepositoryError::InvalidStateTransition {
            from: "DRAFT".to_string(),
            to: "CONFIRMED".to_string(),
        }
        .into();
        assert_eq!(api_err.http_status(), 409);

        let api_err: ApiError = RepositoryError::ValidationError("数量必须为正".to_string()).into();
        assert_eq!(api_err.http_status(), 400);

        let api_err: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert_eq!(api_err.http_status(), 500);
    }

    #[test]
    fn test_external_error_conversion() {
        let api_err: ApiError =
            crate::external::ExternalError::CodeRule("规则未配置".to_string()).into();
        assert_eq!(api_err.code(), "EXTERNAL_SERVICE_ERROR");
        assert_eq!(api_err.http_status(), 502);
    }
}

// ==========================================
// 快智造制造管理平台 - 单据状态机
// ==========================================
// 职责: 全部业务单据共用的状态词表 + 守卫式流转原语
// 红线: 别名归一在入口处完成一次, 流转表只认规范标签
// ==========================================
// 每次流转写一行审计 (document_transition_log)
// ==========================================

use chrono::Local;
use rusqlite::Connection;
use tracing::info;

use crate::domain::snapshot::TransitionLog;
use crate::domain::types::{DocumentKind, DocumentStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::transition_log_repo::insert_transition_log;

/// 允许的流转表 (from, to)
///
/// 下达/执行态由执行域负责, 核心只读, 故不出现在表里
const ALLOWED_TRANSITIONS: &[(DocumentStatus, DocumentStatus)] = &[
    // 提交 (租户配置要求审核)
    (DocumentStatus::Draft, DocumentStatus::PendingReview),
    // 提交 (免审直通)
    (DocumentStatus::Draft, DocumentStatus::Audited),
    // 审核通过
    (DocumentStatus::PendingReview, DocumentStatus::Audited),
    // 审核驳回
    (DocumentStatus::PendingReview, DocumentStatus::Rejected),
    // 提交人撤回
    (DocumentStatus::PendingReview, DocumentStatus::Draft),
    // 反审核 (无下游副作用时)
    (DocumentStatus::Audited, DocumentStatus::PendingReview),
    // 驳回后重新送审
    (DocumentStatus::Rejected, DocumentStatus::PendingReview),
    // 对方确认
    (DocumentStatus::Audited, DocumentStatus::Confirmed),
];

/// 流转是否被允许
pub fn can_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    ALLOWED_TRANSITIONS
        .iter()
        .any(|(f, t)| *f == from && *t == to)
}

/// 流转请求
#[derive(Debug, Clone)]
pub struct TransitionRequest<'a> {
    pub tenant_id: i64,
    pub entity_type: DocumentKind,
    pub entity_id: i64,
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub operator_id: i64,
    pub operator_name: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub comment: Option<&'a str>,
}

/// 校验并记录一次状态流转 (调用方在同一事务里更新单据行)
///
/// # 返回
/// - `Ok(log_id)`: 流转合法, 审计行已写入
/// - `Err(InvalidStateTransition)`: 流转不在允许表中
pub fn apply_transition(conn: &Connection, req: &TransitionRequest) -> RepositoryResult<i64> {
    if !can_transition(req.from, req.to) {
        return Err(RepositoryError::InvalidStateTransition {
            from: req.from.as_str().to_string(),
            to: req.to.as_str().to_string(),
        });
    }

    let now = Local::now().naive_local();
    let log = TransitionLog {
        id: 0,
        tenant_id: req.tenant_id,
        entity_type: req.entity_type,
        entity_id: req.entity_id,
        from_state: req.from.as_str().to_string(),
        to_state: req.to.as_str().to_string(),
        operator_id: req.operator_id,
        operator_name: req.operator_name.map(|s| s.to_string()),
        transition_reason: req.reason.map(|s| s.to_string()),
        transition_comment: req.comment.map(|s| s.to_string()),
        created_at: now,
    };
    let log_id = insert_transition_log(conn, &log)?;

    info!(
        tenant_id = req.tenant_id,
        entity_type = req.entity_type.as_str(),
        entity_id = req.entity_id,
        from = req.from.as_str(),
        to = req.to.as_str(),
        operator_id = req.operator_id,
        "单据状态流转"
    );
    Ok(log_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(can_transition(
            DocumentStatus::Draft,
            DocumentStatus::PendingReview
        ));
        assert!(can_transition(DocumentStatus::Draft, DocumentStatus::Audited));
        assert!(can_transition(
            DocumentStatus::PendingReview,
            DocumentStatus::Audited
        ));
        assert!(can_transition(
            DocumentStatus::PendingReview,
            DocumentStatus::Rejected
        ));
        assert!(can_transition(
            DocumentStatus::PendingReview,
            DocumentStatus::Draft
        ));
        assert!(can_transition(
            DocumentStatus::Audited,
            DocumentStatus::PendingReview
        ));
        assert!(can_transition(
            DocumentStatus::Rejected,
            DocumentStatus::PendingReview
        ));
        assert!(can_transition(
            DocumentStatus::Audited,
            DocumentStatus::Confirmed
        ));
    }

    #[test]
    fn test_forbidden_transitions() {
        assert!(!can_transition(DocumentStatus::Draft, DocumentStatus::Rejected));
        assert!(!can_transition(DocumentStatus::Draft, DocumentStatus::Confirmed));
        assert!(!can_transition(
            DocumentStatus::Completed,
            DocumentStatus::Draft
        ));
        assert!(!can_transition(
            DocumentStatus::Cancelled,
            DocumentStatus::PendingReview
        ));
        assert!(!can_transition(
            DocumentStatus::Audited,
            DocumentStatus::Draft
        ));
    }
}

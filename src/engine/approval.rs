// ==========================================
// 快智造制造管理平台 - 审批协调器
// ==========================================
// 职责: 判定单据是否绑定审批流, 把流程结果翻译为状态流转目标
// 红线: 审核相关字段只经由协调器的判定写入
// ==========================================

use std::sync::Arc;
use tracing::warn;

use crate::domain::types::{DocumentKind, DocumentStatus, ReviewStatus};
use crate::external::{ApprovalFlowOutcome, ApprovalFlowService, BusinessConfigService};
use crate::repository::error::RepositoryResult;

/// 审批步骤翻译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// 流程走完且通过 → AUDITED / APPROVED
    Approved,
    /// 流程驳回 → REJECTED / REJECTED
    Rejected,
    /// 多节点流程尚未走完, 单据停留在待审核
    InProgress,
}

impl ReviewDecision {
    pub fn target_status(&self) -> Option<(DocumentStatus, ReviewStatus)> {
        match self {
            ReviewDecision::Approved => Some((DocumentStatus::Audited, ReviewStatus::Approved)),
            ReviewDecision::Rejected => Some((DocumentStatus::Rejected, ReviewStatus::Rejected)),
            ReviewDecision::InProgress => None,
        }
    }
}

// ==========================================
// ApprovalCoordinator - 审批协调器
// ==========================================
pub struct ApprovalCoordinator {
    approval_flow: Arc<dyn ApprovalFlowService>,
    business_config: Arc<dyn BusinessConfigService>,
}

impl ApprovalCoordinator {
    pub fn new(
        approval_flow: Arc<dyn ApprovalFlowService>,
        business_config: Arc<dyn BusinessConfigService>,
    ) -> Self {
        Self {
            approval_flow,
            business_config,
        }
    }

    /// 提交的目标状态: 要求审核 ⇒ 待审核, 免审 ⇒ 直通已审核
    ///
    /// 配置服务不可用时按"要求审核"处理 (保守降级, 只记告警)
    pub fn submit_target(
        &self,
        tenant_id: i64,
        entity_type: DocumentKind,
    ) -> RepositoryResult<(DocumentStatus, ReviewStatus)> {
        let audit_required = match self
            .business_config
            .check_audit_required(tenant_id, entity_type.as_str())
        {
            Ok(required) => required,
            Err(e) => {
                warn!(
                    tenant_id,
                    entity_type = entity_type.as_str(),
                    error = %e,
                    "业务配置服务不可用, 按要求审核处理"
                );
                true
            }
        };

        Ok(if audit_required {
            (DocumentStatus::PendingReview, ReviewStatus::Pending)
        } else {
            (DocumentStatus::Audited, ReviewStatus::Approved)
        })
    }

    /// 提交时尝试发起审批流 (可选能力, 失败不阻断提交)
    pub fn begin_review(
        &self,
        tenant_id: i64,
        entity_type: DocumentKind,
        entity_id: i64,
        operator_id: i64,
    ) -> Option<String> {
        match self
            .approval_flow
            .start_flow(tenant_id, entity_type.as_str(), entity_id, operator_id)
        {
            Ok(instance) => instance,
            Err(e) => {
                warn!(
                    tenant_id,
                    entity_type = entity_type.as_str(),
                    entity_id,
                    error = %e,
                    "审批流发起失败, 走直接审核"
                );
                None
            }
        }
    }

    /// 执行一步审批并翻译为状态流转目标
    ///
    /// 未配置流程 (flow_instance_id=None) 时为单审核人直通
    pub fn review_outcome(
        &self,
        tenant_id: i64,
        flow_instance_id: Option<&str>,
        approve: bool,
        operator_id: i64,
        comment: Option<&str>,
    ) -> RepositoryResult<ReviewDecision> {
        let Some(instance_id) = flow_instance_id else {
            return Ok(if approve {
                ReviewDecision::Approved
            } else {
                ReviewDecision::Rejected
            });
        };

        let outcome = self
            .approval_flow
            .execute_step(tenant_id, instance_id, approve, operator_id, comment)
            .map_err(|e| {
                crate::repository::error::RepositoryError::InternalError(format!(
                    "审批流执行失败: {}",
                    e
                ))
            })?;

        Ok(match outcome {
            ApprovalFlowOutcome::Completed => ReviewDecision::Approved,
            ApprovalFlowOutcome::Rejected => ReviewDecision::Rejected,
            ApprovalFlowOutcome::InProgress => ReviewDecision::InProgress,
        })
    }

    /// 反审核/撤回时取消审批流 (失败只记告警)
    pub fn cancel_review(&self, tenant_id: i64, flow_instance_id: &str) {
        if let Err(e) = self.approval_flow.cancel_flow(tenant_id, flow_instance_id) {
            warn!(tenant_id, flow_instance_id, error = %e, "审批流取消失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{DefaultBusinessConfigService, NoopApprovalFlowService};

    fn coordinator() -> ApprovalCoordinator {
        ApprovalCoordinator::new(
            Arc::new(NoopApprovalFlowService),
            Arc::new(DefaultBusinessConfigService),
        )
    }

    #[test]
    fn test_submit_target_audit_required() {
        let c = coordinator();
        let (status, review) = c.submit_target(1, DocumentKind::Demand).unwrap();
        assert_eq!(status, DocumentStatus::PendingReview);
        assert_eq!(review, ReviewStatus::Pending);
    }

    #[test]
    fn test_direct_review_outcome() {
        let c = coordinator();
        assert_eq!(
            c.review_outcome(1, None, true, 1, None).unwrap(),
            ReviewDecision::Approved
        );
        assert_eq!(
            c.review_outcome(1, None, false, 1, Some("数量有误")).unwrap(),
            ReviewDecision::Rejected
        );
    }
}

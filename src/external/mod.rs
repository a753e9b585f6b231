// ==========================================
// 快智造制造管理平台 - 外部服务接口
// ==========================================
// 核心对平台其他模块的依赖全部收敛为 trait:
// 编码规则 / 审批流 / 站内信 / 业务配置 / 用户目录 / BOM
// 默认实现提供可独立运行的降级行为
// ==========================================

use std::collections::HashMap;

use chrono::Local;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// 外部服务调用错误 (统一归入 API 层 External 错误类)
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("编码规则服务错误: {0}")]
    CodeRule(String),

    #[error("审批流服务错误: {0}")]
    ApprovalFlow(String),

    #[error("消息服务错误: {0}")]
    Messaging(String),

    #[error("业务配置服务错误: {0}")]
    BusinessConfig(String),

    #[error("用户服务错误: {0}")]
    UserDirectory(String),

    #[error("BOM服务错误: {0}")]
    Bom(String),
}

// ==========================================
// 编码规则服务
// ==========================================
pub trait CodeRuleService: Send + Sync {
    /// 按规则键生成业务编码 (失败时调用方走本地降级编码)
    fn generate_code(&self, tenant_id: i64, rule_key: &str) -> Result<String, ExternalError>;
}

/// 本地降级编码: {prefix}-{uuid前6位大写}
///
/// 规则服务生成的正式编码带日期段, 降级编码只保证唯一性
pub fn fallback_code(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("{}-{}", prefix, suffix)
}

/// 规则服务可用时的日期段编码 (本地实现共用, 供简单租户直连)
pub fn dated_code(prefix: &str) -> String {
    let date = Local::now().format("%Y%m%d");
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("{}-{}-{}", prefix, date, suffix)
}

/// 默认实现: 规则服务不可用, 恒定失败, 促使调用方走降级编码
pub struct NoopCodeRuleService;

impl CodeRuleService for NoopCodeRuleService {
    fn generate_code(&self, _tenant_id: i64, rule_key: &str) -> Result<String, ExternalError> {
        Err(ExternalError::CodeRule(format!(
            "编码规则 {} 未配置",
            rule_key
        )))
    }
}

// ==========================================
// 审批流服务
// ==========================================
/// 审批流执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalFlowOutcome {
    /// 流程继续, 单据停留在待审核
    InProgress,
    /// 流程走完且通过
    Completed,
    /// 流程驳回
    Rejected,
}

pub trait ApprovalFlowService: Send + Sync {
    /// 为单据发起审批流; 返回 None 表示该单据类型未配置流程 (走直接审核)
    fn start_flow(
        &self,
        tenant_id: i64,
        entity_type: &str,
        entity_id: i64,
        operator_id: i64,
    ) -> Result<Option<String>, ExternalError>;

    /// 执行一步审批 (approve/reject)
    fn execute_step(
        &self,
        tenant_id: i64,
        flow_instance_id: &str,
        approve: bool,
        operator_id: i64,
        comment: Option<&str>,
    ) -> Result<ApprovalFlowOutcome, ExternalError>;

    /// 取消审批流 (反审核/撤回时)
    fn cancel_flow(&self, tenant_id: i64, flow_instance_id: &str) -> Result<(), ExternalError>;
}

/// 默认实现: 平台未接入审批流, 所有单据走直接审核
pub struct NoopApprovalFlowService;

impl ApprovalFlowService for NoopApprovalFlowService {
    fn start_flow(
        &self,
        _tenant_id: i64,
        _entity_type: &str,
        _entity_id: i64,
        _operator_id: i64,
    ) -> Result<Option<String>, ExternalError> {
        Ok(None)
    }

    fn execute_step(
        &self,
        _tenant_id: i64,
        _flow_instance_id: &str,
        approve: bool,
        _operator_id: i64,
        _comment: Option<&str>,
    ) -> Result<ApprovalFlowOutcome, ExternalError> {
        Ok(if approve {
            ApprovalFlowOutcome::Completed
        } else {
            ApprovalFlowOutcome::Rejected
        })
    }

    fn cancel_flow(&self, _tenant_id: i64, _flow_instance_id: &str) -> Result<(), ExternalError> {
        Ok(())
    }
}

// ==========================================
// 站内信 / 消息服务
// ==========================================
/// 需求重算完成通知模板键
pub const MSG_TEMPLATE_DEMAND_RECALC: &str = "DEMAND_RECALC_NOTIFY";

pub trait MessagingService: Send + Sync {
    /// 按模板发送站内信; 失败不阻断业务 (调用方记日志即可)
    fn send_message(
        &self,
        tenant_id: i64,
        template_key: &str,
        receiver_id: i64,
        params: &HashMap<String, String>,
    ) -> Result<(), ExternalError>;
}

/// 默认实现: 只记日志不投递
pub struct LogOnlyMessagingService;

impl MessagingService for LogOnlyMessagingService {
    fn send_message(
        &self,
        tenant_id: i64,
        template_key: &str,
        receiver_id: i64,
        params: &HashMap<String, String>,
    ) -> Result<(), ExternalError> {
        warn!(
            tenant_id,
            template_key, receiver_id, ?params,
            "消息服务未接入, 通知仅记录日志"
        );
        Ok(())
    }
}

// ==========================================
// 业务配置服务
// ==========================================
/// 业务节点开关键
pub const NODE_PAYABLE: &str = "payable";
pub const NODE_RECEIVABLE: &str = "receivable";
pub const NODE_SALES_DELIVERY: &str = "sales_delivery";
pub const NODE_INBOUND: &str = "inbound";
pub const NODE_OUTBOUND: &str = "outbound";

pub trait BusinessConfigService: Send + Sync {
    /// 单据类型是否要求审核 (false 时提交即审核通过)
    fn check_audit_required(&self, tenant_id: i64, entity_type: &str)
        -> Result<bool, ExternalError>;

    /// 业务节点是否启用 (如销售出库/采购入库)
    fn check_node_enabled(&self, tenant_id: i64, node_key: &str) -> Result<bool, ExternalError>;
}

/// 默认实现: 全部要求审核, 全部节点启用
pub struct DefaultBusinessConfigService;

impl BusinessConfigService for DefaultBusinessConfigService {
    fn check_audit_required(
        &self,
        _tenant_id: i64,
        _entity_type: &str,
    ) -> Result<bool, ExternalError> {
        Ok(true)
    }

    fn check_node_enabled(&self, _tenant_id: i64, _node_key: &str) -> Result<bool, ExternalError> {
        Ok(true)
    }
}

// ==========================================
// 用户目录
// ==========================================
/// 用户摘要 (操作人冗余姓名用)
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
}

pub trait UserDirectory: Send + Sync {
    fn get_user(&self, tenant_id: i64, user_id: i64) -> Result<Option<UserSummary>, ExternalError>;
}

/// 默认实现: 查不到任何用户, 冗余姓名留空
pub struct NoopUserDirectory;

impl UserDirectory for NoopUserDirectory {
    fn get_user(
        &self,
        _tenant_id: i64,
        _user_id: i64,
    ) -> Result<Option<UserSummary>, ExternalError> {
        Ok(None)
    }
}

// ==========================================
// BOM 服务
// ==========================================
/// BOM 展开得到的物料需求行
#[derive(Debug, Clone)]
pub struct BomRequirement {
    pub material_id: i64,
    pub material_code: String,
    pub material_name: Option<String>,
    pub unit: Option<String>,
    pub required_quantity: Decimal,
}

pub trait BomService: Send + Sync {
    /// 按成品与数量展开 BOM 物料需求; level=0 表示展开到底层
    fn calculate_material_requirements(
        &self,
        tenant_id: i64,
        product_id: i64,
        quantity: Decimal,
        expand_level: i32,
    ) -> Result<Vec<BomRequirement>, ExternalError>;
}

/// 默认实现: 无 BOM 数据, 返回空需求
pub struct NoopBomService;

impl BomService for NoopBomService {
    fn calculate_material_requirements(
        &self,
        _tenant_id: i64,
        _product_id: i64,
        _quantity: Decimal,
        _expand_level: i32,
    ) -> Result<Vec<BomRequirement>, ExternalError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_code_shape() {
        let code = fallback_code("SF");
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "SF");
        assert_eq!(parts[1].len(), 6);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[1], parts[1].to_uppercase());
    }

    #[test]
    fn test_dated_code_shape() {
        let code = dated_code("SO");
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SO");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn test_noop_approval_flow_direct_review() {
        let svc = NoopApprovalFlowService;
        assert_eq!(svc.start_flow(1, "demand", 1, 1).unwrap(), None);
        assert_eq!(
            svc.execute_step(1, "x", true, 1, None).unwrap(),
            ApprovalFlowOutcome::Completed
        );
        assert_eq!(
            svc.execute_step(1, "x", false, 1, None).unwrap(),
            ApprovalFlowOutcome::Rejected
        );
    }
}

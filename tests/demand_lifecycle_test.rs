// ==========================================
// 需求单生命周期集成测试
// ==========================================
// 覆盖: 提交(要求审核/免审直通/幂等), 审核通过/驳回,
//       驳回重提, 撤回, 反审核, 删除约束, 流转日志
// ==========================================

mod test_helpers;

use std::sync::Arc;

use kuaizhizao_core::api::{ApiError, CreateDemandRequest, DemandItemInput};
use kuaizhizao_core::app::ExternalServices;
use kuaizhizao_core::domain::types::{DocumentKind, DocumentStatus, ReviewStatus};

use test_helpers::*;

// ==========================================
// 本文件内的请求构造
// ==========================================

fn item(material_code: &str, quantity: i64) -> DemandItemInput {
    DemandItemInput {
        material_id: 1,
        material_code: material_code.to_string(),
        material_name: Some(format!("物料{}", material_code)),
        material_spec: None,
        unit: Some("个".to_string()),
        required_quantity: dec(quantity),
        delivery_date: None,
        forecast_date: None,
        unit_price: None,
    }
}

fn forecast_request(items: Vec<DemandItemInput>) -> CreateDemandRequest {
    CreateDemandRequest {
        demand_type: "sales_forecast".to_string(),
        demand_name: Some("九月成品预测需求".to_string()),
        source_type: None,
        source_id: None,
        start_date: None,
        end_date: None,
        order_date: None,
        delivery_date: None,
        customer_id: None,
        customer_name: None,
        forecast_period: Some("2026-09".to_string()),
        priority: None,
        notes: None,
        items,
    }
}

fn create_draft(env: &TestEnv) -> i64 {
    env.state
        .demand_api
        .create_demand(TENANT, &forecast_request(vec![item("M001", 10)]), OPERATOR, Some("张三"))
        .expect("创建需求失败")
        .demand
        .id
}

// ==========================================
// 提交
// ==========================================

#[test]
fn test_submit_requires_audit_by_default() {
    let env = setup();
    let id = create_draft(&env);

    let demand = env
        .state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, Some("张三"))
        .unwrap();

    assert_eq!(demand.status, DocumentStatus::PendingReview);
    assert_eq!(demand.review_status, ReviewStatus::Pending);
    assert!(demand.submit_time.is_some());
    assert!(demand.reviewer_id.is_none());
}

#[test]
fn test_submit_free_pass_when_audit_not_required() {
    let env = setup_with(ExternalServices {
        business_config: Arc::new(FixedBusinessConfig {
            audit_required: false,
            nodes_enabled: true,
        }),
        ..ExternalServices::default()
    });
    let id = create_draft(&env);

    let demand = env
        .state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, Some("张三"))
        .unwrap();

    // 免审直通: 提交即审核通过, 审核人=提交人
    assert_eq!(demand.status, DocumentStatus::Audited);
    assert_eq!(demand.review_status, ReviewStatus::Approved);
    assert_eq!(demand.reviewer_id, Some(OPERATOR));
    assert_eq!(demand.reviewer_name.as_deref(), Some("张三"));
    assert!(demand.review_time.is_some());
    assert!(demand.submit_time.is_some());
}

#[test]
fn test_submit_is_idempotent() {
    let env = setup();
    let id = create_draft(&env);

    env.state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, None)
        .unwrap();
    let again = env
        .state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, None)
        .unwrap();
    assert_eq!(again.status, DocumentStatus::PendingReview);

    // 重复提交不追加流转日志
    let logs = env
        .state
        .transition_log_repo
        .list_by_entity(TENANT, DocumentKind::Demand, id)
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].from_state, "DRAFT");
    assert_eq!(logs[0].to_state, "PENDING_REVIEW");
}

// ==========================================
// 审核
// ==========================================

#[test]
fn test_review_approve_writes_transition_log() {
    let env = setup();
    let id = create_draft(&env);
    env.state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, Some("张三"))
        .unwrap();

    let demand = env
        .state
        .demand_api
        .review_demand(TENANT, id, true, 200, Some("李四"), Some("同意"))
        .unwrap();

    assert_eq!(demand.status, DocumentStatus::Audited);
    assert_eq!(demand.review_status, ReviewStatus::Approved);
    assert_eq!(demand.reviewer_id, Some(200));
    assert_eq!(demand.review_remarks.as_deref(), Some("同意"));

    let logs = env
        .state
        .transition_log_repo
        .list_by_entity(TENANT, DocumentKind::Demand, id)
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs
        .iter()
        .any(|l| l.from_state == "DRAFT" && l.to_state == "PENDING_REVIEW"));
    assert!(logs
        .iter()
        .any(|l| l.from_state == "PENDING_REVIEW" && l.to_state == "AUDITED"));
}

#[test]
fn test_review_reject_then_resubmit() {
    let env = setup();
    let id = create_draft(&env);
    env.state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, None)
        .unwrap();

    let demand = env
        .state
        .demand_api
        .review_demand(TENANT, id, false, 200, Some("李四"), Some("数量有误"))
        .unwrap();
    assert_eq!(demand.status, DocumentStatus::Rejected);
    assert_eq!(demand.review_status, ReviewStatus::Rejected);

    // 驳回后重新送审
    let demand = env
        .state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, None)
        .unwrap();
    assert_eq!(demand.status, DocumentStatus::PendingReview);
    assert_eq!(demand.review_status, ReviewStatus::Pending);
}

#[test]
fn test_review_requires_pending_status() {
    let env = setup();
    let id = create_draft(&env);

    // 草稿不可直接审核
    let err = env
        .state
        .demand_api
        .review_demand(TENANT, id, true, 200, None, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessLogic(_)));
    assert_eq!(err.http_status(), 409);
}

// ==========================================
// 撤回 / 反审核
// ==========================================

#[test]
fn test_withdraw_returns_to_draft() {
    let env = setup();
    let id = create_draft(&env);
    env.state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, None)
        .unwrap();

    let demand = env
        .state
        .demand_api
        .withdraw_demand(TENANT, id, OPERATOR, None)
        .unwrap();
    assert_eq!(demand.status, DocumentStatus::Draft);
    assert!(demand.submit_time.is_none());

    // 草稿无可撤回 (DRAFT→DRAFT 不在流转表内)
    assert!(env
        .state
        .demand_api
        .withdraw_demand(TENANT, id, OPERATOR, None)
        .is_err());
}

#[test]
fn test_unapprove_moves_back_to_pending_review() {
    let env = setup();
    let id = create_draft(&env);
    env.state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, None)
        .unwrap();
    env.state
        .demand_api
        .review_demand(TENANT, id, true, 200, Some("李四"), None)
        .unwrap();

    let demand = env
        .state
        .demand_api
        .unapprove_demand(TENANT, id, 200, Some("李四"))
        .unwrap();
    assert_eq!(demand.status, DocumentStatus::PendingReview);
    assert_eq!(demand.review_status, ReviewStatus::Pending);
    assert!(demand.reviewer_id.is_none());
    assert!(demand.review_time.is_none());
}

#[test]
fn test_unapprove_requires_audited_or_rejected() {
    let env = setup();
    let id = create_draft(&env);

    let err = env
        .state
        .demand_api
        .unapprove_demand(TENANT, id, OPERATOR, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessLogic(_)));
}

// ==========================================
// 删除约束
// ==========================================

#[test]
fn test_delete_allowed_only_before_audit() {
    let env = setup();

    // 草稿可删
    let draft_id = create_draft(&env);
    env.state.demand_api.delete_demand(TENANT, draft_id).unwrap();
    let err = env
        .state
        .demand_api
        .get_demand(TENANT, draft_id, false, false)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // 已审核不可删
    let audited_id = create_draft(&env);
    env.state
        .demand_api
        .submit_demand(TENANT, audited_id, OPERATOR, None)
        .unwrap();
    env.state
        .demand_api
        .review_demand(TENANT, audited_id, true, 200, None, None)
        .unwrap();
    let err = env
        .state
        .demand_api
        .delete_demand(TENANT, audited_id)
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessLogic(_)));
}

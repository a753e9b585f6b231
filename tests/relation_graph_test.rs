// ==========================================
// 单据关联图集成测试
// ==========================================
// 覆盖: 建边幂等与自环拒绝, 上下游总览, 递归追溯链,
//       已执行下游判定, 上游变更影响标记
// ==========================================

mod test_helpers;

use kuaizhizao_core::api::{ApiError, CreateDemandRequest, DemandItemInput};
use kuaizhizao_core::domain::types::{DocumentKind, DocumentStatus, RelationMode, RelationType};
use kuaizhizao_core::domain::DocumentNode;
use kuaizhizao_core::engine::relation_graph::build_edge;
use kuaizhizao_core::repository::error::RepositoryError;

use test_helpers::*;

// ==========================================
// 本文件内的夹具
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

/// 创建已审核的预测需求并下推运算, 返回 (需求ID, 运算单ID)
fn pushed_demand(env: &TestEnv) -> (i64, i64) {
    let id = env
        .state
        .demand_api
        .create_demand(
            TENANT,
            &CreateDemandRequest {
                demand_type: "sales_forecast".to_string(),
                demand_name: Some("预测需求".to_string()),
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
                items: vec![item("M001", 10)],
            },
            OPERATOR,
            None,
        )
        .unwrap()
        .demand
        .id;
    env.state
        .demand_api
        .submit_demand(TENANT, id, OPERATOR, None)
        .unwrap();
    env.state
        .demand_api
        .review_demand(TENANT, id, true, 200, None, None)
        .unwrap();
    let push = env
        .state
        .demand_api
        .push_demand_to_computation(TENANT, id, None, OPERATOR)
        .unwrap();
    (id, push.computation_id)
}

fn push_edge(env: &TestEnv, source: DocumentNode, target: DocumentNode) -> bool {
    env.state
        .relation_graph
        .create_edge(&build_edge(
            TENANT,
            source,
            None,
            None,
            target,
            None,
            None,
            RelationType::Derived,
            RelationMode::Push,
            None,
        ))
        .unwrap()
}

// ==========================================
// 建边
// ==========================================

#[test]
fn test_create_edge_idempotent() {
    let env = setup();
    let source = DocumentNode::new(DocumentKind::SalesOrder, 1);
    let target = DocumentNode::new(DocumentKind::Demand, 2);

    assert!(push_edge(&env, source, target));
    // 四元组重复 ⇒ 幂等跳过
    assert!(!push_edge(&env, source, target));
}

#[test]
fn test_create_edge_rejects_self_loop() {
    let env = setup();
    let node = DocumentNode::new(DocumentKind::Demand, 7);

    let err = env
        .state
        .relation_graph
        .create_edge(&build_edge(
            TENANT,
            node,
            None,
            None,
            node,
            None,
            None,
            RelationType::Derived,
            RelationMode::Push,
            None,
        ))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationError(_)));
    assert!(err.to_string().contains("自环"));
}

// ==========================================
// 总览与追溯链
// ==========================================

#[test]
fn test_relation_overview() {
    let env = setup();
    let (demand_id, computation_id) = pushed_demand(&env);

    let overview = env
        .state
        .document_api
        .get_relations(TENANT, "demand_computation", computation_id)
        .unwrap();
    // 上游: 需求→运算的下推边; 下游: 运算→需求的来源边
    assert_eq!(overview.upstream.len(), 1);
    assert_eq!(overview.upstream[0].source_type, DocumentKind::Demand);
    assert_eq!(overview.upstream[0].source_id, demand_id);
    assert_eq!(overview.downstream.len(), 1);
    assert_eq!(overview.downstream[0].relation_type, RelationType::Source);

    // 未知类型报参数错误
    let err = env
        .state
        .document_api
        .get_relations(TENANT, "invoice", 1)
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[test]
fn test_trace_chain_both_directions() {
    let env = setup();
    let (demand_id, computation_id) = pushed_demand(&env);
    let wo_id = seed_work_order(&env, "WO001", DocumentStatus::Draft);
    push_edge(
        &env,
        DocumentNode::new(DocumentKind::DemandComputation, computation_id),
        DocumentNode::new(DocumentKind::WorkOrder, wo_id),
    );

    let chain = env
        .state
        .document_api
        .trace_document_chain(TENANT, "demand", demand_id)
        .unwrap();

    // 向下: 需求 → 运算 → 工单 (访问集防止沿来源边折回)
    assert_eq!(chain.downstream.len(), 1);
    let computation_node = &chain.downstream[0];
    assert_eq!(
        computation_node.document.document_type,
        DocumentKind::DemandComputation
    );
    assert_eq!(computation_node.document.status.as_deref(), Some("draft"));
    assert_eq!(computation_node.children.len(), 1);
    assert_eq!(
        computation_node.children[0].document.document_type,
        DocumentKind::WorkOrder
    );
    assert!(computation_node.children[0].children.is_empty());

    // 向上: 工单 → 运算 → 需求
    let chain = env
        .state
        .document_api
        .trace_document_chain(TENANT, "work_order", wo_id)
        .unwrap();
    assert_eq!(chain.upstream.len(), 1);
    assert_eq!(
        chain.upstream[0].document.document_type,
        DocumentKind::DemandComputation
    );
    assert_eq!(chain.upstream[0].children.len(), 1);
    assert_eq!(
        chain.upstream[0].children[0].document.document_type,
        DocumentKind::Demand
    );
}

// ==========================================
// 已执行下游判定
// ==========================================

#[test]
fn test_executed_downstream_purchase_order_with_receipts() {
    let env = setup();
    let (_, computation_id) = pushed_demand(&env);
    let computation_node = DocumentNode::new(DocumentKind::DemandComputation, computation_id);

    seed_warehouse(&env, "WH001");
    let po_id = seed_purchase_order(&env, "CG001", DocumentStatus::Audited);
    seed_purchase_order_item(&env, po_id, "M001", 10);
    push_edge(
        &env,
        computation_node,
        DocumentNode::new(DocumentKind::PurchaseOrder, po_id),
    );

    // 尚未入库: 不构成阻断
    assert!(env
        .state
        .document_api
        .check_executed_downstream(TENANT, "demand_computation", computation_id)
        .unwrap()
        .is_none());

    env.state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, po_id, None, None, OPERATOR)
        .unwrap();

    let blocker = env
        .state
        .document_api
        .check_executed_downstream(TENANT, "demand_computation", computation_id)
        .unwrap();
    assert!(blocker.unwrap().contains("入库记录"));
}

#[test]
fn test_executed_downstream_plan_with_derived_work_order() {
    let env = setup();
    let (_, computation_id) = pushed_demand(&env);
    let computation_node = DocumentNode::new(DocumentKind::DemandComputation, computation_id);

    let plan_id = seed_production_plan(&env, "JH001");
    let plan_node = DocumentNode::new(DocumentKind::ProductionPlan, plan_id);
    push_edge(&env, computation_node, plan_node);
    assert!(env
        .state
        .relation_graph
        .has_executed_downstream(TENANT, computation_node)
        .unwrap()
        .is_none());

    // 生产计划派生工单后视为已执行
    let wo_id = seed_work_order(&env, "WO001", DocumentStatus::Draft);
    push_edge(&env, plan_node, DocumentNode::new(DocumentKind::WorkOrder, wo_id));

    let blocker = env
        .state
        .relation_graph
        .has_executed_downstream(TENANT, computation_node)
        .unwrap();
    assert!(blocker.unwrap().contains("派生工单"));
}

// ==========================================
// 上游变更影响标记
// ==========================================

#[test]
fn test_impact_marks_only_recomputable_computations() {
    let env = setup();
    let (demand_a, computation_a) = pushed_demand(&env);
    let (demand_b, computation_b) = pushed_demand(&env);

    // 运算B已出结果, 不再标记
    let conn = raw_conn(&env);
    conn.execute(
        "UPDATE demand_computation SET status = 'computed' WHERE id = ?1",
        [computation_b],
    )
    .unwrap();

    let marked = env
        .state
        .relation_graph
        .apply_upstream_change_impact(TENANT, DocumentNode::new(DocumentKind::Demand, demand_a))
        .unwrap();
    assert_eq!(marked, 1);
    assert!(env
        .state
        .computation_repo
        .find_by_id(TENANT, computation_a)
        .unwrap()
        .unwrap()
        .needs_recompute);

    let marked = env
        .state
        .relation_graph
        .apply_upstream_change_impact(TENANT, DocumentNode::new(DocumentKind::Demand, demand_b))
        .unwrap();
    assert_eq!(marked, 0);
    assert!(!env
        .state
        .computation_repo
        .find_by_id(TENANT, computation_b)
        .unwrap()
        .unwrap()
        .needs_recompute);
}

// ==========================================
// 下推/上拉/撤回引擎集成测试
// ==========================================
// 覆盖: 需求下推运算(校验/明细/双向边/重复拒绝/合并MTO⇒LRP),
//       撤回(未下推/已执行阻断/级联删除/整体失效),
//       采购单下推入库(数量包络/默认仓库/节点开关),
//       销售订单与预测上拉出库
// ==========================================

mod test_helpers;

use std::collections::HashMap;
use std::sync::Arc;

use kuaizhizao_core::api::{ApiError, CreateDemandRequest, DemandItemInput};
use kuaizhizao_core::app::ExternalServices;
use kuaizhizao_core::domain::types::{
    ComputationType, DocumentKind, DocumentStatus, RelationMode, RelationType, ReviewStatus,
};
use kuaizhizao_core::domain::DocumentNode;
use kuaizhizao_core::engine::relation_graph::build_edge;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use test_helpers::*;

// ==========================================
// 本文件内的夹具
// ==========================================

fn item(material_code: &str, quantity: i64, unit_price: Option<i64>) -> DemandItemInput {
    DemandItemInput {
        material_id: 1,
        material_code: material_code.to_string(),
        material_name: Some(format!("物料{}", material_code)),
        material_spec: None,
        unit: Some("个".to_string()),
        required_quantity: dec(quantity),
        delivery_date: None,
        forecast_date: None,
        unit_price: unit_price.map(dec),
    }
}

fn request(demand_type: &str, items: Vec<DemandItemInput>) -> CreateDemandRequest {
    CreateDemandRequest {
        demand_type: demand_type.to_string(),
        demand_name: Some("测试需求".to_string()),
        source_type: None,
        source_id: None,
        start_date: None,
        end_date: None,
        order_date: None,
        delivery_date: None,
        customer_id: None,
        customer_name: None,
        forecast_period: None,
        priority: None,
        notes: None,
        items,
    }
}

fn create_audited_demand(env: &TestEnv, demand_type: &str, items: Vec<DemandItemInput>) -> i64 {
    let id = env
        .state
        .demand_api
        .create_demand(TENANT, &request(demand_type, items), OPERATOR, None)
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
    id
}

/// 运算单 → 下游执行单据 挂一条下推边
fn link_downstream(env: &TestEnv, computation_id: i64, target: DocumentNode, target_code: &str) {
    env.state
        .relation_graph
        .create_edge(&build_edge(
            TENANT,
            DocumentNode::new(DocumentKind::DemandComputation, computation_id),
            None,
            None,
            target,
            Some(target_code.to_string()),
            None,
            RelationType::Derived,
            RelationMode::Push,
            None,
        ))
        .unwrap();
}

// ==========================================
// 需求下推运算
// ==========================================

#[test]
fn test_push_requires_approved_demand() {
    let env = setup();
    let id = env
        .state
        .demand_api
        .create_demand(TENANT, &request("sales_forecast", vec![]), OPERATOR, None)
        .unwrap()
        .demand
        .id;

    let err = env
        .state
        .demand_api
        .push_demand_to_computation(TENANT, id, None, OPERATOR)
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessLogic(_)));
    assert!(err.to_string().contains("不能下推"));
}

#[test]
fn test_push_creates_computation_items_and_edges() {
    let env = setup();
    let id = create_audited_demand(
        &env,
        "sales_forecast",
        vec![item("M001", 10, None), item("M002", 5, None)],
    );

    let push = env
        .state
        .demand_api
        .push_demand_to_computation(TENANT, id, None, OPERATOR)
        .unwrap();
    // 纯MTS ⇒ MRP
    assert_eq!(push.computation_type, ComputationType::Mrp);
    assert!(push.warning.is_none());

    // 需求盖章
    let demand = env
        .state
        .demand_api
        .get_demand(TENANT, id, false, false)
        .unwrap()
        .demand;
    assert!(demand.pushed_to_computation);
    assert_eq!(demand.computation_id, Some(push.computation_id));
    assert_eq!(demand.computation_code.as_deref(), Some(push.computation_code.as_str()));

    // 运算明细: 建议数量初始化为需求数量
    let lines = env
        .state
        .computation_repo
        .list_items(TENANT, push.computation_id)
        .unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines
        .iter()
        .all(|l| l.suggested_quantity == l.required_quantity));

    // 双向边: 需求→运算 (derived/push), 运算→需求 (source/push)
    let demand_node = DocumentNode::new(DocumentKind::Demand, id);
    let computation_node =
        DocumentNode::new(DocumentKind::DemandComputation, push.computation_id);
    let down = env.state.relation_graph.downstream_of(TENANT, demand_node).unwrap();
    assert_eq!(down.len(), 1);
    assert_eq!(down[0].target_type, DocumentKind::DemandComputation);
    assert_eq!(down[0].relation_type, RelationType::Derived);
    assert_eq!(down[0].relation_mode, RelationMode::Push);
    let back = env
        .state
        .relation_graph
        .downstream_of(TENANT, computation_node)
        .unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].target_type, DocumentKind::Demand);
    assert_eq!(back[0].relation_type, RelationType::Source);
}

#[test]
fn test_double_push_rejected() {
    let env = setup();
    let id = create_audited_demand(&env, "sales_forecast", vec![item("M001", 10, None)]);
    env.state
        .demand_api
        .push_demand_to_computation(TENANT, id, None, OPERATOR)
        .unwrap();

    let err = env
        .state
        .demand_api
        .push_demand_to_computation(TENANT, id, None, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("已下推到运算单"));
}

#[test]
fn test_merged_push_any_mto_gives_lrp_and_withdraw_invalidates_all() {
    let env = setup();
    let mts_id = create_audited_demand(&env, "sales_forecast", vec![item("M001", 10, None)]);
    let mto_id = create_audited_demand(&env, "sales_order", vec![item("M002", 3, Some(100))]);

    let push = env
        .state
        .push_pull
        .push_demands_to_computation(TENANT, &[mts_id, mto_id], None, OPERATOR)
        .unwrap();
    // 任一MTO即LRP
    assert_eq!(push.computation_type, ComputationType::Lrp);

    let computation = env
        .state
        .computation_repo
        .find_by_id(TENANT, push.computation_id)
        .unwrap()
        .unwrap();
    assert_eq!(computation.demand_ids, vec![mts_id, mto_id]);

    // 任一需求撤回 ⇒ 整张运算单失效, 全部参与需求清标记
    let result = env
        .state
        .demand_api
        .withdraw_demand_from_computation(TENANT, mts_id, OPERATOR)
        .unwrap();
    assert_eq!(result.cleared_demand_ids, vec![mts_id, mto_id]);

    assert!(env
        .state
        .computation_repo
        .find_by_id(TENANT, push.computation_id)
        .unwrap()
        .is_none());
    for id in [mts_id, mto_id] {
        let demand = env
            .state
            .demand_api
            .get_demand(TENANT, id, false, false)
            .unwrap()
            .demand;
        assert!(!demand.pushed_to_computation);
        assert!(demand.computation_id.is_none());
    }
}

// ==========================================
// 撤回
// ==========================================

#[test]
fn test_withdraw_requires_pushed_demand() {
    let env = setup();
    let id = create_audited_demand(&env, "sales_forecast", vec![item("M001", 10, None)]);

    let err = env
        .state
        .demand_api
        .withdraw_demand_from_computation(TENANT, id, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("未下推运算"));
}

#[test]
fn test_withdraw_blocked_by_executed_downstream() {
    let env = setup();
    let id = create_audited_demand(&env, "sales_order", vec![item("M001", 5, Some(10))]);
    let push = env
        .state
        .demand_api
        .push_demand_to_computation(TENANT, id, None, OPERATOR)
        .unwrap();

    // 下游工单已有报工记录 ⇒ 撤回整体拒绝
    let wo_id = seed_work_order(&env, "WO001", DocumentStatus::Draft);
    seed_reporting_record(&env, wo_id, "BG001");
    link_downstream(
        &env,
        push.computation_id,
        DocumentNode::new(DocumentKind::WorkOrder, wo_id),
        "WO001",
    );

    let err = env
        .state
        .demand_api
        .withdraw_demand_from_computation(TENANT, id, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("撤回被拒绝"));
    assert!(err.to_string().contains("报工"));

    // 整体失败: 状态原样保留
    let demand = env
        .state
        .demand_api
        .get_demand(TENANT, id, false, false)
        .unwrap()
        .demand;
    assert!(demand.pushed_to_computation);
    assert!(env
        .state
        .computation_repo
        .find_by_id(TENANT, push.computation_id)
        .unwrap()
        .is_some());
    assert!(env
        .state
        .execution_repo
        .find_work_order(TENANT, wo_id)
        .unwrap()
        .is_some());
}

#[test]
fn test_withdraw_cascades_unexecuted_downstream() {
    let env = setup();
    let id = create_audited_demand(&env, "sales_order", vec![item("M001", 5, Some(10))]);
    let push = env
        .state
        .demand_api
        .push_demand_to_computation(TENANT, id, None, OPERATOR)
        .unwrap();

    let wo_id = seed_work_order(&env, "WO001", DocumentStatus::Released);
    let plan_id = seed_production_plan(&env, "JH001");
    link_downstream(
        &env,
        push.computation_id,
        DocumentNode::new(DocumentKind::WorkOrder, wo_id),
        "WO001",
    );
    link_downstream(
        &env,
        push.computation_id,
        DocumentNode::new(DocumentKind::ProductionPlan, plan_id),
        "JH001",
    );

    let result = env
        .state
        .demand_api
        .withdraw_demand_from_computation(TENANT, id, OPERATOR)
        .unwrap();
    assert_eq!(result.cleared_demand_ids, vec![id]);
    assert_eq!(result.cascaded_documents, 2);

    // 工单重置草稿后软删, 生产计划软删, 运算单硬删
    assert!(env
        .state
        .execution_repo
        .find_work_order(TENANT, wo_id)
        .unwrap()
        .is_none());
    assert!(env
        .state
        .execution_repo
        .find_production_plan(TENANT, plan_id)
        .unwrap()
        .is_none());
    assert!(env
        .state
        .computation_repo
        .find_by_id(TENANT, push.computation_id)
        .unwrap()
        .is_none());

    // 运算节点的边全部解除
    let computation_node =
        DocumentNode::new(DocumentKind::DemandComputation, push.computation_id);
    assert!(env
        .state
        .relation_graph
        .downstream_of(TENANT, computation_node)
        .unwrap()
        .is_empty());
    assert!(env
        .state
        .relation_graph
        .upstream_of(TENANT, computation_node)
        .unwrap()
        .is_empty());
}

// ==========================================
// 采购单下推入库
// ==========================================

#[test]
fn test_push_receipt_full_then_nothing_outstanding() {
    let env = setup();
    seed_warehouse(&env, "WH001");
    let po_id = seed_purchase_order(&env, "CG001", DocumentStatus::Audited);
    seed_purchase_order_item(&env, po_id, "M001", 10);

    let receipt_id = env
        .state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, po_id, None, None, OPERATOR)
        .unwrap();
    assert!(receipt_id > 0);
    assert!(env
        .state
        .execution_repo
        .purchase_order_has_receipts(TENANT, po_id)
        .unwrap());

    // 全量入库后未入库数量归零
    let lines = env
        .state
        .execution_repo
        .list_purchase_order_items(TENANT, po_id)
        .unwrap();
    assert_eq!(lines[0].received_quantity, dec(10));
    assert_eq!(lines[0].outstanding_quantity(), Decimal::ZERO);

    // 再次下推无可入库行
    let err = env
        .state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, po_id, None, None, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("没有可入库的明细行"));
}

#[test]
fn test_push_receipt_partial_quantity() {
    let env = setup();
    seed_warehouse(&env, "WH001");
    let po_id = seed_purchase_order(&env, "CG001", DocumentStatus::Audited);
    let line_id = seed_purchase_order_item(&env, po_id, "M001", 10);

    let mut quantities = HashMap::new();
    quantities.insert(line_id, dec!(2.5));
    env.state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, po_id, None, Some(&quantities), OPERATOR)
        .unwrap();

    let lines = env
        .state
        .execution_repo
        .list_purchase_order_items(TENANT, po_id)
        .unwrap();
    assert_eq!(lines[0].received_quantity, dec!(2.5));
    assert_eq!(lines[0].outstanding_quantity(), dec!(7.5));
}

#[test]
fn test_push_receipt_rejects_quantity_over_outstanding() {
    let env = setup();
    seed_warehouse(&env, "WH001");
    let po_id = seed_purchase_order(&env, "CG001", DocumentStatus::Audited);
    let line_id = seed_purchase_order_item(&env, po_id, "M001", 10);

    let mut quantities = HashMap::new();
    quantities.insert(line_id, dec(15));
    let err = env
        .state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, po_id, None, Some(&quantities), OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("超出未入库数量"));

    // 包络校验失败整体回滚
    let lines = env
        .state
        .execution_repo
        .list_purchase_order_items(TENANT, po_id)
        .unwrap();
    assert_eq!(lines[0].received_quantity, Decimal::ZERO);
    assert!(!env
        .state
        .execution_repo
        .purchase_order_has_receipts(TENANT, po_id)
        .unwrap());
}

#[test]
fn test_push_receipt_requires_warehouse_and_audited_order() {
    let env = setup();
    let po_id = seed_purchase_order(&env, "CG001", DocumentStatus::Audited);
    seed_purchase_order_item(&env, po_id, "M001", 10);

    // 无任何仓库
    let err = env
        .state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, po_id, None, None, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("没有可用仓库"));

    // 未审核的采购单
    seed_warehouse(&env, "WH001");
    let draft_po = seed_purchase_order(&env, "CG002", DocumentStatus::Draft);
    seed_purchase_order_item(&env, draft_po, "M001", 10);
    let err = env
        .state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, draft_po, None, None, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("不能下推入库"));
}

#[test]
fn test_push_receipt_blocked_when_node_disabled() {
    let env = setup_with(ExternalServices {
        business_config: Arc::new(FixedBusinessConfig {
            audit_required: true,
            nodes_enabled: false,
        }),
        ..ExternalServices::default()
    });
    seed_warehouse(&env, "WH001");
    let po_id = seed_purchase_order(&env, "CG001", DocumentStatus::Audited);
    seed_purchase_order_item(&env, po_id, "M001", 10);

    let err = env
        .state
        .push_pull
        .push_purchase_order_to_receipt(TENANT, po_id, None, None, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("节点未启用"));
}

// ==========================================
// 销售出库上拉
// ==========================================

#[test]
fn test_pull_delivery_from_sales_order_updates_envelope() {
    let env = setup();
    let order_id = seed_sales_order(&env, "SO001", DocumentStatus::Audited, ReviewStatus::Approved);
    let line_id = seed_sales_order_item(&env, order_id, "M001", 10, Some(5));

    let mut quantities = HashMap::new();
    quantities.insert(line_id, dec(4));
    let delivery_id = env
        .state
        .push_pull
        .pull_delivery_from_sales_order(TENANT, order_id, Some(&quantities), OPERATOR)
        .unwrap();
    assert!(delivery_id > 0);

    let lines = env.state.sales_repo.list_order_items(TENANT, order_id).unwrap();
    assert_eq!(lines[0].remaining_quantity, dec(6));
    assert_eq!(lines[0].delivered_quantity, dec(4));

    // 超出未出库数量被拒
    let mut over = HashMap::new();
    over.insert(line_id, dec(7));
    let err = env
        .state
        .push_pull
        .pull_delivery_from_sales_order(TENANT, order_id, Some(&over), OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("超出未出库数量"));
}

#[test]
fn test_pull_delivery_from_forecast_uses_placeholder_customer() {
    let env = setup();
    let forecast_id = seed_sales_forecast(&env, "SF001", DocumentStatus::Audited);
    seed_sales_forecast_item(&env, forecast_id, "M001", 10);

    let delivery_id = env
        .state
        .push_pull
        .pull_delivery_from_sales_forecast(TENANT, forecast_id, None, OPERATOR)
        .unwrap();

    let conn = raw_conn(&env);
    let customer_name: String = conn
        .query_row(
            "SELECT customer_name FROM sales_delivery WHERE id = ?1",
            [delivery_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(customer_name, "默认客户");

    let lines = env
        .state
        .sales_repo
        .list_forecast_items(TENANT, forecast_id)
        .unwrap();
    assert_eq!(lines[0].remaining_quantity, Decimal::ZERO);
}

#[test]
fn test_pull_requires_audited_source() {
    let env = setup();
    let order_id = seed_sales_order(&env, "SO001", DocumentStatus::Draft, ReviewStatus::Pending);
    seed_sales_order_item(&env, order_id, "M001", 10, Some(5));

    let err = env
        .state
        .push_pull
        .pull_delivery_from_sales_order(TENANT, order_id, None, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("不能上拉出库"));
}

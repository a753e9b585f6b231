// ==========================================
// 上游同步引擎集成测试
// ==========================================
// 覆盖: 未关联来源, 成功同步(快照+重投影+历史+影响标记+通知),
//       失败同步(事务回滚+失败历史), 预测来源路径
// ==========================================

mod test_helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use kuaizhizao_core::api::{CreateDemandRequest, DemandItemInput};
use kuaizhizao_core::app::ExternalServices;
use kuaizhizao_core::domain::types::{
    DocumentKind, DocumentStatus, RecalcOutcome, ReviewStatus, SnapshotType, TriggerType,
};

use test_helpers::*;

fn linked_order_request(source_id: i64, items: Vec<DemandItemInput>) -> CreateDemandRequest {
    CreateDemandRequest {
        demand_type: "sales_order".to_string(),
        demand_name: Some("订单需求".to_string()),
        source_type: Some("sales_order".to_string()),
        source_id: Some(source_id),
        start_date: None,
        end_date: None,
        order_date: None,
        delivery_date: None,
        customer_id: Some(9),
        customer_name: Some("测试客户".to_string()),
        forecast_period: None,
        priority: None,
        notes: None,
        items,
    }
}

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

#[test]
fn test_sync_without_linked_demand_is_noop() {
    let env = setup();
    let order_id = seed_sales_order(&env, "SO001", DocumentStatus::Audited, ReviewStatus::Approved);
    seed_sales_order_item(&env, order_id, "M001", 10, Some(5));

    let result = env
        .state
        .sync_engine
        .sync_from_upstream(TENANT, DocumentKind::SalesOrder, order_id, OPERATOR)
        .unwrap();
    assert!(!result.synced);
    assert!(result.demand_id.is_none());
    assert!(result.snapshot_id.is_none());
}

#[test]
fn test_sync_success_reprojects_and_records() {
    let env = setup();
    let order_id = seed_sales_order(&env, "SO001", DocumentStatus::Audited, ReviewStatus::Approved);
    let order_item_id = seed_sales_order_item(&env, order_id, "M001", 10, Some(5));

    let demand_id = env
        .state
        .demand_api
        .create_demand(
            TENANT,
            &linked_order_request(order_id, vec![item("M001", 10, Some(5))]),
            OPERATOR,
            None,
        )
        .unwrap()
        .demand
        .id;

    // 上游订单行数量 10 → 20
    let conn = raw_conn(&env);
    conn.execute(
        "UPDATE sales_order_item SET order_quantity = '20' WHERE id = ?1",
        [order_item_id],
    )
    .unwrap();

    let result = env
        .state
        .sync_engine
        .sync_from_upstream(TENANT, DocumentKind::SalesOrder, order_id, OPERATOR)
        .unwrap();
    assert!(result.synced);
    assert_eq!(result.demand_id, Some(demand_id));
    assert!(result.snapshot_id.is_some());
    assert!(result.history_id.is_some());
    // 未下推, 无需通知
    assert!(!result.notify_attempted);

    // 需求明细与合计已重投影
    let detail = env
        .state
        .demand_api
        .get_demand(TENANT, demand_id, true, false)
        .unwrap();
    assert_eq!(detail.demand.total_quantity, dec(20));
    let items = detail.items.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].required_quantity, dec(20));

    // 重算前快照冻结旧值
    let snapshots = env
        .state
        .demand_api
        .list_demand_snapshots(TENANT, demand_id)
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].snapshot_type, SnapshotType::BeforeRecalc);
    assert_eq!(snapshots[0].trigger_reason, "upstream_sales_order_updated");
    let frozen_items = snapshots[0].demand_items_snapshot.as_array().unwrap();
    assert_eq!(frozen_items.len(), 1);
    assert_eq!(frozen_items[0]["required_quantity"].as_str(), Some("10"));

    // 成功历史行挂接快照
    let history = env
        .state
        .demand_api
        .list_demand_recalc_history(TENANT, demand_id)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, RecalcOutcome::Success);
    assert_eq!(history[0].trigger_type, TriggerType::UpstreamChange);
    assert_eq!(history[0].snapshot_id, result.snapshot_id);
}

#[test]
fn test_sync_failure_rolls_back_and_logs_history() {
    let env = setup();
    let order_id = seed_sales_order(&env, "SO001", DocumentStatus::Audited, ReviewStatus::Approved);
    seed_sales_order_item(&env, order_id, "M001", 10, Some(5));

    let demand_id = env
        .state
        .demand_api
        .create_demand(
            TENANT,
            &linked_order_request(order_id, vec![item("M001", 10, Some(5))]),
            OPERATOR,
            None,
        )
        .unwrap()
        .demand
        .id;

    // 来源明细被清空, 重投影必须失败
    let conn = raw_conn(&env);
    conn.execute(
        "DELETE FROM sales_order_item WHERE sales_order_id = ?1",
        [order_id],
    )
    .unwrap();

    let err = env
        .state
        .sync_engine
        .sync_from_upstream(TENANT, DocumentKind::SalesOrder, order_id, OPERATOR)
        .unwrap_err();
    assert!(err.to_string().contains("没有明细行"));

    // 事务回滚: 需求与明细保持原样, 无残留快照
    let detail = env
        .state
        .demand_api
        .get_demand(TENANT, demand_id, true, false)
        .unwrap();
    assert_eq!(detail.demand.total_quantity, dec(10));
    assert_eq!(detail.items.unwrap().len(), 1);
    assert!(env
        .state
        .demand_api
        .list_demand_snapshots(TENANT, demand_id)
        .unwrap()
        .is_empty());

    // 失败历史在事务外追加, 快照ID为空
    let history = env
        .state
        .demand_api
        .list_demand_recalc_history(TENANT, demand_id)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, RecalcOutcome::Failed);
    assert!(history[0].snapshot_id.is_none());
    assert!(history[0].message.as_deref().unwrap().contains("没有明细行"));
}

#[test]
fn test_sync_marks_pushed_computation_and_notifies() {
    let messaging = Arc::new(CountingMessagingService::default());
    let env = setup_with(ExternalServices {
        messaging: messaging.clone(),
        ..ExternalServices::default()
    });

    let order_id = seed_sales_order(&env, "SO001", DocumentStatus::Audited, ReviewStatus::Approved);
    let order_item_id = seed_sales_order_item(&env, order_id, "M001", 10, Some(5));

    let demand_id = env
        .state
        .demand_api
        .create_demand(
            TENANT,
            &linked_order_request(order_id, vec![item("M001", 10, Some(5))]),
            OPERATOR,
            None,
        )
        .unwrap()
        .demand
        .id;
    env.state
        .demand_api
        .submit_demand(TENANT, demand_id, OPERATOR, None)
        .unwrap();
    env.state
        .demand_api
        .review_demand(TENANT, demand_id, true, 200, None, None)
        .unwrap();
    let push = env
        .state
        .demand_api
        .push_demand_to_computation(TENANT, demand_id, None, OPERATOR)
        .unwrap();

    let conn = raw_conn(&env);
    conn.execute(
        "UPDATE sales_order_item SET order_quantity = '30' WHERE id = ?1",
        [order_item_id],
    )
    .unwrap();

    let result = env
        .state
        .sync_engine
        .sync_from_upstream(TENANT, DocumentKind::SalesOrder, order_id, OPERATOR)
        .unwrap();
    assert!(result.synced);
    assert!(result.notify_attempted);
    assert_eq!(messaging.sent.load(Ordering::SeqCst), 1);

    // 策略A: 只标记待重算, 不自动重算
    let computation = env
        .state
        .computation_repo
        .find_by_id(TENANT, push.computation_id)
        .unwrap()
        .unwrap();
    assert!(computation.needs_recompute);
    assert_eq!(computation.status, "draft");
}

#[test]
fn test_sync_forecast_source() {
    let env = setup();
    let forecast_id = seed_sales_forecast(&env, "SF001", DocumentStatus::Audited);
    let forecast_item_id = seed_sales_forecast_item(&env, forecast_id, "M001", 100);

    let demand_id = env
        .state
        .demand_api
        .create_demand(
            TENANT,
            &CreateDemandRequest {
                demand_type: "sales_forecast".to_string(),
                demand_name: Some("预测需求".to_string()),
                source_type: Some("sales_forecast".to_string()),
                source_id: Some(forecast_id),
                start_date: None,
                end_date: None,
                order_date: None,
                delivery_date: None,
                customer_id: None,
                customer_name: None,
                forecast_period: Some("2026-09".to_string()),
                priority: None,
                notes: None,
                items: vec![item("M001", 100, None)],
            },
            OPERATOR,
            None,
        )
        .unwrap()
        .demand
        .id;

    let conn = raw_conn(&env);
    conn.execute(
        "UPDATE sales_forecast_item SET forecast_quantity = '150' WHERE id = ?1",
        [forecast_item_id],
    )
    .unwrap();

    let result = env
        .state
        .sync_engine
        .sync_from_upstream(TENANT, DocumentKind::SalesForecast, forecast_id, OPERATOR)
        .unwrap();
    assert!(result.synced);

    let detail = env
        .state
        .demand_api
        .get_demand(TENANT, demand_id, true, false)
        .unwrap();
    assert_eq!(detail.demand.total_quantity, dec(150));
}

// ==========================================
// 快智造制造管理平台 - 上游同步与重算引擎
// ==========================================
// 职责: 上游销售单据变更时重投影需求 (快照先行, 单事务)
// 红线: 任何破坏性覆盖之前必须先落快照
// 策略A: 已下推的需求只通知不自动重算
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Local;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::domain::demand::{Demand, DemandItem};
use crate::domain::relation::DocumentNode;
use crate::domain::types::{DocumentKind, RecalcOutcome, SnapshotType, TriggerType};
use crate::domain::snapshot::{DemandRecalcHistory, DemandSnapshot};
use crate::external::{MessagingService, MSG_TEMPLATE_DEMAND_RECALC};
use crate::repository::demand_repo::{
    delete_items_by_demand, find_demand_by_source, insert_item, list_items_by_demand,
    update_demand,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sales_repo::{
    find_sales_forecast_by_id, find_sales_order_by_id, list_sales_forecast_items,
    list_sales_order_items,
};
use crate::repository::snapshot_repo::{insert_recalc_history, insert_snapshot};
use crate::engine::relation_graph::apply_upstream_change_impact;

/// 失败信息截断长度 (字符)
const MAX_FAILURE_MESSAGE_CHARS: usize = 500;

/// 同步结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub synced: bool,
    pub demand_id: Option<i64>,
    pub snapshot_id: Option<i64>,
    pub history_id: Option<i64>,
    /// 通知是否已尝试发送 (策略A)
    pub notify_attempted: bool,
}

impl SyncResult {
    fn not_linked() -> Self {
        Self {
            synced: false,
            demand_id: None,
            snapshot_id: None,
            history_id: None,
            notify_attempted: false,
        }
    }
}

// ==========================================
// UpstreamSyncEngine - 上游同步引擎
// ==========================================
pub struct UpstreamSyncEngine {
    conn: Arc<Mutex<Connection>>,
    messaging: Arc<dyn MessagingService>,
}

impl UpstreamSyncEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, messaging: Arc<dyn MessagingService>) -> Self {
        Self { conn, messaging }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 上游单据变更后同步需求
    ///
    /// # 协议 (单事务)
    /// 1. 按 (source_type, source_id) 定位需求, 无则返回 {synced:false}
    /// 2. 快照当前需求+明细
    /// 3. 重读来源单据及明细 (至少一行)
    /// 4. 覆盖投影字段
    /// 5. 删除并重建需求明细
    /// 6. 追加成功历史行
    ///
    /// 失败时回滚事务, 再补写一条 result=failed 的历史行
    #[instrument(skip(self))]
    pub fn sync_from_upstream(
        &self,
        tenant_id: i64,
        source_type: DocumentKind,
        source_id: i64,
        operator_id: i64,
    ) -> RepositoryResult<SyncResult> {
        let conn = self.get_conn()?;

        let Some(demand) = find_demand_by_source(&conn, tenant_id, source_type, source_id)? else {
            return Ok(SyncResult::not_linked());
        };
        let demand_id = demand.id;

        let attempt = self.sync_in_transaction(&conn, tenant_id, &demand, source_type, source_id, operator_id);

        match attempt {
            Ok((snapshot_id, history_id, notify_ctx)) => {
                drop(conn); // 通知不占连接锁
                let notify_attempted = if let Some((demand_code, computation_id, computation_code)) =
                    notify_ctx
                {
                    self.notify_downstream(
                        tenant_id,
                        operator_id,
                        &demand_code,
                        computation_id,
                        computation_code.as_deref(),
                    );
                    true
                } else {
                    false
                };
                Ok(SyncResult {
                    synced: true,
                    demand_id: Some(demand_id),
                    snapshot_id: Some(snapshot_id),
                    history_id: Some(history_id),
                    notify_attempted,
                })
            }
            Err(e) => {
                // 事务已回滚, 补写失败历史 (自动提交)
                let message: String = e.to_string().chars().take(MAX_FAILURE_MESSAGE_CHARS).collect();
                let now = Local::now().naive_local();
                let history = DemandRecalcHistory {
                    id: 0,
                    tenant_id,
                    demand_id,
                    recalc_at: now,
                    trigger_type: TriggerType::UpstreamChange,
                    source_type: Some(source_type),
                    source_id: Some(source_id),
                    trigger_reason: Some(format!("upstream_{}_updated", source_type.as_str())),
                    snapshot_id: None,
                    operator_id,
                    result: RecalcOutcome::Failed,
                    message: Some(message),
                    created_at: now,
                };
                if let Err(log_err) = insert_recalc_history(&conn, &history) {
                    warn!(tenant_id, demand_id, error = %log_err, "失败历史写入失败");
                }
                Err(e)
            }
        }
    }

    /// 事务体: 快照 → 重投影 → 重建明细 → 成功历史
    #[allow(clippy::type_complexity)]
    fn sync_in_transaction(
        &self,
        conn: &Connection,
        tenant_id: i64,
        demand: &Demand,
        source_type: DocumentKind,
        source_id: i64,
        operator_id: i64,
    ) -> RepositoryResult<(i64, i64, Option<(String, i64, Option<String>)>)> {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let now = Local::now().naive_local();
        let trigger_reason = format!("upstream_{}_updated", source_type.as_str());

        // 1. 快照先行
        let items = list_items_by_demand(&tx, tenant_id, demand.id)?;
        let snapshot = DemandSnapshot {
            id: 0,
            tenant_id,
            demand_id: demand.id,
            snapshot_type: SnapshotType::BeforeRecalc,
            snapshot_at: now,
            trigger_reason: trigger_reason.clone(),
            demand_snapshot: serde_json::to_value(demand)
                .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
            demand_items_snapshot: serde_json::to_value(&items)
                .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
            created_at: now,
        };
        let snapshot_id = insert_snapshot(&tx, &snapshot)?;

        // 2. 重读来源并重投影
        let mut updated = demand.clone();
        let new_items = match source_type {
            DocumentKind::SalesOrder => {
                let order = find_sales_order_by_id(&tx, tenant_id, source_id)?.ok_or(
                    RepositoryError::NotFound {
                        entity: "SalesOrder".to_string(),
                        id: source_id.to_string(),
                    },
                )?;
                let source_items = list_sales_order_items(&tx, tenant_id, source_id)?;
                if source_items.is_empty() {
                    return Err(RepositoryError::BusinessRuleViolation(
                        "来源销售订单没有明细行, 无法同步需求".to_string(),
                    ));
                }
                project_from_order(&mut updated, &order, &source_items, now)
            }
            DocumentKind::SalesForecast => {
                let forecast = find_sales_forecast_by_id(&tx, tenant_id, source_id)?.ok_or(
                    RepositoryError::NotFound {
                        entity: "SalesForecast".to_string(),
                        id: source_id.to_string(),
                    },
                )?;
                let source_items = list_sales_forecast_items(&tx, tenant_id, source_id)?;
                if source_items.is_empty() {
                    return Err(RepositoryError::BusinessRuleViolation(
                        "来源销售预测没有明细行, 无法同步需求".to_string(),
                    ));
                }
                project_from_forecast(&mut updated, &forecast, &source_items, now)
            }
            other => {
                return Err(RepositoryError::ValidationError(format!(
                    "单据类型 {} 不支持需求同步",
                    other
                )));
            }
        };

        updated.updated_by = operator_id;
        updated.updated_at = now;
        update_demand(&tx, &updated)?;

        // 3. 删除并重建明细
        delete_items_by_demand(&tx, tenant_id, demand.id)?;
        for item in &new_items {
            insert_item(&tx, item)?;
        }

        // 4. 成功历史
        let history = DemandRecalcHistory {
            id: 0,
            tenant_id,
            demand_id: demand.id,
            recalc_at: now,
            trigger_type: TriggerType::UpstreamChange,
            source_type: Some(source_type),
            source_id: Some(source_id),
            trigger_reason: Some(trigger_reason),
            snapshot_id: Some(snapshot_id),
            operator_id,
            result: RecalcOutcome::Success,
            message: None,
            created_at: now,
        };
        let history_id = insert_recalc_history(&tx, &history)?;

        // 5. 下游运算单标记待重算
        apply_upstream_change_impact(
            &tx,
            tenant_id,
            DocumentNode::new(DocumentKind::Demand, demand.id),
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            tenant_id,
            demand_id = demand.id,
            snapshot_id,
            history_id,
            item_count = new_items.len(),
            "需求上游同步完成"
        );

        let notify_ctx = if updated.pushed_to_computation {
            updated
                .computation_id
                .map(|cid| (updated.demand_code.clone(), cid, updated.computation_code.clone()))
        } else {
            None
        };
        Ok((snapshot_id, history_id, notify_ctx))
    }

    /// 策略A: 发送 DEMAND_RECALC_NOTIFY, 失败只记日志
    fn notify_downstream(
        &self,
        tenant_id: i64,
        operator_id: i64,
        demand_code: &str,
        computation_id: i64,
        computation_code: Option<&str>,
    ) {
        let mut params = HashMap::new();
        params.insert("demand_code".to_string(), demand_code.to_string());
        params.insert("computation_id".to_string(), computation_id.to_string());
        params.insert(
            "computation_code".to_string(),
            computation_code.unwrap_or_default().to_string(),
        );
        if let Err(e) =
            self.messaging
                .send_message(tenant_id, MSG_TEMPLATE_DEMAND_RECALC, operator_id, &params)
        {
            warn!(tenant_id, demand_code, error = %e, "重算通知发送失败 (不阻断)");
        }
    }
}

// ==========================================
// 投影函数 (显式DTO, 不序列化存储行本身)
// ==========================================

/// MTO: 订单行投影 order_quantity/unit_price/total_amount
fn project_from_order(
    demand: &mut Demand,
    order: &crate::domain::sales::SalesOrder,
    source_items: &[crate::domain::sales::SalesOrderItem],
    now: chrono::NaiveDateTime,
) -> Vec<DemandItem> {
    demand.demand_name = order.order_name.clone();
    demand.order_date = order.order_date;
    demand.delivery_date = order.delivery_date;
    demand.customer_id = order.customer_id;
    demand.customer_name = order.customer_name.clone();
    // 展示镜像字段
    demand.status = order.status;
    demand.review_status = order.review_status;

    let mut total_quantity = Decimal::ZERO;
    let mut total_amount = Decimal::ZERO;
    let items: Vec<DemandItem> = source_items
        .iter()
        .map(|line| {
            total_quantity += line.order_quantity;
            let amount = line
                .total_amount
                .or_else(|| line.unit_price.map(|p| p * line.order_quantity));
            if let Some(a) = amount {
                total_amount += a;
            }
            DemandItem {
                id: 0,
                tenant_id: demand.tenant_id,
                demand_id: demand.id,
                material_id: line.material_id,
                material_code: line.material_code.clone(),
                material_name: line.material_name.clone(),
                material_spec: line.material_spec.clone(),
                unit: line.unit.clone(),
                required_quantity: line.order_quantity,
                delivery_date: line.delivery_date,
                forecast_date: None,
                unit_price: line.unit_price,
                item_amount: amount,
                remaining_quantity: Some(line.remaining_quantity),
                delivered_quantity: Some(line.delivered_quantity),
                delivery_status: None,
                created_at: now,
                updated_at: now,
            }
        })
        .collect();

    demand.total_quantity = total_quantity;
    demand.total_amount = total_amount;
    items
}

/// MTS: 预测行投影 forecast_quantity/forecast_date, 金额恒为0
fn project_from_forecast(
    demand: &mut Demand,
    forecast: &crate::domain::sales::SalesForecast,
    source_items: &[crate::domain::sales::SalesForecastItem],
    now: chrono::NaiveDateTime,
) -> Vec<DemandItem> {
    demand.demand_name = forecast.forecast_name.clone();
    demand.forecast_period = forecast.forecast_period.clone();
    demand.start_date = forecast.start_date;
    demand.end_date = forecast.end_date;
    demand.status = forecast.status;
    demand.review_status = forecast.review_status;

    let mut total_quantity = Decimal::ZERO;
    let items: Vec<DemandItem> = source_items
        .iter()
        .map(|line| {
            total_quantity += line.forecast_quantity;
            DemandItem {
                id: 0,
                tenant_id: demand.tenant_id,
                demand_id: demand.id,
                material_id: line.material_id,
                material_code: line.material_code.clone(),
                material_name: line.material_name.clone(),
                material_spec: line.material_spec.clone(),
                unit: line.unit.clone(),
                required_quantity: line.forecast_quantity,
                delivery_date: None,
                forecast_date: line.forecast_date,
                unit_price: None,
                item_amount: None,
                remaining_quantity: Some(line.remaining_quantity),
                delivered_quantity: None,
                delivery_status: None,
                created_at: now,
                updated_at: now,
            }
        })
        .collect();

    demand.total_quantity = total_quantity;
    demand.total_amount = Decimal::ZERO;
    items
}

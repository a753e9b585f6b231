// ==========================================
// 快智造制造管理平台 - 下推/上拉/撤回引擎
// ==========================================
// 职责: 沿单向业务流创建下游单据, 强制数量包络,
//       撤回时级联删除未执行下游, 遇已执行下游拒绝
// 红线: 撤回要么整体成功要么整体失败, 绝不部分撤回
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Local;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::computation::{
    ComputationParams, DemandComputation, DemandComputationItem, COMPUTATION_STATUS_DRAFT,
};
use crate::domain::demand::Demand;
use crate::domain::execution::{
    PurchaseReceipt, PurchaseReceiptItem, SalesDelivery, SalesDeliveryItem,
};
use crate::domain::relation::DocumentNode;
use crate::domain::types::{
    BusinessMode, ComputationType, DocumentKind, DocumentStatus, RelationMode, RelationType,
    ReviewStatus,
};
use crate::engine::relation_graph::{build_edge, create_edge, find_executed_downstream};
use crate::external::{fallback_code, BusinessConfigService, CodeRuleService, NODE_INBOUND, NODE_SALES_DELIVERY};
use crate::repository::computation_repo::{
    find_computation_by_id, hard_delete_computation, insert_computation, insert_computation_item,
};
use crate::repository::demand_repo::{find_demand_by_id, list_items_by_demand, set_push_state};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::execution_repo::{
    find_default_warehouse, find_purchase_order_by_id, find_work_order_by_id,
    hard_delete_purchase_order, insert_purchase_receipt, insert_purchase_receipt_item,
    insert_sales_delivery, insert_sales_delivery_item, list_purchase_order_items,
    reset_and_soft_delete_work_order, soft_delete_production_plan,
    soft_delete_purchase_requisition, update_purchase_order_item_received,
};
use crate::repository::relation_repo::{delete_all_edges_for_node, list_by_source};
use crate::repository::sales_repo::{
    find_sales_forecast_by_id, find_sales_order_by_id, list_sales_forecast_items,
    list_sales_order_items, update_sales_forecast_item_remaining,
    update_sales_order_item_delivery,
};

/// 编码规则键
const COMPUTATION_CODE_KEY: &str = "DEMAND_COMPUTATION_CODE";
const RECEIPT_CODE_KEY: &str = "PURCHASE_RECEIPT_CODE";
const DELIVERY_CODE_KEY: &str = "SALES_DELIVERY_CODE";

/// MTS上拉出库且来源无客户时的占位客户
const DEFAULT_CUSTOMER_NAME: &str = "默认客户";

/// 下推运算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResult {
    pub computation_id: i64,
    pub computation_code: String,
    pub computation_type: ComputationType,
    /// 重新下推 (原运算单已消失) 时附带的提示
    pub warning: Option<String>,
}

/// 撤回结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawResult {
    /// 被清除下推标记的需求ID列表 (合并运算时不止一个)
    pub cleared_demand_ids: Vec<i64>,
    /// 级联删除的下游单据数量
    pub cascaded_documents: usize,
}

// ==========================================
// PushPullEngine - 下推/上拉/撤回引擎
// ==========================================
pub struct PushPullEngine {
    conn: Arc<Mutex<Connection>>,
    code_rules: Arc<dyn CodeRuleService>,
    business_config: Arc<dyn BusinessConfigService>,
}

impl PushPullEngine {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        code_rules: Arc<dyn CodeRuleService>,
        business_config: Arc<dyn BusinessConfigService>,
    ) -> Self {
        Self {
            conn,
            code_rules,
            business_config,
        }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 生成业务编码: 规则服务优先, 失败时本地降级 (只记告警)
    fn generate_code(&self, tenant_id: i64, rule_key: &str, prefix: &str) -> String {
        match self.code_rules.generate_code(tenant_id, rule_key) {
            Ok(code) => code,
            Err(e) => {
                warn!(tenant_id, rule_key, error = %e, "编码规则不可用, 使用降级编码");
                fallback_code(prefix)
            }
        }
    }

    // ==========================================
    // 下推: 需求 → 需求运算
    // ==========================================

    /// 单需求下推
    pub fn push_demand_to_computation(
        &self,
        tenant_id: i64,
        demand_id: i64,
        params: Option<ComputationParams>,
        operator_id: i64,
    ) -> RepositoryResult<PushResult> {
        self.push_demands_to_computation(tenant_id, &[demand_id], params, operator_id)
    }

    /// 合并下推: N个需求汇入同一张运算单
    pub fn push_demands_to_computation(
        &self,
        tenant_id: i64,
        demand_ids: &[i64],
        params: Option<ComputationParams>,
        operator_id: i64,
    ) -> RepositoryResult<PushResult> {
        if demand_ids.is_empty() {
            return Err(RepositoryError::ValidationError(
                "下推需要至少一个需求".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        // 前置校验: 全部需求必须 已审核+审核通过+未下推
        let mut demands: Vec<Demand> = Vec::with_capacity(demand_ids.len());
        let mut warning = None;
        for &demand_id in demand_ids {
            let demand = find_demand_by_id(&tx, tenant_id, demand_id)?.ok_or(
                RepositoryError::NotFound {
                    entity: "Demand".to_string(),
                    id: demand_id.to_string(),
                },
            )?;
            if demand.status != DocumentStatus::Audited
                || demand.review_status != ReviewStatus::Approved
            {
                return Err(RepositoryError::BusinessRuleViolation(format!(
                    "需求 {} 未审核通过, 不能下推运算",
                    demand.demand_code
                )));
            }
            if demand.pushed_to_computation {
                // 已下推: 运算单仍在 ⇒ 拒绝; 已消失 ⇒ 允许重推并告警
                let live = match demand.computation_id {
                    Some(cid) => find_computation_by_id(&tx, tenant_id, cid)?.is_some(),
                    None => false,
                };
                if live {
                    return Err(RepositoryError::BusinessRuleViolation(format!(
                        "需求 {} 已下推到运算单 {}",
                        demand.demand_code,
                        demand.computation_code.as_deref().unwrap_or("-")
                    )));
                }
                warn!(
                    tenant_id,
                    demand_id,
                    "需求标记已下推但运算单不存在, 允许重新下推"
                );
                warning = Some(format!(
                    "需求 {} 原运算单已不存在, 已重新下推",
                    demand.demand_code
                ));
            }
            demands.push(demand);
        }

        // MTO ⇒ LRP, 其余 ⇒ MRP; 合并时任一MTO即LRP
        let computation_type = if demands
            .iter()
            .any(|d| d.business_mode == BusinessMode::Mto)
        {
            ComputationType::Lrp
        } else {
            ComputationType::Mrp
        };

        let now = Local::now().naive_local();
        let code = self.generate_code(
            tenant_id,
            COMPUTATION_CODE_KEY,
            computation_type.as_str(),
        );
        let computation = DemandComputation {
            id: 0,
            tenant_id,
            uuid: Uuid::new_v4().to_string(),
            computation_code: code.clone(),
            computation_type,
            computation_params: params.unwrap_or_default(),
            demand_id: demands[0].id,
            demand_ids: demands.iter().map(|d| d.id).collect(),
            status: COMPUTATION_STATUS_DRAFT.to_string(),
            needs_recompute: false,
            created_by: operator_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let computation_id = insert_computation(&tx, &computation)?;
        let computation_node = DocumentNode::new(DocumentKind::DemandComputation, computation_id);

        // 需求明细 → 运算明细 (建议数量初始化为需求数量)
        for demand in &demands {
            for item in list_items_by_demand(&tx, tenant_id, demand.id)? {
                let line = DemandComputationItem {
                    id: 0,
                    tenant_id,
                    computation_id,
                    material_id: item.material_id,
                    material_code: item.material_code.clone(),
                    material_name: item.material_name.clone(),
                    unit: item.unit.clone(),
                    required_quantity: item.required_quantity,
                    suggested_quantity: item.required_quantity,
                    demand_date: item.delivery_date.or(item.forecast_date),
                    created_at: now,
                };
                insert_computation_item(&tx, &line)?;
            }
        }

        // 盖章 + 双向边
        for demand in &demands {
            set_push_state(
                &tx,
                tenant_id,
                demand.id,
                true,
                Some(computation_id),
                Some(code.as_str()),
            )?;
            let demand_node = DocumentNode::new(DocumentKind::Demand, demand.id);
            create_edge(
                &tx,
                &build_edge(
                    tenant_id,
                    demand_node,
                    Some(demand.demand_code.clone()),
                    demand.demand_name.clone(),
                    computation_node,
                    Some(code.clone()),
                    None,
                    RelationType::Derived,
                    RelationMode::Push,
                    Some("需求下推运算".to_string()),
                ),
            )?;
            create_edge(
                &tx,
                &build_edge(
                    tenant_id,
                    computation_node,
                    Some(code.clone()),
                    None,
                    demand_node,
                    Some(demand.demand_code.clone()),
                    demand.demand_name.clone(),
                    RelationType::Source,
                    RelationMode::Push,
                    Some("运算来源需求".to_string()),
                ),
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            tenant_id,
            computation_id,
            computation_code = %code,
            demand_count = demands.len(),
            computation_type = computation_type.as_str(),
            "需求下推运算完成"
        );
        Ok(PushResult {
            computation_id,
            computation_code: code,
            computation_type,
            warning,
        })
    }

    // ==========================================
    // 撤回: 需求 ← 需求运算
    // ==========================================

    /// 从运算撤回需求
    ///
    /// 合并运算的整体失效: 任一需求撤回即删除整张运算单,
    /// 全部参与需求的下推标记一并清除
    pub fn withdraw_from_computation(
        &self,
        tenant_id: i64,
        demand_id: i64,
        operator_id: i64,
    ) -> RepositoryResult<WithdrawResult> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let demand = find_demand_by_id(&tx, tenant_id, demand_id)?.ok_or(
            RepositoryError::NotFound {
                entity: "Demand".to_string(),
                id: demand_id.to_string(),
            },
        )?;
        if !demand.pushed_to_computation {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "需求 {} 未下推运算, 无可撤回",
                demand.demand_code
            )));
        }

        let demand_node = DocumentNode::new(DocumentKind::Demand, demand_id);
        let Some(computation_id) = demand.computation_id else {
            // 悬空标记: 直接清理
            set_push_state(&tx, tenant_id, demand_id, false, None, None)?;
            delete_all_edges_for_node(&tx, tenant_id, demand_node)?;
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            return Ok(WithdrawResult {
                cleared_demand_ids: vec![demand_id],
                cascaded_documents: 0,
            });
        };
        let computation_node = DocumentNode::new(DocumentKind::DemandComputation, computation_id);

        let Some(computation) = find_computation_by_id(&tx, tenant_id, computation_id)? else {
            // 运算单已消失: 清标记删边即可
            set_push_state(&tx, tenant_id, demand_id, false, None, None)?;
            delete_all_edges_for_node(&tx, tenant_id, computation_node)?;
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            return Ok(WithdrawResult {
                cleared_demand_ids: vec![demand_id],
                cascaded_documents: 0,
            });
        };

        // 下游存在已执行单据 ⇒ 整体拒绝
        if let Some(blocker) = find_executed_downstream(&tx, tenant_id, computation_node)? {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "撤回被拒绝: {}",
                blocker
            )));
        }

        // 级联删除未执行下游 (排除指回需求的来源边)
        let mut cascaded = 0;
        for edge in list_by_source(&tx, tenant_id, computation_node)? {
            if edge.target_type == DocumentKind::Demand {
                continue;
            }
            let target = DocumentNode::new(edge.target_type, edge.target_id);
            cascaded += self.cascade_delete_downstream(&tx, tenant_id, target)?;
        }

        // 整体失效: 删除运算单 (明细级联), 清除全部参与需求的标记
        hard_delete_computation(&tx, tenant_id, computation_id)?;
        let mut cleared = Vec::new();
        for &participant_id in &computation.demand_ids {
            set_push_state(&tx, tenant_id, participant_id, false, None, None)?;
            cleared.push(participant_id);
        }
        delete_all_edges_for_node(&tx, tenant_id, computation_node)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            tenant_id,
            computation_id,
            operator_id,
            cascaded,
            cleared = cleared.len(),
            "需求撤回运算完成"
        );
        Ok(WithdrawResult {
            cleared_demand_ids: cleared,
            cascaded_documents: cascaded,
        })
    }

    /// 递归删除一个未执行下游节点及其子树
    ///
    /// 删除策略: 采购单硬删, 其余软删; 工单先重置草稿再软删
    fn cascade_delete_downstream(
        &self,
        tx: &Connection,
        tenant_id: i64,
        node: DocumentNode,
    ) -> RepositoryResult<usize> {
        let mut deleted = 0;

        // 先处理更深的下游
        for edge in list_by_source(tx, tenant_id, node)? {
            if edge.target_type == DocumentKind::Demand {
                continue;
            }
            let target = DocumentNode::new(edge.target_type, edge.target_id);
            deleted += self.cascade_delete_downstream(tx, tenant_id, target)?;
        }

        match node.kind {
            DocumentKind::PurchaseOrder => {
                hard_delete_purchase_order(tx, tenant_id, node.id)?;
                deleted += 1;
            }
            DocumentKind::WorkOrder => {
                if find_work_order_by_id(tx, tenant_id, node.id)?.is_some() {
                    reset_and_soft_delete_work_order(tx, tenant_id, node.id)?;
                    deleted += 1;
                }
            }
            DocumentKind::ProductionPlan => {
                soft_delete_production_plan(tx, tenant_id, node.id)?;
                deleted += 1;
            }
            DocumentKind::PurchaseRequisition => {
                soft_delete_purchase_requisition(tx, tenant_id, node.id)?;
                deleted += 1;
            }
            other => {
                // 其余类型核心不负责删除, 只解除关联
                warn!(tenant_id, kind = other.as_str(), id = node.id, "撤回级联跳过未知下游类型");
            }
        }

        delete_all_edges_for_node(tx, tenant_id, node)?;
        Ok(deleted)
    }

    // ==========================================
    // 下推: 采购单 → 采购入库单
    // ==========================================

    /// 按未入库数量包络下推入库单
    ///
    /// quantities: 可选的 {采购明细ID: 数量} 部分下推; 每行不得超过未入库数量
    pub fn push_purchase_order_to_receipt(
        &self,
        tenant_id: i64,
        purchase_order_id: i64,
        warehouse_id: Option<i64>,
        quantities: Option<&HashMap<i64, Decimal>>,
        _operator_id: i64,
    ) -> RepositoryResult<i64> {
        if !self.node_enabled(tenant_id, NODE_INBOUND) {
            return Err(RepositoryError::BusinessRuleViolation(
                "采购入库节点未启用".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let order = find_purchase_order_by_id(&tx, tenant_id, purchase_order_id)?.ok_or(
            RepositoryError::NotFound {
                entity: "PurchaseOrder".to_string(),
                id: purchase_order_id.to_string(),
            },
        )?;
        if !matches!(
            order.status,
            DocumentStatus::Audited | DocumentStatus::Confirmed
        ) {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "采购单 {} 未审核/确认, 不能下推入库",
                order.order_code
            )));
        }

        // 仓库: 调用方指定 > 首个启用仓库
        let warehouse_id = match warehouse_id {
            Some(id) => id,
            None => {
                find_default_warehouse(&tx, tenant_id)?
                    .ok_or_else(|| {
                        RepositoryError::BusinessRuleViolation(
                            "没有可用仓库, 无法生成入库单".to_string(),
                        )
                    })?
                    .id
            }
        };

        let now = Local::now().naive_local();
        let receipt_code = self.generate_code(tenant_id, RECEIPT_CODE_KEY, "RK");
        let receipt = PurchaseReceipt {
            id: 0,
            tenant_id,
            receipt_code: receipt_code.clone(),
            purchase_order_id,
            warehouse_id,
            status: DocumentStatus::Draft,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let receipt_id = insert_purchase_receipt(&tx, &receipt)?;

        // 数量包络: 行数量 ≤ 未入库数量
        let mut line_count = 0;
        for line in list_purchase_order_items(&tx, tenant_id, purchase_order_id)? {
            let outstanding = line.outstanding_quantity();
            let quantity = match quantities {
                Some(map) => match map.get(&line.id) {
                    Some(q) => *q,
                    None => continue, // 部分下推时未点名的行跳过
                },
                None => outstanding,
            };
            if quantity <= Decimal::ZERO {
                continue;
            }
            if quantity > outstanding {
                return Err(RepositoryError::BusinessRuleViolation(format!(
                    "物料 {} 入库数量 {} 超出未入库数量 {}",
                    line.material_code, quantity, outstanding
                )));
            }
            let item = PurchaseReceiptItem {
                id: 0,
                tenant_id,
                receipt_id,
                purchase_order_item_id: line.id,
                material_id: line.material_id,
                material_code: line.material_code.clone(),
                receipt_quantity: quantity,
                qualified_quantity: quantity, // 默认全部合格, 质检可修订
                unqualified_quantity: Decimal::ZERO,
                created_at: now,
            };
            insert_purchase_receipt_item(&tx, &item)?;
            update_purchase_order_item_received(
                &tx,
                tenant_id,
                line.id,
                &(line.received_quantity + quantity),
            )?;
            line_count += 1;
        }
        if line_count == 0 {
            return Err(RepositoryError::BusinessRuleViolation(
                "没有可入库的明细行".to_string(),
            ));
        }

        create_edge(
            &tx,
            &build_edge(
                tenant_id,
                DocumentNode::new(DocumentKind::PurchaseOrder, purchase_order_id),
                Some(order.order_code.clone()),
                order.order_name.clone(),
                DocumentNode::new(DocumentKind::PurchaseReceipt, receipt_id),
                Some(receipt_code.clone()),
                None,
                RelationType::Derived,
                RelationMode::Push,
                Some("采购单下推入库".to_string()),
            ),
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(tenant_id, purchase_order_id, receipt_id, receipt_code = %receipt_code, line_count, "采购单下推入库完成");
        Ok(receipt_id)
    }

    // ==========================================
    // 上拉: 销售订单/预测 → 销售出库单
    // ==========================================

    /// 销售订单上拉出库
    pub fn pull_delivery_from_sales_order(
        &self,
        tenant_id: i64,
        sales_order_id: i64,
        quantities: Option<&HashMap<i64, Decimal>>,
        _operator_id: i64,
    ) -> RepositoryResult<i64> {
        if !self.node_enabled(tenant_id, NODE_SALES_DELIVERY) {
            return Err(RepositoryError::BusinessRuleViolation(
                "销售出库节点未启用".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let order = find_sales_order_by_id(&tx, tenant_id, sales_order_id)?.ok_or(
            RepositoryError::NotFound {
                entity: "SalesOrder".to_string(),
                id: sales_order_id.to_string(),
            },
        )?;
        if !matches!(
            order.status,
            DocumentStatus::Audited | DocumentStatus::Confirmed
        ) {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "销售订单 {} 未审核/确认, 不能上拉出库",
                order.order_code
            )));
        }

        let now = Local::now().naive_local();
        let delivery_code = self.generate_code(tenant_id, DELIVERY_CODE_KEY, "CK");
        let delivery = SalesDelivery {
            id: 0,
            tenant_id,
            delivery_code: delivery_code.clone(),
            source_type: Some(DocumentKind::SalesOrder.as_str().to_string()),
            source_id: Some(sales_order_id),
            customer_id: order.customer_id,
            customer_name: order.customer_name.clone(),
            status: DocumentStatus::Draft,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let delivery_id = insert_sales_delivery(&tx, &delivery)?;

        let mut line_count = 0;
        for line in list_sales_order_items(&tx, tenant_id, sales_order_id)? {
            let quantity = match quantities {
                Some(map) => match map.get(&line.id) {
                    Some(q) => *q,
                    None => continue,
                },
                None => line.remaining_quantity,
            };
            if quantity <= Decimal::ZERO {
                continue;
            }
            if quantity > line.remaining_quantity {
                return Err(RepositoryError::BusinessRuleViolation(format!(
                    "物料 {} 出库数量 {} 超出未出库数量 {}",
                    line.material_code, quantity, line.remaining_quantity
                )));
            }
            let item = SalesDeliveryItem {
                id: 0,
                tenant_id,
                delivery_id,
                source_item_id: line.id,
                material_id: line.material_id,
                material_code: line.material_code.clone(),
                delivery_quantity: quantity,
                created_at: now,
            };
            insert_sales_delivery_item(&tx, &item)?;
            update_sales_order_item_delivery(
                &tx,
                tenant_id,
                line.id,
                &(line.remaining_quantity - quantity),
                &(line.delivered_quantity + quantity),
            )?;
            line_count += 1;
        }
        if line_count == 0 {
            return Err(RepositoryError::BusinessRuleViolation(
                "没有可出库的明细行".to_string(),
            ));
        }

        create_edge(
            &tx,
            &build_edge(
                tenant_id,
                DocumentNode::new(DocumentKind::SalesOrder, sales_order_id),
                Some(order.order_code.clone()),
                order.order_name.clone(),
                DocumentNode::new(DocumentKind::SalesDelivery, delivery_id),
                Some(delivery_code.clone()),
                None,
                RelationType::Derived,
                RelationMode::Pull,
                Some("销售订单上拉出库".to_string()),
            ),
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(tenant_id, sales_order_id, delivery_id, delivery_code = %delivery_code, line_count, "销售订单上拉出库完成");
        Ok(delivery_id)
    }

    /// 销售预测上拉出库 (MTS; 无客户时使用占位客户)
    pub fn pull_delivery_from_sales_forecast(
        &self,
        tenant_id: i64,
        sales_forecast_id: i64,
        quantities: Option<&HashMap<i64, Decimal>>,
        _operator_id: i64,
    ) -> RepositoryResult<i64> {
        if !self.node_enabled(tenant_id, NODE_SALES_DELIVERY) {
            return Err(RepositoryError::BusinessRuleViolation(
                "销售出库节点未启用".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let forecast = find_sales_forecast_by_id(&tx, tenant_id, sales_forecast_id)?.ok_or(
            RepositoryError::NotFound {
                entity: "SalesForecast".to_string(),
                id: sales_forecast_id.to_string(),
            },
        )?;
        if !matches!(
            forecast.status,
            DocumentStatus::Audited | DocumentStatus::Confirmed
        ) {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "销售预测 {} 未审核/确认, 不能上拉出库",
                forecast.forecast_code
            )));
        }

        let now = Local::now().naive_local();
        let delivery_code = self.generate_code(tenant_id, DELIVERY_CODE_KEY, "CK");
        let delivery = SalesDelivery {
            id: 0,
            tenant_id,
            delivery_code: delivery_code.clone(),
            source_type: Some(DocumentKind::SalesForecast.as_str().to_string()),
            source_id: Some(sales_forecast_id),
            customer_id: None,
            customer_name: Some(DEFAULT_CUSTOMER_NAME.to_string()),
            status: DocumentStatus::Draft,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let delivery_id = insert_sales_delivery(&tx, &delivery)?;

        let mut line_count = 0;
        for line in list_sales_forecast_items(&tx, tenant_id, sales_forecast_id)? {
            let quantity = match quantities {
                Some(map) => match map.get(&line.id) {
                    Some(q) => *q,
                    None => continue,
                },
                None => line.remaining_quantity,
            };
            if quantity <= Decimal::ZERO {
                continue;
            }
            if quantity > line.remaining_quantity {
                return Err(RepositoryError::BusinessRuleViolation(format!(
                    "物料 {} 出库数量 {} 超出未出库数量 {}",
                    line.material_code, quantity, line.remaining_quantity
                )));
            }
            let item = SalesDeliveryItem {
                id: 0,
                tenant_id,
                delivery_id,
                source_item_id: line.id,
                material_id: line.material_id,
                material_code: line.material_code.clone(),
                delivery_quantity: quantity,
                created_at: now,
            };
            insert_sales_delivery_item(&tx, &item)?;
            update_sales_forecast_item_remaining(
                &tx,
                tenant_id,
                line.id,
                &(line.remaining_quantity - quantity),
            )?;
            line_count += 1;
        }
        if line_count == 0 {
            return Err(RepositoryError::BusinessRuleViolation(
                "没有可出库的明细行".to_string(),
            ));
        }

        create_edge(
            &tx,
            &build_edge(
                tenant_id,
                DocumentNode::new(DocumentKind::SalesForecast, sales_forecast_id),
                Some(forecast.forecast_code.clone()),
                forecast.forecast_name.clone(),
                DocumentNode::new(DocumentKind::SalesDelivery, delivery_id),
                Some(delivery_code.clone()),
                None,
                RelationType::Derived,
                RelationMode::Pull,
                Some("销售预测上拉出库".to_string()),
            ),
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(tenant_id, sales_forecast_id, delivery_id, delivery_code = %delivery_code, line_count, "销售预测上拉出库完成");
        Ok(delivery_id)
    }

    /// 业务节点开关 (配置服务失败按启用处理, 只记告警)
    fn node_enabled(&self, tenant_id: i64, node_key: &str) -> bool {
        match self.business_config.check_node_enabled(tenant_id, node_key) {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!(tenant_id, node_key, error = %e, "业务配置服务不可用, 节点按启用处理");
                true
            }
        }
    }
}

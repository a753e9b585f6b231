// ==========================================
// 快智造制造管理平台 - 统一需求 API
// ==========================================
// 职责: 需求CRUD + 生命周期动作 + 明细维护 + 孤儿清理
// 红线: 非草稿只允许修改 priority/notes 白名单字段
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Local;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::demand::{Demand, DemandItem, DurationInfo, LifecycleHint};
use crate::domain::relation::DocumentNode;
use crate::domain::snapshot::{DemandRecalcHistory, DemandSnapshot};
use crate::domain::types::{
    BusinessMode, DemandType, DocumentKind, DocumentStatus, ReviewStatus,
};
use crate::engine::approval::{ApprovalCoordinator, ReviewDecision};
use crate::engine::push_pull::{PushPullEngine, PushResult, WithdrawResult};
use crate::engine::relation_graph::apply_upstream_change_impact;
use crate::engine::state_machine::{apply_transition, TransitionRequest};
use crate::external::{fallback_code, CodeRuleService};
use crate::repository::demand_repo::{
    delete_items_by_demand, find_demand_by_id, find_item_by_id, hard_delete_demand, insert_demand,
    insert_item, list_demands, list_items_by_demand, list_orphan_demands, update_demand,
    update_item, DemandQuery,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::relation_repo::delete_all_edges_for_node;
use crate::repository::sales_repo::{find_sales_forecast_by_id, find_sales_order_by_id};
use crate::repository::snapshot_repo::{list_history_by_demand, list_snapshots_by_demand};
use crate::domain::computation::ComputationParams;

// ==========================================
// 请求/响应 DTO
// ==========================================

/// 创建需求明细行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandItemInput {
    pub material_id: i64,
    pub material_code: String,
    pub material_name: Option<String>,
    pub material_spec: Option<String>,
    pub unit: Option<String>,
    pub required_quantity: Decimal,
    pub delivery_date: Option<chrono::NaiveDate>,
    pub forecast_date: Option<chrono::NaiveDate>,
    pub unit_price: Option<Decimal>,
}

/// 创建需求请求 (空明细允许, 合计为0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDemandRequest {
    /// 需求类型 (接受规范值与中文别名)
    pub demand_type: String,
    pub demand_name: Option<String>,
    pub source_type: Option<String>,
    pub source_id: Option<i64>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub order_date: Option<chrono::NaiveDate>,
    pub delivery_date: Option<chrono::NaiveDate>,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub forecast_period: Option<String>,
    pub priority: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<DemandItemInput>,
}

/// 更新需求请求 (非草稿仅 priority/notes 生效, 其余字段报业务错误)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDemandRequest {
    pub demand_name: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub order_date: Option<chrono::NaiveDate>,
    pub delivery_date: Option<chrono::NaiveDate>,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub forecast_period: Option<String>,
    pub priority: Option<String>,
    pub notes: Option<String>,
}

impl UpdateDemandRequest {
    /// 是否包含白名单之外的字段
    fn touches_restricted_fields(&self) -> bool {
        self.demand_name.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.order_date.is_some()
            || self.delivery_date.is_some()
            || self.customer_id.is_some()
            || self.customer_name.is_some()
            || self.forecast_period.is_some()
    }
}

/// 需求详情 (展示覆盖后的状态 + 操作提示)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandDetail {
    pub demand: Demand,
    pub items: Option<Vec<DemandItem>>,
    pub lifecycle: LifecycleHint,
    pub duration: Option<DurationInfo>,
    /// 软提示 (如编码降级), 不影响成功语义
    pub notice: Option<String>,
}

/// 批量删除结果 (逐条尽力而为)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    pub success_count: usize,
    pub failed_items: Vec<BulkDeleteFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteFailure {
    pub demand_id: i64,
    pub reason: String,
}

/// 孤儿清理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanCleanResult {
    pub cleaned_count: usize,
    pub demand_ids: Vec<i64>,
}

// ==========================================
// DemandApi - 统一需求 API
// ==========================================
pub struct DemandApi {
    conn: Arc<Mutex<Connection>>,
    code_rules: Arc<dyn CodeRuleService>,
    coordinator: Arc<ApprovalCoordinator>,
    push_pull: Arc<PushPullEngine>,
}

impl DemandApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        code_rules: Arc<dyn CodeRuleService>,
        coordinator: Arc<ApprovalCoordinator>,
        push_pull: Arc<PushPullEngine>,
    ) -> Self {
        Self {
            conn,
            code_rules,
            coordinator,
            push_pull,
        }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 创建
    // ==========================================

    pub fn create_demand(
        &self,
        tenant_id: i64,
        req: &CreateDemandRequest,
        operator_id: i64,
        operator_name: Option<&str>,
    ) -> ApiResult<DemandDetail> {
        let demand_type = DemandType::parse(&req.demand_type).ok_or_else(|| {
            ApiError::Validation(format!("无法识别的需求类型: {}", req.demand_type))
        })?;
        let business_mode = demand_type.business_mode();

        for item in &req.items {
            if item.required_quantity <= Decimal::ZERO {
                return Err(ApiError::Validation(format!(
                    "物料 {} 需求数量必须为正",
                    item.material_code
                )));
            }
        }

        let source_type = req
            .source_type
            .as_deref()
            .map(|s| {
                DocumentKind::parse(s)
                    .ok_or_else(|| ApiError::Validation(format!("无法识别的来源类型: {}", s)))
            })
            .transpose()?;

        // 编码: 规则服务优先, 失败时本地降级并附软提示
        let (demand_code, notice) = match self
            .code_rules
            .generate_code(tenant_id, demand_type.code_rule_key())
        {
            Ok(code) => (code, None),
            Err(e) => {
                warn!(tenant_id, error = %e, "编码规则不可用, 使用降级编码");
                (
                    fallback_code(demand_type.code_prefix()),
                    Some("编码规则未配置, 已分配降级编码".to_string()),
                )
            }
        };

        let now = Local::now().naive_local();
        let mut demand = Demand {
            id: 0,
            tenant_id,
            uuid: Uuid::new_v4().to_string(),
            demand_code,
            demand_name: req.demand_name.clone(),
            demand_type,
            business_mode,
            source_type,
            source_id: req.source_id,
            start_date: req.start_date,
            end_date: req.end_date,
            order_date: req.order_date,
            delivery_date: req.delivery_date,
            customer_id: req.customer_id,
            customer_name: req.customer_name.clone(),
            forecast_period: req.forecast_period.clone(),
            total_quantity: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            status: DocumentStatus::Draft,
            review_status: ReviewStatus::Pending,
            reviewer_id: None,
            reviewer_name: None,
            review_time: None,
            review_remarks: None,
            submit_time: None,
            pushed_to_computation: false,
            computation_id: None,
            computation_code: None,
            priority: req.priority.clone(),
            notes: req.notes.clone(),
            created_by: operator_id,
            created_by_name: operator_name.map(|s| s.to_string()),
            updated_by: operator_id,
            updated_by_name: operator_name.map(|s| s.to_string()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let demand_id = insert_demand(&tx, &demand)?;
        demand.id = demand_id;

        let mut total_quantity = Decimal::ZERO;
        let mut total_amount = Decimal::ZERO;
        let mut items = Vec::with_capacity(req.items.len());
        for input in &req.items {
            let item_amount = match (business_mode, input.unit_price) {
                (BusinessMode::Mto, Some(price)) => Some(input.required_quantity * price),
                _ => None,
            };
            let item = DemandItem {
                id: 0,
                tenant_id,
                demand_id,
                material_id: input.material_id,
                material_code: input.material_code.clone(),
                material_name: input.material_name.clone(),
                material_spec: input.material_spec.clone(),
                unit: input.unit.clone(),
                required_quantity: input.required_quantity,
                delivery_date: input.delivery_date,
                forecast_date: input.forecast_date,
                unit_price: if business_mode == BusinessMode::Mto {
                    input.unit_price
                } else {
                    None
                },
                item_amount,
                remaining_quantity: (business_mode == BusinessMode::Mto)
                    .then_some(input.required_quantity),
                delivered_quantity: (business_mode == BusinessMode::Mto)
                    .then_some(Decimal::ZERO),
                delivery_status: None,
                created_at: now,
                updated_at: now,
            };
            total_quantity += item.required_quantity;
            total_amount += item.item_amount.unwrap_or(Decimal::ZERO);
            let item_id = insert_item(&tx, &item)?;
            items.push(DemandItem { id: item_id, ..item });
        }

        demand.total_quantity = total_quantity;
        demand.total_amount = total_amount;
        update_demand(&tx, &demand)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        info!(tenant_id, demand_id, demand_code = %demand.demand_code, "需求创建完成");

        let lifecycle =
            LifecycleHint::from_states(demand.status, demand.review_status, false);
        Ok(DemandDetail {
            demand,
            items: Some(items),
            lifecycle,
            duration: None,
            notice,
        })
    }

    // ==========================================
    // 查询 (展示覆盖)
    // ==========================================

    /// 有来源的需求: 展示时镜像来源单据的实时状态 (不回写存储)
    fn overlay_from_source(conn: &Connection, demand: &mut Demand) -> RepositoryResult<()> {
        let (Some(source_type), Some(source_id)) = (demand.source_type, demand.source_id) else {
            return Ok(());
        };
        match source_type {
            DocumentKind::SalesOrder => {
                if let Some(order) = find_sales_order_by_id(conn, demand.tenant_id, source_id)? {
                    demand.status = order.status;
                    demand.review_status = order.review_status;
                }
            }
            DocumentKind::SalesForecast => {
                if let Some(forecast) =
                    find_sales_forecast_by_id(conn, demand.tenant_id, source_id)?
                {
                    demand.status = forecast.status;
                    demand.review_status = forecast.review_status;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn duration_info(demand: &Demand) -> DurationInfo {
        DurationInfo {
            draft_to_submit_seconds: demand
                .submit_time
                .map(|t| (t - demand.created_at).num_seconds()),
            submit_to_review_seconds: match (demand.submit_time, demand.review_time) {
                (Some(submit), Some(review)) => Some((review - submit).num_seconds()),
                _ => None,
            },
        }
    }

    pub fn get_demand(
        &self,
        tenant_id: i64,
        demand_id: i64,
        include_items: bool,
        include_duration: bool,
    ) -> ApiResult<DemandDetail> {
        let conn = self.get_conn()?;
        let mut demand = find_demand_by_id(&conn, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        Self::overlay_from_source(&conn, &mut demand)?;

        let items = if include_items {
            Some(list_items_by_demand(&conn, tenant_id, demand_id)?)
        } else {
            None
        };
        let duration = include_duration.then(|| Self::duration_info(&demand));
        let lifecycle = LifecycleHint::from_states(
            demand.status,
            demand.review_status,
            demand.pushed_to_computation,
        );
        Ok(DemandDetail {
            demand,
            items,
            lifecycle,
            duration,
            notice: None,
        })
    }

    /// 分页列表, 批量展示覆盖
    pub fn list_demands(
        &self,
        tenant_id: i64,
        query: &DemandQuery,
    ) -> ApiResult<(Vec<Demand>, i64)> {
        let conn = self.get_conn()?;
        let (mut demands, total) = list_demands(&conn, tenant_id, query)?;
        for demand in &mut demands {
            Self::overlay_from_source(&conn, demand)?;
        }
        Ok((demands, total))
    }

    // ==========================================
    // 更新
    // ==========================================

    pub fn update_demand(
        &self,
        tenant_id: i64,
        demand_id: i64,
        patch: &UpdateDemandRequest,
        operator_id: i64,
        operator_name: Option<&str>,
    ) -> ApiResult<Demand> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;

        if !demand.is_draft() && patch.touches_restricted_fields() {
            return Err(ApiError::BusinessLogic(format!(
                "需求 {} 已提交, 仅允许修改优先级与备注",
                demand.demand_code
            )));
        }

        if demand.is_draft() {
            if let Some(v) = &patch.demand_name {
                demand.demand_name = Some(v.clone());
            }
            if let Some(v) = patch.start_date {
                demand.start_date = Some(v);
            }
            if let Some(v) = patch.end_date {
                demand.end_date = Some(v);
            }
            if let Some(v) = patch.order_date {
                demand.order_date = Some(v);
            }
            if let Some(v) = patch.delivery_date {
                demand.delivery_date = Some(v);
            }
            if let Some(v) = patch.customer_id {
                demand.customer_id = Some(v);
            }
            if let Some(v) = &patch.customer_name {
                demand.customer_name = Some(v.clone());
            }
            if let Some(v) = &patch.forecast_period {
                demand.forecast_period = Some(v.clone());
            }
        }
        if let Some(v) = &patch.priority {
            demand.priority = Some(v.clone());
        }
        if let Some(v) = &patch.notes {
            demand.notes = Some(v.clone());
        }

        demand.updated_by = operator_id;
        demand.updated_by_name = operator_name.map(|s| s.to_string());
        demand.updated_at = Local::now().naive_local();
        update_demand(&tx, &demand)?;

        // 下游草稿/已提交运算单标记待重算 (不自动重算)
        apply_upstream_change_impact(
            &tx,
            tenant_id,
            DocumentNode::new(DocumentKind::Demand, demand_id),
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(demand)
    }

    // ==========================================
    // 生命周期动作
    // ==========================================

    /// 提交: 草稿 → 待审核 (要求审核) / 已审核 (免审直通)
    ///
    /// 已提交后的重复提交为幂等空操作, 返回当前状态
    pub fn submit_demand(
        &self,
        tenant_id: i64,
        demand_id: i64,
        operator_id: i64,
        operator_name: Option<&str>,
    ) -> ApiResult<Demand> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;

        match demand.status {
            // 重复提交幂等
            DocumentStatus::PendingReview | DocumentStatus::Audited => return Ok(demand),
            DocumentStatus::Draft => {
                let (status, review_status) =
                    self.coordinator.submit_target(tenant_id, DocumentKind::Demand)?;
                apply_transition(
                    &tx,
                    &TransitionRequest {
                        tenant_id,
                        entity_type: DocumentKind::Demand,
                        entity_id: demand_id,
                        from: demand.status,
                        to: status,
                        operator_id,
                        operator_name,
                        reason: Some("提交"),
                        comment: None,
                    },
                )?;
                let now = Local::now().naive_local();
                demand.status = status;
                demand.review_status = review_status;
                demand.submit_time = Some(now);
                if review_status == ReviewStatus::Approved {
                    // 免审直通时审核信息即为提交人
                    demand.reviewer_id = Some(operator_id);
                    demand.reviewer_name = operator_name.map(|s| s.to_string());
                    demand.review_time = Some(now);
                }
                demand.updated_by = operator_id;
                demand.updated_by_name = operator_name.map(|s| s.to_string());
                demand.updated_at = now;
                update_demand(&tx, &demand)?;

                // 审批流为可选能力, 发起失败不阻断提交
                self.coordinator
                    .begin_review(tenant_id, DocumentKind::Demand, demand_id, operator_id);
            }
            // 驳回后重新送审
            DocumentStatus::Rejected => {
                apply_transition(
                    &tx,
                    &TransitionRequest {
                        tenant_id,
                        entity_type: DocumentKind::Demand,
                        entity_id: demand_id,
                        from: demand.status,
                        to: DocumentStatus::PendingReview,
                        operator_id,
                        operator_name,
                        reason: Some("重新送审"),
                        comment: None,
                    },
                )?;
                let now = Local::now().naive_local();
                demand.status = DocumentStatus::PendingReview;
                demand.review_status = ReviewStatus::Pending;
                demand.submit_time = Some(now);
                demand.updated_by = operator_id;
                demand.updated_by_name = operator_name.map(|s| s.to_string());
                demand.updated_at = now;
                update_demand(&tx, &demand)?;
            }
            other => {
                return Err(ApiError::BusinessLogic(format!(
                    "需求 {} 当前状态 {} 不可提交",
                    demand.demand_code,
                    other.as_str()
                )));
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(demand)
    }

    /// 审核 (approve=true 通过, false 驳回)
    pub fn review_demand(
        &self,
        tenant_id: i64,
        demand_id: i64,
        approve: bool,
        operator_id: i64,
        operator_name: Option<&str>,
        comment: Option<&str>,
    ) -> ApiResult<Demand> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        if demand.status != DocumentStatus::PendingReview {
            return Err(ApiError::BusinessLogic(format!(
                "需求 {} 当前状态 {} 不可审核",
                demand.demand_code,
                demand.status.as_str()
            )));
        }

        let decision =
            self.coordinator
                .review_outcome(tenant_id, None, approve, operator_id, comment)?;
        let Some((status, review_status)) = decision.target_status() else {
            // 多节点流程未走完, 单据停留在待审核
            debug_assert_eq!(decision, ReviewDecision::InProgress);
            return Ok(demand);
        };

        apply_transition(
            &tx,
            &TransitionRequest {
                tenant_id,
                entity_type: DocumentKind::Demand,
                entity_id: demand_id,
                from: demand.status,
                to: status,
                operator_id,
                operator_name,
                reason: Some(if approve { "审核通过" } else { "审核驳回" }),
                comment,
            },
        )?;

        let now = Local::now().naive_local();
        demand.status = status;
        demand.review_status = review_status;
        demand.reviewer_id = Some(operator_id);
        demand.reviewer_name = operator_name.map(|s| s.to_string());
        demand.review_time = Some(now);
        demand.review_remarks = comment.map(|s| s.to_string());
        demand.updated_by = operator_id;
        demand.updated_by_name = operator_name.map(|s| s.to_string());
        demand.updated_at = now;
        update_demand(&tx, &demand)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(demand)
    }

    /// 反审核: 已审核 → 待审核
    ///
    /// 已下推运算的需求先撤回运算; 撤回被下游阻断时整个反审核失败
    pub fn unapprove_demand(
        &self,
        tenant_id: i64,
        demand_id: i64,
        operator_id: i64,
        operator_name: Option<&str>,
    ) -> ApiResult<Demand> {
        let demand = {
            let conn = self.get_conn()?;
            find_demand_by_id(&conn, tenant_id, demand_id)?
                .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?
        };
        if !matches!(
            demand.status,
            DocumentStatus::Audited | DocumentStatus::Rejected
        ) {
            return Err(ApiError::BusinessLogic(format!(
                "需求 {} 当前状态 {} 不可反审核",
                demand.demand_code,
                demand.status.as_str()
            )));
        }

        if demand.pushed_to_computation {
            self.push_pull
                .withdraw_from_computation(tenant_id, demand_id, operator_id)?;
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        apply_transition(
            &tx,
            &TransitionRequest {
                tenant_id,
                entity_type: DocumentKind::Demand,
                entity_id: demand_id,
                from: demand.status,
                to: DocumentStatus::PendingReview,
                operator_id,
                operator_name,
                reason: Some("反审核"),
                comment: None,
            },
        )?;
        let now = Local::now().naive_local();
        demand.status = DocumentStatus::PendingReview;
        demand.review_status = ReviewStatus::Pending;
        demand.reviewer_id = None;
        demand.reviewer_name = None;
        demand.review_time = None;
        demand.review_remarks = None;
        demand.updated_by = operator_id;
        demand.updated_by_name = operator_name.map(|s| s.to_string());
        demand.updated_at = now;
        update_demand(&tx, &demand)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(demand)
    }

    /// 提交人撤回: 待审核 → 草稿
    pub fn withdraw_demand(
        &self,
        tenant_id: i64,
        demand_id: i64,
        operator_id: i64,
        operator_name: Option<&str>,
    ) -> ApiResult<Demand> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        apply_transition(
            &tx,
            &TransitionRequest {
                tenant_id,
                entity_type: DocumentKind::Demand,
                entity_id: demand_id,
                from: demand.status,
                to: DocumentStatus::Draft,
                operator_id,
                operator_name,
                reason: Some("提交人撤回"),
                comment: None,
            },
        )?;
        let now = Local::now().naive_local();
        demand.status = DocumentStatus::Draft;
        demand.review_status = ReviewStatus::Pending;
        demand.submit_time = None;
        demand.updated_by = operator_id;
        demand.updated_by_name = operator_name.map(|s| s.to_string());
        demand.updated_at = now;
        update_demand(&tx, &demand)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(demand)
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 删除需求: 仅草稿/待审核可删, 硬删除 (明细级联, 关联边一并清除)
    pub fn delete_demand(&self, tenant_id: i64, demand_id: i64) -> ApiResult<()> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Self::delete_demand_in_tx(&tx, tenant_id, demand_id)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    fn delete_demand_in_tx(tx: &Connection, tenant_id: i64, demand_id: i64) -> ApiResult<()> {
        let demand = find_demand_by_id(tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        if !matches!(
            demand.status,
            DocumentStatus::Draft | DocumentStatus::PendingReview
        ) {
            return Err(ApiError::BusinessLogic(format!(
                "需求 {} 当前状态 {} 不可删除",
                demand.demand_code,
                demand.status.as_str()
            )));
        }
        delete_all_edges_for_node(tx, tenant_id, DocumentNode::new(DocumentKind::Demand, demand_id))?;
        hard_delete_demand(tx, tenant_id, demand_id)?;
        info!(tenant_id, demand_id, demand_code = %demand.demand_code, "需求已删除");
        Ok(())
    }

    /// 批量删除: 逐条尽力而为, 失败条目带原因返回
    pub fn bulk_delete_demands(
        &self,
        tenant_id: i64,
        demand_ids: &[i64],
    ) -> ApiResult<BulkDeleteResult> {
        let mut success_count = 0;
        let mut failed_items = Vec::new();
        for &demand_id in demand_ids {
            match self.delete_demand(tenant_id, demand_id) {
                Ok(()) => success_count += 1,
                Err(e) => failed_items.push(BulkDeleteFailure {
                    demand_id,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(BulkDeleteResult {
            success_count,
            failed_items,
        })
    }

    // ==========================================
    // 孤儿需求 (来源单据已删除)
    // ==========================================

    pub fn inspect_orphan_demands(&self, tenant_id: i64) -> ApiResult<Vec<Demand>> {
        let conn = self.get_conn()?;
        Ok(list_orphan_demands(&conn, tenant_id)?)
    }

    /// 清理孤儿需求: 硬删除需求与明细, 解除关联边
    pub fn clean_orphan_demands(&self, tenant_id: i64) -> ApiResult<OrphanCleanResult> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let orphans = list_orphan_demands(&tx, tenant_id)?;
        let mut demand_ids = Vec::with_capacity(orphans.len());
        for orphan in &orphans {
            delete_all_edges_for_node(
                &tx,
                tenant_id,
                DocumentNode::new(DocumentKind::Demand, orphan.id),
            )?;
            delete_items_by_demand(&tx, tenant_id, orphan.id)?;
            hard_delete_demand(&tx, tenant_id, orphan.id)?;
            demand_ids.push(orphan.id);
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        if !demand_ids.is_empty() {
            info!(tenant_id, count = demand_ids.len(), "孤儿需求清理完成");
        }
        Ok(OrphanCleanResult {
            cleaned_count: demand_ids.len(),
            demand_ids,
        })
    }

    // ==========================================
    // 明细维护 (仅草稿)
    // ==========================================

    fn require_draft(demand: &Demand) -> ApiResult<()> {
        if !demand.is_draft() {
            return Err(ApiError::BusinessLogic(format!(
                "需求 {} 已提交, 明细不可修改",
                demand.demand_code
            )));
        }
        Ok(())
    }

    /// 明细变化后重新聚合合计
    fn refresh_totals(
        tx: &Connection,
        demand: &mut Demand,
        operator_id: i64,
    ) -> RepositoryResult<()> {
        let items = list_items_by_demand(tx, demand.tenant_id, demand.id)?;
        demand.total_quantity = items.iter().map(|i| i.required_quantity).sum();
        demand.total_amount = items
            .iter()
            .filter_map(|i| i.item_amount)
            .sum();
        demand.updated_by = operator_id;
        demand.updated_at = Local::now().naive_local();
        update_demand(tx, demand)
    }

    pub fn add_demand_item(
        &self,
        tenant_id: i64,
        demand_id: i64,
        input: &DemandItemInput,
        operator_id: i64,
    ) -> ApiResult<DemandItem> {
        if input.required_quantity <= Decimal::ZERO {
            return Err(ApiError::Validation(format!(
                "物料 {} 需求数量必须为正",
                input.material_code
            )));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        Self::require_draft(&demand)?;

        let now = Local::now().naive_local();
        let mto = demand.business_mode == BusinessMode::Mto;
        let item_amount = match (mto, input.unit_price) {
            (true, Some(price)) => Some(input.required_quantity * price),
            _ => None,
        };
        let mut item = DemandItem {
            id: 0,
            tenant_id,
            demand_id,
            material_id: input.material_id,
            material_code: input.material_code.clone(),
            material_name: input.material_name.clone(),
            material_spec: input.material_spec.clone(),
            unit: input.unit.clone(),
            required_quantity: input.required_quantity,
            delivery_date: input.delivery_date,
            forecast_date: input.forecast_date,
            unit_price: if mto { input.unit_price } else { None },
            item_amount,
            remaining_quantity: mto.then_some(input.required_quantity),
            delivered_quantity: mto.then_some(Decimal::ZERO),
            delivery_status: None,
            created_at: now,
            updated_at: now,
        };
        item.id = insert_item(&tx, &item)?;

        Self::refresh_totals(&tx, &mut demand, operator_id)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(item)
    }

    pub fn update_demand_item(
        &self,
        tenant_id: i64,
        demand_id: i64,
        item_id: i64,
        input: &DemandItemInput,
        operator_id: i64,
    ) -> ApiResult<DemandItem> {
        if input.required_quantity <= Decimal::ZERO {
            return Err(ApiError::Validation(format!(
                "物料 {} 需求数量必须为正",
                input.material_code
            )));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        Self::require_draft(&demand)?;

        let mut item = find_item_by_id(&tx, tenant_id, item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求明细(id={})不存在", item_id)))?;
        if item.demand_id != demand_id {
            return Err(ApiError::Validation(format!(
                "明细(id={})不属于需求(id={})",
                item_id, demand_id
            )));
        }

        let mto = demand.business_mode == BusinessMode::Mto;
        item.material_id = input.material_id;
        item.material_code = input.material_code.clone();
        item.material_name = input.material_name.clone();
        item.material_spec = input.material_spec.clone();
        item.unit = input.unit.clone();
        item.required_quantity = input.required_quantity;
        item.delivery_date = input.delivery_date;
        item.forecast_date = input.forecast_date;
        item.unit_price = if mto { input.unit_price } else { None };
        item.item_amount = match (mto, input.unit_price) {
            (true, Some(price)) => Some(input.required_quantity * price),
            _ => None,
        };
        if mto {
            item.remaining_quantity = Some(input.required_quantity);
        }
        item.updated_at = Local::now().naive_local();
        update_item(&tx, &item)?;

        Self::refresh_totals(&tx, &mut demand, operator_id)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(item)
    }

    pub fn delete_demand_item(
        &self,
        tenant_id: i64,
        demand_id: i64,
        item_id: i64,
        operator_id: i64,
    ) -> ApiResult<()> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut demand = find_demand_by_id(&tx, tenant_id, demand_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求(id={})不存在", demand_id)))?;
        Self::require_draft(&demand)?;

        let item = find_item_by_id(&tx, tenant_id, item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("需求明细(id={})不存在", item_id)))?;
        if item.demand_id != demand_id {
            return Err(ApiError::Validation(format!(
                "明细(id={})不属于需求(id={})",
                item_id, demand_id
            )));
        }
        crate::repository::demand_repo::delete_item(&tx, tenant_id, item_id)?;

        Self::refresh_totals(&tx, &mut demand, operator_id)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    // ==========================================
    // 快照 / 重算历史
    // ==========================================

    pub fn list_demand_snapshots(
        &self,
        tenant_id: i64,
        demand_id: i64,
    ) -> ApiResult<Vec<DemandSnapshot>> {
        let conn = self.get_conn()?;
        Ok(list_snapshots_by_demand(&conn, tenant_id, demand_id)?)
    }

    pub fn list_demand_recalc_history(
        &self,
        tenant_id: i64,
        demand_id: i64,
    ) -> ApiResult<Vec<DemandRecalcHistory>> {
        let conn = self.get_conn()?;
        Ok(list_history_by_demand(&conn, tenant_id, demand_id)?)
    }

    // ==========================================
    // 下推/撤回运算 (委托引擎)
    // ==========================================

    pub fn push_demand_to_computation(
        &self,
        tenant_id: i64,
        demand_id: i64,
        params: Option<ComputationParams>,
        operator_id: i64,
    ) -> ApiResult<PushResult> {
        Ok(self
            .push_pull
            .push_demand_to_computation(tenant_id, demand_id, params, operator_id)?)
    }

    pub fn withdraw_demand_from_computation(
        &self,
        tenant_id: i64,
        demand_id: i64,
        operator_id: i64,
    ) -> ApiResult<WithdrawResult> {
        Ok(self
            .push_pull
            .withdraw_from_computation(tenant_id, demand_id, operator_id)?)
    }
}

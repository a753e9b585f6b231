// ==========================================
// 快智造制造管理平台 - 单据关联图引擎
// ==========================================
// 职责: 上下游查询 / 已执行判定 / 上游变更影响标记 / 递归追溯
// 红线: 建边只允许经由下推上拉引擎 (及同一接口的外部域服务)
// ==========================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::domain::relation::{ChainNode, DocumentNode, DocumentRelation, RelatedDocument};
use crate::domain::types::{
    DocumentKind, DocumentStatus, RelationMode, RelationType, PLAN_EXEC_NOT_EXECUTED,
};
use crate::repository::computation_repo::set_needs_recompute;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::execution_repo::{
    count_reporting_records, find_production_plan_by_id, find_purchase_requisition_by_id,
    find_work_order_by_id, purchase_order_has_receipts, requisition_has_linked_items,
};
use crate::repository::relation_repo::{insert_relation, list_by_source, list_by_target};

/// 递归追溯的最大深度 (防御异常数据导致的深链)
const MAX_TRACE_DEPTH: usize = 10;

/// 运算单可标记重算的状态
const RECOMPUTABLE_STATUSES: &[&str] = &["draft", "submitted"];

// ==========================================
// 行级操作 (引擎事务内复用)
// ==========================================

/// 建边: 禁止自环, 重复幂等
pub(crate) fn create_edge(conn: &Connection, relation: &DocumentRelation) -> RepositoryResult<bool> {
    if relation.source_type == relation.target_type && relation.source_id == relation.target_id {
        return Err(RepositoryError::ValidationError(
            "单据关联不允许自环".to_string(),
        ));
    }
    let created = insert_relation(conn, relation)?;
    if !created {
        debug!(
            source = %relation.source_type,
            source_id = relation.source_id,
            target = %relation.target_type,
            target_id = relation.target_id,
            "关联边已存在, 幂等跳过"
        );
    }
    Ok(created)
}

/// 单据是否"已执行" (返回 Some(阻断类别描述) 表示已执行)
///
/// 四类单据有执行语义, 其余类型自身不构成阻断
pub(crate) fn is_document_executed(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
) -> RepositoryResult<Option<String>> {
    match node.kind {
        DocumentKind::WorkOrder => {
            let Some(wo) = find_work_order_by_id(conn, tenant_id, node.id)? else {
                return Ok(None);
            };
            if count_reporting_records(conn, tenant_id, node.id)? > 0 {
                return Ok(Some("下游工单已有报工记录".to_string()));
            }
            if wo.status == DocumentStatus::InProgress {
                return Ok(Some("下游工单已开工".to_string()));
            }
            if wo.status == DocumentStatus::Completed && !wo.manual_completion {
                return Ok(Some("下游工单已正常完工".to_string()));
            }
            Ok(None)
        }
        DocumentKind::PurchaseOrder => {
            if purchase_order_has_receipts(conn, tenant_id, node.id)? {
                Ok(Some("下游采购单已有入库记录".to_string()))
            } else {
                Ok(None)
            }
        }
        DocumentKind::ProductionPlan => {
            let Some(plan) = find_production_plan_by_id(conn, tenant_id, node.id)? else {
                return Ok(None);
            };
            if plan.execution_status != PLAN_EXEC_NOT_EXECUTED {
                return Ok(Some("下游生产计划已开始执行".to_string()));
            }
            // 已派生工单也视为执行
            let derived = list_by_source(conn, tenant_id, node)?;
            if derived
                .iter()
                .any(|edge| edge.target_type == DocumentKind::WorkOrder)
            {
                return Ok(Some("下游生产计划已派生工单".to_string()));
            }
            Ok(None)
        }
        DocumentKind::PurchaseRequisition => {
            let Some(req) = find_purchase_requisition_by_id(conn, tenant_id, node.id)? else {
                return Ok(None);
            };
            if req.conversion_status != "none" {
                return Ok(Some("下游采购申请已部分或全部转换".to_string()));
            }
            if requisition_has_linked_items(conn, tenant_id, node.id)? {
                return Ok(Some("下游采购申请明细已关联采购单".to_string()));
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// 下游是否存在已执行单据 (递归整个下游子图, 带环保护)
pub(crate) fn find_executed_downstream(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
) -> RepositoryResult<Option<String>> {
    let mut visited: HashSet<DocumentNode> = HashSet::new();
    visited.insert(node);
    find_executed_downstream_inner(conn, tenant_id, node, &mut visited)
}

fn find_executed_downstream_inner(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
    visited: &mut HashSet<DocumentNode>,
) -> RepositoryResult<Option<String>> {
    for edge in list_by_source(conn, tenant_id, node)? {
        let target = DocumentNode::new(edge.target_type, edge.target_id);
        if !visited.insert(target) {
            continue;
        }
        if let Some(blocker) = is_document_executed(conn, tenant_id, target)? {
            return Ok(Some(blocker));
        }
        if let Some(blocker) = find_executed_downstream_inner(conn, tenant_id, target, visited)? {
            return Ok(Some(blocker));
        }
    }
    Ok(None)
}

/// 上游变更影响: 下游草稿/已提交状态的运算单标记待重算 (不自动重算)
pub(crate) fn apply_upstream_change_impact(
    conn: &Connection,
    tenant_id: i64,
    source: DocumentNode,
) -> RepositoryResult<usize> {
    let mut marked = 0;
    let mut visited: HashSet<DocumentNode> = HashSet::new();
    visited.insert(source);
    let mut queue = vec![source];

    while let Some(node) = queue.pop() {
        for edge in list_by_source(conn, tenant_id, node)? {
            let target = DocumentNode::new(edge.target_type, edge.target_id);
            if !visited.insert(target) {
                continue;
            }
            if target.kind == DocumentKind::DemandComputation {
                let status: Option<String> = conn
                    .query_row(
                        "SELECT status FROM demand_computation \
                         WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
                        params![tenant_id, target.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(status) = status {
                    if RECOMPUTABLE_STATUSES.contains(&status.as_str()) {
                        set_needs_recompute(conn, tenant_id, target.id, true)?;
                        marked += 1;
                    }
                }
            }
            queue.push(target);
        }
    }

    if marked > 0 {
        info!(
            tenant_id,
            source = %source.kind,
            source_id = source.id,
            marked,
            "上游变更已标记下游运算单待重算"
        );
    }
    Ok(marked)
}

/// 读取单据当前状态标签 (追溯链装饰用, 查不到返回 None)
fn lookup_status(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
) -> RepositoryResult<Option<String>> {
    let table = match node.kind {
        DocumentKind::Demand => "demand",
        DocumentKind::SalesForecast => "sales_forecast",
        DocumentKind::SalesOrder => "sales_order",
        DocumentKind::DemandComputation => "demand_computation",
        DocumentKind::WorkOrder => "work_order",
        DocumentKind::ProductionPlan => "production_plan",
        DocumentKind::PurchaseRequisition => "purchase_requisition",
        DocumentKind::PurchaseOrder => "purchase_order",
        DocumentKind::PurchaseReceipt => "purchase_receipt",
        DocumentKind::SalesDelivery => "sales_delivery",
    };
    let sql = format!(
        "SELECT status FROM {} WHERE tenant_id = ? AND id = ?",
        table
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, node.id], |row| row.get(0))
        .optional()?)
}

fn edge_to_related(edge: &DocumentRelation, downstream: bool) -> RelatedDocument {
    if downstream {
        RelatedDocument {
            document_type: edge.target_type,
            document_id: edge.target_id,
            document_code: edge.target_code.clone(),
            document_name: edge.target_name.clone(),
            status: None,
            relation_mode: edge.relation_mode,
        }
    } else {
        RelatedDocument {
            document_type: edge.source_type,
            document_id: edge.source_id,
            document_code: edge.source_code.clone(),
            document_name: edge.source_name.clone(),
            status: None,
            relation_mode: edge.relation_mode,
        }
    }
}

/// 递归追溯 (downstream=true 沿出边, false 沿入边), 带环保护
pub(crate) fn trace_chain(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
    downstream: bool,
) -> RepositoryResult<Vec<ChainNode>> {
    let mut visited: HashSet<DocumentNode> = HashSet::new();
    visited.insert(node);
    trace_chain_inner(conn, tenant_id, node, downstream, 0, &mut visited)
}

fn trace_chain_inner(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
    downstream: bool,
    depth: usize,
    visited: &mut HashSet<DocumentNode>,
) -> RepositoryResult<Vec<ChainNode>> {
    if depth >= MAX_TRACE_DEPTH {
        return Ok(Vec::new());
    }

    let edges = if downstream {
        list_by_source(conn, tenant_id, node)?
    } else {
        list_by_target(conn, tenant_id, node)?
    };

    let mut nodes = Vec::new();
    for edge in edges {
        let next = if downstream {
            DocumentNode::new(edge.target_type, edge.target_id)
        } else {
            DocumentNode::new(edge.source_type, edge.source_id)
        };
        if !visited.insert(next) {
            continue;
        }
        let mut document = edge_to_related(&edge, downstream);
        document.status = lookup_status(conn, tenant_id, next)?;
        let children = trace_chain_inner(conn, tenant_id, next, downstream, depth + 1, visited)?;
        nodes.push(ChainNode { document, children });
    }
    Ok(nodes)
}

// ==========================================
// RelationGraphEngine - 单据关联图引擎
// ==========================================
pub struct RelationGraphEngine {
    conn: Arc<Mutex<Connection>>,
}

impl RelationGraphEngine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 建边 (幂等, 禁止自环); 返回是否新建
    pub fn create_edge(&self, relation: &DocumentRelation) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        create_edge(&conn, relation)
    }

    pub fn downstream_of(
        &self,
        tenant_id: i64,
        node: DocumentNode,
    ) -> RepositoryResult<Vec<DocumentRelation>> {
        let conn = self.get_conn()?;
        list_by_source(&conn, tenant_id, node)
    }

    pub fn upstream_of(
        &self,
        tenant_id: i64,
        node: DocumentNode,
    ) -> RepositoryResult<Vec<DocumentRelation>> {
        let conn = self.get_conn()?;
        list_by_target(&conn, tenant_id, node)
    }

    /// 下游是否存在已执行单据; 返回阻断类别描述
    pub fn has_executed_downstream(
        &self,
        tenant_id: i64,
        node: DocumentNode,
    ) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        find_executed_downstream(&conn, tenant_id, node)
    }

    /// 上游变更影响标记; 返回标记的运算单数量
    pub fn apply_upstream_change_impact(
        &self,
        tenant_id: i64,
        source: DocumentNode,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        apply_upstream_change_impact(&conn, tenant_id, source)
    }

    /// 递归追溯链 (downstream=true 向下, false 向上)
    pub fn trace(
        &self,
        tenant_id: i64,
        node: DocumentNode,
        downstream: bool,
    ) -> RepositoryResult<Vec<ChainNode>> {
        let conn = self.get_conn()?;
        trace_chain(&conn, tenant_id, node, downstream)
    }
}

/// 构造一条标准来源边 (source → target, 模式由入口决定)
pub fn build_edge(
    tenant_id: i64,
    source: DocumentNode,
    source_code: Option<String>,
    source_name: Option<String>,
    target: DocumentNode,
    target_code: Option<String>,
    target_name: Option<String>,
    relation_type: RelationType,
    relation_mode: RelationMode,
    relation_desc: Option<String>,
) -> DocumentRelation {
    DocumentRelation {
        id: 0,
        tenant_id,
        source_type: source.kind,
        source_id: source.id,
        source_code,
        source_name,
        target_type: target.kind,
        target_id: target.id,
        target_code,
        target_name,
        relation_type,
        relation_mode,
        relation_desc,
        created_at: Local::now().naive_local(),
    }
}

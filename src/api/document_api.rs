// ==========================================
// 快智造制造管理平台 - 单据关联 API
// ==========================================
// 职责: 单据关联总览 / 上下游追溯链查询
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::relation::{ChainNode, DocumentNode, DocumentRelation};
use crate::domain::types::DocumentKind;
use crate::engine::relation_graph::RelationGraphEngine;

/// 单据关联总览 (上游与下游一次取齐)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationOverview {
    pub upstream: Vec<DocumentRelation>,
    pub downstream: Vec<DocumentRelation>,
}

/// 追溯链 (向上/向下的递归树)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceChain {
    pub document_type: DocumentKind,
    pub document_id: i64,
    pub upstream: Vec<ChainNode>,
    pub downstream: Vec<ChainNode>,
}

// ==========================================
// DocumentApi - 单据关联 API
// ==========================================
pub struct DocumentApi {
    relation_graph: Arc<RelationGraphEngine>,
}

impl DocumentApi {
    pub fn new(relation_graph: Arc<RelationGraphEngine>) -> Self {
        Self { relation_graph }
    }

    fn parse_kind(document_type: &str) -> ApiResult<DocumentKind> {
        DocumentKind::parse(document_type).ok_or_else(|| {
            ApiError::Validation(format!("无法识别的单据类型: {}", document_type))
        })
    }

    /// 单据的直接上下游关联
    pub fn get_relations(
        &self,
        tenant_id: i64,
        document_type: &str,
        document_id: i64,
    ) -> ApiResult<RelationOverview> {
        let kind = Self::parse_kind(document_type)?;
        let node = DocumentNode::new(kind, document_id);
        Ok(RelationOverview {
            upstream: self.relation_graph.upstream_of(tenant_id, node)?,
            downstream: self.relation_graph.downstream_of(tenant_id, node)?,
        })
    }

    /// 完整追溯链 (双向递归, 深度受限, 带环保护)
    pub fn trace_document_chain(
        &self,
        tenant_id: i64,
        document_type: &str,
        document_id: i64,
    ) -> ApiResult<TraceChain> {
        let kind = Self::parse_kind(document_type)?;
        let node = DocumentNode::new(kind, document_id);
        Ok(TraceChain {
            document_type: kind,
            document_id,
            upstream: self.relation_graph.trace(tenant_id, node, false)?,
            downstream: self.relation_graph.trace(tenant_id, node, true)?,
        })
    }

    /// 下游是否存在已执行单据 (撤回前预检, 返回阻断类别)
    pub fn check_executed_downstream(
        &self,
        tenant_id: i64,
        document_type: &str,
        document_id: i64,
    ) -> ApiResult<Option<String>> {
        let kind = Self::parse_kind(document_type)?;
        let node = DocumentNode::new(kind, document_id);
        Ok(self.relation_graph.has_executed_downstream(tenant_id, node)?)
    }
}

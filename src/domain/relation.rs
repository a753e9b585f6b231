// ==========================================
// 快智造制造管理平台 - 单据关联领域模型
// ==========================================
// 单据关联图: (source_type, source_id) → (target_type, target_id)
// 带 push/pull 模式的有向边, 四元组唯一, 禁止自环
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{DocumentKind, RelationMode, RelationType};

// ==========================================
// DocumentRelation - 单据关联边
// ==========================================
// 所有权: 双端共同持有, 任一端删除时边必须删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRelation {
    pub id: i64,
    pub tenant_id: i64,

    pub source_type: DocumentKind,
    pub source_id: i64,
    pub source_code: Option<String>,
    pub source_name: Option<String>,

    pub target_type: DocumentKind,
    pub target_id: i64,
    pub target_code: Option<String>,
    pub target_name: Option<String>,

    pub relation_type: RelationType, // source / derived
    pub relation_mode: RelationMode, // push / pull
    pub relation_desc: Option<String>,

    pub created_at: NaiveDateTime,
}

/// 关联图节点 (上下游查询与追溯的入参)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentNode {
    pub kind: DocumentKind,
    pub id: i64,
}

impl DocumentNode {
    pub fn new(kind: DocumentKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// 带装饰的关联单据条目 (上下游列表展示用)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedDocument {
    pub document_type: DocumentKind,
    pub document_id: i64,
    pub document_code: Option<String>,
    pub document_name: Option<String>,
    pub status: Option<String>,
    pub relation_mode: RelationMode,
}

/// 递归追溯链节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainNode {
    pub document: RelatedDocument,
    /// 向同一方向继续展开的子链
    pub children: Vec<ChainNode>,
}

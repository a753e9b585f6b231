// ==========================================
// 快智造制造管理平台 - 单据关联仓储
// ==========================================
// 四元组 (tenant, source_type, source_id, target_type, target_id) 唯一;
// 重复建边幂等, 由 UNIQUE 约束 + INSERT OR IGNORE 保证
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::relation::{DocumentNode, DocumentRelation};
use crate::domain::types::{DocumentKind, RelationMode, RelationType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{dt_to_sql, sql_to_dt};

const RELATION_COLS: &str = "id, tenant_id, source_type, source_id, source_code, source_name, \
     target_type, target_id, target_code, target_name, relation_type, relation_mode, \
     relation_desc, created_at";

fn map_relation(row: &rusqlite::Row) -> rusqlite::Result<DocumentRelation> {
    let source_type_s: String = row.get(2)?;
    let target_type_s: String = row.get(6)?;
    let relation_type_s: String = row.get(10)?;
    let relation_mode_s: String = row.get(11)?;

    let invalid = |idx: usize, v: &str| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("无法识别的枚举值: {}", v).into(),
        )
    };

    Ok(DocumentRelation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        source_type: DocumentKind::parse(&source_type_s).ok_or_else(|| invalid(2, &source_type_s))?,
        source_id: row.get(3)?,
        source_code: row.get(4)?,
        source_name: row.get(5)?,
        target_type: DocumentKind::parse(&target_type_s).ok_or_else(|| invalid(6, &target_type_s))?,
        target_id: row.get(7)?,
        target_code: row.get(8)?,
        target_name: row.get(9)?,
        relation_type: RelationType::parse(&relation_type_s)
            .ok_or_else(|| invalid(10, &relation_type_s))?,
        relation_mode: RelationMode::parse(&relation_mode_s)
            .ok_or_else(|| invalid(11, &relation_mode_s))?,
        relation_desc: row.get(12)?,
        created_at: sql_to_dt(13, row.get(13)?)?,
    })
}

// ==========================================
// 行级操作
// ==========================================

/// 建边 (幂等): 已存在时不报错也不覆盖, 返回是否新建
pub(crate) fn insert_relation(
    conn: &Connection,
    relation: &DocumentRelation,
) -> RepositoryResult<bool> {
    let changed = conn.execute(
        r#"INSERT OR IGNORE INTO document_relation (
            tenant_id, source_type, source_id, source_code, source_name,
            target_type, target_id, target_code, target_name,
            relation_type, relation_mode, relation_desc, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            relation.tenant_id,
            relation.source_type.as_str(),
            relation.source_id,
            &relation.source_code,
            &relation.source_name,
            relation.target_type.as_str(),
            relation.target_id,
            &relation.target_code,
            &relation.target_name,
            relation.relation_type.as_str(),
            relation.relation_mode.as_str(),
            &relation.relation_desc,
            dt_to_sql(&relation.created_at),
        ],
    )?;
    Ok(changed > 0)
}

pub(crate) fn find_relation(
    conn: &Connection,
    tenant_id: i64,
    source: DocumentNode,
    target: DocumentNode,
) -> RepositoryResult<Option<DocumentRelation>> {
    let sql = format!(
        "SELECT {} FROM document_relation \
         WHERE tenant_id = ? AND source_type = ? AND source_id = ? \
           AND target_type = ? AND target_id = ?",
        RELATION_COLS
    );
    Ok(conn
        .query_row(
            &sql,
            params![
                tenant_id,
                source.kind.as_str(),
                source.id,
                target.kind.as_str(),
                target.id
            ],
            map_relation,
        )
        .optional()?)
}

/// 以 node 为源的出边 (下游)
pub(crate) fn list_by_source(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
) -> RepositoryResult<Vec<DocumentRelation>> {
    let sql = format!(
        "SELECT {} FROM document_relation \
         WHERE tenant_id = ? AND source_type = ? AND source_id = ? ORDER BY id",
        RELATION_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tenant_id, node.kind.as_str(), node.id], map_relation)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// 以 node 为目标的入边 (上游)
pub(crate) fn list_by_target(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
) -> RepositoryResult<Vec<DocumentRelation>> {
    let sql = format!(
        "SELECT {} FROM document_relation \
         WHERE tenant_id = ? AND target_type = ? AND target_id = ? ORDER BY id",
        RELATION_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tenant_id, node.kind.as_str(), node.id], map_relation)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn delete_edge(
    conn: &Connection,
    tenant_id: i64,
    source: DocumentNode,
    target: DocumentNode,
) -> RepositoryResult<()> {
    conn.execute(
        r#"DELETE FROM document_relation
           WHERE tenant_id = ? AND source_type = ? AND source_id = ?
             AND target_type = ? AND target_id = ?"#,
        params![
            tenant_id,
            source.kind.as_str(),
            source.id,
            target.kind.as_str(),
            target.id
        ],
    )?;
    Ok(())
}

/// 删除单据两个方向上的所有边 (单据删除时调用)
pub(crate) fn delete_all_edges_for_node(
    conn: &Connection,
    tenant_id: i64,
    node: DocumentNode,
) -> RepositoryResult<()> {
    conn.execute(
        r#"DELETE FROM document_relation
           WHERE tenant_id = ?
             AND ((source_type = ? AND source_id = ?)
               OR (target_type = ? AND target_id = ?))"#,
        params![
            tenant_id,
            node.kind.as_str(),
            node.id,
            node.kind.as_str(),
            node.id
        ],
    )?;
    Ok(())
}

// ==========================================
// RelationRepository - 单据关联仓储
// ==========================================
pub struct RelationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RelationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create(&self, relation: &DocumentRelation) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        insert_relation(&conn, relation)
    }

    pub fn find(
        &self,
        tenant_id: i64,
        source: DocumentNode,
        target: DocumentNode,
    ) -> RepositoryResult<Option<DocumentRelation>> {
        let conn = self.get_conn()?;
        find_relation(&conn, tenant_id, source, target)
    }

    pub fn list_downstream(
        &self,
        tenant_id: i64,
        node: DocumentNode,
    ) -> RepositoryResult<Vec<DocumentRelation>> {
        let conn = self.get_conn()?;
        list_by_source(&conn, tenant_id, node)
    }

    pub fn list_upstream(
        &self,
        tenant_id: i64,
        node: DocumentNode,
    ) -> RepositoryResult<Vec<DocumentRelation>> {
        let conn = self.get_conn()?;
        list_by_target(&conn, tenant_id, node)
    }

    pub fn delete_edge(
        &self,
        tenant_id: i64,
        source: DocumentNode,
        target: DocumentNode,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        delete_edge(&conn, tenant_id, source, target)
    }

    pub fn delete_all_for_node(&self, tenant_id: i64, node: DocumentNode) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        delete_all_edges_for_node(&conn, tenant_id, node)
    }
}

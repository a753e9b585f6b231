// ==========================================
// 快智造制造管理平台 - 状态流转审计仓储
// ==========================================
// 只追加; 时间线面板与时长分析从这里读取
// ==========================================

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::domain::snapshot::TransitionLog;
use crate::domain::types::DocumentKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{dt_to_sql, sql_to_dt};

const LOG_COLS: &str = "id, tenant_id, entity_type, entity_id, from_state, to_state, \
     operator_id, operator_name, transition_reason, transition_comment, created_at";

fn map_log(row: &rusqlite::Row) -> rusqlite::Result<TransitionLog> {
    let entity_type_s: String = row.get(2)?;
    Ok(TransitionLog {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        entity_type: DocumentKind::parse(&entity_type_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("无法识别的单据类型: {}", entity_type_s).into(),
            )
        })?,
        entity_id: row.get(3)?,
        from_state: row.get(4)?,
        to_state: row.get(5)?,
        operator_id: row.get(6)?,
        operator_name: row.get(7)?,
        transition_reason: row.get(8)?,
        transition_comment: row.get(9)?,
        created_at: sql_to_dt(10, row.get(10)?)?,
    })
}

pub(crate) fn insert_transition_log(
    conn: &Connection,
    log: &TransitionLog,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO document_transition_log (
            tenant_id, entity_type, entity_id, from_state, to_state,
            operator_id, operator_name, transition_reason, transition_comment, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            log.tenant_id,
            log.entity_type.as_str(),
            log.entity_id,
            &log.from_state,
            &log.to_state,
            log.operator_id,
            &log.operator_name,
            &log.transition_reason,
            &log.transition_comment,
            dt_to_sql(&log.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_logs_by_entity(
    conn: &Connection,
    tenant_id: i64,
    entity_type: DocumentKind,
    entity_id: i64,
) -> RepositoryResult<Vec<TransitionLog>> {
    let sql = format!(
        "SELECT {} FROM document_transition_log \
         WHERE tenant_id = ? AND entity_type = ? AND entity_id = ? \
         ORDER BY created_at ASC, id ASC",
        LOG_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let logs = stmt
        .query_map(params![tenant_id, entity_type.as_str(), entity_id], map_log)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

// ==========================================
// TransitionLogRepository - 审计仓储
// ==========================================
pub struct TransitionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransitionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create(&self, log: &TransitionLog) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_transition_log(&conn, log)
    }

    pub fn list_by_entity(
        &self,
        tenant_id: i64,
        entity_type: DocumentKind,
        entity_id: i64,
    ) -> RepositoryResult<Vec<TransitionLog>> {
        let conn = self.get_conn()?;
        list_logs_by_entity(&conn, tenant_id, entity_type, entity_id)
    }
}

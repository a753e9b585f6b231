// ==========================================
// 快智造制造管理平台 - 需求快照与重算历史仓储
// ==========================================
// 快照创建后不可变, 仓储不提供更新接口
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::snapshot::{DemandRecalcHistory, DemandSnapshot};
use crate::domain::types::{DocumentKind, RecalcOutcome, SnapshotType, TriggerType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{dt_to_sql, sql_to_dt};

const SNAPSHOT_COLS: &str = "id, tenant_id, demand_id, snapshot_type, snapshot_at, \
     trigger_reason, demand_snapshot, demand_items_snapshot, created_at";

fn map_snapshot(row: &rusqlite::Row) -> rusqlite::Result<DemandSnapshot> {
    let snapshot_type_s: String = row.get(3)?;
    let demand_json: String = row.get(6)?;
    let items_json: String = row.get(7)?;

    let json_err = |idx: usize, e: serde_json::Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    };

    Ok(DemandSnapshot {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        demand_id: row.get(2)?,
        snapshot_type: SnapshotType::parse(&snapshot_type_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("无法识别的快照类型: {}", snapshot_type_s).into(),
            )
        })?,
        snapshot_at: sql_to_dt(4, row.get(4)?)?,
        trigger_reason: row.get(5)?,
        demand_snapshot: serde_json::from_str(&demand_json).map_err(|e| json_err(6, e))?,
        demand_items_snapshot: serde_json::from_str(&items_json).map_err(|e| json_err(7, e))?,
        created_at: sql_to_dt(8, row.get(8)?)?,
    })
}

const HISTORY_COLS: &str = "id, tenant_id, demand_id, recalc_at, trigger_type, source_type, \
     source_id, trigger_reason, snapshot_id, operator_id, result, message, created_at";

fn map_history(row: &rusqlite::Row) -> rusqlite::Result<DemandRecalcHistory> {
    let trigger_type_s: String = row.get(4)?;
    let source_type_s: Option<String> = row.get(5)?;
    let result_s: String = row.get(10)?;

    let invalid = |idx: usize, v: &str| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("无法识别的枚举值: {}", v).into(),
        )
    };

    Ok(DemandRecalcHistory {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        demand_id: row.get(2)?,
        recalc_at: sql_to_dt(3, row.get(3)?)?,
        trigger_type: TriggerType::parse(&trigger_type_s)
            .ok_or_else(|| invalid(4, &trigger_type_s))?,
        source_type: source_type_s
            .map(|s| DocumentKind::parse(&s).ok_or_else(|| invalid(5, &s)))
            .transpose()?,
        source_id: row.get(6)?,
        trigger_reason: row.get(7)?,
        snapshot_id: row.get(8)?,
        operator_id: row.get(9)?,
        result: RecalcOutcome::parse(&result_s).ok_or_else(|| invalid(10, &result_s))?,
        message: row.get(11)?,
        created_at: sql_to_dt(12, row.get(12)?)?,
    })
}

// ==========================================
// 行级操作
// ==========================================

pub(crate) fn insert_snapshot(
    conn: &Connection,
    snapshot: &DemandSnapshot,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO demand_snapshot (
            tenant_id, demand_id, snapshot_type, snapshot_at, trigger_reason,
            demand_snapshot, demand_items_snapshot, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            snapshot.tenant_id,
            snapshot.demand_id,
            snapshot.snapshot_type.as_str(),
            dt_to_sql(&snapshot.snapshot_at),
            &snapshot.trigger_reason,
            snapshot.demand_snapshot.to_string(),
            snapshot.demand_items_snapshot.to_string(),
            dt_to_sql(&snapshot.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_snapshot_by_id(
    conn: &Connection,
    tenant_id: i64,
    id: i64,
) -> RepositoryResult<Option<DemandSnapshot>> {
    let sql = format!(
        "SELECT {} FROM demand_snapshot WHERE tenant_id = ? AND id = ?",
        SNAPSHOT_COLS
    );
    Ok(conn
        .query_row(&sql, params![tenant_id, id], map_snapshot)
        .optional()?)
}

pub(crate) fn list_snapshots_by_demand(
    conn: &Connection,
    tenant_id: i64,
    demand_id: i64,
) -> RepositoryResult<Vec<DemandSnapshot>> {
    let sql = format!(
        "SELECT {} FROM demand_snapshot \
         WHERE tenant_id = ? AND demand_id = ? ORDER BY snapshot_at DESC, id DESC",
        SNAPSHOT_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tenant_id, demand_id], map_snapshot)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn insert_recalc_history(
    conn: &Connection,
    history: &DemandRecalcHistory,
) -> RepositoryResult<i64> {
    conn.execute(
        r#"INSERT INTO demand_recalc_history (
            tenant_id, demand_id, recalc_at, trigger_type, source_type, source_id,
            trigger_reason, snapshot_id, operator_id, result, message, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            history.tenant_id,
            history.demand_id,
            dt_to_sql(&history.recalc_at),
            history.trigger_type.as_str(),
            history.source_type.map(|k| k.as_str()),
            history.source_id,
            &history.trigger_reason,
            history.snapshot_id,
            history.operator_id,
            history.result.as_str(),
            &history.message,
            dt_to_sql(&history.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_history_by_demand(
    conn: &Connection,
    tenant_id: i64,
    demand_id: i64,
) -> RepositoryResult<Vec<DemandRecalcHistory>> {
    let sql = format!(
        "SELECT {} FROM demand_recalc_history \
         WHERE tenant_id = ? AND demand_id = ? ORDER BY recalc_at DESC, id DESC",
        HISTORY_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tenant_id, demand_id], map_history)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ==========================================
// SnapshotRepository - 快照与历史仓储
// ==========================================
pub struct SnapshotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn create_snapshot(&self, snapshot: &DemandSnapshot) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_snapshot(&conn, snapshot)
    }

    pub fn find_snapshot(&self, tenant_id: i64, id: i64) -> RepositoryResult<Option<DemandSnapshot>> {
        let conn = self.get_conn()?;
        find_snapshot_by_id(&conn, tenant_id, id)
    }

    pub fn list_snapshots(
        &self,
        tenant_id: i64,
        demand_id: i64,
    ) -> RepositoryResult<Vec<DemandSnapshot>> {
        let conn = self.get_conn()?;
        list_snapshots_by_demand(&conn, tenant_id, demand_id)
    }

    pub fn create_history(&self, history: &DemandRecalcHistory) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        insert_recalc_history(&conn, history)
    }

    pub fn list_history(
        &self,
        tenant_id: i64,
        demand_id: i64,
    ) -> RepositoryResult<Vec<DemandRecalcHistory>> {
        let conn = self.get_conn()?;
        list_history_by_demand(&conn, tenant_id, demand_id)
    }
}

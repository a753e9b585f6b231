// ==========================================
// 快智造制造管理平台 - 仓储层模块
// ==========================================
// 红线: Repository 不含业务逻辑
// 约定: 每个仓储同时提供
//   - 带锁的结构体方法 (单操作调用)
//   - pub(crate) 自由函数 (引擎在事务内复用, 入参 &Connection)
// ==========================================

pub mod computation_repo;
pub mod demand_repo;
pub mod error;
pub mod execution_repo;
pub mod relation_repo;
pub mod sales_repo;
pub mod snapshot_repo;
pub mod transition_log_repo;

pub use computation_repo::ComputationRepository;
pub use demand_repo::DemandRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use execution_repo::ExecutionRepository;
pub use relation_repo::RelationRepository;
pub use sales_repo::SalesRepository;
pub use snapshot_repo::SnapshotRepository;
pub use transition_log_repo::TransitionLogRepository;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// 统一时间格式
pub(crate) const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
/// 统一日期格式
pub(crate) const DATE_FMT: &str = "%Y-%m-%d";

/// NaiveDateTime → SQL TEXT
pub(crate) fn dt_to_sql(v: &NaiveDateTime) -> String {
    v.format(DATETIME_FMT).to_string()
}

/// Option<NaiveDateTime> → SQL TEXT
pub(crate) fn opt_dt_to_sql(v: &Option<NaiveDateTime>) -> Option<String> {
    v.as_ref().map(dt_to_sql)
}

/// Option<NaiveDate> → SQL TEXT
pub(crate) fn opt_date_to_sql(v: &Option<NaiveDate>) -> Option<String> {
    v.as_ref().map(|d| d.format(DATE_FMT).to_string())
}

/// SQL TEXT → NaiveDateTime
pub(crate) fn sql_to_dt(idx: usize, s: String) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&s, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// SQL TEXT(可空) → Option<NaiveDateTime>
pub(crate) fn sql_to_opt_dt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    s.map(|v| sql_to_dt(idx, v)).transpose()
}

/// SQL TEXT(可空) → Option<NaiveDate>
pub(crate) fn sql_to_opt_date(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    s.map(|v| {
        NaiveDate::parse_from_str(&v, DATE_FMT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// SQL TEXT → Decimal
pub(crate) fn sql_to_dec(idx: usize, s: String) -> rusqlite::Result<Decimal> {
    Decimal::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// SQL TEXT(可空) → Option<Decimal>
pub(crate) fn sql_to_opt_dec(idx: usize, s: Option<String>) -> rusqlite::Result<Option<Decimal>> {
    s.map(|v| sql_to_dec(idx, v)).transpose()
}

// ==========================================
// 快智造制造管理平台 - 需求快照与重算历史
// ==========================================
// 快照: 任何破坏性重算之前冻结需求+明细的完整副本
// 重算历史: 只追加的投影/同步尝试日志 (成功与失败都记录)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{DocumentKind, RecalcOutcome, SnapshotType, TriggerType};

// ==========================================
// DemandSnapshot - 需求快照
// ==========================================
// 不可变: 创建后不允许任何更新
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandSnapshot {
    pub id: i64,
    pub tenant_id: i64,
    pub demand_id: i64,

    pub snapshot_type: SnapshotType,      // 快照类型
    pub snapshot_at: NaiveDateTime,       // 快照时间
    pub trigger_reason: String,           // 触发原因 (如 upstream_sales_order_updated)

    /// 需求主体 JSON (显式DTO投影, 不序列化存储行本身)
    pub demand_snapshot: serde_json::Value,
    /// 需求明细 JSON 数组
    pub demand_items_snapshot: serde_json::Value,

    pub created_at: NaiveDateTime,
}

// ==========================================
// DemandRecalcHistory - 重算历史
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandRecalcHistory {
    pub id: i64,
    pub tenant_id: i64,
    pub demand_id: i64,

    pub recalc_at: NaiveDateTime,          // 重算时间
    pub trigger_type: TriggerType,         // 触发类型
    pub source_type: Option<DocumentKind>, // 触发来源单据类型
    pub source_id: Option<i64>,            // 触发来源单据ID
    pub trigger_reason: Option<String>,    // 触发原因
    pub snapshot_id: Option<i64>,          // 本次重算前的快照ID (失败时为空)
    pub operator_id: i64,                  // 操作人
    pub result: RecalcOutcome,             // success / failed
    pub message: Option<String>,           // 失败信息 (截断到500字符)

    pub created_at: NaiveDateTime,
}

// ==========================================
// TransitionLog - 状态流转审计
// ==========================================
// 每次状态机流转写一行, 供时间线面板与时长分析使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionLog {
    pub id: i64,
    pub tenant_id: i64,
    pub entity_type: DocumentKind, // 单据类型
    pub entity_id: i64,            // 单据ID
    pub from_state: String,        // 流转前状态 (规范标签)
    pub to_state: String,          // 流转后状态 (规范标签)
    pub operator_id: i64,
    pub operator_name: Option<String>,
    pub transition_reason: Option<String>,
    pub transition_comment: Option<String>,
    pub created_at: NaiveDateTime,
}

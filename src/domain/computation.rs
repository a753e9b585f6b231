// ==========================================
// 快智造制造管理平台 - 需求运算领域模型
// ==========================================
// 需求运算: 需求(单个或合并集合)下推产生的计划制品
// 核心把它当作不透明的下游单据, 内部算法不在范围内
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::ComputationType;

// ==========================================
// ComputationParams - 运算参数
// ==========================================
// 全部可开关; JSON 持久化到 computation_params 列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationParams {
    pub include_safety_stock: bool,           // 计算安全库存
    pub include_in_transit: bool,             // 计算在途
    pub include_reserved: bool,               // 计算预留
    pub include_reorder_point: bool,          // 计算再订货点
    pub bom_expand_level: i32,                // BOM展开层级
    pub consider_capacity: bool,              // 考虑产能
    pub consider_material_readiness: bool,    // 考虑物料齐套
    pub consider_equipment_availability: bool,// 考虑设备可用性
    pub consider_mold_tool_availability: bool,// 考虑模具工装可用性
}

impl Default for ComputationParams {
    fn default() -> Self {
        Self {
            include_safety_stock: true,
            include_in_transit: true,
            include_reserved: true,
            include_reorder_point: false,
            bom_expand_level: 0, // 0 = 展开到底层
            consider_capacity: false,
            consider_material_readiness: true,
            consider_equipment_availability: false,
            consider_mold_tool_availability: false,
        }
    }
}

// ==========================================
// DemandComputation - 需求运算单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandComputation {
    pub id: i64,
    pub tenant_id: i64,
    pub uuid: String,
    pub computation_code: String,            // 运算编码
    pub computation_type: ComputationType,   // MRP / LRP
    pub computation_params: ComputationParams,

    /// 主需求ID (单需求下推)
    pub demand_id: i64,
    /// 合并需求ID列表 (含主需求; 单需求下推时仅一个元素)
    pub demand_ids: Vec<i64>,

    pub status: String,        // 运算单自身状态 (draft/submitted/computed)
    pub needs_recompute: bool, // 上游变更影响标记 (不自动重算)

    pub created_by: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

/// 运算单自身状态值 (核心只读写 draft/submitted 两档)
pub const COMPUTATION_STATUS_DRAFT: &str = "draft";
pub const COMPUTATION_STATUS_SUBMITTED: &str = "submitted";
pub const COMPUTATION_STATUS_COMPUTED: &str = "computed";

// ==========================================
// DemandComputationItem - 运算明细 (按物料)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandComputationItem {
    pub id: i64,
    pub tenant_id: i64,
    pub computation_id: i64,

    pub material_id: i64,
    pub material_code: String,
    pub material_name: Option<String>,
    pub unit: Option<String>,

    pub required_quantity: Decimal,        // 需求数量 (来自需求明细)
    pub suggested_quantity: Decimal,       // 建议数量 (运算结果, 核心初始化为需求数量)
    pub demand_date: Option<NaiveDate>,    // 需求日期

    pub created_at: NaiveDateTime,
}

// ==========================================
// 快智造制造管理平台 - 业务引擎层
// ==========================================
// 状态机 / 审批协调 / 单据关联图 / 上游同步 / 下推上拉撤回
// ==========================================

pub mod approval;
pub mod push_pull;
pub mod relation_graph;
pub mod state_machine;
pub mod sync;

pub use approval::{ApprovalCoordinator, ReviewDecision};
pub use push_pull::{PushPullEngine, PushResult, WithdrawResult};
pub use relation_graph::{build_edge, RelationGraphEngine};
pub use state_machine::{apply_transition, can_transition, TransitionRequest};
pub use sync::{SyncResult, UpstreamSyncEngine};

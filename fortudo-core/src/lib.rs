//! fortudo-core: time-block scheduling and conflict resolution for a daily planner

pub mod error;
pub mod gaps;
pub mod overlap;
pub mod persist;
pub mod planner;
pub mod reschedule;
pub mod store;
pub mod sync;
pub mod task;
pub mod time;

pub use error::{PlannerError, Result};
pub use gaps::{compute_gaps, CurrentMarker, Gap, GapReport};
pub use overlap::{find_conflicts, overlap_warning, overlaps, TimeRange};
pub use persist::{JsonFileRepository, MemoryRepository, TaskRepository};
pub use planner::{
    ClearScope, ConfirmationType, NowProvider, OperationResult, OverlapCheck, Planner,
};
pub use reschedule::{
    cascade, cascade_all, completion_adjustment, CascadeReport, CompletionAdjustment,
    Displacement,
};
pub use store::{TaskDraft, TaskPatch, TaskStore};
pub use sync::{spawn_sync_worker, SyncBackend, SyncHandle, SyncStatus};
pub use task::{Backlog, Priority, Task, TaskKind, TaskStatus, TimeBlock};

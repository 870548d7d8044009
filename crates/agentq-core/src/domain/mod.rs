//! Domain model (ids, enumerations, the Task value object).

pub mod ids;
pub mod status;
pub mod task;

pub use ids::TaskId;
pub use status::{Priority, TaskStatus, TaskType};
pub use task::{
    DEFAULT_MAX_RETRIES, HistoryEntry, HistoryEvent, Lease, SubmitReceipt, SubmitRequest, Task,
    TaskInput,
};

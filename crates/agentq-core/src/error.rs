//! Queue errors.
//!
//! Every error here is local to a single engine call and is returned
//! synchronously to the caller. None of them leave the persisted document
//! mutated: the store only writes after the whole mutation closure has
//! succeeded in memory.

use thiserror::Error;

use crate::domain::TaskId;

/// Error taxonomy for the queue engine.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Bad or missing caller input (e.g. empty title). Rejected before any
    /// mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown task id.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The operation is not legal for the task's current state.
    #[error("cannot {op} task {id}: {reason}")]
    InvalidState {
        id: TaskId,
        op: &'static str,
        reason: String,
    },

    /// A lease operation by someone other than the current holder.
    #[error("lease conflict on task {id}: held by {holder:?}, caller is {caller}")]
    LeaseConflict {
        id: TaskId,
        holder: Option<String>,
        caller: String,
    },

    /// A submitted dependency references a task id that does not exist.
    #[error("dangling dependency: task {0} does not exist")]
    DanglingDependency(TaskId),

    /// The submitted dependencies would close a cycle.
    #[error("dependency cycle: {}", format_cycle(.0))]
    DependencyCycle(Vec<TaskId>),

    /// Could not produce a unique task id within the collision-retry budget.
    #[error("id generation exhausted after {0} attempts")]
    IdGeneration(u32),

    /// I/O or serialization failure while persisting the document. The
    /// in-memory mutation is discarded; the previous on-disk document remains
    /// authoritative.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

fn format_cycle(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

//! agentq-core
//!
//! A file-backed task queue for agent workloads. The whole queue lives in
//! one JSON document; every mutation rewrites it atomically, so the file on
//! disk is always a complete, consistent snapshot.
//!
//! # Module layout
//! - **domain**: the task model (ids, status/priority/type enums, the task
//!   record with its append-only history)
//! - **queue**: queue mechanics (lease protocol, retry policy with
//!   exponential backoff, dependency graph validation)
//! - **store**: persistence (the document with its derived indexes and
//!   stats, the atomic file store)
//! - **ports**: abstractions the engine depends on (Clock)
//! - **engine**: the composition root with the producer/worker operations
//!
//! # Example
//! ```no_run
//! use agentq_core::{QueueEngine, QueueStore, RetryPolicy, SubmitRequest};
//!
//! # async fn demo() -> Result<(), agentq_core::QueueError> {
//! let store = QueueStore::new("agent-queue.json");
//! let engine = QueueEngine::new(store, RetryPolicy::default());
//!
//! let receipt = engine.submit(SubmitRequest::new("Deploy service")).await?;
//! let lease = engine
//!     .assign(&receipt.id, "worker-1", chrono::Duration::seconds(60))
//!     .await?;
//! # let _ = lease;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod queue;
pub mod store;

pub use domain::{
    HistoryEntry, HistoryEvent, Lease, Priority, SubmitReceipt, SubmitRequest, Task, TaskId,
    TaskStatus, TaskType,
};
pub use engine::QueueEngine;
pub use error::QueueError;
pub use ports::{Clock, FixedClock, SystemClock};
pub use queue::{RetryDecision, RetryPolicy};
pub use store::{QueueDocument, QueueStats, QueueStore};

//! Persistence: the queue document, its derived indexes and stats, and the
//! file-backed store that owns them.

pub mod document;
pub mod file;
pub mod index;
pub mod stats;

pub use document::{DOCUMENT_VERSION, QueueDocument};
pub use file::QueueStore;
pub use index::{PriorityBuckets, QueueIndexes, StatusBuckets};
pub use stats::{PriorityCounts, QueueStats, StatusCounts};

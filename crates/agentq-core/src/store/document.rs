//! The persisted queue document.
//!
//! One document owns everything: the ordered task list (insertion order =
//! submission order), the derived indexes, the running stats, and version
//! metadata. Tasks are never deleted; terminal tasks stay for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskId};
use crate::error::QueueError;

use super::index::QueueIndexes;
use super::stats::QueueStats;

/// Schema version written into fresh documents.
pub const DOCUMENT_VERSION: &str = "1.1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDocument {
    pub version: String,
    pub updated: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub stats: QueueStats,
    pub indexes: QueueIndexes,
}

impl QueueDocument {
    /// A fresh document with every bucket present and empty.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            updated: now,
            tasks: Vec::new(),
            stats: QueueStats::default(),
            indexes: QueueIndexes::default(),
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.task(id).is_some()
    }

    /// Append a new task and mirror it into indexes and stats in the same
    /// step.
    pub fn insert_task(&mut self, task: Task) {
        self.indexes.on_insert(&task);
        self.stats.on_insert(&task);
        self.tasks.push(task);
    }

    /// Run `f` against one task and re-mirror whatever it changed (status,
    /// priority, assignee) into the indexes and stats. If `f` fails the
    /// document must be discarded, not persisted; `QueueStore::mutate`
    /// guarantees that.
    pub fn with_task<R>(
        &mut self,
        id: &TaskId,
        f: impl FnOnce(&mut Task) -> Result<R, QueueError>,
    ) -> Result<R, QueueError> {
        let pos = self
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;

        let (out, old_status, old_priority, old_assignee) = {
            let task = &mut self.tasks[pos];
            let old_status = task.status;
            let old_priority = task.priority;
            let old_assignee = task.assignee.clone();
            let out = f(task)?;
            (out, old_status, old_priority, old_assignee)
        };

        let task = &self.tasks[pos];
        self.indexes.on_status_change(id, old_status, task.status);
        self.stats.on_status_change(old_status, task.status);
        self.indexes
            .on_priority_change(id, old_priority, task.priority);
        self.stats.on_priority_change(old_priority, task.priority);
        self.indexes
            .on_assignee_change(id, &old_assignee, &task.assignee);

        Ok(out)
    }

    /// Full consistency check: unique ids, index mirroring, stats mirroring,
    /// lease-iff-leased-status, bounded retry counters. Used by the store as
    /// a debug-build self-test before every write.
    pub fn check_consistency(&self) -> Result<(), String> {
        for (i, task) in self.tasks.iter().enumerate() {
            if self.tasks[..i].iter().any(|t| t.id == task.id) {
                return Err(format!("duplicate task id {}", task.id));
            }
            if task.lease.is_some() != task.status.is_leased() {
                return Err(format!(
                    "task {} is {} but lease presence is {}",
                    task.id,
                    task.status,
                    task.lease.is_some()
                ));
            }
            if task.retry_count > task.max_retries {
                return Err(format!(
                    "task {} retryCount {} exceeds maxRetries {}",
                    task.id, task.retry_count, task.max_retries
                ));
            }
            for dep in &task.dependencies {
                if !self.contains(dep) {
                    return Err(format!("task {} has dangling dependency {}", task.id, dep));
                }
            }
        }
        if self.indexes != QueueIndexes::rebuild(&self.tasks) {
            return Err("indexes diverge from the task list".to_string());
        }
        if !self.stats.mirrors(&self.indexes) {
            return Err("stats counters diverge from the indexes".to_string());
        }
        Ok(())
    }
}

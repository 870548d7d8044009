//! Running queue statistics.
//!
//! Counters move inside the same mutation that moves the indexes, never as a
//! separate pass, so `stats.byStatus[s] == |indexes.byStatus[s]|` holds after
//! every commit. The average completion time is a running mean over
//! `totalProcessed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Priority, Task, TaskStatus};

use super::index::QueueIndexes;

/// Per-status counters. All six keys are always on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StatusCounts {
    pub pending: u64,
    pub assigned: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Assigned => self.assigned,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }

    fn get_mut(&mut self, status: TaskStatus) -> &mut u64 {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Assigned => &mut self.assigned,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::Cancelled => &mut self.cancelled,
        }
    }
}

/// Per-priority counters. All four keys are always on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PriorityCounts {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl PriorityCounts {
    pub fn get(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    fn get_mut(&mut self, priority: Priority) -> &mut u64 {
        match priority {
            Priority::Critical => &mut self.critical,
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
        }
    }
}

/// The document's `stats` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueStats {
    pub total_processed: u64,
    pub avg_completion_time_ms: f64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub by_priority: PriorityCounts,
    pub by_status: StatusCounts,
}

impl QueueStats {
    pub fn on_insert(&mut self, task: &Task) {
        *self.by_status.get_mut(task.status) += 1;
        *self.by_priority.get_mut(task.priority) += 1;
    }

    pub fn on_status_change(&mut self, old: TaskStatus, new: TaskStatus) {
        if old == new {
            return;
        }
        let bucket = self.by_status.get_mut(old);
        *bucket = bucket.saturating_sub(1);
        *self.by_status.get_mut(new) += 1;
    }

    pub fn on_priority_change(&mut self, old: Priority, new: Priority) {
        if old == new {
            return;
        }
        let bucket = self.by_priority.get_mut(old);
        *bucket = bucket.saturating_sub(1);
        *self.by_priority.get_mut(new) += 1;
    }

    /// Fold one completion into the running mean.
    pub fn record_completion(&mut self, at: DateTime<Utc>, elapsed_ms: f64) {
        self.total_processed += 1;
        self.avg_completion_time_ms +=
            (elapsed_ms - self.avg_completion_time_ms) / self.total_processed as f64;
        self.last_processed_at = Some(at);
    }

    /// Invariant check: every counter equals the size of the matching index
    /// bucket.
    pub fn mirrors(&self, indexes: &QueueIndexes) -> bool {
        TaskStatus::ALL
            .iter()
            .all(|&s| self.by_status.get(s) == indexes.by_status.get(s).len() as u64)
            && Priority::ALL
                .iter()
                .all(|&p| self.by_priority.get(p) == indexes.by_priority.get(p).len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SubmitRequest, TaskId};

    fn task(id: &str, priority: &str) -> Task {
        let mut req = SubmitRequest::new("t");
        req.priority = Some(priority.to_string());
        Task::from_submit(&req, TaskId::new(id), Utc::now())
    }

    #[test]
    fn counters_follow_inserts_and_moves() {
        let mut stats = QueueStats::default();
        let mut indexes = QueueIndexes::default();

        let t = task("task_a", "high");
        stats.on_insert(&t);
        indexes.on_insert(&t);

        assert_eq!(stats.by_status.pending, 1);
        assert_eq!(stats.by_priority.high, 1);
        assert!(stats.mirrors(&indexes));

        stats.on_status_change(TaskStatus::Pending, TaskStatus::Assigned);
        indexes.on_status_change(&t.id, TaskStatus::Pending, TaskStatus::Assigned);

        assert_eq!(stats.by_status.pending, 0);
        assert_eq!(stats.by_status.assigned, 1);
        assert!(stats.mirrors(&indexes));
    }

    #[test]
    fn running_mean_is_exact() {
        let mut stats = QueueStats::default();
        let now = Utc::now();

        stats.record_completion(now, 100.0);
        stats.record_completion(now, 200.0);
        stats.record_completion(now, 600.0);

        assert_eq!(stats.total_processed, 3);
        assert!((stats.avg_completion_time_ms - 300.0).abs() < 1e-9);
        assert_eq!(stats.last_processed_at, Some(now));
    }

    #[test]
    fn stats_serialize_with_the_schema_field_names() {
        let json = serde_json::to_value(QueueStats::default()).unwrap();
        assert!(json.get("totalProcessed").is_some());
        assert!(json.get("avgCompletionTimeMs").is_some());
        assert!(json.get("lastProcessedAt").is_some());
        assert!(json["byStatus"].get("PENDING").is_some());
        assert!(json["byPriority"].get("CRITICAL").is_some());
    }
}

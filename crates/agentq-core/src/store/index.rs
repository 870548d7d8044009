//! Derived lookup indexes.
//!
//! `byStatus`, `byPriority`, and `byAssignee` must exactly mirror the task
//! list after every committed mutation. Buckets hold ids in insertion order;
//! removal is a linear scan, which is fine at single-document scale.
//!
//! The status and priority maps always serialize with every key present,
//! matching the document schema's default shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Priority, Task, TaskId, TaskStatus};

/// Id buckets keyed by status. All six keys are always on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StatusBuckets {
    pub pending: Vec<TaskId>,
    pub assigned: Vec<TaskId>,
    pub in_progress: Vec<TaskId>,
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    pub cancelled: Vec<TaskId>,
}

impl StatusBuckets {
    pub fn get(&self, status: TaskStatus) -> &Vec<TaskId> {
        match status {
            TaskStatus::Pending => &self.pending,
            TaskStatus::Assigned => &self.assigned,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Completed => &self.completed,
            TaskStatus::Failed => &self.failed,
            TaskStatus::Cancelled => &self.cancelled,
        }
    }

    fn get_mut(&mut self, status: TaskStatus) -> &mut Vec<TaskId> {
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

/// Id buckets keyed by priority. All four keys are always on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PriorityBuckets {
    pub critical: Vec<TaskId>,
    pub high: Vec<TaskId>,
    pub medium: Vec<TaskId>,
    pub low: Vec<TaskId>,
}

impl PriorityBuckets {
    pub fn get(&self, priority: Priority) -> &Vec<TaskId> {
        match priority {
            Priority::Critical => &self.critical,
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }

    fn get_mut(&mut self, priority: Priority) -> &mut Vec<TaskId> {
        match priority {
            Priority::Critical => &mut self.critical,
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
        }
    }
}

/// The three derived indexes of the queue document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueIndexes {
    pub by_status: StatusBuckets,
    pub by_assignee: BTreeMap<String, Vec<TaskId>>,
    pub by_priority: PriorityBuckets,
}

impl QueueIndexes {
    /// Mirror a freshly inserted task.
    pub fn on_insert(&mut self, task: &Task) {
        self.by_status.get_mut(task.status).push(task.id.clone());
        self.by_priority
            .get_mut(task.priority)
            .push(task.id.clone());
        if !task.assignee.is_empty() {
            self.by_assignee
                .entry(task.assignee.clone())
                .or_default()
                .push(task.id.clone());
        }
    }

    pub fn on_status_change(&mut self, id: &TaskId, old: TaskStatus, new: TaskStatus) {
        if old == new {
            return;
        }
        remove_id(self.by_status.get_mut(old), id);
        self.by_status.get_mut(new).push(id.clone());
    }

    pub fn on_priority_change(&mut self, id: &TaskId, old: Priority, new: Priority) {
        if old == new {
            return;
        }
        remove_id(self.by_priority.get_mut(old), id);
        self.by_priority.get_mut(new).push(id.clone());
    }

    pub fn on_assignee_change(&mut self, id: &TaskId, old: &str, new: &str) {
        if old == new {
            return;
        }
        if !old.is_empty() {
            if let Some(bucket) = self.by_assignee.get_mut(old) {
                remove_id(bucket, id);
                if bucket.is_empty() {
                    self.by_assignee.remove(old);
                }
            }
        }
        if !new.is_empty() {
            self.by_assignee
                .entry(new.to_string())
                .or_default()
                .push(id.clone());
        }
    }

    /// Recompute everything from the task list. The incremental updates must
    /// always agree with this.
    pub fn rebuild<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut indexes = Self::default();
        for task in tasks {
            indexes.on_insert(task);
        }
        indexes
    }
}

fn remove_id(bucket: &mut Vec<TaskId>, id: &TaskId) {
    bucket.retain(|candidate| candidate != id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubmitRequest;
    use chrono::Utc;

    fn task(id: &str, agent: Option<&str>) -> Task {
        let mut req = SubmitRequest::new("t");
        req.agent = agent.map(str::to_string);
        Task::from_submit(&req, TaskId::new(id), Utc::now())
    }

    #[test]
    fn insert_mirrors_all_three_indexes() {
        let mut indexes = QueueIndexes::default();
        let t = task("task_a", Some("athena"));

        indexes.on_insert(&t);

        assert_eq!(indexes.by_status.pending, vec![t.id.clone()]);
        assert_eq!(indexes.by_priority.medium, vec![t.id.clone()]);
        assert_eq!(indexes.by_assignee["athena"], vec![t.id]);
    }

    #[test]
    fn empty_assignee_gets_no_bucket() {
        let mut indexes = QueueIndexes::default();
        indexes.on_insert(&task("task_a", None));
        assert!(indexes.by_assignee.is_empty());
    }

    #[test]
    fn status_change_moves_the_id_exactly_once() {
        let mut indexes = QueueIndexes::default();
        let t = task("task_a", None);
        indexes.on_insert(&t);

        indexes.on_status_change(&t.id, TaskStatus::Pending, TaskStatus::Assigned);
        assert!(indexes.by_status.pending.is_empty());
        assert_eq!(indexes.by_status.assigned, vec![t.id.clone()]);

        // No-op move keeps the bucket intact.
        indexes.on_status_change(&t.id, TaskStatus::Assigned, TaskStatus::Assigned);
        assert_eq!(indexes.by_status.assigned, vec![t.id]);
    }

    #[test]
    fn assignee_change_drops_empty_buckets() {
        let mut indexes = QueueIndexes::default();
        let t = task("task_a", Some("athena"));
        indexes.on_insert(&t);

        indexes.on_assignee_change(&t.id, "athena", "hermes");
        assert!(!indexes.by_assignee.contains_key("athena"));
        assert_eq!(indexes.by_assignee["hermes"], vec![t.id]);
    }

    #[test]
    fn rebuild_matches_incremental_updates() {
        let mut indexes = QueueIndexes::default();
        let mut tasks = vec![
            task("task_a", Some("athena")),
            task("task_b", None),
            task("task_c", Some("hermes")),
        ];
        for t in &tasks {
            indexes.on_insert(t);
        }

        indexes.on_status_change(&tasks[1].id, TaskStatus::Pending, TaskStatus::Assigned);
        tasks[1].status = TaskStatus::Assigned;

        assert_eq!(indexes, QueueIndexes::rebuild(&tasks));
    }

    #[test]
    fn all_keys_serialize_even_when_empty() {
        let json = serde_json::to_value(QueueIndexes::default()).unwrap();
        for status in ["PENDING", "ASSIGNED", "IN_PROGRESS", "COMPLETED", "FAILED", "CANCELLED"] {
            assert!(json["byStatus"].get(status).is_some());
        }
        for priority in ["CRITICAL", "HIGH", "MEDIUM", "LOW"] {
            assert!(json["byPriority"].get(priority).is_some());
        }
        assert!(json["byAssignee"].as_object().unwrap().is_empty());
    }
}

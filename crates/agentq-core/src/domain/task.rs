//! Task value object.
//!
//! Design:
//! - The task list in the document is the single source of truth; the
//!   indexes and stats are derived from it.
//! - All state transitions happen through the methods here, which also
//!   append to the immutable `history` log.
//! - Field names on the wire are fixed by the persisted document schema
//!   (`retryCount`, `maxRetries`, `type`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Priority, TaskId, TaskStatus, TaskType};

/// Default retry budget for newly submitted tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A time-boxed exclusive claim by one worker on one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Events recorded in a task's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEvent {
    Created,
    Assigned,
    Started,
    LeaseRenewed,
    LeaseExpired,
    RetryScheduled,
    FailedTerminal,
    Completed,
    Cancelled,
}

/// One entry in the append-only history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub event: HistoryEvent,
    pub by: String,
}

/// Caller-supplied payload, captured verbatim at submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub source: String,
}

/// Producer-facing submission request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub agent: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub dependencies: Vec<TaskId>,
    pub requester: Option<String>,
    pub max_retries: Option<u32>,
}

impl SubmitRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Reject bad input before anything touches the document.
    pub fn validate(&self) -> Result<(), crate::error::QueueError> {
        if self.title.trim().is_empty() {
            return Err(crate::error::QueueError::Validation(
                "task title is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a producer gets back from `submit` (mirrors the original 201
/// response payload).
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee: String,
}

/// One unit of work with its full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: Priority,
    pub created: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub assignee: String,
    pub requester: String,
    pub input: TaskInput,
    pub output: Option<Value>,
    pub error: Option<Value>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub dependencies: Vec<TaskId>,
    pub tags: Vec<String>,
    pub context: serde_json::Map<String, Value>,
    pub history: Vec<HistoryEntry>,
    pub lease: Option<Lease>,
}

impl Task {
    /// Construct a PENDING task from a validated submission. The caller is
    /// responsible for `SubmitRequest::validate` and for the uniqueness of
    /// `id` against the current document.
    pub fn from_submit(req: &SubmitRequest, id: TaskId, now: DateTime<Utc>) -> Self {
        let requester = req
            .requester
            .clone()
            .unwrap_or_else(|| "producer".to_string());
        Self {
            id,
            task_type: TaskType::from_category(req.category.as_deref()),
            status: TaskStatus::Pending,
            priority: Priority::from_input(req.priority.as_deref()),
            created: now,
            deadline: req.due_date,
            assignee: req.agent.clone().unwrap_or_default(),
            requester: requester.clone(),
            input: TaskInput {
                title: req.title.clone(),
                description: req.description.clone().unwrap_or_default(),
                category: req.category.clone().unwrap_or_default(),
                source: requester.clone(),
            },
            output: None,
            error: None,
            retry_count: 0,
            max_retries: req.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            dependencies: req.dependencies.clone(),
            tags: req.tags.clone(),
            context: serde_json::Map::new(),
            history: vec![HistoryEntry {
                at: now,
                event: HistoryEvent::Created,
                by: requester,
            }],
            lease: None,
        }
    }

    pub fn receipt(&self) -> SubmitReceipt {
        SubmitReceipt {
            id: self.id.clone(),
            task_type: self.task_type,
            status: self.status,
            priority: self.priority,
            assignee: self.assignee.clone(),
        }
    }

    fn push_history(&mut self, at: DateTime<Utc>, event: HistoryEvent, by: &str) {
        self.history.push(HistoryEntry {
            at,
            event,
            by: by.to_string(),
        });
    }

    /// PENDING -> ASSIGNED with a fresh lease.
    pub fn mark_assigned(&mut self, lease: Lease, now: DateTime<Utc>) {
        self.status = TaskStatus::Assigned;
        let holder = lease.holder.clone();
        self.lease = Some(lease);
        self.push_history(now, HistoryEvent::Assigned, &holder);
    }

    /// ASSIGNED -> IN_PROGRESS.
    pub fn mark_started(&mut self, now: DateTime<Utc>, worker: &str) {
        self.status = TaskStatus::InProgress;
        self.push_history(now, HistoryEvent::Started, worker);
    }

    pub fn record_lease_renewal(&mut self, now: DateTime<Utc>, worker: &str) {
        self.push_history(now, HistoryEvent::LeaseRenewed, worker);
    }

    /// Terminal success: records output, clears lease and any stale error.
    pub fn mark_completed(&mut self, output: Value, now: DateTime<Utc>, worker: &str) {
        self.status = TaskStatus::Completed;
        self.output = Some(output);
        self.error = None;
        self.lease = None;
        self.push_history(now, HistoryEvent::Completed, worker);
    }

    /// Failure with retry budget left: back to PENDING, retryCount bumped,
    /// lease and output cleared. The failure info stays in `error` until the
    /// next completion overwrites it.
    pub fn schedule_retry(&mut self, error: Value, now: DateTime<Utc>, by: &str) {
        self.status = TaskStatus::Pending;
        self.retry_count += 1;
        self.error = Some(error);
        self.output = None;
        self.lease = None;
        self.push_history(now, HistoryEvent::RetryScheduled, by);
    }

    /// Terminal failure: retry budget exhausted.
    pub fn mark_failed_terminal(&mut self, error: Value, now: DateTime<Utc>, by: &str) {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.output = None;
        self.lease = None;
        self.push_history(now, HistoryEvent::FailedTerminal, by);
    }

    /// Terminal cancellation from any non-terminal state.
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>, by: &str) {
        self.status = TaskStatus::Cancelled;
        self.lease = None;
        self.push_history(now, HistoryEvent::Cancelled, by);
    }

    /// Lease-expiry reclaim. Returns to PENDING if retry budget remains,
    /// otherwise goes terminally FAILED. Returns true when terminal.
    pub fn expire_lease(&mut self, now: DateTime<Utc>, by: &str) -> bool {
        let expired = self.lease.take();
        self.push_history(now, HistoryEvent::LeaseExpired, by);
        if self.retry_count < self.max_retries {
            self.retry_count += 1;
            self.status = TaskStatus::Pending;
            false
        } else {
            let holder = expired.map(|l| l.holder).unwrap_or_default();
            self.error = Some(serde_json::json!({
                "reason": "lease expired",
                "holder": holder,
                "retryCount": self.retry_count,
            }));
            self.output = None;
            self.status = TaskStatus::Failed;
            self.push_history(now, HistoryEvent::FailedTerminal, by);
            true
        }
    }

    /// The instant of the most recent RETRY_SCHEDULED entry, if any. Used to
    /// derive backoff eligibility without extending the wire schema.
    pub fn last_retry_at(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|h| h.event == HistoryEvent::RetryScheduled)
            .map(|h| h.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_request() -> SubmitRequest {
        SubmitRequest {
            title: "Deploy service".to_string(),
            description: Some("roll out v2".to_string()),
            category: Some("operations".to_string()),
            priority: Some("high".to_string()),
            agent: Some("athena".to_string()),
            tags: vec!["infra".to_string()],
            ..SubmitRequest::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 28, 9, 0, 0).unwrap()
    }

    #[test]
    fn from_submit_maps_and_seeds_history() {
        let task = Task::from_submit(&sample_request(), TaskId::new("task_a"), now());

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.task_type, TaskType::Operations);
        assert_eq!(task.assignee, "athena");
        assert_eq!(task.requester, "producer");
        assert_eq!(task.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(task.retry_count, 0);
        assert!(task.lease.is_none());
        assert_eq!(task.history.len(), 1);
        assert_eq!(task.history[0].event, HistoryEvent::Created);
    }

    #[test]
    fn empty_title_is_rejected_by_validate() {
        let req = SubmitRequest::default();
        assert!(req.validate().is_err());

        let req = SubmitRequest::new("   ");
        assert!(req.validate().is_err());

        let req = SubmitRequest::new("x");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn wire_field_names_are_stable() {
        let task = Task::from_submit(&sample_request(), TaskId::new("task_a"), now());
        let json = serde_json::to_value(&task).unwrap();

        for key in [
            "id",
            "type",
            "status",
            "priority",
            "created",
            "deadline",
            "assignee",
            "requester",
            "input",
            "output",
            "error",
            "retryCount",
            "maxRetries",
            "dependencies",
            "tags",
            "context",
            "history",
            "lease",
        ] {
            assert!(json.get(key).is_some(), "missing wire field {key}");
        }
        assert_eq!(json["type"], "OPERATIONS");
        assert_eq!(json["retryCount"], 0);
        assert_eq!(json["history"][0]["event"], "CREATED");
    }

    #[test]
    fn completion_clears_error_and_lease() {
        let mut task = Task::from_submit(&sample_request(), TaskId::new("task_a"), now());
        task.mark_assigned(
            Lease {
                holder: "w1".to_string(),
                acquired_at: now(),
                expires_at: now() + chrono::Duration::seconds(60),
            },
            now(),
        );
        task.schedule_retry(serde_json::json!({"msg": "boom"}), now(), "w1");
        assert!(task.error.is_some());
        assert_eq!(task.retry_count, 1);

        task.mark_completed(serde_json::json!({"ok": true}), now(), "w1");
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error.is_none());
        assert!(task.lease.is_none());
        assert!(task.output.is_some());
    }

    #[test]
    fn expire_lease_goes_terminal_once_budget_is_spent() {
        let mut task = Task::from_submit(&sample_request(), TaskId::new("task_a"), now());
        task.max_retries = 1;

        task.mark_assigned(
            Lease {
                holder: "w1".to_string(),
                acquired_at: now(),
                expires_at: now() + chrono::Duration::seconds(1),
            },
            now(),
        );
        assert!(!task.expire_lease(now(), "queue"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);

        task.mark_assigned(
            Lease {
                holder: "w1".to_string(),
                acquired_at: now(),
                expires_at: now() + chrono::Duration::seconds(1),
            },
            now(),
        );
        assert!(task.expire_lease(now(), "queue"));
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.is_some());
    }
}

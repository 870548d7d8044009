//! Queue engine: the composition root.
//!
//! Every operation is one atomic read-modify-write against the store. The
//! closure re-validates state from the freshly loaded document, so callers
//! holding stale snapshots cannot corrupt anything; they just get a typed
//! error back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{Lease, SubmitReceipt, SubmitRequest, Task, TaskId, TaskStatus};
use crate::error::QueueError;
use crate::ports::{Clock, SystemClock};
use crate::queue::dependency;
use crate::queue::{LeaseManager, RetryDecision, RetryPolicy};
use crate::store::{QueueDocument, QueueStore};

/// Collision-retry budget for id generation.
const MAX_ID_ATTEMPTS: u32 = 8;

/// Actor name recorded in history entries written by the engine itself
/// (reclaim sweep).
const QUEUE_ACTOR: &str = "queue";

pub struct QueueEngine {
    store: QueueStore,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl QueueEngine {
    pub fn new(store: QueueStore, retry: RetryPolicy) -> Self {
        Self::with_clock(store, retry, Arc::new(SystemClock))
    }

    pub fn with_clock(store: QueueStore, retry: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            retry,
            clock,
        }
    }

    /// Accept a new task from a producer. Validates input, checks the
    /// dependency graph, generates a unique id, and commits the PENDING task
    /// with its index and stats mirrors in one write.
    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitReceipt, QueueError> {
        req.validate()?;
        let now = self.clock.now();
        let receipt = self
            .store
            .mutate(now, |doc| {
                let id = generate_unique_id(doc, now)?;
                dependency::validate_submission(&doc.tasks, &id, &req.dependencies)?;
                let task = Task::from_submit(&req, id, now);
                let receipt = task.receipt();
                doc.insert_task(task);
                Ok(receipt)
            })
            .await?;
        debug!(task = %receipt.id, priority = %receipt.priority, "task submitted");
        Ok(receipt)
    }

    /// Read-only snapshot of the whole document. May be stale by the time
    /// the caller acts on it; mutations re-validate internally.
    pub async fn list(&self) -> Result<QueueDocument, QueueError> {
        self.store.snapshot(self.clock.now()).await
    }

    pub async fn get(&self, id: &TaskId) -> Result<Task, QueueError> {
        let doc = self.store.snapshot(self.clock.now()).await?;
        doc.task(id)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    /// Terminal cancellation from any non-terminal status.
    pub async fn cancel(&self, id: &TaskId, by: &str) -> Result<Task, QueueError> {
        let now = self.clock.now();
        let by = by.to_string();
        self.store
            .mutate(now, |doc| {
                doc.with_task(id, |task| {
                    if task.status.is_terminal() {
                        return Err(QueueError::InvalidState {
                            id: task.id.clone(),
                            op: "cancel",
                            reason: format!("status is {}", task.status),
                        });
                    }
                    task.mark_cancelled(now, &by);
                    Ok(task.clone())
                })
            })
            .await
    }

    /// Lease a PENDING task to a worker. Refused while any dependency is
    /// incomplete or while the task is still inside its retry backoff
    /// window.
    pub async fn assign(
        &self,
        id: &TaskId,
        worker: &str,
        ttl: Duration,
    ) -> Result<Lease, QueueError> {
        let now = self.clock.now();
        self.store
            .mutate(now, |doc| {
                let task = doc
                    .task(id)
                    .ok_or_else(|| QueueError::NotFound(id.clone()))?;

                let unmet = dependency::unmet_dependencies(&doc.tasks, task);
                if !unmet.is_empty() {
                    return Err(QueueError::InvalidState {
                        id: id.clone(),
                        op: "assign",
                        reason: format!(
                            "{} incomplete dependencies ({})",
                            unmet.len(),
                            unmet
                                .iter()
                                .map(|d| d.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                    });
                }

                if let Some(eligible_at) = self.retry_eligible_at(task) {
                    if now < eligible_at {
                        return Err(QueueError::InvalidState {
                            id: id.clone(),
                            op: "assign",
                            reason: format!("retry backoff until {eligible_at}"),
                        });
                    }
                }

                doc.with_task(id, |task| LeaseManager::acquire(task, worker, ttl, now))
            })
            .await
    }

    /// Extend the calling holder's lease.
    pub async fn renew(
        &self,
        id: &TaskId,
        worker: &str,
        ttl: Duration,
    ) -> Result<Lease, QueueError> {
        let now = self.clock.now();
        self.store
            .mutate(now, |doc| {
                doc.with_task(id, |task| LeaseManager::renew(task, worker, ttl, now))
            })
            .await
    }

    /// ASSIGNED -> IN_PROGRESS for the current holder.
    pub async fn start(&self, id: &TaskId, worker: &str) -> Result<Task, QueueError> {
        let now = self.clock.now();
        self.store
            .mutate(now, |doc| {
                doc.with_task(id, |task| {
                    LeaseManager::start(task, worker, now)?;
                    Ok(task.clone())
                })
            })
            .await
    }

    /// Successful completion by the lease holder. Records output, releases
    /// the lease, and folds the completion time into the running stats.
    pub async fn complete(
        &self,
        id: &TaskId,
        worker: &str,
        output: Value,
    ) -> Result<Task, QueueError> {
        let now = self.clock.now();
        self.store
            .mutate(now, |doc| {
                let task = doc.with_task(id, |task| {
                    check_leased_for(task, "complete")?;
                    LeaseManager::check_holder(task, worker)?;
                    task.mark_completed(output, now, worker);
                    Ok(task.clone())
                })?;
                let elapsed_ms = (now - task.created).num_milliseconds().max(0) as f64;
                doc.stats.record_completion(now, elapsed_ms);
                Ok(task)
            })
            .await
    }

    /// Failure reported by the lease holder. The retry policy decides
    /// between re-enqueue (with backoff) and terminal FAILED.
    pub async fn fail(
        &self,
        id: &TaskId,
        worker: &str,
        error: Value,
    ) -> Result<Task, QueueError> {
        let now = self.clock.now();
        let task = self
            .store
            .mutate(now, |doc| {
                doc.with_task(id, |task| {
                    check_leased_for(task, "fail")?;
                    LeaseManager::check_holder(task, worker)?;
                    match self.retry.decide(task.retry_count, task.max_retries) {
                        RetryDecision::Retry(delay) => {
                            debug!(
                                task = %task.id,
                                retry = task.retry_count + 1,
                                backoff_secs = delay.as_secs(),
                                "task failed, retry scheduled"
                            );
                            task.schedule_retry(error, now, worker);
                        }
                        RetryDecision::Terminal => {
                            task.mark_failed_terminal(error, now, worker);
                        }
                    }
                    Ok(task.clone())
                })
            })
            .await?;
        if task.status == TaskStatus::Failed {
            info!(task = %task.id, retries = task.retry_count, "task failed terminally");
        }
        Ok(task)
    }

    /// Sweep every task whose lease expired before now: the lease is
    /// cleared, retryCount bumped, and the task re-enqueued (or terminally
    /// failed once its budget is spent). Background maintenance; per-task
    /// outcomes are logged, not propagated.
    pub async fn reclaim_expired(&self) -> Result<Vec<TaskId>, QueueError> {
        let now = self.clock.now();
        let reclaimed = self
            .store
            .mutate(now, |doc| {
                let expired: Vec<TaskId> = doc
                    .tasks
                    .iter()
                    .filter(|t| LeaseManager::is_expired(t, now))
                    .map(|t| t.id.clone())
                    .collect();

                for id in &expired {
                    let terminal = doc.with_task(id, |task| {
                        Ok(task.expire_lease(now, QUEUE_ACTOR))
                    })?;
                    if terminal {
                        info!(task = %id, "lease expired, retry budget spent, task failed");
                    } else {
                        info!(task = %id, "lease expired, task re-enqueued");
                    }
                }
                Ok(expired)
            })
            .await?;
        if !reclaimed.is_empty() {
            debug!(count = reclaimed.len(), "reclaim sweep finished");
        }
        Ok(reclaimed)
    }

    /// When a retried task becomes eligible for re-assignment, derived from
    /// the last RETRY_SCHEDULED history entry plus the policy's backoff for
    /// the current retry number. Tasks reclaimed from an expired lease carry
    /// no RETRY_SCHEDULED entry and are eligible immediately.
    fn retry_eligible_at(&self, task: &Task) -> Option<DateTime<Utc>> {
        let retried_at = task.last_retry_at()?;
        let backoff = Duration::from_std(self.retry.next_delay(task.retry_count))
            .unwrap_or_else(|_| Duration::seconds(self.retry.max_delay.as_secs() as i64));
        Some(retried_at + backoff)
    }
}

fn check_leased_for(task: &Task, op: &'static str) -> Result<(), QueueError> {
    if !task.status.is_leased() {
        return Err(QueueError::InvalidState {
            id: task.id.clone(),
            op,
            reason: format!("status is {}", task.status),
        });
    }
    Ok(())
}

fn generate_unique_id(doc: &QueueDocument, now: DateTime<Utc>) -> Result<TaskId, QueueError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = TaskId::generate(now);
        if !doc.contains(&id) {
            return Ok(id);
        }
    }
    Err(QueueError::IdGeneration(MAX_ID_ATTEMPTS))
}

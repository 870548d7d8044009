//! Lease protocol: single-holder, time-boxed assignment.
//!
//! Per-task state machine: unleased -> leased(holder, expiresAt), re-entrant
//! only via `renew` by the same holder. The lease is authoritative: a task
//! carries one exactly while its status is ASSIGNED or IN_PROGRESS.
//!
//! These operations mutate a task in place; the engine runs them inside a
//! store mutation so the index/stats mirrors move in the same commit.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Lease, Task, TaskStatus};
use crate::error::QueueError;

pub struct LeaseManager;

impl LeaseManager {
    /// Grant a lease on a PENDING task. Any other status is an
    /// `InvalidState` error; dependency and backoff gating happen in the
    /// engine before this is called.
    pub fn acquire(
        task: &mut Task,
        worker: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Lease, QueueError> {
        if task.status != TaskStatus::Pending {
            return Err(QueueError::InvalidState {
                id: task.id.clone(),
                op: "assign",
                reason: format!("status is {}", task.status),
            });
        }
        let lease = Lease {
            holder: worker.to_string(),
            acquired_at: now,
            expires_at: now + ttl,
        };
        task.mark_assigned(lease.clone(), now);
        Ok(lease)
    }

    /// Extend the current holder's lease.
    pub fn renew(
        task: &mut Task,
        worker: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Lease, QueueError> {
        let lease = Self::held_lease_mut(task, worker)?;
        lease.expires_at = now + ttl;
        let renewed = lease.clone();
        task.record_lease_renewal(now, worker);
        Ok(renewed)
    }

    /// ASSIGNED -> IN_PROGRESS for the current holder.
    pub fn start(task: &mut Task, worker: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        Self::held_lease_mut(task, worker)?;
        if task.status != TaskStatus::Assigned {
            return Err(QueueError::InvalidState {
                id: task.id.clone(),
                op: "start",
                reason: format!("status is {}", task.status),
            });
        }
        task.mark_started(now, worker);
        Ok(())
    }

    /// Check that `worker` holds the lease; used by complete/fail before
    /// they release it.
    pub fn check_holder(task: &Task, worker: &str) -> Result<(), QueueError> {
        match &task.lease {
            Some(lease) if lease.holder == worker => Ok(()),
            other => Err(QueueError::LeaseConflict {
                id: task.id.clone(),
                holder: other.as_ref().map(|l| l.holder.clone()),
                caller: worker.to_string(),
            }),
        }
    }

    /// True when the task carries a lease that expired strictly before `now`.
    pub fn is_expired(task: &Task, now: DateTime<Utc>) -> bool {
        task.lease
            .as_ref()
            .is_some_and(|lease| lease.expires_at < now)
    }

    fn held_lease_mut<'a>(task: &'a mut Task, worker: &str) -> Result<&'a mut Lease, QueueError> {
        let id = task.id.clone();
        match task.lease.as_mut() {
            Some(lease) if lease.holder == worker => Ok(lease),
            other => Err(QueueError::LeaseConflict {
                id,
                holder: other.map(|l| l.holder.clone()),
                caller: worker.to_string(),
            }),
        }
    }
}

//! File-backed queue store.
//!
//! The store is the sole owner of the persisted document. Every externally
//! visible state transition goes through [`QueueStore::mutate`], which holds
//! an async mutex for the whole load-modify-write cycle: that mutex is the
//! single-writer arbitration point, so mutations from one process apply in
//! the order they acquire it.
//!
//! The write is all-or-nothing: the new document is built fully in memory,
//! serialized, written to a temp file, and renamed over the old one. A crash
//! mid-write never leaves a half-written document.
//!
//! Known gap, by construction: two *processes* sharing the same file without
//! sharing a store instance can race load-modify-write and silently lose one
//! side's update (last writer wins on the whole document). Route all
//! mutations for one queue file through one long-lived store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::QueueError;

use super::document::QueueDocument;

pub struct QueueStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document without mutating anything. An absent file
    /// yields a fresh empty document; a present but unparseable file is a
    /// persistence error, never silently replaced.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<QueueDocument, QueueError> {
        self.load(now).await
    }

    /// Atomic read-modify-write. Loads the document, applies `f`, and on
    /// success persists the whole result in one rename. If `f` or the write
    /// fails, the in-memory mutation is discarded and the previous on-disk
    /// document remains authoritative.
    pub async fn mutate<R>(
        &self,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut QueueDocument) -> Result<R, QueueError>,
    ) -> Result<R, QueueError> {
        let _guard = self.write_lock.lock().await;

        let mut doc = self.load(now).await?;
        let out = f(&mut doc)?;
        doc.updated = now;

        #[cfg(debug_assertions)]
        if let Err(broken) = doc.check_consistency() {
            debug_assert!(false, "mutation broke a document invariant: {broken}");
        }

        self.persist(&doc).await?;
        Ok(out)
    }

    async fn load(&self, now: DateTime<Utc>) -> Result<QueueDocument, QueueError> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                QueueError::Persistence(format!(
                    "queue document {} is unreadable: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(QueueDocument::empty(now)),
            Err(e) => Err(QueueError::Persistence(format!(
                "reading {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn persist(&self, doc: &QueueDocument) -> Result<(), QueueError> {
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| QueueError::Persistence(format!("serializing document: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    QueueError::Persistence(format!("creating {}: {e}", parent.display()))
                })?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json)
            .await
            .map_err(|e| QueueError::Persistence(format!("writing {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            QueueError::Persistence(format!("replacing {}: {e}", self.path.display()))
        })?;

        debug!(
            path = %self.path.display(),
            tasks = doc.tasks.len(),
            "queue document persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SubmitRequest, Task, TaskId};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> QueueStore {
        QueueStore::new(dir.path().join("agent-queue.json"))
    }

    #[tokio::test]
    async fn absent_file_loads_as_empty_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let doc = store.snapshot(Utc::now()).await.unwrap();
        assert!(doc.tasks.is_empty());
        // Snapshot alone does not create the file.
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn mutation_survives_a_store_reopen() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();

        let store = store_in(&dir);
        store
            .mutate(now, |doc| {
                doc.insert_task(Task::from_submit(
                    &SubmitRequest::new("persist me"),
                    TaskId::new("task_a"),
                    now,
                ));
                Ok(())
            })
            .await
            .unwrap();

        let reopened = store_in(&dir);
        let doc = reopened.snapshot(Utc::now()).await.unwrap();
        assert_eq!(doc.tasks.len(), 1);
        assert_eq!(doc.tasks[0].id, TaskId::new("task_a"));
        assert_eq!(doc.stats.by_status.pending, 1);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_the_file_untouched() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let store = store_in(&dir);

        store
            .mutate(now, |doc| {
                doc.insert_task(Task::from_submit(
                    &SubmitRequest::new("keep"),
                    TaskId::new("task_a"),
                    now,
                ));
                Ok(())
            })
            .await
            .unwrap();

        let err = store
            .mutate(now, |doc| {
                doc.insert_task(Task::from_submit(
                    &SubmitRequest::new("discard"),
                    TaskId::new("task_b"),
                    now,
                ));
                Err::<(), _>(QueueError::Validation("abort".to_string()))
            })
            .await;
        assert!(err.is_err());

        let doc = store.snapshot(Utc::now()).await.unwrap();
        assert_eq!(doc.tasks.len(), 1);
        assert_eq!(doc.tasks[0].id, TaskId::new("task_a"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_a_reset() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), b"{ not json").await.unwrap();

        let err = store.snapshot(Utc::now()).await;
        assert!(matches!(err, Err(QueueError::Persistence(_))));

        let err = store.mutate(Utc::now(), |_| Ok(())).await;
        assert!(matches!(err, Err(QueueError::Persistence(_))));

        // The corrupt bytes are still there for a human to inspect.
        let bytes = tokio::fs::read(store.path()).await.unwrap();
        assert_eq!(bytes, b"{ not json");
    }

    #[tokio::test]
    async fn updated_timestamp_moves_with_each_commit() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let t0 = Utc::now();
        store.mutate(t0, |_| Ok(())).await.unwrap();
        let t1 = t0 + chrono::Duration::seconds(5);
        store.mutate(t1, |_| Ok(())).await.unwrap();

        let doc = store.snapshot(t1).await.unwrap();
        assert_eq!(doc.updated, t1);
    }
}

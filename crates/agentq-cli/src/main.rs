use std::sync::Arc;

use chrono::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentq_core::{QueueEngine, QueueStore, RetryPolicy, SubmitRequest, SystemClock};

/// Demo: one producer and one worker walking a task through its whole
/// lifecycle against a real queue file.
#[tokio::main]
async fn main() -> Result<(), agentq_core::QueueError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::var("AGENTQ_QUEUE").unwrap_or_else(|_| "agent-queue.json".to_string());
    info!(path = %path, "opening queue");

    let store = QueueStore::new(path);
    let engine = QueueEngine::with_clock(store, RetryPolicy::default(), Arc::new(SystemClock));

    // (A) producer: submit a task
    let receipt = engine
        .submit(SubmitRequest {
            title: "Deploy service".to_string(),
            description: Some("roll out v2 behind the flag".to_string()),
            category: Some("operations".to_string()),
            priority: Some("high".to_string()),
            agent: Some("athena".to_string()),
            tags: vec!["infra".to_string()],
            ..SubmitRequest::default()
        })
        .await?;
    println!(
        "submitted: id={} type={} priority={} status={}",
        receipt.id, receipt.task_type, receipt.priority, receipt.status
    );

    // (B) worker: lease it, report progress
    let worker = "worker-1";
    let lease = engine
        .assign(&receipt.id, worker, Duration::seconds(60))
        .await?;
    println!("leased by {} until {}", lease.holder, lease.expires_at);

    engine.start(&receipt.id, worker).await?;

    // (C) worker: finish with an output payload
    let task = engine
        .complete(
            &receipt.id,
            worker,
            serde_json::json!({ "deployed": true, "version": "v2" }),
        )
        .await?;
    println!("finished: status={} output={:?}", task.status, task.output);

    // (D) queue-wide view straight from the persisted document
    let doc = engine.list().await?;
    println!(
        "queue: {} tasks, {} processed, avg completion {:.0} ms",
        doc.tasks.len(),
        doc.stats.total_processed,
        doc.stats.avg_completion_time_ms
    );

    // (E) a reclaim sweep is a no-op here, but this is what a background
    // maintenance loop would call
    let reclaimed = engine.reclaim_expired().await?;
    println!("reclaimed {} expired leases", reclaimed.len());

    Ok(())
}

//! Queue and status store against a live Redis.
//!
//! Run with `REDIS_URL=redis://localhost:6379 cargo test -p vpost-queue -- --ignored`.

use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use vpost_models::{ExecutionMode, JobId, JobParams, JobState, JobStatusSnapshot};
use vpost_queue::{Delivery, JobQueue, JobStatusStore, QueueConfig, QueueError, QueueJob};

fn test_config() -> QueueConfig {
    let suffix = uuid::Uuid::new_v4();
    QueueConfig {
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        stream_name: format!("vpost:test:jobs:{}", suffix),
        consumer_group: format!("vpost:test:workers:{}", suffix),
        dlq_stream_name: format!("vpost:test:dlq:{}", suffix),
        visibility_timeout: Duration::from_millis(0),
        ..QueueConfig::default()
    }
}

fn job(id: &str) -> QueueJob {
    QueueJob::from(JobParams::new(
        JobId::from_string(id),
        format!("/up/{id}/a.mp4"),
        format!("/out/output_{id}.mp4"),
        format!("/up/{id}"),
    ))
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn enqueue_consume_ack() {
    let queue = JobQueue::new(test_config()).unwrap();
    assert_ok!(queue.ping().await);
    assert_ok!(queue.init().await);

    let id = uuid::Uuid::new_v4().to_string();
    let message_id = queue.enqueue(&job(&id)).await.unwrap();

    let deliveries = queue.consume("c1", 100, 10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    match &deliveries[0] {
        Delivery::Job { message_id: got, job } => {
            assert_eq!(got, &message_id);
            assert_eq!(job.job_id().as_str(), id);
        }
        other => panic!("unexpected delivery: {other:?}"),
    }

    queue.ack(&message_id).await.unwrap();
    assert_eq!(queue.len().await.unwrap(), 0);
    assert_eq!(queue.consumer_count().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn duplicate_enqueue_rejected() {
    let queue = JobQueue::new(test_config()).unwrap();
    queue.init().await.unwrap();

    let j = job(&uuid::Uuid::new_v4().to_string());
    queue.enqueue(&j).await.unwrap();

    let err = assert_err!(queue.enqueue(&j).await);
    assert!(matches!(err, QueueError::DuplicateJob(_)));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn unacked_job_can_be_claimed() {
    let queue = JobQueue::new(test_config()).unwrap();
    queue.init().await.unwrap();
    queue.enqueue(&job(&uuid::Uuid::new_v4().to_string())).await.unwrap();

    let first = queue.consume("crashed", 100, 10).await.unwrap();
    assert_eq!(first.len(), 1);

    let claimed = queue.claim_pending("rescuer", 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn heartbeat_keeps_running_job_from_being_claimed() {
    let queue = JobQueue::new(QueueConfig {
        visibility_timeout: Duration::from_millis(300),
        ..test_config()
    })
    .unwrap();
    queue.init().await.unwrap();
    let message_id = queue.enqueue(&job(&uuid::Uuid::new_v4().to_string())).await.unwrap();
    queue.consume("busy", 100, 10).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_ok!(queue.heartbeat("busy", &message_id).await);
    assert!(queue.claim_pending("rescuer", 10).await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(queue.claim_pending("rescuer", 10).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn dlq_moves_entry() {
    let queue = JobQueue::new(test_config()).unwrap();
    queue.init().await.unwrap();

    let j = job(&uuid::Uuid::new_v4().to_string());
    let message_id = queue.enqueue(&j).await.unwrap();
    queue.consume("c1", 100, 10).await.unwrap();

    assert_eq!(queue.increment_retry(&message_id).await.unwrap(), 1);
    queue.dlq(&message_id, &j, "boom").await.unwrap();

    assert_eq!(queue.dlq_len().await.unwrap(), 1);
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn status_roundtrip_and_revoke() {
    let queue = JobQueue::new(test_config()).unwrap();
    let store = JobStatusStore::for_queue(&queue);
    let id = JobId::new();

    // Unknown jobs read as pending
    let snap = store.poll(&id).await.unwrap();
    assert_eq!(snap.state, JobState::Pending);

    let mut snap = JobStatusSnapshot::pending(id.clone(), ExecutionMode::Queued);
    snap.set_progress(50, "Inputs ready");
    store.put(&snap).await.unwrap();

    let got = store.poll(&id).await.unwrap();
    assert_eq!(got.progress, 50);
    assert!(!got.revoked);

    store.revoke(&id).await.unwrap();
    assert!(store.is_revoked(&id).await.unwrap());
    assert!(store.poll(&id).await.unwrap().revoked);
}

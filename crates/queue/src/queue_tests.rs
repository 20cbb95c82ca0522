// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sb_core::{AgentResult, FakeClock, Skill, WebhookEvent, WebhookJob};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    queue: FileJobQueue<FakeClock>,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let queue = FileJobQueue::open(
        QueueConfig::new(dir.path()).recovery_grace(Duration::from_secs(60)),
        clock.clone(),
        Arc::new(MetricsStore::new()),
    )
    .unwrap();
    Fixture { _dir: dir, queue, clock }
}

fn job(clock: &FakeClock) -> WebhookJob {
    WebhookJob::new(WebhookEvent::builder().build(), Skill::default(), clock)
}

#[tokio::test]
async fn enqueue_dequeue_round_trip() {
    let f = fixture();
    let job = job(&f.clock);

    let enqueued = f.queue.enqueue(&job).unwrap();
    assert_eq!(enqueued.job_id, job.job_id);
    assert!(!enqueued.duplicate);
    let id = enqueued.job_id;
    assert_eq!(f.queue.pending_count().unwrap(), 1);

    let dequeued = f.queue.dequeue().unwrap().unwrap();
    assert_eq!(dequeued.job_id, job.job_id);
    assert_eq!(f.queue.pending_count().unwrap(), 0);

    // The file moved from jobs/ to processing/.
    assert!(f.queue.dir().join(format!("processing/{id}.json")).exists());
    assert!(!f.queue.dir().join(format!("jobs/{id}.json")).exists());
}

#[tokio::test]
async fn dequeue_empty_returns_none() {
    let f = fixture();
    assert!(f.queue.dequeue().unwrap().is_none());
}

#[tokio::test]
async fn fifo_order_is_preserved() {
    let f = fixture();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let job = job(&f.clock);
        ids.push(f.queue.enqueue(&job).unwrap().job_id);
    }

    for expected in &ids {
        let dequeued = f.queue.dequeue().unwrap().unwrap();
        assert_eq!(&dequeued.job_id, expected);
    }
}

#[tokio::test]
async fn enqueue_is_idempotent() {
    let f = fixture();
    let job = job(&f.clock);

    let first = f.queue.enqueue(&job).unwrap();
    let second = f.queue.enqueue(&job).unwrap();

    assert_eq!(first.job_id, second.job_id);
    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(f.queue.pending_count().unwrap(), 1);

    // Still idempotent after the job left the pending directory.
    f.queue.dequeue().unwrap().unwrap();
    let third = f.queue.enqueue(&job).unwrap();
    assert_eq!(first.job_id, third.job_id);
    assert!(third.duplicate);
    assert_eq!(f.queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn complete_moves_record_with_result_and_snapshots() {
    let f = fixture();
    let job = job(&f.clock);
    f.queue.enqueue(&job).unwrap();
    f.queue.dequeue().unwrap().unwrap();

    f.queue
        .complete(
            &job.job_id,
            CompletionRecord {
                result: AgentResult {
                    success: true,
                    changes_made: true,
                    files_modified: vec!["README.md".to_string()],
                    ..AgentResult::default()
                },
                snapshot_before: Some(sb_core::Snapshot::default()),
                snapshot_after: Some(sb_core::Snapshot::default()),
            },
        )
        .unwrap();

    let (status, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Completed);
    assert_eq!(record.job.status, JobStatus::Completed);
    assert!(record.job.completed_at_ms.is_some());
    assert!(record.result.unwrap().changes_made);
    assert!(record.snapshot_before.is_some());
    assert!(record.snapshot_after.is_some());
}

#[tokio::test]
async fn fail_moves_record_with_error() {
    let f = fixture();
    let job = job(&f.clock);
    f.queue.enqueue(&job).unwrap();
    f.queue.dequeue().unwrap().unwrap();

    f.queue
        .fail(
            &job.job_id,
            JobFailure {
                message: "agent timed out".to_string(),
                error_type: "AgentTimeout".to_string(),
                retryable: true,
                stderr_tail: None,
            },
        )
        .unwrap();

    let (status, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.error_type, "AgentTimeout");
    assert!(error.retryable);
    assert_eq!(record.job.last_error.as_deref(), Some("agent timed out"));
}

#[tokio::test]
async fn complete_unknown_job_is_not_found() {
    let f = fixture();
    let err = f.queue.complete(&JobId::new("nope"), CompletionRecord::default()).unwrap_err();
    assert!(matches!(err, QueueError::NotFound { dir: "processing", .. }));
}

#[tokio::test]
async fn at_most_one_file_per_job_id() {
    let f = fixture();
    let job = job(&f.clock);
    f.queue.enqueue(&job).unwrap();

    let count = |id: &JobId| {
        ["jobs", "processing", "completed", "failed"]
            .iter()
            .filter(|d| f.queue.dir().join(format!("{d}/{id}.json")).exists())
            .count()
    };

    assert_eq!(count(&job.job_id), 1);
    f.queue.dequeue().unwrap().unwrap();
    assert_eq!(count(&job.job_id), 1);
    f.queue.complete(&job.job_id, CompletionRecord::default()).unwrap();
    assert_eq!(count(&job.job_id), 1);
}

#[tokio::test]
async fn recover_respects_grace_period() {
    let f = fixture();
    let job = job(&f.clock);
    f.queue.enqueue(&job).unwrap();
    f.queue.dequeue().unwrap().unwrap();

    // Inside the grace window: nothing happens.
    assert!(f.queue.recover().unwrap().is_empty());

    f.clock.advance(Duration::from_secs(120));
    let recovered = f.queue.recover().unwrap();
    assert_eq!(recovered, vec![job.job_id.clone()]);

    // Back in jobs/ at the head of the index, attempt incremented.
    let (status, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Pending);
    assert_eq!(record.job.attempt, 1);
    assert!(record.claimed_at_ms.is_none());

    let redelivered = f.queue.dequeue().unwrap().unwrap();
    assert_eq!(redelivered.job_id, job.job_id);
    assert_eq!(redelivered.attempt, 1);
}

#[tokio::test]
async fn recover_puts_recovered_jobs_ahead_of_new_work() {
    let f = fixture();
    let stale = job(&f.clock);
    f.queue.enqueue(&stale).unwrap();
    f.queue.dequeue().unwrap().unwrap();

    f.clock.advance(Duration::from_secs(120));
    let fresh = job(&f.clock);
    f.queue.enqueue(&fresh).unwrap();

    f.queue.recover().unwrap();

    assert_eq!(f.queue.dequeue().unwrap().unwrap().job_id, stale.job_id);
    assert_eq!(f.queue.dequeue().unwrap().unwrap().job_id, fresh.job_id);
}

#[tokio::test]
async fn recover_survives_missing_claim_stamp() {
    // Simulates kill-9 between the claim rename and the stamp rewrite.
    let f = fixture();
    let job = job(&f.clock);
    f.queue.enqueue(&job).unwrap();

    let src = f.queue.dir().join(format!("jobs/{}.json", job.job_id));
    let dst = f.queue.dir().join(format!("processing/{}.json", job.job_id));
    std::fs::rename(&src, &dst).unwrap();
    f.queue.write_index(&[]).unwrap();

    // The fallback compares the file mtime against the clock, so line
    // the fake clock up with wall time and backdate the file past the
    // grace period.
    let real_now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    f.clock.set_epoch_ms(real_now_ms);
    let old = std::time::SystemTime::now() - Duration::from_secs(600);
    let file = std::fs::File::options().append(true).open(&dst).unwrap();
    file.set_times(std::fs::FileTimes::new().set_modified(old)).unwrap();
    drop(file);

    let recovered = f.queue.recover().unwrap();
    assert_eq!(recovered, vec![job.job_id.clone()]);
    assert!(f.queue.dequeue().unwrap().is_some());
}

#[tokio::test]
async fn wait_for_dequeue_returns_when_job_arrives() {
    let dir = TempDir::new().unwrap();
    let clock = sb_core::SystemClock;
    let queue = Arc::new(
        FileJobQueue::open(QueueConfig::new(dir.path()), clock, Arc::new(MetricsStore::new()))
            .unwrap(),
    );

    let waiter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.wait_for_dequeue(Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let job = WebhookJob::new(WebhookEvent::builder().build(), Skill::default(), &sb_core::SystemClock);
    queue.enqueue(&job).unwrap();

    let dequeued = waiter.await.unwrap().unwrap().unwrap();
    assert_eq!(dequeued.job_id, job.job_id);
}

#[tokio::test]
async fn wait_for_dequeue_times_out_empty() {
    let dir = TempDir::new().unwrap();
    let queue = FileJobQueue::open(
        QueueConfig::new(dir.path()).poll_interval(Duration::from_millis(20)),
        sb_core::SystemClock,
        Arc::new(MetricsStore::new()),
    )
    .unwrap();

    let result = queue.wait_for_dequeue(Duration::from_millis(80)).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn metrics_record_operations_and_gauges() {
    let f = fixture();
    let job = job(&f.clock);
    f.queue.enqueue(&job).unwrap();

    let snapshot = f.queue.metrics().snapshot();
    assert_eq!(snapshot.counters["queue.enqueue.count"], 1);
    assert!(snapshot.histograms.contains_key("queue.enqueue.latency_ms"));
    assert_eq!(snapshot.gauges["queue_size"], 1.0);
    assert!(snapshot.gauges["disk_usage_mb"] > 0.0);

    f.queue.dequeue().unwrap().unwrap();
    f.queue.complete(&job.job_id, CompletionRecord::default()).unwrap();

    let snapshot = f.queue.metrics().snapshot();
    assert_eq!(snapshot.counters["queue.dequeue.count"], 1);
    assert_eq!(snapshot.counters["queue.complete.count"], 1);
    assert_eq!(snapshot.gauges["queue_size"], 0.0);
    assert_eq!(snapshot.gauges["jobs_per_hour"], 1.0 / 24.0);
}

#[tokio::test]
async fn list_filters_by_status() {
    let f = fixture();
    let first = job(&f.clock);
    let second = job(&f.clock);
    f.queue.enqueue(&first).unwrap();
    f.queue.enqueue(&second).unwrap();
    f.queue.dequeue().unwrap().unwrap();

    assert_eq!(f.queue.list(JobStatus::Pending).unwrap().len(), 1);
    assert_eq!(f.queue.list(JobStatus::Processing).unwrap().len(), 1);
    assert!(f.queue.list(JobStatus::Completed).unwrap().is_empty());
}

#[tokio::test]
async fn index_survives_external_rewrite_readers() {
    // A reader mid-rewrite sees pre- or post-state, never a torn file.
    let f = fixture();
    let job = job(&f.clock);
    f.queue.enqueue(&job).unwrap();

    let index: Vec<String> =
        serde_json::from_slice(&std::fs::read(f.queue.dir().join("queue.json")).unwrap()).unwrap();
    assert_eq!(index, vec![job.job_id.to_string()]);
    assert!(!f.queue.dir().join("queue.json.tmp").exists());
}

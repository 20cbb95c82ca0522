// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-queue: durable file-backed job queue.
//!
//! A FIFO shared across OS processes. Every mutation runs under an
//! advisory `.lock` file; the `queue.json` index is rewritten via
//! write-to-temp + atomic rename, so concurrent readers always observe
//! either the pre- or post-state. Delivery is at-least-once: work found
//! in `processing/` after a crash is recovered back to `jobs/` once the
//! grace period expires.
//!
//! The [`JobQueue`] trait is the migration boundary for a later swap to
//! a network key-value store; nothing outside this crate touches the
//! on-disk layout.

mod lock;
mod metrics;
mod queue;
mod record;

pub use lock::{QueueLock, QueueLockGuard};
pub use metrics::QueueMetrics;
pub use queue::{FileJobQueue, QueueConfig};
pub use record::{CompletionRecord, JobFailure, JobRecord};

use async_trait::async_trait;
use sb_core::{JobId, WebhookJob};
use std::time::Duration;
use thiserror::Error;

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("queue record corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("job not found in {dir}: {job_id}")]
    NotFound { dir: &'static str, job_id: JobId },
}

impl QueueError {
    /// True for conditions the caller should surface as "queue
    /// unavailable" (disk full, lock stuck) rather than a bad request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Io(_))
    }
}

/// Result of an enqueue: the id under which the job is tracked, and
/// whether it was already present (idempotent no-op).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub job_id: JobId,
    pub duplicate: bool,
}

/// The durable queue abstraction consumed by intake and orchestrators.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Persist a pending job. Enqueuing an id that already exists
    /// anywhere in the queue is a no-op returning the existing id.
    fn enqueue(&self, job: &WebhookJob) -> Result<Enqueued, QueueError>;

    /// Claim the head of the queue, if any.
    fn dequeue(&self) -> Result<Option<WebhookJob>, QueueError>;

    /// Block up to `timeout` for a job to become available.
    async fn wait_for_dequeue(&self, timeout: Duration) -> Result<Option<WebhookJob>, QueueError>;

    /// Move a claimed job to terminal success.
    fn complete(&self, job_id: &JobId, outcome: CompletionRecord) -> Result<(), QueueError>;

    /// Move a claimed job to terminal failure.
    fn fail(&self, job_id: &JobId, failure: JobFailure) -> Result<(), QueueError>;

    /// Return stale `processing/` entries to the pending queue. Returns
    /// the recovered job ids.
    fn recover(&self) -> Result<Vec<JobId>, QueueError>;

    /// Number of pending jobs.
    fn pending_count(&self) -> Result<usize, QueueError>;
}

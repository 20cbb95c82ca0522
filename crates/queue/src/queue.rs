// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The file-backed queue implementation.
//!
//! Layout, relative to the workspace queue directory:
//!
//! ```text
//! queue.json                 ordered list of pending job ids
//! jobs/{job_id}.json         pending job payload
//! processing/{job_id}.json   job currently held by a worker
//! completed/{job_id}.json    terminal success
//! failed/{job_id}.json       terminal failure
//! .lock                      advisory lock for critical sections
//! ```

use crate::lock::QueueLock;
use crate::metrics::QueueMetrics;
use crate::record::{CompletionRecord, JobFailure, JobRecord};
use crate::{Enqueued, JobQueue, QueueError};
use async_trait::async_trait;
use sb_core::{Clock, JobId, JobStatus, MetricsStore, SystemClock, WebhookJob};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Longest sleep between polls in `wait_for_dequeue`.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Queue construction parameters.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Workspace queue directory.
    pub dir: PathBuf,
    /// Age after which a `processing/` entry is considered abandoned.
    pub recovery_grace: Duration,
    /// Sleep between dequeue polls. Clamped to one second.
    pub poll_interval: Duration,
}

impl QueueConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            recovery_grace: Duration::from_secs(300),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn recovery_grace(mut self, grace: Duration) -> Self {
        self.recovery_grace = grace;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Durable FIFO over plain JSON files. See crate docs for guarantees.
pub struct FileJobQueue<C: Clock = SystemClock> {
    config: QueueConfig,
    lock: QueueLock,
    clock: C,
    metrics: QueueMetrics,
}

impl<C: Clock> FileJobQueue<C> {
    /// Open (creating directories as needed) a queue rooted at
    /// `config.dir`.
    pub fn open(config: QueueConfig, clock: C, metrics: Arc<MetricsStore>) -> Result<Self, QueueError> {
        for sub in ["jobs", "processing", "completed", "failed"] {
            fs::create_dir_all(config.dir.join(sub))?;
        }
        let lock = QueueLock::new(&config.dir);
        let queue = Self { config, lock, clock, metrics: QueueMetrics::new(metrics) };
        if !queue.index_path().exists() {
            queue.write_index(&[])?;
        }
        Ok(queue)
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    fn index_path(&self) -> PathBuf {
        self.config.dir.join("queue.json")
    }

    fn record_path(&self, dir: &str, job_id: &str) -> PathBuf {
        self.config.dir.join(dir).join(format!("{job_id}.json"))
    }

    fn read_index(&self) -> Result<Vec<String>, QueueError> {
        match fs::read(self.index_path()) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite `queue.json` via temp file + atomic rename.
    fn write_index(&self, ids: &[String]) -> Result<(), QueueError> {
        let tmp = self.config.dir.join("queue.json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&ids)?)?;
        fs::rename(&tmp, self.index_path())?;
        Ok(())
    }

    fn read_record(&self, path: &Path) -> Result<JobRecord, QueueError> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    /// Write a record via temp file + rename within its directory.
    fn write_record(&self, path: &Path, record: &JobRecord) -> Result<(), QueueError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Directory currently holding `job_id`, if any.
    fn locate(&self, job_id: &str) -> Option<&'static str> {
        for dir in ["jobs", "processing", "completed", "failed"] {
            if self.record_path(dir, job_id).exists() {
                return Some(dir);
            }
        }
        None
    }

    /// Fetch a record and its directory, for the operator surface.
    pub fn find(&self, job_id: &JobId) -> Result<Option<(JobStatus, JobRecord)>, QueueError> {
        let Some(dir) = self.locate(job_id) else {
            return Ok(None);
        };
        let record = self.read_record(&self.record_path(dir, job_id))?;
        let status = match dir {
            "jobs" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            _ => JobStatus::Failed,
        };
        Ok(Some((status, record)))
    }

    /// All records in one directory, unordered.
    pub fn list(&self, status: JobStatus) -> Result<Vec<JobRecord>, QueueError> {
        let dir = match status {
            JobStatus::Pending => "jobs",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        let mut records = Vec::new();
        for entry in fs::read_dir(self.config.dir.join(dir))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match self.read_record(&path) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record");
                    }
                }
            }
        }
        Ok(records)
    }

    /// Recompute derived gauges from the on-disk state.
    pub fn refresh_gauges(&self) -> Result<(), QueueError> {
        let index = self.read_index()?;
        let now_ms = self.clock.epoch_ms();

        let backlog_age_seconds = index
            .first()
            .and_then(|id| self.read_record(&self.record_path("jobs", id)).ok())
            .map(|record| now_ms.saturating_sub(record.job.created_at_ms) / 1000)
            .unwrap_or(0);

        let mut disk_usage = 0u64;
        for dir in ["jobs", "processing", "completed", "failed"] {
            for entry in fs::read_dir(self.config.dir.join(dir))? {
                disk_usage += entry?.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        // Terminal files keep their move-time mtime, which stands in for
        // the completion timestamp without parsing every record.
        let day_ago = std::time::SystemTime::now() - Duration::from_secs(24 * 3600);
        let mut completed_last_day = 0u64;
        for entry in fs::read_dir(self.config.dir.join("completed"))? {
            let meta = entry?.metadata()?;
            if meta.modified().map(|m| m >= day_ago).unwrap_or(false) {
                completed_last_day += 1;
            }
        }

        self.metrics.set_gauges(
            index.len(),
            backlog_age_seconds,
            disk_usage as f64 / (1024.0 * 1024.0),
            completed_last_day as f64 / 24.0,
        );
        Ok(())
    }

    fn dequeue_inner(&self) -> Result<Option<WebhookJob>, QueueError> {
        let started = self.clock.now();
        let _guard = self.lock.acquire()?;
        let mut index = self.read_index()?;
        let mut dequeued = None;

        while let Some(job_id) = index.first().cloned() {
            index.remove(0);
            let src = self.record_path("jobs", &job_id);
            if !src.exists() {
                tracing::warn!(job_id, "queue index referenced a missing job file; skipping");
                continue;
            }
            let dst = self.record_path("processing", &job_id);
            // Atomic move claims the job; the claimed-at stamp follows.
            fs::rename(&src, &dst)?;
            let mut record = self.read_record(&dst)?;
            record.claimed_at_ms = Some(self.clock.epoch_ms());
            self.write_record(&dst, &record)?;
            dequeued = Some(record.job);
            break;
        }

        self.write_index(&index)?;
        if dequeued.is_some() {
            self.metrics.record_op("dequeue", started, self.clock.now());
        }
        let _ = self.refresh_gauges();
        Ok(dequeued)
    }
}

#[async_trait]
impl<C: Clock> JobQueue for FileJobQueue<C> {
    fn enqueue(&self, job: &WebhookJob) -> Result<Enqueued, QueueError> {
        let started = self.clock.now();
        let _guard = self.lock.acquire()?;

        // Idempotency: an id seen anywhere in the queue is not re-added.
        if self.locate(&job.job_id).is_some() {
            tracing::debug!(job_id = %job.job_id, "duplicate enqueue ignored");
            return Ok(Enqueued { job_id: job.job_id.clone(), duplicate: true });
        }

        let path = self.record_path("jobs", &job.job_id);
        self.write_record(&path, &JobRecord::pending(job.clone()))?;

        let mut index = self.read_index()?;
        if !index.iter().any(|id| id == job.job_id.as_str()) {
            index.push(job.job_id.to_string());
            self.write_index(&index)?;
        }

        self.metrics.record_op("enqueue", started, self.clock.now());
        let _ = self.refresh_gauges();
        tracing::info!(job_id = %job.job_id, skill = %job.skill, "job enqueued");
        Ok(Enqueued { job_id: job.job_id.clone(), duplicate: false })
    }

    fn dequeue(&self) -> Result<Option<WebhookJob>, QueueError> {
        self.dequeue_inner()
    }

    async fn wait_for_dequeue(&self, timeout: Duration) -> Result<Option<WebhookJob>, QueueError> {
        let deadline = self.clock.now() + timeout;
        let poll = self.config.poll_interval.min(MAX_POLL_INTERVAL);
        loop {
            if let Some(job) = self.dequeue_inner()? {
                return Ok(Some(job));
            }
            let now = self.clock.now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    fn complete(&self, job_id: &JobId, outcome: CompletionRecord) -> Result<(), QueueError> {
        let started = self.clock.now();
        let _guard = self.lock.acquire()?;

        let src = self.record_path("processing", job_id);
        if !src.exists() {
            return Err(QueueError::NotFound { dir: "processing", job_id: job_id.clone() });
        }
        let mut record = self.read_record(&src)?;
        record.job.complete(self.clock.epoch_ms());
        record.result = Some(outcome.result);
        record.snapshot_before = outcome.snapshot_before;
        record.snapshot_after = outcome.snapshot_after;

        self.write_record(&self.record_path("completed", job_id), &record)?;
        fs::remove_file(&src)?;

        self.metrics.record_op("complete", started, self.clock.now());
        let _ = self.refresh_gauges();
        tracing::info!(job_id = %job_id, "job completed");
        Ok(())
    }

    fn fail(&self, job_id: &JobId, failure: JobFailure) -> Result<(), QueueError> {
        let started = self.clock.now();
        let _guard = self.lock.acquire()?;

        let src = self.record_path("processing", job_id);
        if !src.exists() {
            return Err(QueueError::NotFound { dir: "processing", job_id: job_id.clone() });
        }
        let mut record = self.read_record(&src)?;
        record.job.fail(failure.message.clone(), self.clock.epoch_ms());
        record.error = Some(failure);

        self.write_record(&self.record_path("failed", job_id), &record)?;
        fs::remove_file(&src)?;

        self.metrics.record_op("fail", started, self.clock.now());
        let _ = self.refresh_gauges();
        tracing::info!(job_id = %job_id, "job failed");
        Ok(())
    }

    fn recover(&self) -> Result<Vec<JobId>, QueueError> {
        let _guard = self.lock.acquire()?;
        let now_ms = self.clock.epoch_ms();
        let grace_ms = self.config.recovery_grace.as_millis() as u64;
        let mut recovered = Vec::new();

        for entry in fs::read_dir(self.config.dir.join("processing"))? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let mut record = match self.read_record(&path) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable processing record");
                    continue;
                }
            };
            // A crash between the claim rename and the stamp rewrite can
            // leave claimed_at empty; fall back to the file's mtime.
            let claimed_ms = record.claimed_at_ms.or_else(|| {
                fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as u64)
            });
            if let Some(claimed_ms) = claimed_ms {
                if now_ms.saturating_sub(claimed_ms) < grace_ms {
                    continue;
                }
            }

            record.job.status = JobStatus::Pending;
            record.job.attempt += 1;
            record.job.started_at_ms = None;
            record.job.worktree_path = None;
            record.job.branch_name = None;
            record.claimed_at_ms = None;

            let job_id = record.job.job_id.clone();
            self.write_record(&self.record_path("jobs", &job_id), &record)?;
            fs::remove_file(&path)?;
            recovered.push(job_id);
        }

        if !recovered.is_empty() {
            // Recovered work goes to the head so it runs before new intake.
            let mut index: Vec<String> = recovered.iter().map(|id| id.to_string()).collect();
            for id in self.read_index()? {
                if !index.contains(&id) {
                    index.push(id);
                }
            }
            self.write_index(&index)?;
            self.metrics.count_recovered(recovered.len());
            tracing::info!(count = recovered.len(), "recovered in-flight jobs");
        }

        let _ = self.refresh_gauges();
        Ok(recovered)
    }

    fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(self.read_index()?.len())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

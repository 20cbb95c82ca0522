// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable unit of work: one webhook event materialized as a job.
//!
//! Status is monotonic — `Pending → Processing → {Completed, Failed}` —
//! except for the explicit retry transition, which produces a *new* job
//! record with `attempt + 1` and a freshly generated id so that
//! idempotency keys stay distinct per attempt.

use crate::agent::ExecutionId;
use crate::id::ShortHash;
use crate::skill::Skill;
use crate::webhook::WebhookEvent;
use crate::Clock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Job identifier of the form `{source}-{event_type}-{short_hash}`.
    ///
    /// Stable across the lifetime of one attempt; regenerated (with a new
    /// short hash) when a failed job is re-enqueued.
    pub struct JobId;
}

impl JobId {
    /// Compose a job id from its three segments.
    pub fn from_parts(source: &str, event_type: &str, hash: &ShortHash) -> Self {
        Self::new(format!("{source}-{event_type}-{hash}"))
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Enqueued, waiting for a worker
    Pending,
    /// Claimed by an orchestrator; worktree and agent in flight
    Processing,
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
}

crate::str_enum! {
    JobStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine permits moving to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// A job created from one webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookJob {
    pub job_id: JobId,
    /// Entropy segment of `job_id`, reused for worktree and branch names.
    pub short_hash: ShortHash,
    pub event: WebhookEvent,
    pub skill: Skill,
    pub status: JobStatus,
    /// Set when the orchestrator provisions the scratch tree
    /// (status ≥ Processing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_execution_id: Option<ExecutionId>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// Zero for the first attempt.
    #[serde(default)]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WebhookJob {
    /// Materialize a job from a webhook event.
    ///
    /// The short hash is derived from the delivery's correlation id, so a
    /// redelivered webhook computes the same job id and the queue's
    /// enqueue idempotency collapses it to one entry.
    pub fn new(event: WebhookEvent, skill: Skill, clock: &impl Clock) -> Self {
        let seed = format!("{}:{}:{}", event.source, event.event_type, event.correlation_id);
        let short_hash = ShortHash::derive(&seed);
        let job_id =
            JobId::from_parts(&event.source.to_string(), &event.event_type, &short_hash);
        Self {
            job_id,
            short_hash,
            event,
            skill,
            status: JobStatus::Pending,
            worktree_path: None,
            branch_name: None,
            agent_execution_id: None,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            completed_at_ms: None,
            attempt: 0,
            last_error: None,
        }
    }

    /// Build the follow-up record for a transient failure.
    ///
    /// The new record starts back at `Pending` with a fresh id and hash;
    /// worktree bindings and execution state do not carry over.
    pub fn retry_record(&self, clock: &impl Clock) -> Self {
        let short_hash = ShortHash::generate();
        let job_id = JobId::from_parts(
            &self.event.source.to_string(),
            &self.event.event_type,
            &short_hash,
        );
        Self {
            job_id,
            short_hash,
            event: self.event.clone(),
            skill: self.skill.clone(),
            status: JobStatus::Pending,
            worktree_path: None,
            branch_name: None,
            agent_execution_id: None,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            completed_at_ms: None,
            attempt: self.attempt + 1,
            last_error: self.last_error.clone(),
        }
    }

    /// Mark the job claimed by a worker and bind its scratch tree.
    pub fn start(&mut self, worktree_path: PathBuf, branch_name: String, epoch_ms: u64) {
        self.status = JobStatus::Processing;
        self.worktree_path = Some(worktree_path);
        self.branch_name = Some(branch_name);
        self.started_at_ms = Some(epoch_ms);
    }

    pub fn complete(&mut self, epoch_ms: u64) {
        self.status = JobStatus::Completed;
        self.completed_at_ms = Some(epoch_ms);
    }

    pub fn fail(&mut self, error: impl Into<String>, epoch_ms: u64) {
        self.status = JobStatus::Failed;
        self.last_error = Some(error.into());
        self.completed_at_ms = Some(epoch_ms);
    }

    /// Issue number from the embedded event, when present.
    pub fn issue_number(&self) -> Option<u64> {
        self.event.issue_number()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

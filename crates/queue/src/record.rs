// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted queue record shapes.
//!
//! One JSON file per job, moved between `jobs/`, `processing/`,
//! `completed/`, and `failed/` as its status progresses. The record is
//! the job itself plus queue-side bookkeeping: when it was claimed, and
//! on terminal transitions the result or failure with both worktree
//! snapshots.

use sb_core::{AgentResult, Snapshot, WebhookJob};
use serde::{Deserialize, Serialize};

/// Terminal-success payload appended to a record by `complete`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub result: AgentResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_before: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_after: Option<Snapshot>,
}

/// Terminal-failure payload appended to a record by `fail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub message: String,
    /// Error taxonomy name (`AgentTimeout`, `PushRejected`, …).
    pub error_type: String,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
}

/// On-disk representation of one job file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub job: WebhookJob,
    /// Set when a worker moves the file into `processing/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AgentResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_before: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_after: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl JobRecord {
    pub fn pending(job: WebhookJob) -> Self {
        Self {
            job,
            claimed_at_ms: None,
            result: None,
            snapshot_before: None,
            snapshot_after: None,
            error: None,
        }
    }
}

impl From<WebhookJob> for JobRecord {
    fn from(job: WebhookJob) -> Self {
        Self::pending(job)
    }
}

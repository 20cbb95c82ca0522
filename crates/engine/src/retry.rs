// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure taxonomy and retry classification.
//!
//! Errors are classified at the boundary where they occur; the
//! orchestrator decides between re-enqueue with backoff and terminal
//! failure. Transient: network and I/O failures, HTTP 5xx and 429, git
//! push timeouts and lock contention, agent start errors, agent
//! timeouts. Everything else is terminal.

use crate::hooks::HookError;
use crate::worktree::WorktreeError;
use sb_adapters::git::GitError;
use std::time::Duration;
use thiserror::Error;

/// Exponential backoff schedule for transient failures, indexed by the
/// failing attempt number.
pub const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(60),
    Duration::from_secs(300),
    Duration::from_secs(900),
];

/// Attempts after which even transient failures become terminal.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay before re-enqueueing after `attempt` failed, or `None` when
/// the attempt budget is spent.
pub fn backoff_delay(attempt: u32) -> Option<Duration> {
    BACKOFF_SCHEDULE.get(attempt as usize).copied()
}

/// Everything that can take a job to `Failed`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("worktree creation failed: {0}")]
    WorktreeCreation(#[from] WorktreeError),
    #[error("snapshot capture failed: {0}")]
    Snapshot(#[from] crate::snapshot::SnapshotError),
    #[error("agent failed to start: {0}")]
    AgentStart(String),
    #[error("agent timed out after {seconds}s")]
    AgentTimeout { seconds: u64 },
    #[error("agent crashed: {message}")]
    AgentCrash { message: String, stderr_tail: Option<String> },
    #[error("agent result invalid: {0}")]
    AgentResultInvalid(String),
    #[error("agent reported failure: {0}")]
    AgentReportedFailure(String),
    #[error("commit failed: {0}")]
    Commit(GitError),
    #[error("push rejected: {0}")]
    Push(GitError),
    #[error("pull request creation failed: {0}")]
    PrCreation(#[from] HookError),
    #[error("shutdown while job in flight")]
    Shutdown,
}

impl JobError {
    /// Taxonomy name carried in `JobFailedEvent` and failure records.
    pub fn error_type(&self) -> &'static str {
        match self {
            JobError::WorktreeCreation(_) => "WorktreeCreationFailed",
            JobError::Snapshot(_) => "SnapshotFailed",
            JobError::AgentStart(_) => "AgentStartError",
            JobError::AgentTimeout { .. } => "AgentTimeout",
            JobError::AgentCrash { .. } => "AgentCrash",
            JobError::AgentResultInvalid(_) => "AgentResultInvalid",
            JobError::AgentReportedFailure(_) => "AgentReportedFailure",
            JobError::Commit(_) => "CommitFailed",
            JobError::Push(_) => "PushRejected",
            JobError::PrCreation(_) => "PRCreationFailed",
            JobError::Shutdown => "Shutdown",
        }
    }

    /// Whether the failure is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            JobError::AgentStart(_) | JobError::AgentTimeout { .. } => true,
            JobError::WorktreeCreation(WorktreeError::Git(e)) => e.is_transient(),
            JobError::WorktreeCreation(_) => false,
            JobError::Snapshot(crate::snapshot::SnapshotError::Git(e)) => e.is_transient(),
            JobError::Snapshot(_) => false,
            JobError::Commit(e) | JobError::Push(e) => e.is_transient(),
            JobError::PrCreation(e) => e.is_transient(),
            JobError::AgentCrash { .. }
            | JobError::AgentResultInvalid(_)
            | JobError::AgentReportedFailure(_)
            | JobError::Shutdown => false,
        }
    }

    /// Captured stderr, when the failure carries one.
    pub fn stderr_tail(&self) -> Option<&str> {
        match self {
            JobError::AgentCrash { stderr_tail, .. } => stderr_tail.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound hooks the orchestrator calls after a successful run.
//!
//! Pull-request creation is an external collaborator: the concrete forge
//! client lives outside this core. The orchestrator only sees the trait;
//! when no hook is configured, the PR step is skipped.

use async_trait::async_trait;
use sb_core::{AgentResult, WebhookJob};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
    /// True for 4xx authorization-class upstream responses, which are
    /// not worth retrying.
    pub authorization: bool,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), authorization: false }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self { message: message.into(), authorization: true }
    }

    pub fn is_transient(&self) -> bool {
        !self.authorization
    }
}

/// Creates a pull request for a pushed branch, returning its URL.
#[async_trait]
pub trait PullRequestHook: Send + Sync + 'static {
    async fn create(&self, job: &WebhookJob, result: &AgentResult) -> Result<String, HookError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{HookError, PullRequestHook};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sb_core::{AgentResult, JobId, WebhookJob};
    use std::sync::Arc;

    /// Records calls; returns a deterministic URL or a configured error.
    #[derive(Clone, Default)]
    pub struct FakePullRequestHook {
        calls: Arc<Mutex<Vec<JobId>>>,
        error: Arc<Mutex<Option<HookError>>>,
    }

    impl FakePullRequestHook {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_error(&self, error: HookError) {
            *self.error.lock() = Some(error);
        }

        pub fn calls(&self) -> Vec<JobId> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl PullRequestHook for FakePullRequestHook {
        async fn create(&self, job: &WebhookJob, _result: &AgentResult) -> Result<String, HookError> {
            self.calls.lock().push(job.job_id.clone());
            if let Some(error) = self.error.lock().take() {
                return Err(error);
            }
            Ok(format!("https://example.invalid/pr/{}", job.short_hash))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePullRequestHook;

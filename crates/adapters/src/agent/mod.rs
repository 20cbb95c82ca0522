// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent facade: lifecycle and I/O of one subprocess invocation.
//!
//! [`AgentFacade`] is the single seam between the orchestrator and any
//! concrete agent. Implementations own the subprocess completely: they
//! stream the rendered system prompt to stdin once, parse stdout through
//! the control-frame parser, enforce the skill timeout, and release
//! every handle on every exit path. The orchestrator only ever sees the
//! [`AgentHandle`]'s event stream and the final [`AgentExecution`].

mod claude;
mod prompt;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use claude::ClaudeAgentFacade;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentFacade, FakeBehavior};
pub use prompt::{PromptError, PromptTemplate, SystemPrompt};

use async_trait::async_trait;
use sb_core::{AgentExecution, CorrelationId, ExecutionId, JobId, Skill};
use sb_protocol::ProtocolEvent;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Error message recorded when the process exits cleanly but never
/// emitted a parseable final JSON object. The orchestrator matches on
/// this to classify the failure as `AgentResultInvalid`.
pub const NO_RESULT_ERROR: &str = "agent exited without a parseable final result";

#[derive(Debug, Error)]
pub enum AgentError {
    /// The subprocess could not be launched at all.
    #[error("agent failed to start: {0}")]
    Start(String),
    #[error("agent I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("agent driver aborted: {0}")]
    Join(String),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Everything a facade needs to run an agent against one job.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub job_id: JobId,
    pub worktree_path: PathBuf,
    pub issue_number: Option<u64>,
    pub issue_title: String,
    pub repo_name: String,
    pub branch_name: String,
    pub skill: Skill,
    pub correlation_id: CorrelationId,
    /// Explicit override; takes precedence over the skill table.
    pub timeout_override: Option<Duration>,
}

impl AgentContext {
    /// Resolve the timeout: explicit override > per-skill table >
    /// catalog default.
    pub fn timeout(&self) -> Duration {
        self.timeout_override.unwrap_or_else(|| self.skill.timeout())
    }
}

/// A live agent run: a stream of protocol events plus the final record.
#[derive(Debug)]
pub struct AgentHandle {
    pub execution_id: ExecutionId,
    events: mpsc::UnboundedReceiver<ProtocolEvent>,
    outcome: JoinHandle<AgentExecution>,
}

impl AgentHandle {
    pub(crate) fn new(
        execution_id: ExecutionId,
        events: mpsc::UnboundedReceiver<ProtocolEvent>,
        outcome: JoinHandle<AgentExecution>,
    ) -> Self {
        Self { execution_id, events, outcome }
    }

    /// Next protocol event; `None` once the agent has terminated and the
    /// stream is drained.
    pub async fn next_event(&mut self) -> Option<ProtocolEvent> {
        self.events.recv().await
    }

    /// Await the final execution record. Call after draining the event
    /// stream.
    pub async fn wait(self) -> Result<AgentExecution, AgentError> {
        self.outcome.await.map_err(|e| AgentError::Join(e.to_string()))
    }

    /// Tear the run down immediately. The driver task is aborted, which
    /// drops the child with kill-on-drop and releases every handle.
    pub fn abort(&self) {
        self.outcome.abort();
    }
}

/// The one interface the orchestrator drives.
#[async_trait]
pub trait AgentFacade: Send + Sync + 'static {
    /// Launch an agent for `ctx`. The returned handle's execution
    /// progresses `Created → Running → {Completed, TimedOut, Failed}`.
    async fn spawn(&self, ctx: AgentContext) -> Result<AgentHandle, AgentError>;

    /// Implementation name recorded on executions.
    fn agent_kind(&self) -> &'static str;
}

/// Record one protocol event on the execution and forward it.
///
/// Shared by the real and fake facades so both produce identical
/// thinking-step and command trails.
pub(crate) fn record_event(
    execution: &mut AgentExecution,
    event: &ProtocolEvent,
    tx: &mpsc::UnboundedSender<ProtocolEvent>,
    epoch_ms: u64,
) {
    if let Some(record) = event.frame_record() {
        execution.push_frame(record);
    }
    match event {
        ProtocolEvent::Log { message, .. }
        | ProtocolEvent::Progress { message, .. }
        | ProtocolEvent::Checkpoint { message } => {
            execution.push_thinking_step(message.clone(), epoch_ms);
        }
        ProtocolEvent::Error { .. }
        | ProtocolEvent::TextChunk(_)
        | ProtocolEvent::FinalResult(_) => {}
    }
    // A dropped receiver just means nobody is routing events anymore.
    let _ = tx.send(event.clone());
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

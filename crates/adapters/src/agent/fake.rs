// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted agent facade for tests.
//!
//! Mirrors the real facade's observable behavior: it replays a scripted
//! event sequence through the same recording path, honors the resolved
//! timeout for hanging agents, and produces terminal executions with the
//! same state transitions.

use super::{record_event, AgentContext, AgentError, AgentFacade, AgentHandle};
use async_trait::async_trait;
use parking_lot::Mutex;
use sb_core::{AgentExecution, AgentResult, Clock, SystemClock};
use sb_protocol::ProtocolEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What the fake does when spawned.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Replay `events`, then complete with `result`.
    Complete { events: Vec<ProtocolEvent>, result: AgentResult },
    /// Replay `events`, then exit without a final result.
    NoResult { events: Vec<ProtocolEvent> },
    /// Never produce output; runs into the timeout.
    Hang,
    /// Refuse to start.
    StartError(String),
}

#[derive(Clone)]
pub struct FakeAgentFacade {
    behavior: Arc<Mutex<FakeBehavior>>,
    contexts: Arc<Mutex<Vec<AgentContext>>>,
}

impl FakeAgentFacade {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self { behavior: Arc::new(Mutex::new(behavior)), contexts: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Agent that immediately succeeds with `result`.
    pub fn completing(result: AgentResult) -> Self {
        Self::new(FakeBehavior::Complete { events: Vec::new(), result })
    }

    /// Agent that emits `events` and then succeeds with `result`.
    pub fn scripted(events: Vec<ProtocolEvent>, result: AgentResult) -> Self {
        Self::new(FakeBehavior::Complete { events, result })
    }

    /// Agent that hangs until the timeout fires.
    pub fn hanging() -> Self {
        Self::new(FakeBehavior::Hang)
    }

    /// Agent whose process cannot be launched.
    pub fn start_error(message: impl Into<String>) -> Self {
        Self::new(FakeBehavior::StartError(message.into()))
    }

    /// Change behavior for subsequent spawns.
    pub fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Every context this facade has been spawned with.
    pub fn contexts(&self) -> Vec<AgentContext> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl AgentFacade for FakeAgentFacade {
    async fn spawn(&self, ctx: AgentContext) -> Result<AgentHandle, AgentError> {
        self.contexts.lock().push(ctx.clone());
        let behavior = self.behavior.lock().clone();
        let timeout = ctx.timeout();
        let clock = SystemClock;

        if let FakeBehavior::StartError(message) = behavior {
            return Err(AgentError::Start(message));
        }

        let mut execution = AgentExecution::new(
            ctx.job_id.clone(),
            ctx.skill.clone(),
            self.agent_kind(),
            timeout.as_secs(),
            clock.epoch_ms(),
        );
        execution.mark_running(clock.epoch_ms());

        let (tx, rx) = mpsc::unbounded_channel();
        let execution_id = execution.execution_id.clone();
        let outcome = tokio::spawn(async move {
            match behavior {
                FakeBehavior::Complete { events, result } => {
                    for event in &events {
                        record_event(&mut execution, event, &tx, clock.epoch_ms());
                    }
                    execution.complete(result, clock.epoch_ms());
                }
                FakeBehavior::NoResult { events } => {
                    for event in &events {
                        record_event(&mut execution, event, &tx, clock.epoch_ms());
                    }
                    execution.fail(super::NO_RESULT_ERROR, clock.epoch_ms());
                }
                FakeBehavior::Hang => {
                    tokio::time::sleep(timeout).await;
                    execution.error_message =
                        Some(format!("agent timed out after {}s", timeout.as_secs()));
                    execution.time_out(clock.epoch_ms());
                }
                FakeBehavior::StartError(_) => {}
            }
            execution
        });

        Ok(AgentHandle::new(execution_id, rx, outcome))
    }

    fn agent_kind(&self) -> &'static str {
        "fake"
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent execution records.
//!
//! One [`AgentExecution`] describes a single run of the subprocess agent
//! bound to one job: its state machine, the thinking steps collected
//! from the control-frame stream, and the final result or failure.

use crate::job::JobId;
use crate::skill::Skill;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

crate::define_id! {
    /// Identifier for one agent invocation.
    pub struct ExecutionId;
}

/// State machine of one agent invocation.
///
/// `Created → Running → {Completed, TimedOut, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentExecutionState {
    Created,
    Running,
    Completed,
    TimedOut,
    Failed,
}

crate::str_enum! {
    AgentExecutionState {
        Created => "created",
        Running => "running",
        Completed => "completed",
        TimedOut => "timed_out",
        Failed => "failed",
    }
}

impl AgentExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentExecutionState::Completed
                | AgentExecutionState::TimedOut
                | AgentExecutionState::Failed
        )
    }
}

/// One entry in the agent's progress trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingStep {
    /// 1-based position in the trail.
    pub step: u32,
    pub timestamp_ms: u64,
    /// Time since the previous step (or since start, for the first).
    pub duration_ms: u64,
    pub thought: String,
}

/// Raw record of one control frame received from the subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// Outcome of a successful execution, emitted by the agent as its final
/// JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    #[serde(default)]
    pub changes_made: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_created: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_deleted: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Runtime record of one agent invocation.
///
/// Thinking steps are preserved on every exit path, including timeouts
/// and crashes. `final_result` is set iff the state is `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub execution_id: ExecutionId,
    pub job_id: JobId,
    pub skill: Skill,
    /// Agent implementation name; today only `claude`.
    pub agent_kind: String,
    pub state: AgentExecutionState,
    pub timeout_seconds: u64,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thinking_steps: Vec<ThinkingStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands_received: Vec<FrameRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<AgentResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AgentExecution {
    pub fn new(job_id: JobId, skill: Skill, agent_kind: &str, timeout_seconds: u64, epoch_ms: u64) -> Self {
        Self {
            execution_id: ExecutionId::random(),
            job_id,
            skill,
            agent_kind: agent_kind.to_string(),
            state: AgentExecutionState::Created,
            timeout_seconds,
            created_at_ms: epoch_ms,
            started_at_ms: None,
            completed_at_ms: None,
            thinking_steps: Vec::new(),
            commands_received: Vec::new(),
            final_result: None,
            error_message: None,
        }
    }

    pub fn mark_running(&mut self, epoch_ms: u64) {
        self.state = AgentExecutionState::Running;
        self.started_at_ms = Some(epoch_ms);
    }

    /// Append a thinking step, numbering it and computing the duration
    /// since the previous step.
    pub fn push_thinking_step(&mut self, thought: impl Into<String>, epoch_ms: u64) {
        let previous_ms = self
            .thinking_steps
            .last()
            .map(|s| s.timestamp_ms)
            .or(self.started_at_ms)
            .unwrap_or(self.created_at_ms);
        self.thinking_steps.push(ThinkingStep {
            step: self.thinking_steps.len() as u32 + 1,
            timestamp_ms: epoch_ms,
            duration_ms: epoch_ms.saturating_sub(previous_ms),
            thought: thought.into(),
        });
    }

    pub fn push_frame(&mut self, frame: FrameRecord) {
        self.commands_received.push(frame);
    }

    pub fn complete(&mut self, result: AgentResult, epoch_ms: u64) {
        self.state = AgentExecutionState::Completed;
        self.final_result = Some(result);
        self.completed_at_ms = Some(epoch_ms);
    }

    pub fn time_out(&mut self, epoch_ms: u64) {
        self.state = AgentExecutionState::TimedOut;
        self.completed_at_ms = Some(epoch_ms);
    }

    pub fn fail(&mut self, error: impl Into<String>, epoch_ms: u64) {
        self.state = AgentExecutionState::Failed;
        self.error_message = Some(error.into());
        self.completed_at_ms = Some(epoch_ms);
    }

    /// Wall-clock duration of the run, when it has both endpoints.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at_ms, self.completed_at_ms) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The claude subprocess facade.
//!
//! Launches the configured binary with the worktree as its working
//! directory, writes the rendered system prompt to stdin once, and
//! consumes stdout incrementally through the protocol parser. The skill
//! timeout is enforced here: an overrunning agent is SIGKILLed and its
//! thinking steps collected so far are preserved on the execution.

use super::{record_event, AgentContext, AgentError, AgentFacade, AgentHandle, SystemPrompt};
use async_trait::async_trait;
use sb_core::{AgentExecution, Clock, SystemClock};
use sb_protocol::{Parser, ProtocolEvent};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::mpsc;

/// Bytes of stderr retained for failure diagnostics.
const STDERR_TAIL_CAP: usize = 4096;

/// Grace given to the process between stdout EOF and exit.
const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClaudeAgentFacade<C: Clock = SystemClock> {
    binary: PathBuf,
    args: Vec<String>,
    prompt: Arc<SystemPrompt>,
    clock: C,
}

impl ClaudeAgentFacade<SystemClock> {
    pub fn new(binary: impl Into<PathBuf>, prompt: Arc<SystemPrompt>) -> Self {
        Self::with_clock(binary, prompt, SystemClock)
    }
}

impl<C: Clock> ClaudeAgentFacade<C> {
    pub fn with_clock(binary: impl Into<PathBuf>, prompt: Arc<SystemPrompt>, clock: C) -> Self {
        Self { binary: binary.into(), args: Vec::new(), prompt, clock }
    }

    /// Extra arguments passed to the agent binary.
    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }
}

#[async_trait]
impl<C: Clock> AgentFacade for ClaudeAgentFacade<C> {
    async fn spawn(&self, ctx: AgentContext) -> Result<AgentHandle, AgentError> {
        let timeout = ctx.timeout();
        let mut execution = AgentExecution::new(
            ctx.job_id.clone(),
            ctx.skill.clone(),
            self.agent_kind(),
            timeout.as_secs(),
            self.clock.epoch_ms(),
        );
        let rendered = self.prompt.render(&ctx);

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(&self.args)
            .current_dir(&ctx.worktree_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| AgentError::Start(format!("{}: {e}", self.binary.display())))?;

        execution.mark_running(self.clock.epoch_ms());
        tracing::info!(
            job_id = %ctx.job_id,
            skill = %ctx.skill,
            timeout_s = timeout.as_secs(),
            worktree = %ctx.worktree_path.display(),
            "agent spawned"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let execution_id = execution.execution_id.clone();
        let clock = self.clock.clone();
        let outcome = tokio::spawn(drive(child, rendered, execution, tx, timeout, clock));
        Ok(AgentHandle::new(execution_id, rx, outcome))
    }

    fn agent_kind(&self) -> &'static str {
        "claude"
    }
}

/// Own the child to completion. Always returns a terminal execution and
/// never holds a handle past exit.
async fn drive<C: Clock>(
    mut child: Child,
    prompt: Arc<String>,
    mut execution: AgentExecution,
    tx: mpsc::UnboundedSender<ProtocolEvent>,
    timeout: Duration,
    clock: C,
) -> AgentExecution {
    // Stream stdin once, then close it so the agent sees EOF.
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
            tracing::warn!(error = %e, "failed to write system prompt to agent stdin");
        }
    }

    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut tail: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while let Ok(n) = stderr.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_CAP {
                    let cut = tail.len() - STDERR_TAIL_CAP;
                    tail.drain(..cut);
                }
            }
            String::from_utf8_lossy(&tail).into_owned()
        })
    });

    let mut parser = Parser::new();
    let deadline = tokio::time::Instant::now() + timeout;
    let mut timed_out = false;

    if let Some(mut stdout) = child.stdout.take() {
        let mut buf = [0u8; 8192];
        loop {
            match tokio::time::timeout_at(deadline, stdout.read(&mut buf)).await {
                Err(_) => {
                    timed_out = true;
                    break;
                }
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    for event in parser.feed(&buf[..n]) {
                        record_event(&mut execution, &event, &tx, clock.epoch_ms());
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "error reading agent stdout");
                    break;
                }
            }
        }
    }

    if timed_out {
        tracing::warn!(
            execution_id = %execution.execution_id,
            timeout_s = timeout.as_secs(),
            "agent timed out; killing"
        );
        let _ = child.start_kill();
        let _ = child.wait().await;
        execution.error_message = Some(format!("agent timed out after {}s", timeout.as_secs()));
        execution.time_out(clock.epoch_ms());
        return execution;
    }

    // stdout closed: flush the parser, then give the process a short
    // grace to exit.
    let mut final_result = None;
    for event in parser.finish() {
        if let ProtocolEvent::FinalResult(result) = &event {
            final_result = Some(result.clone());
        }
        record_event(&mut execution, &event, &tx, clock.epoch_ms());
    }

    let status = match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to reap agent process");
            None
        }
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            None
        }
    };

    let stderr_tail = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    let now = clock.epoch_ms();
    match status {
        Some(status) if status.success() => match final_result {
            Some(result) => execution.complete(result, now),
            None => {
                execution.fail(super::NO_RESULT_ERROR, now);
            }
        },
        Some(status) => {
            let mut message = format!("agent exited with {status}");
            if !stderr_tail.is_empty() {
                message.push_str("; stderr: ");
                message.push_str(stderr_tail.trim_end());
            }
            execution.fail(message, now);
        }
        None => {
            execution.fail("agent did not exit after closing stdout", now);
        }
    }
    execution
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;

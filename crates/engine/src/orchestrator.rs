// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-workspace worker loop.
//!
//! One orchestrator instance runs per workspace: it claims jobs from the
//! durable queue, provisions a worktree, brackets the agent run with
//! snapshots, routes control frames into thinking steps and progress
//! events, reconciles the outcome (commit/push/PR under the autonomy
//! gates), and publishes every lifecycle transition on the event bus.

use crate::hooks::PullRequestHook;
use crate::retry::{backoff_delay, JobError, MAX_ATTEMPTS};
use crate::snapshot::SnapshotService;
use crate::worktree::{WorktreeManager, WorktreeStatus};
use sb_adapters::git;
use sb_adapters::{AgentContext, AgentError, AgentFacade, NO_RESULT_ERROR};
use sb_bus::EventBus;
use sb_core::{
    AgentExecutionState, AgentResult, Clock, CorrelationId, DomainEvent, EventPayload, Snapshot,
    SystemClock, WebhookJob, WorkspaceConfig,
};
use sb_protocol::ProtocolEvent;
use sb_queue::{CompletionRecord, JobFailure, JobQueue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which pipeline stages actually run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    /// Agent reads and comments only: no commit, no push, no PR.
    Analysis,
    /// Commit and push, but no PR creation.
    Development,
    /// No-op placeholder that only publishes lifecycle events.
    Review,
    /// The full pipeline.
    #[default]
    Publish,
}

sb_core::str_enum! {
    AutonomyLevel {
        Analysis => "analysis",
        Development => "development",
        Review => "review",
        Publish => "publish",
    }
}

impl AutonomyLevel {
    fn commits(&self) -> bool {
        matches!(self, AutonomyLevel::Development | AutonomyLevel::Publish)
    }

    fn opens_prs(&self) -> bool {
        matches!(self, AutonomyLevel::Publish)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub workspace: WorkspaceConfig,
    pub autonomy: AutonomyLevel,
    /// Bound on each queue wait; also the idle loop cadence.
    pub poll_timeout: Duration,
    /// How long an in-flight agent gets to finish at shutdown.
    pub shutdown_grace: Duration,
    pub max_attempts: u32,
    /// Explicit agent timeout; overrides the per-skill table.
    pub agent_timeout: Option<Duration>,
}

impl OrchestratorConfig {
    pub fn new(workspace: WorkspaceConfig) -> Self {
        Self {
            workspace,
            autonomy: AutonomyLevel::default(),
            poll_timeout: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
            max_attempts: MAX_ATTEMPTS,
            agent_timeout: None,
        }
    }

    pub fn autonomy(mut self, autonomy: AutonomyLevel) -> Self {
        self.autonomy = autonomy;
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = Some(timeout);
        self
    }
}

/// What one processed job ended as; returned for observability in tests
/// and logs, the queue record is the durable truth.
#[derive(Debug)]
enum JobOutcome {
    Completed,
    Failed(JobError),
}

pub struct JobOrchestrator<C: Clock = SystemClock> {
    config: OrchestratorConfig,
    queue: Arc<dyn JobQueue>,
    bus: Arc<EventBus>,
    worktrees: Arc<WorktreeManager<C>>,
    snapshots: SnapshotService<C>,
    agent: Arc<dyn AgentFacade>,
    pr_hook: Option<Arc<dyn PullRequestHook>>,
    clock: C,
    shutdown: CancellationToken,
}

impl<C: Clock> JobOrchestrator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        queue: Arc<dyn JobQueue>,
        bus: Arc<EventBus>,
        worktrees: Arc<WorktreeManager<C>>,
        snapshots: SnapshotService<C>,
        agent: Arc<dyn AgentFacade>,
        pr_hook: Option<Arc<dyn PullRequestHook>>,
        clock: C,
    ) -> Self {
        Self {
            config,
            queue,
            bus,
            worktrees,
            snapshots,
            agent,
            pr_hook,
            clock,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the loop and tears down in-flight work.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Main loop: runs until the shutdown token fires.
    pub async fn run(&self) {
        tracing::info!(
            workspace = %self.config.workspace.id,
            autonomy = %self.config.autonomy,
            "orchestrator started"
        );
        loop {
            let job = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.queue.wait_for_dequeue(self.config.poll_timeout) => match result {
                    Ok(Some(job)) => job,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "queue wait failed; backing off");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                },
            };
            self.process(job).await;
        }
        tracing::info!(workspace = %self.config.workspace.id, "orchestrator stopped");
    }

    /// Drive one claimed job to a terminal state.
    pub async fn process(&self, job: WebhookJob) {
        let job_id = job.job_id.clone();
        let started = self.clock.now();
        tracing::info!(job_id = %job_id, skill = %job.skill, attempt = job.attempt, "processing job");

        let outcome = if self.config.autonomy == AutonomyLevel::Review {
            self.process_review_placeholder(&job).await
        } else {
            self.process_inner(job.clone()).await
        };

        let elapsed_ms = self.clock.now().duration_since(started).as_millis() as u64;
        match outcome {
            JobOutcome::Completed => {
                tracing::info!(job_id = %job_id, elapsed_ms, "job completed");
            }
            JobOutcome::Failed(error) => {
                tracing::warn!(job_id = %job_id, elapsed_ms, error = %error, "job failed");
                self.handle_failure(&job, error).await;
            }
        }
    }

    /// Review autonomy: publish the lifecycle without touching git or
    /// the agent.
    async fn process_review_placeholder(&self, job: &WebhookJob) -> JobOutcome {
        self.publish(
            &job.event.correlation_id,
            EventPayload::JobStarted {
                job_id: job.job_id.clone(),
                issue_number: job.issue_number(),
                skill: job.skill.clone(),
                worktree_path: PathBuf::new(),
                branch_name: String::new(),
                attempt: job.attempt,
            },
        );
        let result = AgentResult {
            success: true,
            message: "review placeholder: no action taken".to_string(),
            ..AgentResult::default()
        };
        if let Err(e) = self.queue.complete(
            &job.job_id,
            CompletionRecord { result, snapshot_before: None, snapshot_after: None },
        ) {
            tracing::error!(job_id = %job.job_id, error = %e, "failed to complete placeholder job");
        }
        self.publish(
            &job.event.correlation_id,
            EventPayload::JobCompleted {
                job_id: job.job_id.clone(),
                issue_number: job.issue_number(),
                changes_made: false,
                message: "review placeholder".to_string(),
                duration_ms: 0,
            },
        );
        JobOutcome::Completed
    }

    async fn process_inner(&self, mut job: WebhookJob) -> JobOutcome {
        let correlation = job.event.correlation_id.clone();
        let source = job.event.source.to_string();

        // Provision the scratch tree.
        let worktree = match self
            .worktrees
            .create(&source, &job.event.event_type, &job.event.external_id, &job.short_hash)
            .await
        {
            Ok(worktree) => worktree,
            Err(e) => return JobOutcome::Failed(JobError::WorktreeCreation(e)),
        };

        job.start(worktree.path.clone(), worktree.branch.clone(), self.clock.epoch_ms());
        self.publish(
            &correlation,
            EventPayload::JobStarted {
                job_id: job.job_id.clone(),
                issue_number: job.issue_number(),
                skill: job.skill.clone(),
                worktree_path: worktree.path.clone(),
                branch_name: worktree.branch.clone(),
                attempt: job.attempt,
            },
        );

        let snap_before = match self.snapshots.capture(&worktree.path).await {
            Ok(snapshot) => snapshot,
            Err(e) => return JobOutcome::Failed(JobError::Snapshot(e)),
        };

        // Run the agent, routing frames as they stream.
        let execution = match self.run_agent(&job, &worktree.path, &worktree.branch).await {
            Ok(execution) => execution,
            Err(error) => return JobOutcome::Failed(error),
        };

        let result = match execution.state {
            AgentExecutionState::Completed => match execution.final_result.clone() {
                Some(result) if result.success => result,
                Some(result) => {
                    return JobOutcome::Failed(JobError::AgentReportedFailure(result.message));
                }
                None => {
                    // complete() always sets the result; treat a missing
                    // one as an invalid report rather than panicking.
                    return JobOutcome::Failed(JobError::AgentResultInvalid(
                        "completed execution without result".to_string(),
                    ));
                }
            },
            AgentExecutionState::TimedOut => {
                return JobOutcome::Failed(JobError::AgentTimeout {
                    seconds: execution.timeout_seconds,
                });
            }
            _ => {
                let message = execution.error_message.clone().unwrap_or_default();
                if message == NO_RESULT_ERROR {
                    return JobOutcome::Failed(JobError::AgentResultInvalid(message));
                }
                return JobOutcome::Failed(JobError::AgentCrash {
                    message,
                    stderr_tail: None,
                });
            }
        };

        self.reconcile_success(&job, &worktree.name, &worktree.path, snap_before, result, &execution)
            .await
    }

    /// Spawn the agent and consume its stream, honoring shutdown.
    async fn run_agent(
        &self,
        job: &WebhookJob,
        worktree_path: &std::path::Path,
        branch_name: &str,
    ) -> Result<sb_core::AgentExecution, JobError> {
        let issue = job.event.issue.clone().unwrap_or_default();
        let repo_name = issue.repo.clone().unwrap_or_else(|| {
            self.config
                .workspace
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let ctx = AgentContext {
            job_id: job.job_id.clone(),
            worktree_path: worktree_path.to_path_buf(),
            issue_number: job.issue_number(),
            issue_title: issue.title,
            repo_name,
            branch_name: branch_name.to_string(),
            skill: job.skill.clone(),
            correlation_id: job.event.correlation_id.clone(),
            timeout_override: self.config.agent_timeout,
        };

        let mut handle = match self.agent.spawn(ctx).await {
            Ok(handle) => handle,
            Err(AgentError::Start(message)) => return Err(JobError::AgentStart(message)),
            Err(e) => return Err(JobError::AgentStart(e.to_string())),
        };

        let correlation = job.event.correlation_id.clone();
        let mut step_count: u32 = 0;
        loop {
            tokio::select! {
                event = handle.next_event() => match event {
                    Some(event) => {
                        step_count += 1;
                        self.route_frame(job, &correlation, &event, step_count);
                    }
                    None => break,
                },
                _ = self.shutdown.cancelled() => {
                    return self.finish_agent_on_shutdown(handle).await;
                }
            }
        }

        handle.wait().await.map_err(|e| JobError::AgentCrash {
            message: e.to_string(),
            stderr_tail: None,
        })
    }

    /// Bounded grace for an in-flight agent once shutdown is signalled.
    async fn finish_agent_on_shutdown(
        &self,
        mut handle: sb_adapters::AgentHandle,
    ) -> Result<sb_core::AgentExecution, JobError> {
        tracing::info!(grace = ?self.config.shutdown_grace, "shutdown: draining in-flight agent");
        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            while handle.next_event().await.is_some() {}
        })
        .await;
        match drained {
            Ok(()) => handle.wait().await.map_err(|e| JobError::AgentCrash {
                message: e.to_string(),
                stderr_tail: None,
            }),
            Err(_) => {
                handle.abort();
                Err(JobError::Shutdown)
            }
        }
    }

    /// Map a streamed protocol event to progress on the bus.
    fn route_frame(
        &self,
        job: &WebhookJob,
        correlation: &CorrelationId,
        event: &ProtocolEvent,
        step_count: u32,
    ) {
        let (step, total_steps, message) = match event {
            ProtocolEvent::Progress { percent, message } => {
                (u32::from(*percent), Some(100), message.clone())
            }
            ProtocolEvent::Checkpoint { message } | ProtocolEvent::Log { message, .. } => {
                (step_count, None, message.clone())
            }
            ProtocolEvent::Error { message, kind } => {
                tracing::warn!(job_id = %job.job_id, kind = %kind, error = %message, "agent reported error frame");
                return;
            }
            ProtocolEvent::TextChunk(_) | ProtocolEvent::FinalResult(_) => return,
        };
        self.publish(
            correlation,
            EventPayload::JobProgressed {
                job_id: job.job_id.clone(),
                issue_number: job.issue_number(),
                step,
                total_steps,
                message,
            },
        );
    }

    /// Commit/push/PR under the autonomy gates, validate and clean the
    /// worktree, then mark the job complete.
    async fn reconcile_success(
        &self,
        job: &WebhookJob,
        worktree_name: &str,
        worktree_path: &std::path::Path,
        snap_before: Snapshot,
        mut result: AgentResult,
        execution: &sb_core::AgentExecution,
    ) -> JobOutcome {
        let correlation = job.event.correlation_id.clone();

        let snap_after = match self.snapshots.capture(worktree_path).await {
            Ok(snapshot) => snapshot,
            Err(e) => return JobOutcome::Failed(JobError::Snapshot(e)),
        };

        if result.changes_made && self.config.autonomy.commits() {
            let summary = if result.message.is_empty() {
                format!("skybridge: {} for {}", job.skill, job.job_id)
            } else {
                result.message.clone()
            };

            if let Err(e) = git::add_all(worktree_path).await {
                return JobOutcome::Failed(JobError::Commit(e));
            }
            let commit_hash = match git::commit(worktree_path, &summary).await {
                Ok(hash) => hash,
                Err(e) => return JobOutcome::Failed(JobError::Commit(e)),
            };
            result.commit_hash = Some(commit_hash.clone());
            self.publish(
                &correlation,
                EventPayload::JobCommitted {
                    job_id: job.job_id.clone(),
                    commit_hash,
                    message: summary,
                },
            );

            let branch = job.branch_name.clone().unwrap_or_default();
            if let Err(e) = git::push(worktree_path, &branch).await {
                return JobOutcome::Failed(JobError::Push(e));
            }
            self.publish(
                &correlation,
                EventPayload::JobPushed { job_id: job.job_id.clone(), branch_name: branch },
            );

            if self.config.autonomy.opens_prs() {
                if let Some(hook) = &self.pr_hook {
                    match hook.create(job, &result).await {
                        Ok(pr_url) => {
                            result.pr_url = Some(pr_url.clone());
                            self.publish(
                                &correlation,
                                EventPayload::PRCreated {
                                    job_id: job.job_id.clone(),
                                    issue_number: job.issue_number(),
                                    pr_url,
                                },
                            );
                        }
                        Err(e) => return JobOutcome::Failed(JobError::PrCreation(e)),
                    }
                }
            }
        }

        let changes_made = result.changes_made;
        let message = result.message.clone();
        if let Err(e) = self.queue.complete(
            &job.job_id,
            CompletionRecord {
                result,
                snapshot_before: Some(snap_before.clone()),
                snapshot_after: Some(snap_after.clone()),
            },
        ) {
            tracing::error!(job_id = %job.job_id, error = %e, "failed to record completion");
        }
        self.publish(
            &correlation,
            EventPayload::JobCompleted {
                job_id: job.job_id.clone(),
                issue_number: job.issue_number(),
                changes_made,
                message,
                duration_ms: execution.duration_ms().unwrap_or(0),
            },
        );

        // Decide whether the scratch tree can go.
        match self.worktrees.validate_removal(worktree_name).await {
            Ok(validation) if validation.can_remove => {
                match self.worktrees.remove(worktree_name, false).await {
                    Ok(()) => {
                        self.publish(
                            &correlation,
                            EventPayload::WorktreeRemoved {
                                job_id: job.job_id.clone(),
                                worktree_name: worktree_name.to_string(),
                            },
                        );
                    }
                    Err(e) => {
                        tracing::warn!(worktree = worktree_name, error = %e, "worktree removal failed");
                    }
                }
            }
            Ok(validation) => {
                let _ = self.worktrees.record(
                    worktree_name,
                    WorktreeStatus::Completed,
                    Some(snap_before),
                    Some(snap_after),
                );
                self.publish(
                    &correlation,
                    EventPayload::WorktreeRetained {
                        job_id: job.job_id.clone(),
                        worktree_name: worktree_name.to_string(),
                        reason: validation.reason,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(worktree = worktree_name, error = %e, "removal validation failed");
            }
        }
        JobOutcome::Completed
    }

    /// Terminal failure: record it, publish it, and schedule a retry
    /// when the classification allows one. The worktree is retained for
    /// debugging on every failure path.
    async fn handle_failure(&self, job: &WebhookJob, error: JobError) {
        let correlation = job.event.correlation_id.clone();
        let retryable = error.is_transient() && job.attempt + 1 < self.config.max_attempts;

        if let Err(e) = self.queue.fail(
            &job.job_id,
            JobFailure {
                message: error.to_string(),
                error_type: error.error_type().to_string(),
                retryable,
                stderr_tail: error.stderr_tail().map(str::to_string),
            },
        ) {
            tracing::error!(job_id = %job.job_id, error = %e, "failed to record failure");
        }

        self.publish(
            &correlation,
            EventPayload::JobFailed {
                job_id: job.job_id.clone(),
                issue_number: job.issue_number(),
                error_type: error.error_type().to_string(),
                message: error.to_string(),
                retryable: error.is_transient(),
                attempt: job.attempt,
            },
        );

        // The tree stays on disk for debugging; only the recorded
        // status changes.
        let name = crate::worktree::worktree_name(
            &job.event.source.to_string(),
            &job.event.event_type,
            &job.event.external_id,
            &job.short_hash,
        );
        let _ = self.worktrees.record(&name, WorktreeStatus::Failed, None, None);

        if !retryable {
            return;
        }
        let Some(delay) = backoff_delay(job.attempt) else {
            return;
        };

        let retry = job.retry_record(&self.clock);
        self.publish(
            &correlation,
            EventPayload::JobRetried {
                job_id: retry.job_id.clone(),
                previous_job_id: job.job_id.clone(),
                attempt: retry.attempt,
                delay_seconds: delay.as_secs(),
            },
        );

        let queue = Arc::clone(&self.queue);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    // Losing the backoff is fine: enqueue now and let the
                    // next daemon run pick it up on schedule.
                }
            }
            if let Err(e) = queue.enqueue(&retry) {
                tracing::error!(job_id = %retry.job_id, error = %e, "retry enqueue failed");
            }
        });
    }

    fn publish(&self, correlation: &CorrelationId, payload: EventPayload) {
        self.bus.publish(DomainEvent::new(&self.clock, correlation.clone(), payload));
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

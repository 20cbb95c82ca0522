// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hooks::FakePullRequestHook;
use async_trait::async_trait;
use parking_lot::Mutex;
use sb_adapters::{FakeAgentFacade, FakeBehavior};
use sb_core::{
    FakeClock, IssueRef, JobStatus, MetricsStore, Skill, WebhookEvent, WorkspaceId,
};
use sb_protocol::LogLevel;
use sb_queue::{FileJobQueue, QueueConfig};
use std::process::Command;
use tempfile::TempDir;
use tokio::sync::broadcast;

struct Fixture {
    _repo: TempDir,
    _base: TempDir,
    _queue_dir: TempDir,
    repo_path: std::path::PathBuf,
    queue: Arc<FileJobQueue>,
    bus: Arc<EventBus>,
    /// Publication-ordered event feed (taken before any publish).
    stream: Mutex<broadcast::Receiver<DomainEvent>>,
    worktrees: Arc<WorktreeManager>,
}

impl Fixture {
    fn new(with_remote: bool) -> Self {
        let repo = TempDir::new().unwrap();
        let sh = |dir: &std::path::Path, args: &[&str]| {
            let out = Command::new("git")
                .args(args)
                .current_dir(dir)
                .env_remove("GIT_DIR")
                .env_remove("GIT_WORK_TREE")
                .output()
                .unwrap();
            assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
        };
        sh(repo.path(), &["init", "-b", "main"]);
        sh(repo.path(), &["config", "user.email", "test@test.com"]);
        sh(repo.path(), &["config", "user.name", "Test"]);
        std::fs::write(repo.path().join("README.md"), "# Test\n").unwrap();
        sh(repo.path(), &["add", "."]);
        sh(repo.path(), &["commit", "-m", "initial"]);

        if with_remote {
            let remote = TempDir::new().unwrap();
            sh(remote.path(), &["init", "--bare"]);
            sh(repo.path(), &["remote", "add", "origin", &remote.path().display().to_string()]);
            sh(repo.path(), &["push", "origin", "main"]);
            // Keep the bare remote alive for the whole test process.
            std::mem::forget(remote);
        }

        let base = TempDir::new().unwrap();
        let queue_dir = TempDir::new().unwrap();
        let queue = Arc::new(
            FileJobQueue::open(
                QueueConfig::new(queue_dir.path()),
                SystemClock,
                Arc::new(MetricsStore::new()),
            )
            .unwrap(),
        );
        let bus = Arc::new(EventBus::new(WorkspaceId::core()));
        let stream = Mutex::new(bus.stream());
        let worktrees = Arc::new(WorktreeManager::new(repo.path(), base.path()));

        Self {
            repo_path: repo.path().to_path_buf(),
            _repo: repo,
            _base: base,
            _queue_dir: queue_dir,
            queue,
            bus,
            stream,
            worktrees,
        }
    }

    fn orchestrator(
        &self,
        agent: Arc<dyn AgentFacade>,
        autonomy: AutonomyLevel,
        pr_hook: Option<Arc<dyn PullRequestHook>>,
    ) -> JobOrchestrator {
        let config = OrchestratorConfig::new(WorkspaceConfig::new("core", &self.repo_path))
            .autonomy(autonomy)
            .agent_timeout(Duration::from_millis(200));
        JobOrchestrator::new(
            config,
            Arc::clone(&self.queue) as Arc<dyn JobQueue>,
            Arc::clone(&self.bus),
            Arc::clone(&self.worktrees),
            SnapshotService::new(),
            agent,
            pr_hook,
            SystemClock,
        )
    }

    /// Enqueue + dequeue a fresh job so `process` can run it.
    fn claimed_job(&self, issue: u64) -> WebhookJob {
        let event = WebhookEvent::builder()
            .external_id(issue.to_string())
            .issue(IssueRef {
                number: issue,
                title: format!("Issue {issue}"),
                ..IssueRef::default()
            })
            .build();
        let job = WebhookJob::new(event, Skill::new("resolve-issue"), &FakeClock::new());
        self.queue.enqueue(&job).unwrap();
        self.queue.dequeue().unwrap().unwrap()
    }

    /// Events published so far, in publication order.
    fn drain_events(&self) -> Vec<DomainEvent> {
        let mut stream = self.stream.lock();
        let mut events = Vec::new();
        while let Ok(event) = stream.try_recv() {
            events.push(event);
        }
        events
    }

    fn event_names(&self) -> Vec<String> {
        self.drain_events().iter().map(|e| e.name().to_string()).collect()
    }
}

fn success_result(changes: bool) -> AgentResult {
    AgentResult {
        success: true,
        changes_made: changes,
        files_modified: if changes { vec!["README.md".to_string()] } else { Vec::new() },
        message: "patched the readme".to_string(),
        ..AgentResult::default()
    }
}

/// An agent that actually edits the worktree it is given.
struct EditingAgent {
    inner: FakeAgentFacade,
}

#[async_trait]
impl AgentFacade for EditingAgent {
    async fn spawn(
        &self,
        ctx: sb_adapters::AgentContext,
    ) -> Result<sb_adapters::AgentHandle, sb_adapters::AgentError> {
        std::fs::write(ctx.worktree_path.join("README.md"), "# Fixed\n")
            .map_err(|e| sb_adapters::AgentError::Start(e.to_string()))?;
        self.inner.spawn(ctx).await
    }

    fn agent_kind(&self) -> &'static str {
        "fake"
    }
}

#[tokio::test]
async fn happy_path_publishes_full_event_sequence() {
    let f = Fixture::new(true);
    let agent = Arc::new(EditingAgent {
        inner: FakeAgentFacade::scripted(
            vec![
                sb_protocol::ProtocolEvent::Progress { percent: 50, message: "halfway".to_string() },
                sb_protocol::ProtocolEvent::Checkpoint { message: "edited".to_string() },
            ],
            success_result(true),
        ),
    });
    let hook = Arc::new(FakePullRequestHook::new());
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, Some(hook.clone()));

    let job = f.claimed_job(7);
    orch.process(job.clone()).await;

    let names = f.event_names();
    let lifecycle: Vec<&str> =
        names.iter().map(String::as_str).filter(|n| *n != "JobProgressed").collect();
    assert_eq!(
        lifecycle,
        vec!["JobStarted", "JobCommitted", "JobPushed", "PRCreated", "JobCompleted", "WorktreeRemoved"],
    );
    assert!(names.contains(&"JobProgressed".to_string()));
    assert_eq!(hook.calls(), vec![job.job_id.clone()]);

    // Terminal record carries result and both snapshots.
    let (status, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Completed);
    let result = record.result.unwrap();
    assert!(result.success);
    assert!(result.commit_hash.is_some());
    assert!(result.pr_url.is_some());
    assert!(record.snapshot_before.is_some());
    assert!(record.snapshot_after.is_some());
}

#[tokio::test]
async fn worktree_removed_after_clean_push() {
    let f = Fixture::new(true);
    let agent = Arc::new(EditingAgent { inner: FakeAgentFacade::completing(success_result(true)) });
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    orch.process(f.claimed_job(8)).await;

    assert!(f.event_names().contains(&"WorktreeRemoved".to_string()));
    assert!(f.worktrees.list().unwrap().is_empty());
}

#[tokio::test]
async fn no_changes_skips_commit_and_push() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::completing(success_result(false)));
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    orch.process(f.claimed_job(9)).await;

    let names = f.event_names();
    assert!(!names.contains(&"JobCommitted".to_string()));
    assert!(!names.contains(&"JobPushed".to_string()));
    assert!(names.contains(&"JobCompleted".to_string()));
}

#[tokio::test]
async fn analysis_autonomy_suppresses_commit_even_with_changes() {
    let f = Fixture::new(false);
    let agent = Arc::new(EditingAgent { inner: FakeAgentFacade::completing(success_result(true)) });
    let orch = f.orchestrator(agent, AutonomyLevel::Analysis, None);

    orch.process(f.claimed_job(10)).await;

    let names = f.event_names();
    assert!(!names.contains(&"JobCommitted".to_string()));
    assert!(!names.contains(&"PRCreated".to_string()));
    assert!(names.contains(&"JobCompleted".to_string()));
    // The edit stayed uncommitted, so the tree is retained.
    assert!(names.contains(&"WorktreeRetained".to_string()));
}

#[tokio::test]
async fn development_autonomy_commits_but_opens_no_pr() {
    let f = Fixture::new(true);
    let agent = Arc::new(EditingAgent { inner: FakeAgentFacade::completing(success_result(true)) });
    let hook = Arc::new(FakePullRequestHook::new());
    let orch = f.orchestrator(agent, AutonomyLevel::Development, Some(hook.clone()));

    orch.process(f.claimed_job(11)).await;

    let names = f.event_names();
    assert!(names.contains(&"JobCommitted".to_string()));
    assert!(names.contains(&"JobPushed".to_string()));
    assert!(!names.contains(&"PRCreated".to_string()));
    assert!(hook.calls().is_empty());
}

#[tokio::test]
async fn review_autonomy_is_a_pure_event_placeholder() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::completing(success_result(true)));
    let orch = f.orchestrator(agent.clone(), AutonomyLevel::Review, None);

    let job = f.claimed_job(12);
    orch.process(job.clone()).await;

    assert_eq!(f.event_names(), vec!["JobStarted", "JobCompleted"]);
    // No agent, no worktree.
    assert!(agent.contexts().is_empty());
    assert!(f.worktrees.list().unwrap().is_empty());
    let (status, _) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Completed);
}

#[tokio::test]
async fn timeout_fails_retryable_and_retains_worktree() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::hanging());
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    let job = f.claimed_job(13);
    orch.process(job.clone()).await;

    let names = f.event_names();
    assert!(names.contains(&"JobFailed".to_string()));
    assert!(names.contains(&"JobRetried".to_string()));
    assert!(!names.contains(&"WorktreeRemoved".to_string()));

    let (status, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.error_type, "AgentTimeout");
    assert!(error.retryable);

    // Worktree retained for debugging, marked failed.
    let worktrees = f.worktrees.list().unwrap();
    assert_eq!(worktrees.len(), 1);
    assert_eq!(worktrees[0].status, WorktreeStatus::Failed);
}

#[tokio::test]
async fn agent_reported_failure_is_terminal() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::completing(AgentResult {
        success: false,
        message: "cannot reproduce the issue".to_string(),
        ..AgentResult::default()
    }));
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    let job = f.claimed_job(14);
    orch.process(job.clone()).await;

    let names = f.event_names();
    assert!(names.contains(&"JobFailed".to_string()));
    assert!(!names.contains(&"JobRetried".to_string()));

    let (_, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(record.error.unwrap().error_type, "AgentReportedFailure");
}

#[tokio::test]
async fn no_result_exit_is_agent_result_invalid() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::new(FakeBehavior::NoResult { events: Vec::new() }));
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    let job = f.claimed_job(15);
    orch.process(job.clone()).await;

    let (_, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    let error = record.error.unwrap();
    assert_eq!(error.error_type, "AgentResultInvalid");
    assert!(!error.retryable);
}

#[tokio::test]
async fn start_error_is_retryable() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::start_error("binary missing"));
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    let job = f.claimed_job(16);
    orch.process(job.clone()).await;

    let names = f.event_names();
    assert!(names.contains(&"JobRetried".to_string()));
    let (_, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    let error = record.error.unwrap();
    assert_eq!(error.error_type, "AgentStartError");
    assert!(error.retryable);
}

#[tokio::test]
async fn retries_exhaust_at_max_attempts() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::hanging());
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    // Third attempt (attempt = 2): transient failure but budget spent.
    let mut job = f.claimed_job(17);
    job.attempt = 2;
    orch.process(job.clone()).await;

    let names = f.event_names();
    assert!(names.contains(&"JobFailed".to_string()));
    assert!(!names.contains(&"JobRetried".to_string()));
    let (_, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert!(!record.error.unwrap().retryable);
}

#[tokio::test]
async fn push_failure_without_remote_is_terminal() {
    let f = Fixture::new(false); // no origin configured
    let agent = Arc::new(EditingAgent { inner: FakeAgentFacade::completing(success_result(true)) });
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    let job = f.claimed_job(18);
    orch.process(job.clone()).await;

    let names = f.event_names();
    assert!(names.contains(&"JobCommitted".to_string()));
    assert!(names.contains(&"JobFailed".to_string()));
    let (_, record) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(record.error.unwrap().error_type, "PushRejected");
}

#[tokio::test]
async fn run_loop_drains_queue_until_shutdown() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::completing(success_result(false)));
    let orch = Arc::new(f.orchestrator(agent, AutonomyLevel::Publish, None));

    let event = WebhookEvent::builder()
        .external_id("20")
        .issue(IssueRef { number: 20, title: "a".to_string(), ..IssueRef::default() })
        .build();
    let job = WebhookJob::new(event, Skill::default(), &FakeClock::new());
    f.queue.enqueue(&job).unwrap();

    let shutdown = orch.shutdown_token();
    let runner = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run().await })
    };

    // Wait for the job to reach a terminal state.
    for _ in 0..100 {
        if matches!(f.queue.find(&job.job_id).unwrap(), Some((JobStatus::Completed, _))) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    shutdown.cancel();
    runner.await.unwrap();

    let (status, _) = f.queue.find(&job.job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Completed);
}

#[tokio::test]
async fn progress_frames_republish_with_percent_totals() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::scripted(
        vec![
            sb_protocol::ProtocolEvent::Progress { percent: 30, message: "scanning".to_string() },
            sb_protocol::ProtocolEvent::Log { level: LogLevel::Info, message: "found it".to_string() },
        ],
        success_result(false),
    ));
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    orch.process(f.claimed_job(21)).await;

    let progressed: Vec<_> = f
        .drain_events()
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::JobProgressed { step, total_steps, message, .. } => {
                Some((*step, *total_steps, message.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(progressed.len(), 2);
    assert_eq!(progressed[0], (30, Some(100), "scanning".to_string()));
    assert_eq!(progressed[1].1, None);
}

#[tokio::test]
async fn events_carry_the_job_correlation_id() {
    let f = Fixture::new(false);
    let agent = Arc::new(FakeAgentFacade::completing(success_result(false)));
    let orch = f.orchestrator(agent, AutonomyLevel::Publish, None);

    let job = f.claimed_job(22);
    let correlation = job.event.correlation_id.clone();
    orch.process(job).await;

    let events = f.drain_events();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.correlation_id == correlation));
}

#[test]
fn autonomy_serde_round_trip() {
    for level in [
        AutonomyLevel::Analysis,
        AutonomyLevel::Development,
        AutonomyLevel::Review,
        AutonomyLevel::Publish,
    ] {
        let json = serde_json::to_string(&level).unwrap();
        let back: AutonomyLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, level);
    }
    assert_eq!(serde_json::to_string(&AutonomyLevel::Publish).unwrap(), "\"publish\"");
}

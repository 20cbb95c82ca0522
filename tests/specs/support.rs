// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared environment for the scenario tests: a real git repository
//! with a bare origin, one `core` workspace wired exactly the way the
//! daemon wires it, and a scripted agent.

use async_trait::async_trait;
use sb_adapters::{AgentFacade, FakeAgentFacade};
use sb_bus::EventBus;
use sb_core::{
    DomainEvent, EventKind, EventSource, MetricsStore, SystemClock, WorkspaceConfig, WorkspaceId,
};
use sb_daemon::intake::{sign, SignatureVerifier};
use sb_daemon::{IntakeHandler, IntakeRequest, OperatorSurface, WorkspaceHandle, WorkspaceRegistry};
use sb_engine::{
    AutonomyLevel, JobOrchestrator, OrchestratorConfig, SnapshotService, WorktreeManager,
};
use sb_kanban::{KanbanProjection, KanbanStore};
use sb_queue::{FileJobQueue, JobQueue, QueueConfig};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub const SECRET: &str = "spec-secret";

pub struct Env {
    pub state: TempDir,
    pub repo: TempDir,
    pub registry: Arc<WorkspaceRegistry>,
    pub intake: IntakeHandler,
    pub surface: OperatorSurface,
    pub stream: broadcast::Receiver<DomainEvent>,
    pub agent: FakeAgentFacade,
    agent_dyn: Arc<dyn AgentFacade>,
}

/// Wraps the scripted agent so it actually edits the worktree.
struct EditingAgent {
    inner: FakeAgentFacade,
    edit: bool,
}

#[async_trait]
impl AgentFacade for EditingAgent {
    async fn spawn(
        &self,
        ctx: sb_adapters::AgentContext,
    ) -> Result<sb_adapters::AgentHandle, sb_adapters::AgentError> {
        if self.edit {
            std::fs::write(ctx.worktree_path.join("README.md"), "# Fixed by agent\n")
                .map_err(|e| sb_adapters::AgentError::Start(e.to_string()))?;
        }
        self.inner.spawn(ctx).await
    }

    fn agent_kind(&self) -> &'static str {
        "fake"
    }
}

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .unwrap();
    assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
}

impl Env {
    /// Build the workspace. `edit` makes the agent modify the worktree
    /// before its scripted events play out.
    pub fn new(agent: FakeAgentFacade, edit: bool) -> Self {
        let state = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        git(repo.path(), &["init", "-b", "main"]);
        git(repo.path(), &["config", "user.email", "spec@test.com"]);
        git(repo.path(), &["config", "user.name", "Spec"]);
        std::fs::write(repo.path().join("README.md"), "# Spec repo\n").unwrap();
        git(repo.path(), &["add", "."]);
        git(repo.path(), &["commit", "-m", "initial"]);

        let remote = state.path().join("origin.git");
        std::fs::create_dir_all(&remote).unwrap();
        git(&remote, &["init", "--bare"]);
        git(repo.path(), &["remote", "add", "origin", &remote.display().to_string()]);
        git(repo.path(), &["push", "origin", "main"]);

        let metrics = Arc::new(MetricsStore::new());
        let queue = Arc::new(
            FileJobQueue::open(
                QueueConfig::new(state.path().join("queues/core"))
                    .recovery_grace(Duration::from_millis(100)),
                SystemClock,
                Arc::clone(&metrics),
            )
            .unwrap(),
        );
        let bus = Arc::new(EventBus::new(WorkspaceId::core()));
        let stream = bus.stream();
        let kanban =
            KanbanStore::open(&state.path().join("workspaces/core/data/kanban.db")).unwrap();
        let projection = Arc::new(KanbanProjection::new(kanban.clone()));
        for kind in [
            EventKind::IssueReceived,
            EventKind::JobStarted,
            EventKind::JobProgressed,
            EventKind::PRCreated,
            EventKind::JobCompleted,
            EventKind::JobFailed,
        ] {
            bus.subscribe(kind, Arc::clone(&projection) as _);
        }
        let worktrees = Arc::new(WorktreeManager::new(repo.path(), state.path().join("worktrees")));

        let mut registry = WorkspaceRegistry::new();
        registry.insert(WorkspaceHandle {
            config: WorkspaceConfig::new("core", repo.path()),
            queue,
            bus,
            kanban,
            worktrees,
            metrics,
            log_dir: state.path().join("logs/core"),
        });
        let registry = Arc::new(registry);

        let mut secrets = HashMap::new();
        secrets.insert(EventSource::Github, SECRET.to_string());
        let intake = IntakeHandler::new(
            SignatureVerifier::new(secrets),
            Arc::clone(&registry),
            vec![EventSource::Github],
        );
        let surface = OperatorSurface::new(Arc::clone(&registry), Some("spec-pass".to_string()));

        let agent_dyn: Arc<dyn AgentFacade> =
            Arc::new(EditingAgent { inner: agent.clone(), edit });

        Self { state, repo, registry, intake, surface, stream, agent, agent_dyn }
    }

    pub fn core(&self) -> Arc<WorkspaceHandle> {
        self.registry.core().unwrap()
    }

    pub fn orchestrator(&self) -> JobOrchestrator {
        let core = self.core();
        JobOrchestrator::new(
            OrchestratorConfig::new(core.config.clone())
                .autonomy(AutonomyLevel::Development)
                .agent_timeout(Duration::from_millis(300)),
            core.job_queue(),
            Arc::clone(&core.bus),
            Arc::clone(&core.worktrees),
            SnapshotService::new(),
            Arc::clone(&self.agent_dyn),
            None,
            SystemClock,
        )
    }

    /// Deliver a signed `issues.opened` webhook for issue `number`.
    pub async fn deliver_issue(&self, number: u64, delivery: &str) -> sb_daemon::IntakeResponse {
        let body = serde_json::json!({
            "action": "opened",
            "issue": {
                "number": number,
                "title": format!("Issue {number}"),
                "html_url": format!("https://example.invalid/issues/{number}"),
                "body": "something is wrong",
                "user": { "login": "reporter" },
                "labels": [{ "name": "bug" }]
            },
            "repository": { "full_name": "acme/widget" }
        })
        .to_string()
        .into_bytes();
        let signature = sign(SECRET, &body);
        self.intake
            .handle(
                IntakeRequest::new("github", body)
                    .with_header("x-github-event", "issues")
                    .with_header("x-hub-signature-256", signature)
                    .with_header("x-github-delivery", delivery),
            )
            .await
    }

    /// Claim the next job and drive it to a terminal state.
    pub async fn process_next(&self) {
        let core = self.core();
        let job = core.queue.dequeue().unwrap().expect("a pending job");
        self.orchestrator().process(job).await;
        core.bus.drain().await;
    }

    /// Names of all events published so far, in publication order.
    pub fn drain_event_names(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(event) = self.stream.try_recv() {
            names.push(event.name().to_string());
        }
        names
    }
}

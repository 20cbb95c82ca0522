// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.
//!
//! `Daemon::start` is the composition root: it builds every
//! per-workspace collaborator (queue with startup recovery, event bus,
//! kanban projection, notification sink, worktree manager), wires the
//! subscribers, spawns one orchestrator per workspace, and hands back
//! the intake handler and operator surface for the HTTP runtime to
//! mount.

use crate::env;
use crate::intake::{IntakeHandler, SignatureVerifier};
use crate::notifications::NotificationSink;
use crate::registry::{WorkspaceHandle, WorkspaceRegistry};
use crate::surface::OperatorSurface;
use sb_adapters::agent::PromptError;
use sb_adapters::{
    AgentFacade, ClaudeAgentFacade, DesktopNotifyAdapter, LogNotifyAdapter, NotifyAdapter,
    NotifyChannel, SystemPrompt,
};
use sb_bus::EventBus;
use sb_core::{EventKind, MetricsStore, SystemClock, WorkspaceConfig};
use sb_engine::{JobOrchestrator, OrchestratorConfig, SnapshotService, WorktreeManager};
use sb_kanban::{KanbanError, KanbanProjection, KanbanStore};
use sb_queue::{FileJobQueue, JobQueue, QueueConfig, QueueError};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Kanban(#[from] KanbanError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("unsupported queue provider: {0} (only `file` exists)")]
    UnsupportedQueueProvider(String),
    #[error("no enabled workspaces")]
    NoWorkspaces,
}

/// A running dispatcher.
pub struct Daemon {
    pub registry: Arc<WorkspaceRegistry>,
    pub intake: Arc<IntakeHandler>,
    pub surface: Arc<OperatorSurface>,
    orchestrators: Vec<(CancellationToken, tokio::task::JoinHandle<()>)>,
}

impl Daemon {
    /// Build and start everything for the given workspaces.
    pub async fn start(workspaces: Vec<WorkspaceConfig>) -> Result<Self, LifecycleError> {
        let provider = env::queue_provider();
        if provider != "file" {
            return Err(LifecycleError::UnsupportedQueueProvider(provider));
        }

        let prompt = Arc::new(match env::system_prompt_path() {
            Some(path) => SystemPrompt::load(&path)?,
            None => SystemPrompt::builtin(),
        });
        let agent: Arc<dyn AgentFacade> =
            Arc::new(ClaudeAgentFacade::new(env::agent_binary(), prompt));

        let mut registry = WorkspaceRegistry::new();
        for config in workspaces.into_iter().filter(|w| w.enabled) {
            registry.insert(Self::build_workspace(config)?);
        }
        let registry = Arc::new(registry);
        if registry.ids().is_empty() {
            return Err(LifecycleError::NoWorkspaces);
        }

        // One worker loop per workspace.
        let mut orchestrators = Vec::new();
        for handle in registry.handles() {
            let orchestrator = Arc::new(JobOrchestrator::new(
                OrchestratorConfig::new(handle.config.clone()),
                handle.job_queue(),
                Arc::clone(&handle.bus),
                Arc::clone(&handle.worktrees),
                SnapshotService::new(),
                Arc::clone(&agent),
                None,
                SystemClock,
            ));
            let token = orchestrator.shutdown_token();
            let task = tokio::spawn(async move { orchestrator.run().await });
            orchestrators.push((token, task));
        }

        let enabled = env::enabled_sources();
        let verifier = SignatureVerifier::from_env(&enabled);
        let intake = Arc::new(IntakeHandler::new(verifier, Arc::clone(&registry), enabled));
        let surface = Arc::new(OperatorSurface::new(Arc::clone(&registry), env::delete_password()));

        tracing::info!(
            workspaces = registry.ids().len(),
            version = env::VERSION,
            "skybridge daemon started"
        );
        Ok(Self { registry, intake, surface, orchestrators })
    }

    fn build_workspace(config: WorkspaceConfig) -> Result<WorkspaceHandle, LifecycleError> {
        let id = config.id.clone();
        let metrics = Arc::new(MetricsStore::new());

        let queue = Arc::new(FileJobQueue::open(
            QueueConfig::new(env::queue_base().join(id.as_str()))
                .recovery_grace(env::recovery_grace()),
            SystemClock,
            Arc::clone(&metrics),
        )?);
        // At-least-once: anything a dead worker left in processing/
        // goes back to the head of the queue.
        let recovered = queue.recover()?;
        if !recovered.is_empty() {
            tracing::info!(workspace = %id, count = recovered.len(), "recovered in-flight jobs");
        }

        let bus = Arc::new(EventBus::new(id.clone()));

        let kanban = KanbanStore::open(
            &env::workspaces_base().join(id.as_str()).join("data").join("kanban.db"),
        )?;
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

        let channels: Vec<Arc<dyn NotifyAdapter>> = env::notify_channels()
            .into_iter()
            .map(|channel| match channel {
                NotifyChannel::Log => Arc::new(LogNotifyAdapter) as Arc<dyn NotifyAdapter>,
                NotifyChannel::Desktop => Arc::new(DesktopNotifyAdapter::new()),
            })
            .collect();
        let sink = Arc::new(NotificationSink::new(channels));
        sink.subscribe(&bus);

        let worktrees = Arc::new(WorktreeManager::new(config.root.clone(), env::worktrees_base()));
        let log_dir = env::logs_base().join(id.as_str());

        Ok(WorkspaceHandle { config, queue, bus, kanban, worktrees, metrics, log_dir })
    }

    /// Stop every orchestrator, giving in-flight agents their grace.
    pub async fn shutdown(self) {
        tracing::info!("skybridge daemon shutting down");
        for (token, _) in &self.orchestrators {
            token.cancel();
        }
        for (_, task) in self.orchestrators {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "orchestrator task did not join cleanly");
            }
        }
        for handle in self.registry.handles() {
            handle.bus.drain().await;
        }
        tracing::info!("skybridge daemon stopped");
    }
}

/// Install the global tracing subscriber: env-filtered, with daily log
/// files under `{LOGS_BASE}/core/`.
///
/// Returns the appender guard; dropping it stops the background writer.
pub fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let log_dir = env::logs_base().join("core");
    let file_appender = tracing_appender::rolling::daily(log_dir, "skybridge.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_new(env::log_level())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon tests.

use crate::registry::{WorkspaceHandle, WorkspaceRegistry};
use sb_bus::EventBus;
use sb_core::{MetricsStore, SystemClock, WorkspaceConfig, WorkspaceId};
use sb_engine::WorktreeManager;
use sb_kanban::KanbanStore;
use sb_queue::{FileJobQueue, QueueConfig};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

/// Create a git repository with one commit.
pub fn setup_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let sh = |args: &[&str]| {
        let out = Command::new("git")
            .args(args)
            .current_dir(dir.path())
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .output()
            .unwrap();
        assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
    };
    sh(&["init", "-b", "main"]);
    sh(&["config", "user.email", "test@test.com"]);
    sh(&["config", "user.name", "Test"]);
    std::fs::write(dir.path().join("README.md"), "# Test\n").unwrap();
    sh(&["add", "."]);
    sh(&["commit", "-m", "initial"]);
    dir
}

/// Build a workspace handle with all state under `state_dir`.
pub fn workspace_handle(id: &str, repo_root: &Path, state_dir: &Path) -> WorkspaceHandle {
    let metrics = Arc::new(MetricsStore::new());
    let queue = Arc::new(
        FileJobQueue::open(
            QueueConfig::new(state_dir.join("queues").join(id)),
            SystemClock,
            Arc::clone(&metrics),
        )
        .unwrap(),
    );
    let bus = Arc::new(EventBus::new(WorkspaceId::new(id)));
    let kanban =
        KanbanStore::open(&state_dir.join("workspaces").join(id).join("kanban.db")).unwrap();
    let worktrees = Arc::new(WorktreeManager::new(repo_root, state_dir.join("worktrees")));

    WorkspaceHandle {
        config: WorkspaceConfig::new(id, repo_root),
        queue,
        bus,
        kanban,
        worktrees,
        metrics,
        log_dir: state_dir.join("logs").join(id),
    }
}

/// Registry with a single `core` workspace.
pub fn single_workspace_registry(repo_root: &Path, state_dir: &Path) -> Arc<WorkspaceRegistry> {
    let mut registry = WorkspaceRegistry::new();
    registry.insert(workspace_handle("core", repo_root, state_dir));
    Arc::new(registry)
}

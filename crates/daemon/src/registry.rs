// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace registry: `workspace_id → per-workspace collaborators`.
//!
//! Built once at startup and immutable for the run. Every intake and
//! operator request is tagged with a workspace id (the `X-Workspace`
//! header); a missing header means the `core` workspace. Read surfaces
//! fall back to `core` for unknown ids; write surfaces reject them.

use sb_bus::EventBus;
use sb_core::{MetricsStore, WorkspaceConfig, WorkspaceId};
use sb_engine::WorktreeManager;
use sb_kanban::KanbanStore;
use sb_queue::{FileJobQueue, JobQueue};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything scoped to one workspace.
pub struct WorkspaceHandle {
    pub config: WorkspaceConfig,
    pub queue: Arc<FileJobQueue>,
    pub bus: Arc<EventBus>,
    pub kanban: KanbanStore,
    pub worktrees: Arc<WorktreeManager>,
    pub metrics: Arc<MetricsStore>,
    pub log_dir: PathBuf,
}

impl WorkspaceHandle {
    /// The queue behind its migration-boundary trait.
    pub fn job_queue(&self) -> Arc<dyn JobQueue> {
        Arc::clone(&self.queue) as Arc<dyn JobQueue>
    }
}

/// All workspaces known to this daemon run.
#[derive(Default)]
pub struct WorkspaceRegistry {
    workspaces: HashMap<WorkspaceId, Arc<WorkspaceHandle>>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: WorkspaceHandle) {
        self.workspaces.insert(handle.config.id.clone(), Arc::new(handle));
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkspaceHandle>> {
        self.workspaces.get(id).cloned()
    }

    pub fn core(&self) -> Option<Arc<WorkspaceHandle>> {
        self.get(WorkspaceId::DEFAULT)
    }

    pub fn ids(&self) -> Vec<WorkspaceId> {
        let mut ids: Vec<WorkspaceId> = self.workspaces.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn handles(&self) -> impl Iterator<Item = &Arc<WorkspaceHandle>> {
        self.workspaces.values()
    }

    /// Read-surface resolution: missing or unknown ids fall back to
    /// `core`.
    pub fn resolve_read(&self, header: Option<&str>) -> Option<Arc<WorkspaceHandle>> {
        match header {
            Some(id) => self.get(id).or_else(|| self.core()),
            None => self.core(),
        }
    }

    /// Write-surface resolution: missing means `core`, unknown is an
    /// error surfaced to the caller as `None`.
    pub fn resolve_write(&self, header: Option<&str>) -> Option<Arc<WorkspaceHandle>> {
        match header {
            Some(id) => self.get(id),
            None => self.core(),
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

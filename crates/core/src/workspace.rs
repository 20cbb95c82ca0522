// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace identity and static configuration.
//!
//! A workspace is the tenancy boundary: every queue directory, kanban
//! database, event bus, and log directory belongs to exactly one
//! workspace. Workspaces are declared at startup and immutable for the
//! lifetime of a run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Opaque workspace identifier (e.g. `core`, `acme-payments`).
    pub struct WorkspaceId;
}

impl WorkspaceId {
    /// Name of the workspace used when a request does not carry one.
    pub const DEFAULT: &'static str = "core";

    /// The default `core` workspace.
    pub fn core() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::core()
    }
}

/// Static configuration for one workspace, declared at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub id: WorkspaceId,
    /// Canonical repository root the worktrees branch off.
    pub root: PathBuf,
    /// Disabled workspaces keep their data but accept no new jobs.
    pub enabled: bool,
}

impl WorkspaceConfig {
    pub fn new(id: impl Into<WorkspaceId>, root: impl Into<PathBuf>) -> Self {
        Self { id: id.into(), root: root.into(), enabled: true }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;

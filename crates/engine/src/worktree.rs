// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree manager: isolated scratch trees with unique naming.
//!
//! Each job attempt gets its own branch and directory, both suffixed
//! with the attempt's short hash, so retries, reopens, and duplicated
//! webhooks can never collide. Metadata lives beside the trees (under
//! `.meta/`), never inside them, so a worktree's git status reflects
//! only what the agent did.

use sb_adapters::git;
use sb_core::{Clock, ShortHash, Snapshot, SystemClock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error(transparent)]
    Git(#[from] git::GitError),
    #[error("worktree metadata I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("worktree metadata corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("worktree not found: {0}")]
    NotFound(String),
    #[error("removal refused: {0}")]
    RemovalRefused(String),
}

/// Lifecycle status recorded in worktree metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    Processing,
    Completed,
    Failed,
    #[default]
    Unknown,
}

sb_core::str_enum! {
    WorktreeStatus {
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Unknown => "unknown",
    }
}

/// One scratch tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub name: String,
    pub path: PathBuf,
    pub branch: String,
    pub status: WorktreeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_before: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_after: Option<Snapshot>,
    pub created_at_ms: u64,
}

/// Outcome of a removal check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalValidation {
    pub can_remove: bool,
    pub reason: String,
    /// Dirty-path counts backing the decision.
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    pub unpushed: u32,
}

/// `skybridge-{source}-{event_type}-{external_id}-{short_hash}`
pub fn worktree_name(source: &str, event_type: &str, external_id: &str, hash: &ShortHash) -> String {
    format!("skybridge-{source}-{event_type}-{external_id}-{hash}")
}

/// `webhook/{source}/issue/{external_id}/{short_hash}`
pub fn branch_name(source: &str, external_id: &str, hash: &ShortHash) -> String {
    format!("webhook/{source}/issue/{external_id}/{hash}")
}

/// Creates, inspects, validates, and removes scratch trees.
///
/// The manager exclusively owns directory creation and removal; other
/// components get a shared read-only view via [`Worktree`].
pub struct WorktreeManager<C: Clock = SystemClock> {
    /// Canonical repository the branches are created in.
    repo_root: PathBuf,
    /// Directory the scratch trees are materialized under.
    base_dir: PathBuf,
    clock: C,
}

impl WorktreeManager<SystemClock> {
    pub fn new(repo_root: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(repo_root, base_dir, SystemClock)
    }
}

impl<C: Clock> WorktreeManager<C> {
    pub fn with_clock(repo_root: impl Into<PathBuf>, base_dir: impl Into<PathBuf>, clock: C) -> Self {
        Self { repo_root: repo_root.into(), base_dir: base_dir.into(), clock }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(".meta").join(format!("{name}.json"))
    }

    fn write_meta(&self, worktree: &Worktree) -> Result<(), WorktreeError> {
        let path = self.meta_path(&worktree.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec_pretty(worktree)?)?;
        Ok(())
    }

    /// Create the branch and scratch tree for one job attempt.
    ///
    /// Idempotent: when the branch already exists, the recorded worktree
    /// is returned as-is.
    pub async fn create(
        &self,
        source: &str,
        event_type: &str,
        external_id: &str,
        hash: &ShortHash,
    ) -> Result<Worktree, WorktreeError> {
        let name = worktree_name(source, event_type, external_id, hash);
        let branch = branch_name(source, external_id, hash);
        let path = self.base_dir.join(&name);

        if git::branch_exists(&self.repo_root, &branch).await? {
            if let Ok(existing) = self.status(&name).await {
                tracing::debug!(name, "worktree already exists; reusing");
                return Ok(existing);
            }
            // Branch without a tree (e.g. manual cleanup): rematerialize.
            git::worktree_add_existing(&self.repo_root, &path, &branch).await?;
        } else {
            git::worktree_add(&self.repo_root, &path, &branch, "HEAD").await?;
        }

        let worktree = Worktree {
            name: name.clone(),
            path,
            branch,
            status: WorktreeStatus::Processing,
            snapshot_before: None,
            snapshot_after: None,
            created_at_ms: self.clock.epoch_ms(),
        };
        self.write_meta(&worktree)?;
        tracing::info!(name, branch = %worktree.branch, "worktree created");
        Ok(worktree)
    }

    /// Read a worktree's recorded metadata.
    pub async fn status(&self, name: &str) -> Result<Worktree, WorktreeError> {
        let path = self.meta_path(name);
        if !path.exists() {
            return Err(WorktreeError::NotFound(name.to_string()));
        }
        let worktree: Worktree = serde_json::from_slice(&std::fs::read(&path)?)?;
        if !worktree.path.exists() {
            return Err(WorktreeError::NotFound(name.to_string()));
        }
        Ok(worktree)
    }

    /// All recorded worktrees, including ones whose tree is gone.
    pub fn list(&self) -> Result<Vec<Worktree>, WorktreeError> {
        let meta_dir = self.base_dir.join(".meta");
        let mut worktrees = Vec::new();
        if !meta_dir.exists() {
            return Ok(worktrees);
        }
        for entry in std::fs::read_dir(meta_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match serde_json::from_slice::<Worktree>(&std::fs::read(&path)?) {
                    Ok(worktree) => worktrees.push(worktree),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping bad metadata");
                    }
                }
            }
        }
        worktrees.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(worktrees)
    }

    /// Update the recorded status and snapshots.
    pub fn record(
        &self,
        name: &str,
        status: WorktreeStatus,
        snapshot_before: Option<Snapshot>,
        snapshot_after: Option<Snapshot>,
    ) -> Result<(), WorktreeError> {
        let path = self.meta_path(name);
        if !path.exists() {
            return Err(WorktreeError::NotFound(name.to_string()));
        }
        let mut worktree: Worktree = serde_json::from_slice(&std::fs::read(&path)?)?;
        worktree.status = status;
        if snapshot_before.is_some() {
            worktree.snapshot_before = snapshot_before;
        }
        if snapshot_after.is_some() {
            worktree.snapshot_after = snapshot_after;
        }
        self.write_meta(&worktree)
    }

    /// Decide whether a tree can be removed without losing work.
    ///
    /// `can_remove` is true iff nothing is staged, nothing is modified,
    /// and no commit is unpushed. Untracked files do not block removal
    /// but are called out in the reason.
    pub async fn validate_removal(&self, name: &str) -> Result<RemovalValidation, WorktreeError> {
        let worktree = self.status(name).await?;
        let status = git::status(&worktree.path).await?;
        let unpushed = git::unpushed_count(&worktree.path).await?;

        let can_remove = status.is_clean() && unpushed == 0;
        let mut reasons = Vec::new();
        if !status.staged.is_empty() {
            reasons.push(format!("{} staged path(s)", status.staged.len()));
        }
        if !status.unstaged.is_empty() {
            reasons.push(format!("{} modified path(s)", status.unstaged.len()));
        }
        if unpushed > 0 {
            reasons.push(format!("{unpushed} unpushed commit(s)"));
        }
        if !status.untracked.is_empty() {
            reasons.push(format!("{} untracked path(s) (not blocking)", status.untracked.len()));
        }
        let reason = if reasons.is_empty() { "clean".to_string() } else { reasons.join(", ") };

        Ok(RemovalValidation {
            can_remove,
            reason,
            staged: status.staged.len(),
            unstaged: status.unstaged.len(),
            untracked: status.untracked.len(),
            unpushed,
        })
    }

    /// Remove a tree. Without `force`, validation must allow it.
    pub async fn remove(&self, name: &str, force: bool) -> Result<(), WorktreeError> {
        let worktree = self.status(name).await?;
        if !force {
            let validation = self.validate_removal(name).await?;
            if !validation.can_remove {
                return Err(WorktreeError::RemovalRefused(validation.reason));
            }
        }
        git::worktree_remove(&self.repo_root, &worktree.path, force).await?;
        let _ = std::fs::remove_file(self.meta_path(name));
        tracing::info!(name, force, "worktree removed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;

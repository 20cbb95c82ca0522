// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot service: before/after state capture for worktrees.
//!
//! A capture walks the tree once: branch, HEAD, status counts, a file
//! inventory with content hashes, and a unified diff for every dirty
//! tracked path. The resulting [`Snapshot`]s are embedded in terminal
//! queue records and are the sole trusted source of "what did the agent
//! change?".

use sb_adapters::git;
use sb_core::{Clock, FileStat, Snapshot, SnapshotDiff, SystemClock};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Git(#[from] git::GitError),
    #[error("snapshot I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotService<C: Clock = SystemClock> {
    clock: C,
}

impl SnapshotService<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> SnapshotService<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Capture the current state of a worktree.
    pub async fn capture(&self, worktree: &Path) -> Result<Snapshot, SnapshotError> {
        let branch = git::current_branch(worktree).await?;
        let head_commit = git::head_commit(worktree).await?;
        let status = git::status(worktree).await?;

        let mut files = Vec::new();
        for path in git::ls_files(worktree).await? {
            let absolute = worktree.join(&path);
            let Ok(bytes) = tokio::fs::read(&absolute).await else {
                // Deleted-but-tracked paths show up in ls-files; the
                // status counts already reflect them.
                continue;
            };
            files.push(FileStat {
                path,
                size: bytes.len() as u64,
                hash: hex_digest(&bytes),
            });
        }

        let mut diffs = BTreeMap::new();
        for path in status.staged.iter().chain(status.unstaged.iter()) {
            if diffs.contains_key(path) {
                continue;
            }
            match git::diff_path(worktree, path).await {
                Ok(diff) if !diff.is_empty() => {
                    diffs.insert(path.clone(), diff);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path, error = %e, "diff capture failed");
                }
            }
        }

        Ok(Snapshot {
            branch,
            head_commit,
            staged: status.staged.len() as u32,
            unstaged: status.unstaged.len() as u32,
            untracked: status.untracked.len() as u32,
            files,
            diffs,
            captured_at_ms: self.clock.epoch_ms(),
        })
    }

    /// Aggregate deltas between two captures.
    pub fn diff(&self, before: &Snapshot, after: &Snapshot) -> SnapshotDiff {
        before.diff(after)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;

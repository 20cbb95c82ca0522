// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree snapshot value types.
//!
//! A snapshot captures the state of a scratch tree at one moment: the
//! branch, HEAD commit, dirty-path counts, a file inventory, and the
//! unified diff per dirty path. Two snapshots bracket every agent run
//! and their diff is the sole trusted answer to "what did the agent
//! change?".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inventory entry for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub path: String,
    pub size: u64,
    /// Content hash (sha256, hex).
    pub hash: String,
}

/// Captured state of a worktree at a moment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub branch: String,
    pub head_commit: String,
    pub staged: u32,
    pub unstaged: u32,
    pub untracked: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileStat>,
    /// Unified diff per dirty path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub diffs: BTreeMap<String, String>,
    pub captured_at_ms: u64,
}

impl Snapshot {
    /// True when nothing is staged or modified (untracked files allowed).
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0
    }

    /// Aggregate what changed between `self` (before) and `after`.
    pub fn diff(&self, after: &Snapshot) -> SnapshotDiff {
        let before_files: BTreeMap<&str, &FileStat> =
            self.files.iter().map(|f| (f.path.as_str(), f)).collect();
        let after_files: BTreeMap<&str, &FileStat> =
            after.files.iter().map(|f| (f.path.as_str(), f)).collect();

        let mut files_added = Vec::new();
        let mut files_modified = Vec::new();
        let mut files_deleted = Vec::new();

        for (path, stat) in &after_files {
            match before_files.get(path) {
                None => files_added.push((*path).to_string()),
                Some(before) if before.hash != stat.hash => {
                    files_modified.push((*path).to_string());
                }
                Some(_) => {}
            }
        }
        for path in before_files.keys() {
            if !after_files.contains_key(path) {
                files_deleted.push((*path).to_string());
            }
        }

        let (lines_added, lines_removed) = count_diff_lines(after.diffs.values());

        SnapshotDiff {
            files_added,
            files_modified,
            files_deleted,
            lines_added,
            lines_removed,
            diffs: after.diffs.clone(),
        }
    }
}

/// Aggregate delta between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_added: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_deleted: Vec<String>,
    pub lines_added: u64,
    pub lines_removed: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub diffs: BTreeMap<String, String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.files_added.is_empty()
            && self.files_modified.is_empty()
            && self.files_deleted.is_empty()
    }
}

/// Count `+`/`-` body lines across unified diffs, skipping headers.
fn count_diff_lines<'a>(diffs: impl Iterator<Item = &'a String>) -> (u64, u64) {
    let mut added = 0;
    let mut removed = 0;
    for diff in diffs {
        for line in diff.lines() {
            if line.starts_with("+++") || line.starts_with("---") {
                continue;
            }
            if line.starts_with('+') {
                added += 1;
            } else if line.starts_with('-') {
                removed += 1;
            }
        }
    }
    (added, removed)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git adapter: every git invocation the system makes.
//!
//! Plain async functions over the `git` CLI, each bounded by a timeout.
//! `GIT_DIR`/`GIT_WORK_TREE` are scrubbed from the environment so
//! invocations behave the same whether the daemon was started from
//! inside a repository or not.

use crate::subprocess::{run_with_timeout, SubprocessError, LOCAL_GIT_TIMEOUT, NETWORK_TIMEOUT};
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("invalid utf-8 in git output")]
    InvalidUtf8,
}

impl GitError {
    /// Push/fetch failures caused by the network or lock contention are
    /// retryable; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            GitError::Subprocess(SubprocessError::TimedOut { .. }) => true,
            GitError::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("could not resolve host")
                    || stderr.contains("connection")
                    || stderr.contains("index.lock")
                    || stderr.contains("unable to access")
            }
            _ => false,
        }
    }
}

fn git(repo: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    cmd
}

async fn run(repo: &Path, args: &[&str], timeout: std::time::Duration) -> Result<String, GitError> {
    let mut cmd = git(repo);
    cmd.args(args);
    let label = format!("git {}", args.first().copied().unwrap_or(""));
    let output = run_with_timeout(cmd, timeout, &label).await?;
    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    String::from_utf8(output.stdout).map_err(|_| GitError::InvalidUtf8)
}

/// Current branch name (`HEAD` when detached).
pub async fn current_branch(repo: &Path) -> Result<String, GitError> {
    Ok(run(repo, &["rev-parse", "--abbrev-ref", "HEAD"], LOCAL_GIT_TIMEOUT).await?.trim().to_string())
}

/// Commit id of `HEAD`; empty string for a repository with no commits.
pub async fn head_commit(repo: &Path) -> Result<String, GitError> {
    match run(repo, &["rev-parse", "HEAD"], LOCAL_GIT_TIMEOUT).await {
        Ok(out) => Ok(out.trim().to_string()),
        Err(GitError::CommandFailed { .. }) => Ok(String::new()),
        Err(e) => Err(e),
    }
}

/// Parsed `git status --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub untracked: Vec<String>,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }

    /// Paths that differ from HEAD in any way.
    pub fn dirty_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .staged
            .iter()
            .chain(self.unstaged.iter())
            .chain(self.untracked.iter())
            .cloned()
            .collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// Read and classify the working-tree status.
pub async fn status(repo: &Path) -> Result<GitStatus, GitError> {
    let out = run(repo, &["status", "--porcelain"], LOCAL_GIT_TIMEOUT).await?;
    let mut status = GitStatus::default();
    for line in out.lines() {
        if line.len() < 4 {
            continue;
        }
        let (index, worktree) = (line.as_bytes()[0], line.as_bytes()[1]);
        let path = line[3..].trim().to_string();
        if index == b'?' && worktree == b'?' {
            status.untracked.push(path);
            continue;
        }
        if index != b' ' {
            status.staged.push(path.clone());
        }
        if worktree != b' ' {
            status.unstaged.push(path);
        }
    }
    Ok(status)
}

/// All files in the tree: tracked plus untracked (excluding ignored).
pub async fn ls_files(repo: &Path) -> Result<Vec<String>, GitError> {
    let tracked = run(repo, &["ls-files"], LOCAL_GIT_TIMEOUT).await?;
    let untracked =
        run(repo, &["ls-files", "--others", "--exclude-standard"], LOCAL_GIT_TIMEOUT).await?;
    let mut files: Vec<String> =
        tracked.lines().chain(untracked.lines()).map(str::to_string).collect();
    files.sort_unstable();
    files.dedup();
    Ok(files)
}

/// Unified diff of one path against HEAD.
pub async fn diff_path(repo: &Path, path: &str) -> Result<String, GitError> {
    run(repo, &["diff", "HEAD", "--", path], LOCAL_GIT_TIMEOUT).await
}

pub async fn branch_exists(repo: &Path, branch: &str) -> Result<bool, GitError> {
    let mut cmd = git(repo);
    cmd.args(["rev-parse", "--verify", &format!("refs/heads/{branch}")]);
    let output = run_with_timeout(cmd, LOCAL_GIT_TIMEOUT, "git rev-parse").await?;
    Ok(output.status.success())
}

/// Create `branch` at `start_point` and materialize a worktree for it.
pub async fn worktree_add(
    repo: &Path,
    worktree_path: &Path,
    branch: &str,
    start_point: &str,
) -> Result<(), GitError> {
    if let Some(parent) = worktree_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| GitError::CommandFailed {
            command: "worktree add".to_string(),
            stderr: format!("failed to create worktree parent dir: {e}"),
        })?;
    }
    let path = worktree_path.display().to_string();
    run(repo, &["worktree", "add", "-b", branch, &path, start_point], LOCAL_GIT_TIMEOUT)
        .await
        .map(|_| ())
}

/// Materialize a worktree for an existing branch.
pub async fn worktree_add_existing(
    repo: &Path,
    worktree_path: &Path,
    branch: &str,
) -> Result<(), GitError> {
    let path = worktree_path.display().to_string();
    run(repo, &["worktree", "add", &path, branch], LOCAL_GIT_TIMEOUT).await.map(|_| ())
}

pub async fn worktree_remove(repo: &Path, worktree_path: &Path, force: bool) -> Result<(), GitError> {
    let path = worktree_path.display().to_string();
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(&path);
    run(repo, &args, LOCAL_GIT_TIMEOUT).await.map(|_| ())
}

pub async fn add_all(repo: &Path) -> Result<(), GitError> {
    run(repo, &["add", "-A"], LOCAL_GIT_TIMEOUT).await.map(|_| ())
}

/// Commit staged changes and return the new commit id.
pub async fn commit(repo: &Path, message: &str) -> Result<String, GitError> {
    run(repo, &["commit", "-m", message], LOCAL_GIT_TIMEOUT).await?;
    head_commit(repo).await
}

/// Push `branch`, setting its upstream on the first push.
pub async fn push(repo: &Path, branch: &str) -> Result<(), GitError> {
    run(repo, &["push", "--set-upstream", "origin", branch], NETWORK_TIMEOUT).await.map(|_| ())
}

/// Commits on `HEAD` not reachable from any remote ref.
pub async fn unpushed_count(repo: &Path) -> Result<u32, GitError> {
    let out = run(repo, &["rev-list", "--count", "HEAD", "--not", "--remotes"], LOCAL_GIT_TIMEOUT)
        .await?;
    Ok(out.trim().parse().unwrap_or(0))
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file lock guarding the queue's critical sections.
//!
//! Uses `fs2` exclusive locks on a dedicated `.lock` file so multiple
//! daemon processes can share one queue directory. The lock is held for
//! the duration of one mutation only; blocking waits are acceptable
//! because critical sections are a handful of small file operations.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Handle to the queue's `.lock` file.
#[derive(Debug)]
pub struct QueueLock {
    path: PathBuf,
}

impl QueueLock {
    pub fn new(queue_dir: &Path) -> Self {
        Self { path: queue_dir.join(".lock") }
    }

    /// Acquire the exclusive lock, blocking until it is available.
    pub fn acquire(&self) -> std::io::Result<QueueLockGuard> {
        let file = OpenOptions::new().create(true).write(true).truncate(false).open(&self.path)?;
        file.lock_exclusive()?;
        Ok(QueueLockGuard { file })
    }
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct QueueLockGuard {
    file: File,
}

impl Drop for QueueLockGuard {
    fn drop(&mut self) {
        // Dropping the descriptor would release the lock anyway; unlock
        // explicitly so errors are at least observable under strace.
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn acquire_creates_lock_file() {
    let dir = TempDir::new().unwrap();
    let lock = QueueLock::new(dir.path());

    let guard = lock.acquire().unwrap();
    assert!(dir.path().join(".lock").exists());
    drop(guard);
}

#[test]
fn reacquire_after_drop() {
    let dir = TempDir::new().unwrap();
    let lock = QueueLock::new(dir.path());

    drop(lock.acquire().unwrap());
    drop(lock.acquire().unwrap());
}

#[test]
fn lock_excludes_other_threads() {
    let dir = TempDir::new().unwrap();
    let lock = std::sync::Arc::new(QueueLock::new(dir.path()));
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let lock = lock.clone();
        let counter = counter.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..10 {
                let _guard = lock.acquire().unwrap();
                // Read-modify-write under the lock must never lose updates.
                let seen = counter.load(std::sync::atomic::Ordering::SeqCst);
                std::thread::yield_now();
                counter.store(seen + 1, std::sync::atomic::Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 40);
}

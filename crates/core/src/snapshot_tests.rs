// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn stat(path: &str, hash: &str) -> FileStat {
    FileStat { path: path.to_string(), size: 10, hash: hash.to_string() }
}

#[test]
fn clean_snapshot_allows_untracked() {
    let snap = Snapshot { untracked: 3, ..Snapshot::default() };
    assert!(snap.is_clean());

    let snap = Snapshot { staged: 1, ..Snapshot::default() };
    assert!(!snap.is_clean());

    let snap = Snapshot { unstaged: 2, ..Snapshot::default() };
    assert!(!snap.is_clean());
}

#[test]
fn diff_classifies_added_modified_deleted() {
    let before = Snapshot {
        files: vec![stat("kept.rs", "aaa"), stat("changed.rs", "bbb"), stat("gone.rs", "ccc")],
        ..Snapshot::default()
    };
    let after = Snapshot {
        files: vec![stat("kept.rs", "aaa"), stat("changed.rs", "new"), stat("fresh.rs", "ddd")],
        ..Snapshot::default()
    };

    let diff = before.diff(&after);
    assert_eq!(diff.files_added, vec!["fresh.rs"]);
    assert_eq!(diff.files_modified, vec!["changed.rs"]);
    assert_eq!(diff.files_deleted, vec!["gone.rs"]);
    assert!(!diff.is_empty());
}

#[test]
fn diff_of_identical_snapshots_is_empty() {
    let snap = Snapshot { files: vec![stat("a.rs", "aaa")], ..Snapshot::default() };
    assert!(snap.diff(&snap.clone()).is_empty());
}

#[test]
fn diff_counts_lines_skipping_headers() {
    let mut diffs = BTreeMap::new();
    diffs.insert(
        "a.rs".to_string(),
        "--- a/a.rs\n+++ b/a.rs\n@@ -1,2 +1,3 @@\n context\n+added one\n+added two\n-removed one\n"
            .to_string(),
    );
    let before = Snapshot::default();
    let after = Snapshot { diffs, ..Snapshot::default() };

    let diff = before.diff(&after);
    assert_eq!(diff.lines_added, 2);
    assert_eq!(diff.lines_removed, 1);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    hello_world = { "hello-world", 60 },
    bug_simple = { "bug-simple", 300 },
    bug_complex = { "bug-complex", 600 },
    refactor = { "refactor", 900 },
    resolve_issue = { "resolve-issue", 600 },
)]
fn catalog_timeouts(name: &str, secs: u64) {
    assert_eq!(Skill::new(name).timeout(), Duration::from_secs(secs));
    assert!(Skill::new(name).is_known());
}

#[test]
fn unknown_skill_uses_default_timeout() {
    let skill = Skill::new("write-poetry");
    assert!(!skill.is_known());
    assert_eq!(skill.timeout(), DEFAULT_TIMEOUT);
}

#[test]
fn default_skill_is_resolve_issue() {
    assert_eq!(Skill::default(), "resolve-issue");
}

#[test]
fn serde_is_transparent() {
    let skill = Skill::new("refactor");
    assert_eq!(serde_json::to_string(&skill).unwrap(), "\"refactor\"");
}

#[test]
fn catalog_lists_every_entry() {
    let names: Vec<String> = Skill::catalog().map(|(s, _)| s.to_string()).collect();
    assert_eq!(
        names,
        vec!["hello-world", "bug-simple", "bug-complex", "refactor", "resolve-issue"]
    );
}

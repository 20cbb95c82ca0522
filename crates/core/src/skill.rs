// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Skill catalog.
//!
//! A skill names an agent behavior and parameterizes its timeout and the
//! system prompt context. The catalog is a static table: skills arrive
//! with jobs as plain strings, and unknown names fall back to the
//! default timeout rather than failing the job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout applied when a skill has no catalog entry and no override.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Per-skill timeouts. Unknown skills use [`DEFAULT_TIMEOUT`].
const CATALOG: &[(&str, u64)] = &[
    ("hello-world", 60),
    ("bug-simple", 300),
    ("bug-complex", 600),
    ("refactor", 900),
    ("resolve-issue", 600),
];

/// A named agent behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Skill(String);

impl Skill {
    /// The skill used when a job does not name one.
    pub const DEFAULT: &'static str = "resolve-issue";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the skill has an entry in the static catalog.
    pub fn is_known(&self) -> bool {
        CATALOG.iter().any(|(name, _)| *name == self.0)
    }

    /// Timeout for one agent invocation of this skill.
    pub fn timeout(&self) -> Duration {
        CATALOG
            .iter()
            .find(|(name, _)| *name == self.0)
            .map(|(_, secs)| Duration::from_secs(*secs))
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// All catalog entries, for the discovery surface.
    pub fn catalog() -> impl Iterator<Item = (Skill, Duration)> {
        CATALOG.iter().map(|(name, secs)| (Skill::new(*name), Duration::from_secs(*secs)))
    }
}

impl Default for Skill {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Skill {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Skill {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Skill {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Skill {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Skill {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
#[path = "skill_tests.rs"]
mod tests;

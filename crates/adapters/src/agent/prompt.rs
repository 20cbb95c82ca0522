// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System prompt template loading and rendering.
//!
//! The template (`system_prompt.json`) is read once at startup and never
//! reloaded mid-run. Rendering substitutes the per-job placeholders and
//! caches the result under a content address, so repeated invocations
//! with identical context share one rendered string.

use super::AgentContext;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read system prompt: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid system prompt JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk shape of `system_prompt.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub version: u32,
    pub template: PromptBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBody {
    pub role: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// Loaded template plus the rendered-prompt cache.
#[derive(Debug)]
pub struct SystemPrompt {
    template: PromptTemplate,
    cache: Mutex<HashMap<String, Arc<String>>>,
}

impl SystemPrompt {
    pub fn load(path: &Path) -> Result<Self, PromptError> {
        let template: PromptTemplate = serde_json::from_slice(&std::fs::read(path)?)?;
        Ok(Self { template, cache: Mutex::new(HashMap::new()) })
    }

    /// Built-in template used when no `system_prompt.json` is deployed.
    pub fn builtin() -> Self {
        let template = PromptTemplate {
            version: 1,
            template: PromptBody {
                role: "You are an autonomous software agent working in the git worktree \
                       {worktree_path} on a checkout of {repo_name}, branch {branch_name}."
                    .to_string(),
                instructions: vec![
                    "Resolve issue #{issue_number}: {issue_title}".to_string(),
                    "Apply the {skill} skill.".to_string(),
                    "Report progress with <skybridge_command> control frames.".to_string(),
                    "When finished, print a single JSON object with the fields success, \
                     changes_made, files_created, files_modified, files_deleted, commit_hash, \
                     pr_url, and message."
                        .to_string(),
                ],
                rules: vec![
                    "Work only inside {worktree_path}.".to_string(),
                    "Reason from the issue and the code in front of you; never apply \
                     memorized pattern heuristics."
                        .to_string(),
                    "Do not push or open pull requests yourself; the dispatcher does that."
                        .to_string(),
                ],
            },
        };
        Self { template, cache: Mutex::new(HashMap::new()) }
    }

    pub fn version(&self) -> u32 {
        self.template.version
    }

    /// Render the prompt for a job, reusing the cached copy when the
    /// substituted content is identical.
    pub fn render(&self, ctx: &AgentContext) -> Arc<String> {
        let body = self.render_uncached(ctx);
        let key = hex_digest(&body);
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(&key) {
            return Arc::clone(cached);
        }
        let rendered = Arc::new(body);
        cache.insert(key, Arc::clone(&rendered));
        rendered
    }

    /// Number of distinct rendered prompts currently cached.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    fn render_uncached(&self, ctx: &AgentContext) -> String {
        let body = &self.template.template;
        let mut out = substitute(&body.role, ctx);
        if !body.instructions.is_empty() {
            out.push_str("\n\nInstructions:\n");
            for (i, instruction) in body.instructions.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, substitute(instruction, ctx)));
            }
        }
        if !body.rules.is_empty() {
            out.push_str("\nRules:\n");
            for rule in &body.rules {
                out.push_str(&format!("- {}\n", substitute(rule, ctx)));
            }
        }
        out
    }
}

fn substitute(text: &str, ctx: &AgentContext) -> String {
    text.replace("{worktree_path}", &ctx.worktree_path.display().to_string())
        .replace(
            "{issue_number}",
            &ctx.issue_number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
        )
        .replace("{issue_title}", &ctx.issue_title)
        .replace("{repo_name}", &ctx.repo_name)
        .replace("{branch_name}", &ctx.branch_name)
        .replace("{skill}", ctx.skill.as_str())
}

fn hex_digest(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;

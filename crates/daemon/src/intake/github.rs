// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub payload normalization.
//!
//! Only the fields the pipeline consumes are deserialized; everything
//! else rides along in the job's `parsed` value.

use super::Normalized;
use sb_core::IssueRef;
use serde::Deserialize;

/// Comment prefix that turns an issue comment into work.
const COMMENT_TRIGGER: &str = "/skybridge";

#[derive(Debug, Deserialize)]
struct Payload {
    action: Option<String>,
    issue: Option<Issue>,
    comment: Option<Comment>,
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    number: u64,
    title: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Comment {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
}

/// Derive `(event_type, external_id, issue)` from a GitHub webhook.
///
/// `x_github_event` is the `x-github-event` header (`issues`,
/// `issue_comment`, `ping`, …). Returns:
/// - `Ok(Normalized::Job { .. })` for event types that become jobs,
/// - `Ok(Normalized::Ignored)` for recognized-but-inert deliveries,
/// - `Err` for payloads missing required structure.
pub fn normalize(x_github_event: &str, parsed: &serde_json::Value) -> Result<Normalized, String> {
    let payload: Payload = serde_json::from_value(parsed.clone())
        .map_err(|e| format!("github payload structure: {e}"))?;

    match x_github_event {
        "issues" => {
            let action = payload.action.as_deref().unwrap_or_default();
            let issue = payload.issue.ok_or("issues event without issue object")?;
            let event_type = format!("issues.{action}");
            if !matches!(action, "opened" | "reopened") {
                return Ok(Normalized::Ignored { event_type });
            }
            Ok(Normalized::Job {
                event_type,
                external_id: issue.number.to_string(),
                issue: to_issue_ref(issue, payload.repository),
                skill: None,
            })
        }
        "issue_comment" => {
            let action = payload.action.as_deref().unwrap_or_default();
            let event_type = format!("issue_comment.{action}");
            let comment_body = payload.comment.as_ref().and_then(|c| c.body.as_deref());
            let trigger = comment_body
                .map(str::trim_start)
                .filter(|body| body.starts_with(COMMENT_TRIGGER));
            if action != "created" || trigger.is_none() {
                return Ok(Normalized::Ignored { event_type });
            }
            let issue = payload.issue.ok_or("issue_comment event without issue object")?;
            // `/skybridge <skill>` selects a skill; bare `/skybridge`
            // takes the default.
            let skill = trigger
                .and_then(|body| body[COMMENT_TRIGGER.len()..].split_whitespace().next())
                .map(sb_core::Skill::new);
            Ok(Normalized::Job {
                event_type,
                external_id: issue.number.to_string(),
                issue: to_issue_ref(issue, payload.repository),
                skill,
            })
        }
        // Recognized deliveries that never create work.
        "ping" | "installation" | "push" => {
            Ok(Normalized::Ignored { event_type: x_github_event.to_string() })
        }
        other => Ok(Normalized::Ignored { event_type: other.to_string() }),
    }
}

fn to_issue_ref(issue: Issue, repository: Option<Repository>) -> IssueRef {
    IssueRef {
        number: issue.number,
        title: issue.title,
        url: issue.html_url,
        author: issue.user.map(|u| u.login),
        labels: issue.labels.into_iter().map(|l| l.name).collect(),
        body: issue.body,
        repo: repository.map(|r| r.full_name),
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;

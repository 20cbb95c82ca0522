// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook event types: the normalized form of a payload received from
//! an external source.
//!
//! `raw_bytes` is the exact byte sequence the signature was computed
//! over. It is held in memory for the duration of intake only and never
//! serialized into queue records; downstream consumers see the decoded
//! `parsed` value and the normalized [`IssueRef`].

use crate::event::EventId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External systems that deliver webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Github,
    Trello,
    Discord,
}

crate::str_enum! {
    EventSource {
        Github => "github",
        Trello => "trello",
        Discord => "discord",
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown webhook source: {0}")]
pub struct SourceParseError(pub String);

impl std::str::FromStr for EventSource {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(EventSource::Github),
            "trello" => Ok(EventSource::Trello),
            "discord" => Ok(EventSource::Discord),
            other => Err(SourceParseError(other.to_string())),
        }
    }
}

crate::define_id! {
    /// Correlation id propagated from `x-*-delivery` headers, or
    /// generated at intake when the source sent none.
    pub struct CorrelationId;
}

/// Normalized issue metadata extracted from a source payload.
///
/// This is the subset every downstream consumer agrees on: the kanban
/// projection keys cards on `number`, the worktree manager uses it for
/// branch names, and the agent prompt renders `title`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Repository the issue belongs to, `owner/name` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// A received and verified webhook payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: EventId,
    pub source: EventSource,
    /// Source-specific event type (`issues.opened`, `card.created`, …).
    pub event_type: String,
    pub received_at_ms: u64,
    /// Exact payload bytes used for signature verification. Held for
    /// intake only; not persisted.
    #[serde(skip)]
    pub raw_bytes: Vec<u8>,
    /// Decoded payload.
    pub parsed: serde_json::Value,
    /// Identifier of the subject in the source system (issue number,
    /// card id).
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<IssueRef>,
    pub correlation_id: CorrelationId,
}

impl WebhookEvent {
    /// Issue number when this event concerns an issue.
    pub fn issue_number(&self) -> Option<u64> {
        self.issue.as_ref().map(|i| i.number)
    }
}

/// Test builder: a plausible `issues.opened` delivery with targeted
/// overrides. Each `build()` draws a fresh event id and correlation id,
/// so two built events are always distinct deliveries.
#[cfg(any(test, feature = "test-support"))]
pub struct WebhookEventBuilder {
    source: EventSource,
    event_type: String,
    external_id: String,
    raw_bytes: Vec<u8>,
    parsed: serde_json::Value,
    issue: Option<IssueRef>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for WebhookEventBuilder {
    fn default() -> Self {
        Self {
            source: EventSource::Github,
            event_type: "issues.opened".to_string(),
            external_id: "1".to_string(),
            raw_bytes: Vec::new(),
            parsed: serde_json::Value::Null,
            issue: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl WebhookEventBuilder {
    pub fn source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = external_id.into();
        self
    }

    pub fn raw_bytes(mut self, raw_bytes: Vec<u8>) -> Self {
        self.raw_bytes = raw_bytes;
        self
    }

    pub fn parsed(mut self, parsed: serde_json::Value) -> Self {
        self.parsed = parsed;
        self
    }

    pub fn issue(mut self, issue: IssueRef) -> Self {
        self.issue = Some(issue);
        self
    }

    pub fn build(self) -> WebhookEvent {
        WebhookEvent {
            event_id: EventId::random(),
            source: self.source,
            event_type: self.event_type,
            received_at_ms: 1_000_000,
            raw_bytes: self.raw_bytes,
            parsed: self.parsed,
            external_id: self.external_id,
            issue: self.issue,
            correlation_id: CorrelationId::random(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl WebhookEvent {
    /// Builder with test defaults.
    pub fn builder() -> WebhookEventBuilder {
        WebhookEventBuilder::default()
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;

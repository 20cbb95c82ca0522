// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events for the Skybridge system.
//!
//! Events are a closed set of tagged variants — no runtime type
//! discovery. The [`DomainEvent`] envelope carries identity and timing;
//! [`EventPayload`] carries the facts. Serialization uses
//! `{"type": "JobStarted", ...fields}` with the past-tense event names
//! that appear in queue records and on the observability stream.

use crate::job::JobId;
use crate::skill::Skill;
use crate::webhook::{CorrelationId, EventSource};
use crate::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier assigned to every published event.
    pub struct EventId;
}

/// Immutable envelope published on the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: EventId,
    pub occurred_at_ms: u64,
    pub correlation_id: CorrelationId,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn new(clock: &impl Clock, correlation_id: CorrelationId, payload: EventPayload) -> Self {
        Self {
            event_id: EventId::random(),
            occurred_at_ms: clock.epoch_ms(),
            correlation_id,
            payload,
        }
    }

    /// Past-tense event type name (`IssueReceived`, `JobStarted`, …).
    pub fn name(&self) -> &'static str {
        self.payload.kind().name()
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.payload.job_id()
    }

    /// One-line summary for log files.
    pub fn log_summary(&self) -> String {
        match self.payload.job_id() {
            Some(job_id) => format!("{} job={}", self.name(), job_id),
            None => format!("{} aggregate={}", self.name(), self.payload.aggregate_id()),
        }
    }
}

/// Tag-only discriminant of [`EventPayload`], used as the subscription
/// key in the event bus registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    IssueReceived,
    JobCreated,
    JobStarted,
    JobProgressed,
    JobCommitted,
    JobPushed,
    PRCreated,
    JobCompleted,
    JobFailed,
    JobRetried,
    WorktreeRemoved,
    WorktreeRetained,
    TrelloCardCreated,
    TrelloCardUpdated,
    TrelloCardMovedToList,
    DeployCompleted,
    DeployFailed,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::IssueReceived => "IssueReceived",
            EventKind::JobCreated => "JobCreated",
            EventKind::JobStarted => "JobStarted",
            EventKind::JobProgressed => "JobProgressed",
            EventKind::JobCommitted => "JobCommitted",
            EventKind::JobPushed => "JobPushed",
            EventKind::PRCreated => "PRCreated",
            EventKind::JobCompleted => "JobCompleted",
            EventKind::JobFailed => "JobFailed",
            EventKind::JobRetried => "JobRetried",
            EventKind::WorktreeRemoved => "WorktreeRemoved",
            EventKind::WorktreeRetained => "WorktreeRetained",
            EventKind::TrelloCardCreated => "TrelloCardCreated",
            EventKind::TrelloCardUpdated => "TrelloCardUpdated",
            EventKind::TrelloCardMovedToList => "TrelloCardMovedToList",
            EventKind::DeployCompleted => "DeployCompleted",
            EventKind::DeployFailed => "DeployFailed",
        }
    }

    /// Every kind, for subscribe-to-all consumers (observability stream).
    pub fn all() -> &'static [EventKind] {
        &[
            EventKind::IssueReceived,
            EventKind::JobCreated,
            EventKind::JobStarted,
            EventKind::JobProgressed,
            EventKind::JobCommitted,
            EventKind::JobPushed,
            EventKind::PRCreated,
            EventKind::JobCompleted,
            EventKind::JobFailed,
            EventKind::JobRetried,
            EventKind::WorktreeRemoved,
            EventKind::WorktreeRetained,
            EventKind::TrelloCardCreated,
            EventKind::TrelloCardUpdated,
            EventKind::TrelloCardMovedToList,
            EventKind::DeployCompleted,
            EventKind::DeployFailed,
        ]
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The closed set of domain event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// A webhook passed verification and was materialized as a job.
    IssueReceived {
        source: EventSource,
        job_id: JobId,
        issue_number: u64,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },

    JobCreated {
        job_id: JobId,
        source: EventSource,
        event_type: String,
        skill: Skill,
        #[serde(default)]
        attempt: u32,
    },

    JobStarted {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issue_number: Option<u64>,
        skill: Skill,
        worktree_path: PathBuf,
        branch_name: String,
        #[serde(default)]
        attempt: u32,
    },

    /// Progress or checkpoint frame re-published by the orchestrator.
    JobProgressed {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issue_number: Option<u64>,
        step: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_steps: Option<u32>,
        message: String,
    },

    JobCommitted {
        job_id: JobId,
        commit_hash: String,
        message: String,
    },

    JobPushed {
        job_id: JobId,
        branch_name: String,
    },

    PRCreated {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issue_number: Option<u64>,
        pr_url: String,
    },

    JobCompleted {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issue_number: Option<u64>,
        changes_made: bool,
        message: String,
        duration_ms: u64,
    },

    JobFailed {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issue_number: Option<u64>,
        error_type: String,
        message: String,
        retryable: bool,
        #[serde(default)]
        attempt: u32,
    },

    /// A transient failure was re-enqueued under a fresh job id.
    JobRetried {
        job_id: JobId,
        previous_job_id: JobId,
        attempt: u32,
        delay_seconds: u64,
    },

    WorktreeRemoved {
        job_id: JobId,
        worktree_name: String,
    },

    /// Removal validation refused; the tree is kept for inspection.
    WorktreeRetained {
        job_id: JobId,
        worktree_name: String,
        reason: String,
    },

    TrelloCardCreated {
        card_id: String,
        list_id: String,
        title: String,
    },

    TrelloCardUpdated {
        card_id: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        changes: BTreeMap<String, String>,
    },

    TrelloCardMovedToList {
        card_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_list_id: Option<String>,
        to_list_id: String,
    },

    DeployCompleted {
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        duration_ms: u64,
    },

    DeployFailed {
        target: String,
        error: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::IssueReceived { .. } => EventKind::IssueReceived,
            EventPayload::JobCreated { .. } => EventKind::JobCreated,
            EventPayload::JobStarted { .. } => EventKind::JobStarted,
            EventPayload::JobProgressed { .. } => EventKind::JobProgressed,
            EventPayload::JobCommitted { .. } => EventKind::JobCommitted,
            EventPayload::JobPushed { .. } => EventKind::JobPushed,
            EventPayload::PRCreated { .. } => EventKind::PRCreated,
            EventPayload::JobCompleted { .. } => EventKind::JobCompleted,
            EventPayload::JobFailed { .. } => EventKind::JobFailed,
            EventPayload::JobRetried { .. } => EventKind::JobRetried,
            EventPayload::WorktreeRemoved { .. } => EventKind::WorktreeRemoved,
            EventPayload::WorktreeRetained { .. } => EventKind::WorktreeRetained,
            EventPayload::TrelloCardCreated { .. } => EventKind::TrelloCardCreated,
            EventPayload::TrelloCardUpdated { .. } => EventKind::TrelloCardUpdated,
            EventPayload::TrelloCardMovedToList { .. } => EventKind::TrelloCardMovedToList,
            EventPayload::DeployCompleted { .. } => EventKind::DeployCompleted,
            EventPayload::DeployFailed { .. } => EventKind::DeployFailed,
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            EventPayload::IssueReceived { job_id, .. }
            | EventPayload::JobCreated { job_id, .. }
            | EventPayload::JobStarted { job_id, .. }
            | EventPayload::JobProgressed { job_id, .. }
            | EventPayload::JobCommitted { job_id, .. }
            | EventPayload::JobPushed { job_id, .. }
            | EventPayload::PRCreated { job_id, .. }
            | EventPayload::JobCompleted { job_id, .. }
            | EventPayload::JobFailed { job_id, .. }
            | EventPayload::JobRetried { job_id, .. }
            | EventPayload::WorktreeRemoved { job_id, .. }
            | EventPayload::WorktreeRetained { job_id, .. } => Some(job_id),
            EventPayload::TrelloCardCreated { .. }
            | EventPayload::TrelloCardUpdated { .. }
            | EventPayload::TrelloCardMovedToList { .. }
            | EventPayload::DeployCompleted { .. }
            | EventPayload::DeployFailed { .. } => None,
        }
    }

    /// Identifier of the aggregate the event belongs to.
    pub fn aggregate_id(&self) -> String {
        match self {
            EventPayload::TrelloCardCreated { card_id, .. }
            | EventPayload::TrelloCardUpdated { card_id, .. }
            | EventPayload::TrelloCardMovedToList { card_id, .. } => card_id.clone(),
            EventPayload::DeployCompleted { target, .. }
            | EventPayload::DeployFailed { target, .. } => target.clone(),
            other => {
                other.job_id().map(|id| id.to_string()).unwrap_or_default()
            }
        }
    }

    /// Coarse aggregate classification (`job`, `card`, `deploy`).
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            EventPayload::TrelloCardCreated { .. }
            | EventPayload::TrelloCardUpdated { .. }
            | EventPayload::TrelloCardMovedToList { .. } => "card",
            EventPayload::DeployCompleted { .. } | EventPayload::DeployFailed { .. } => "deploy",
            _ => "job",
        }
    }

    /// Issue number, for subscribers that key on it (kanban projection).
    pub fn issue_number(&self) -> Option<u64> {
        match self {
            EventPayload::IssueReceived { issue_number, .. } => Some(*issue_number),
            EventPayload::JobStarted { issue_number, .. }
            | EventPayload::JobProgressed { issue_number, .. }
            | EventPayload::PRCreated { issue_number, .. }
            | EventPayload::JobCompleted { issue_number, .. }
            | EventPayload::JobFailed { issue_number, .. } => *issue_number,
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board, list, card, and history value types.

use serde::{Deserialize, Serialize};

/// The six lists every board starts with. There is no implicit default:
/// operations that omit a target list fail explicitly.
pub const DEFAULT_LISTS: [&str; 6] =
    ["Issues", "Brainstorm", "A Fazer", "Em Andamento", "Em Revisão", "Publicar"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanBoard {
    pub id: i64,
    pub name: String,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanList {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub position: i64,
}

/// Projection of one issue/job onto the board.
///
/// Invariant: `being_processed == true ⇒ position == 0`; live cards
/// always sort to the top of their list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanCard {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub description: String,
    pub position: i64,
    pub labels: Vec<String>,
    pub being_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_total_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// History row kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardEvent {
    Created,
    Moved,
    ProcessingStarted,
    ProcessingCompleted,
    ProcessingFailed,
    PrCreated,
    Updated,
    Deleted,
}

sb_core::str_enum! {
    CardEvent {
        Created => "created",
        Moved => "moved",
        ProcessingStarted => "processing_started",
        ProcessingCompleted => "processing_completed",
        ProcessingFailed => "processing_failed",
        PrCreated => "pr_created",
        Updated => "updated",
        Deleted => "deleted",
    }
}

impl CardEvent {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(CardEvent::Created),
            "moved" => Some(CardEvent::Moved),
            "processing_started" => Some(CardEvent::ProcessingStarted),
            "processing_completed" => Some(CardEvent::ProcessingCompleted),
            "processing_failed" => Some(CardEvent::ProcessingFailed),
            "pr_created" => Some(CardEvent::PrCreated),
            "updated" => Some(CardEvent::Updated),
            "deleted" => Some(CardEvent::Deleted),
            _ => None,
        }
    }
}

/// Append-only audit row for one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHistoryEntry {
    pub id: i64,
    pub card_id: i64,
    pub event: CardEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_list_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_list_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub occurred_at_ms: u64,
}

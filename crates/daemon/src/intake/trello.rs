// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trello payload normalization.
//!
//! Trello delivers board activity as `action` objects. Card creation is
//! the only action that becomes a job; everything else is acknowledged
//! and dropped.

use super::Normalized;
use sb_core::IssueRef;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Payload {
    action: Option<Action>,
}

#[derive(Debug, Deserialize)]
struct Action {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<ActionData>,
}

#[derive(Debug, Deserialize)]
struct ActionData {
    #[serde(default)]
    card: Option<Card>,
}

#[derive(Debug, Deserialize)]
struct Card {
    id: String,
    name: String,
    #[serde(default)]
    desc: Option<String>,
    /// Board-scoped sequential id, used as the issue number analog.
    #[serde(default, rename = "idShort")]
    id_short: Option<u64>,
}

pub fn normalize(parsed: &serde_json::Value) -> Result<Normalized, String> {
    let payload: Payload = serde_json::from_value(parsed.clone())
        .map_err(|e| format!("trello payload structure: {e}"))?;
    let Some(action) = payload.action else {
        return Err("trello payload without action".to_string());
    };

    let event_type = format!("card.{}", action.kind);
    if action.kind != "createCard" {
        return Ok(Normalized::Ignored { event_type });
    }

    let card = action
        .data
        .and_then(|d| d.card)
        .ok_or("createCard action without card data")?;

    Ok(Normalized::Job {
        event_type: "card.created".to_string(),
        external_id: card.id.clone(),
        issue: IssueRef {
            number: card.id_short.unwrap_or(0),
            title: card.name,
            body: card.desc,
            ..IssueRef::default()
        },
        skill: None,
    })
}

#[cfg(test)]
#[path = "trello_tests.rs"]
mod tests;

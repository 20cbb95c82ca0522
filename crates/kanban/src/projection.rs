// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-driven projection onto the board.
//!
//! A pure subscriber: every mutation is a fold of one domain event into
//! the store, stamped with the event's own `occurred_at_ms`. Replaying
//! an event log against an empty store therefore reproduces the same
//! board.

use crate::model::CardEvent;
use crate::store::{KanbanError, KanbanStore, NewCard};
use async_trait::async_trait;
use sb_bus::{EventHandler, HandlerError};
use sb_core::{DomainEvent, EventPayload};

/// List a job lands in while its skill is running.
fn list_for_skill(skill: &str) -> &'static str {
    match skill {
        "analyze-issue" => "Brainstorm",
        "review-issue" => "Em Revisão",
        "publish-issue" => "Publicar",
        // resolve-issue and everything else counts as active work.
        _ => "Em Andamento",
    }
}

/// Subscribes to job lifecycle events and maintains the board.
pub struct KanbanProjection {
    store: KanbanStore,
}

impl KanbanProjection {
    pub fn new(store: KanbanStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &KanbanStore {
        &self.store
    }

    fn apply(&self, event: &DomainEvent) -> Result<(), KanbanError> {
        let now_ms = event.occurred_at_ms;
        match &event.payload {
            EventPayload::IssueReceived { issue_number, title, url, labels, body, .. } => {
                if self.store.card_by_issue(*issue_number)?.is_some() {
                    // Reopened or redelivered issue: the card already
                    // tracks it.
                    return Ok(());
                }
                let issues = self.store.list_by_name("Issues")?;
                self.store.create_card(
                    NewCard {
                        list_id: Some(issues.id),
                        title: title.clone(),
                        description: body.clone().unwrap_or_default(),
                        labels: labels.clone(),
                        issue_number: Some(*issue_number),
                        issue_url: url.clone(),
                    },
                    now_ms,
                )?;
                Ok(())
            }

            EventPayload::JobStarted { job_id, issue_number, skill, .. } => {
                let Some(card) = self.lookup(*issue_number)? else {
                    return Ok(());
                };
                let list = self.store.list_by_name(list_for_skill(skill.as_str()))?;
                self.store.start_processing(card.id, job_id.as_str(), list.id, now_ms)
            }

            EventPayload::JobProgressed { issue_number, step, total_steps, .. } => {
                let Some(card) = self.lookup(*issue_number)? else {
                    return Ok(());
                };
                self.store.set_progress(card.id, *step, *total_steps, now_ms)
            }

            EventPayload::PRCreated { issue_number, pr_url, .. } => {
                let Some(card) = self.lookup(*issue_number)? else {
                    return Ok(());
                };
                self.store.set_pr_url(card.id, pr_url, now_ms)
            }

            EventPayload::JobCompleted { issue_number, message, .. } => {
                let Some(card) = self.lookup(*issue_number)? else {
                    return Ok(());
                };
                let review = self.store.list_by_name("Em Revisão")?;
                self.store.finish_processing(
                    card.id,
                    review.id,
                    CardEvent::ProcessingCompleted,
                    serde_json::json!({ "message": message }),
                    now_ms,
                )
            }

            EventPayload::JobFailed { issue_number, error_type, message, .. } => {
                let Some(card) = self.lookup(*issue_number)? else {
                    return Ok(());
                };
                let issues = self.store.list_by_name("Issues")?;
                self.store.finish_processing(
                    card.id,
                    issues.id,
                    CardEvent::ProcessingFailed,
                    serde_json::json!({ "error_type": error_type, "error_message": message }),
                    now_ms,
                )?;
                self.store.add_label(card.id, "erro", now_ms)
            }

            // Everything else is not board-relevant.
            _ => Ok(()),
        }
    }

    fn lookup(&self, issue_number: Option<u64>) -> Result<Option<crate::model::KanbanCard>, KanbanError> {
        match issue_number {
            Some(number) => self.store.card_by_issue(number),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl EventHandler for KanbanProjection {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        self.apply(event).map_err(|e| {
            HandlerError::new(format!("kanban projection failed on {}: {e}", event.name()))
        })
    }

    fn name(&self) -> &'static str {
        "kanban-projection"
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;

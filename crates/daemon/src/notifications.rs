// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification sink: completion/failure alerts.
//!
//! A bus subscriber fanning job outcomes out to a configurable set of
//! channels. Channel failures are logged and swallowed; alerting can
//! never affect job processing.

use async_trait::async_trait;
use sb_adapters::NotifyAdapter;
use sb_bus::{EventBus, EventHandler, HandlerError};
use sb_core::{DomainEvent, EventKind, EventPayload};
use std::sync::Arc;

pub struct NotificationSink {
    channels: Vec<Arc<dyn NotifyAdapter>>,
}

impl NotificationSink {
    pub fn new(channels: Vec<Arc<dyn NotifyAdapter>>) -> Self {
        Self { channels }
    }

    /// Register for the two outcome events.
    pub fn subscribe(self: Arc<Self>, bus: &EventBus) {
        bus.subscribe(EventKind::JobCompleted, Arc::clone(&self) as Arc<dyn EventHandler>);
        bus.subscribe(EventKind::JobFailed, self);
    }

    fn render(event: &DomainEvent) -> Option<(String, String)> {
        match &event.payload {
            EventPayload::JobCompleted { job_id, issue_number, changes_made, message, .. } => {
                let title = match issue_number {
                    Some(n) => format!("Skybridge: issue #{n} resolved"),
                    None => format!("Skybridge: job {} completed", job_id.short(24)),
                };
                let body = if *changes_made {
                    format!("Changes pushed. {message}")
                } else {
                    format!("No changes needed. {message}")
                };
                Some((title, body))
            }
            EventPayload::JobFailed { job_id, issue_number, error_type, message, retryable, .. } => {
                let title = match issue_number {
                    Some(n) => format!("Skybridge: issue #{n} failed"),
                    None => format!("Skybridge: job {} failed", job_id.short(24)),
                };
                let retry_note = if *retryable { " (will retry)" } else { "" };
                Some((title, format!("{error_type}: {message}{retry_note}")))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl EventHandler for NotificationSink {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let Some((title, body)) = Self::render(event) else {
            return Ok(());
        };
        for channel in &self.channels {
            if let Err(e) = channel.notify(&title, &body).await {
                tracing::warn!(error = %e, title, "notification channel failed");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "notification-sink"
    }
}

#[cfg(test)]
#[path = "notifications_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook intake: receive → verify → normalize → enqueue.
//!
//! The external HTTP runtime maps transport onto [`IntakeRequest`] /
//! [`IntakeResponse`]; everything in between is typed and synchronous
//! from the caller's point of view. Intake never touches git, the
//! agent, or the network: a request ends at the queue and the event
//! bus.

mod github;
pub mod signature;
mod trello;

pub use signature::{sign, SignatureCheck, SignatureVerifier};

use crate::registry::WorkspaceRegistry;
use sb_core::{
    CorrelationId, DomainEvent, EventId, EventPayload, EventSource, IssueRef, Skill, SystemClock,
    WebhookEvent, WebhookJob,
};
use sb_core::Clock;
use sb_queue::JobQueue;
use std::sync::Arc;

/// Outcome of source-specific payload normalization.
#[derive(Debug)]
pub enum Normalized {
    /// The delivery becomes a job.
    Job {
        event_type: String,
        external_id: String,
        issue: IssueRef,
        /// Skill requested in the delivery (e.g. a `/skybridge refactor`
        /// comment); `None` means the catalog default.
        skill: Option<Skill>,
    },
    /// Recognized delivery that creates no work (acknowledged 202).
    Ignored { event_type: String },
}

/// One incoming webhook request, transport-agnostic.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    /// Path segment of `POST /webhooks/{source}`.
    pub source: String,
    pub headers: Vec<(String, String)>,
    /// Exact body bytes as received.
    pub body: Vec<u8>,
}

impl IntakeRequest {
    pub fn new(source: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { source: source.into(), headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Typed response the HTTP runtime renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl IntakeResponse {
    fn accepted(body: serde_json::Value) -> Self {
        Self { status: 202, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self { status, body: serde_json::json!({ "error": message.into() }) }
    }
}

/// The intake pipeline for all enabled sources.
pub struct IntakeHandler {
    verifier: SignatureVerifier,
    registry: Arc<WorkspaceRegistry>,
    enabled: Vec<EventSource>,
    clock: SystemClock,
}

impl IntakeHandler {
    pub fn new(
        verifier: SignatureVerifier,
        registry: Arc<WorkspaceRegistry>,
        enabled: Vec<EventSource>,
    ) -> Self {
        Self { verifier, registry, enabled, clock: SystemClock }
    }

    /// Process one delivery end to end.
    pub async fn handle(&self, req: IntakeRequest) -> IntakeResponse {
        let Ok(source) = req.source.parse::<EventSource>() else {
            return IntakeResponse::error(404, format!("unknown webhook source: {}", req.source));
        };
        if !self.enabled.contains(&source) {
            return IntakeResponse::error(403, format!("webhook source disabled: {source}"));
        }

        // Intake mutates state, so an unknown workspace is rejected
        // rather than silently redirected to `core`.
        let workspace_header = req.header("x-workspace");
        let Some(workspace) = self.registry.resolve_write(workspace_header) else {
            return IntakeResponse::error(
                404,
                format!("unknown workspace: {}", workspace_header.unwrap_or_default()),
            );
        };

        // 1-3. Raw bytes straight into the verifier.
        let signature = req.header(signature_header(source));
        match self.verifier.verify(source, &req.body, signature) {
            SignatureCheck::Ok => {}
            SignatureCheck::InvalidSignature => {
                tracing::warn!(%source, "webhook rejected: invalid signature");
                workspace.metrics.incr("intake.rejected_signature");
                return IntakeResponse::error(401, "invalid signature");
            }
            SignatureCheck::UnconfiguredSource => {
                tracing::warn!(%source, "webhook rejected: no secret configured");
                return IntakeResponse::error(403, format!("no secret configured for {source}"));
            }
        }

        let correlation_id = req
            .header(delivery_header(source))
            .map(CorrelationId::new)
            .unwrap_or_else(CorrelationId::random);

        // 4. Decode and derive (event_type, external_id).
        let parsed: serde_json::Value = match serde_json::from_slice(&req.body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%source, correlation_id = %correlation_id, error = %e, "malformed payload");
                return IntakeResponse::error(400, format!("malformed payload: {e}"));
            }
        };
        let normalized = match source {
            EventSource::Github => {
                github::normalize(req.header("x-github-event").unwrap_or_default(), &parsed)
            }
            EventSource::Trello => trello::normalize(&parsed),
            // No normalization rules yet: recognized source, no jobs.
            EventSource::Discord => Ok(Normalized::Ignored { event_type: "message".to_string() }),
        };
        let (event_type, external_id, issue, skill) = match normalized {
            Ok(Normalized::Job { event_type, external_id, issue, skill }) => {
                (event_type, external_id, issue, skill)
            }
            Ok(Normalized::Ignored { event_type }) => {
                tracing::debug!(%source, event_type, "delivery acknowledged without a job");
                return IntakeResponse::accepted(serde_json::json!({
                    "status": "ignored",
                    "event_type": event_type,
                }));
            }
            Err(reason) => {
                tracing::warn!(%source, correlation_id = %correlation_id, reason, "payload rejected");
                return IntakeResponse::error(400, reason);
            }
        };

        // 5. Materialize the job.
        let event = WebhookEvent {
            event_id: EventId::random(),
            source,
            event_type,
            received_at_ms: self.clock.epoch_ms(),
            raw_bytes: req.body.clone(),
            parsed,
            external_id,
            issue: Some(issue.clone()),
            correlation_id: correlation_id.clone(),
        };
        let job = WebhookJob::new(event, skill.unwrap_or_default(), &self.clock);

        // 6. Enqueue (idempotent) and announce.
        let enqueued = match workspace.job_queue().enqueue(&job) {
            Ok(enqueued) => enqueued,
            Err(e) if e.is_unavailable() => {
                tracing::error!(error = %e, "queue unavailable");
                return IntakeResponse::error(503, "queue unavailable");
            }
            Err(e) => {
                tracing::error!(error = %e, "enqueue failed");
                return IntakeResponse::error(500, "internal error");
            }
        };
        let job_id = enqueued.job_id;

        // A redelivery hits the same job id; the first delivery already
        // announced it.
        if !enqueued.duplicate {
            workspace.metrics.incr("intake.accepted");
            workspace.bus.publish(DomainEvent::new(
                &self.clock,
                correlation_id.clone(),
                EventPayload::IssueReceived {
                    source,
                    job_id: job_id.clone(),
                    issue_number: issue.number,
                    title: issue.title.clone(),
                    url: issue.url.clone(),
                    author: issue.author.clone(),
                    labels: issue.labels.clone(),
                    body: issue.body.clone(),
                },
            ));
            workspace.bus.publish(DomainEvent::new(
                &self.clock,
                correlation_id.clone(),
                EventPayload::JobCreated {
                    job_id: job_id.clone(),
                    source,
                    event_type: job.event.event_type.clone(),
                    skill: job.skill.clone(),
                    attempt: job.attempt,
                },
            ));
        }

        tracing::info!(
            %source,
            job_id = %job_id,
            correlation_id = %correlation_id,
            workspace = %workspace.config.id,
            "webhook accepted"
        );
        IntakeResponse::accepted(serde_json::json!({
            "job_id": job_id.to_string(),
            "correlation_id": correlation_id.to_string(),
        }))
    }
}

/// Header carrying the HMAC signature, per source.
fn signature_header(source: EventSource) -> &'static str {
    match source {
        EventSource::Github => "x-hub-signature-256",
        EventSource::Trello => "x-trello-signature",
        EventSource::Discord => "x-discord-signature",
    }
}

/// Header carrying the delivery id used for correlation.
fn delivery_header(source: EventSource) -> &'static str {
    match source {
        EventSource::Github => "x-github-delivery",
        EventSource::Trello => "x-trello-delivery",
        EventSource::Discord => "x-discord-delivery",
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

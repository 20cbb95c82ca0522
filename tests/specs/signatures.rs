// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S2: an invalid signature is rejected with no side effects.

use super::support::Env;
use sb_adapters::FakeAgentFacade;
use sb_core::AgentResult;
use sb_daemon::IntakeRequest;
use sb_queue::JobQueue;

#[tokio::test]
async fn invalid_signature_leaves_no_trace() {
    let mut env = Env::new(FakeAgentFacade::completing(AgentResult::default()), false);

    let body = serde_json::json!({
        "action": "opened",
        "issue": { "number": 7, "title": "Issue 7" }
    })
    .to_string()
    .into_bytes();

    let response = env
        .intake
        .handle(
            IntakeRequest::new("github", body)
                .with_header("x-github-event", "issues")
                .with_header("x-hub-signature-256", "sha256=deadbeefdeadbeef"),
        )
        .await;

    assert_eq!(response.status, 401);

    let core = env.core();
    assert_eq!(core.queue.pending_count().unwrap(), 0);
    assert!(env.drain_event_names().is_empty());
    assert!(core.kanban.card_by_issue(7).unwrap().is_none());
}

#[tokio::test]
async fn valid_then_tampered_body() {
    let mut env = Env::new(FakeAgentFacade::completing(AgentResult::default()), false);

    // A genuine delivery is accepted...
    assert_eq!(env.deliver_issue(9, "delivery-ok").await.status, 202);
    // ...then an attacker replays the signature over a different body.
    let body = serde_json::json!({
        "action": "opened",
        "issue": { "number": 999, "title": "Evil" }
    })
    .to_string()
    .into_bytes();
    let stolen = sb_daemon::intake::sign(super::support::SECRET, b"different bytes");
    let response = env
        .intake
        .handle(
            IntakeRequest::new("github", body)
                .with_header("x-github-event", "issues")
                .with_header("x-hub-signature-256", stolen),
        )
        .await;

    assert_eq!(response.status, 401);
    assert_eq!(env.core().queue.pending_count().unwrap(), 1);
    let _ = env.drain_event_names();
}

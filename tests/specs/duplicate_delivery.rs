// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S5: the same signed webhook delivered twice collapses to one queue
//! entry and exactly one set of lifecycle events.

use super::support::Env;
use sb_adapters::FakeAgentFacade;
use sb_core::AgentResult;
use sb_queue::JobQueue;

#[tokio::test]
async fn duplicate_webhook_fires_one_lifecycle() {
    let agent = FakeAgentFacade::completing(AgentResult {
        success: true,
        changes_made: false,
        message: "done".to_string(),
        ..AgentResult::default()
    });
    let mut env = Env::new(agent, false);

    let first = env.deliver_issue(5, "delivery-s5").await;
    let second = env.deliver_issue(5, "delivery-s5").await;

    assert_eq!(first.status, 202);
    assert_eq!(second.status, 202);
    assert_eq!(first.body["job_id"], second.body["job_id"]);

    let core = env.core();
    assert_eq!(core.queue.pending_count().unwrap(), 1);

    env.process_next().await;
    // Nothing left to process.
    assert!(core.queue.dequeue().unwrap().is_none());

    let names = env.drain_event_names();
    let count = |name: &str| names.iter().filter(|n| *n == name).count();
    assert_eq!(count("IssueReceived"), 1);
    assert_eq!(count("JobCreated"), 1);
    assert_eq!(count("JobStarted"), 1);
    assert_eq!(count("JobCompleted"), 1);

    // One card, one agent run.
    assert_eq!(core.kanban.cards(None).unwrap().len(), 1);
    assert_eq!(env.agent.contexts().len(), 1);
}

#[tokio::test]
async fn redelivery_after_completion_is_still_deduplicated() {
    let mut env = Env::new(FakeAgentFacade::completing(AgentResult {
        success: true,
        ..AgentResult::default()
    }), false);

    env.deliver_issue(6, "delivery-s5b").await;
    env.process_next().await;
    let _ = env.drain_event_names();

    // The job is terminal; the same delivery must not resurrect it.
    let response = env.deliver_issue(6, "delivery-s5b").await;
    assert_eq!(response.status, 202);
    assert_eq!(env.core().queue.pending_count().unwrap(), 0);
    assert!(env.drain_event_names().is_empty());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3: a hanging agent times out; the job fails retryable, the card
//! returns to Issues with the `erro` label, and the worktree survives
//! for debugging.

use super::support::Env;
use sb_adapters::FakeAgentFacade;
use sb_core::{JobId, JobStatus};
use sb_engine::WorktreeStatus;

#[tokio::test]
async fn hanging_agent_times_out() {
    let mut env = Env::new(FakeAgentFacade::hanging(), false);

    let response = env.deliver_issue(13, "delivery-s3").await;
    let job_id = JobId::new(response.body["job_id"].as_str().unwrap());

    env.process_next().await;

    // Terminal failure, classified retryable.
    let core = env.core();
    let (status, record) = core.queue.find(&job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.error_type, "AgentTimeout");
    assert!(error.retryable);

    let names = env.drain_event_names();
    assert!(names.contains(&"JobFailed".to_string()));
    assert!(names.contains(&"JobRetried".to_string()));
    assert!(!names.contains(&"WorktreeRemoved".to_string()));

    // Worktree retained and marked failed.
    let worktrees = core.worktrees.list().unwrap();
    assert_eq!(worktrees.len(), 1);
    assert_eq!(worktrees[0].status, WorktreeStatus::Failed);
    assert!(worktrees[0].path.exists());

    // Card back in Issues, flagged.
    let card = core.kanban.card_by_issue(13).unwrap().unwrap();
    let issues = core.kanban.list_by_name("Issues").unwrap();
    assert_eq!(card.list_id, issues.id);
    assert!(!card.being_processed);
    assert!(card.labels.contains(&"erro".to_string()));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S1: a valid `issues.opened` webhook flows end to end — job enqueued,
//! worktree provisioned, agent run, commit pushed, events in order,
//! card parked in review.

use super::support::Env;
use sb_adapters::FakeAgentFacade;
use sb_core::{AgentResult, JobStatus};
use sb_protocol::ProtocolEvent;

fn result() -> AgentResult {
    AgentResult {
        success: true,
        changes_made: true,
        files_modified: vec!["README.md".to_string()],
        message: "fixed the readme".to_string(),
        ..AgentResult::default()
    }
}

#[tokio::test]
async fn happy_path() {
    let agent = FakeAgentFacade::scripted(
        vec![ProtocolEvent::Progress { percent: 50, message: "halfway".to_string() }],
        result(),
    );
    let mut env = Env::new(agent, true);

    // Intake.
    let response = env.deliver_issue(7, "delivery-s1").await;
    assert_eq!(response.status, 202);
    let job_id = response.body["job_id"].as_str().unwrap().to_string();
    assert!(job_id.starts_with("github-issues.opened-"));
    let hash = job_id.rsplit('-').next().unwrap().to_string();
    assert_eq!(hash.len(), 8);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

    // Orchestration.
    env.process_next().await;

    // Event order (progress frames are interleaved, lifecycle fixed).
    let names = env.drain_event_names();
    let lifecycle: Vec<&str> =
        names.iter().map(String::as_str).filter(|n| *n != "JobProgressed").collect();
    similar_asserts::assert_eq!(
        lifecycle,
        vec![
            "IssueReceived",
            "JobCreated",
            "JobStarted",
            "JobCommitted",
            "JobPushed",
            "JobCompleted",
            "WorktreeRemoved",
        ],
    );

    // Terminal queue record.
    let core = env.core();
    let (status, record) = core.queue.find(&sb_core::JobId::new(job_id.clone())).unwrap().unwrap();
    assert_eq!(status, JobStatus::Completed);
    let recorded = record.result.unwrap();
    assert!(recorded.success);
    assert!(recorded.commit_hash.is_some());
    assert!(record.snapshot_before.is_some());
    assert!(record.snapshot_after.is_some());
    // The after-snapshot proves the agent's edit was captured.
    let diff = record.snapshot_before.unwrap().diff(&record.snapshot_after.unwrap());
    assert!(diff.files_modified.contains(&"README.md".to_string()));

    // Worktree was pushed clean and removed; branch followed the naming
    // scheme and survives in the canonical repo.
    assert!(core.worktrees.list().unwrap().is_empty());
    let worktree_name = format!("skybridge-github-issues.opened-7-{hash}");
    assert!(!env.state.path().join("worktrees").join(worktree_name).exists());
    let branch = format!("webhook/github/issue/7/{hash}");
    assert!(sb_adapters::git::branch_exists(env.repo.path(), &branch).await.unwrap());

    // Kanban: card landed in "Em Revisão", no longer live.
    let card = core.kanban.card_by_issue(7).unwrap().unwrap();
    let review = core.kanban.list_by_name("Em Revisão").unwrap();
    assert_eq!(card.list_id, review.id);
    assert!(!card.being_processed);
    assert_eq!(card.title, "Issue 7");
}

#[tokio::test]
async fn no_change_run_completes_without_push() {
    let agent = FakeAgentFacade::completing(AgentResult {
        success: true,
        changes_made: false,
        message: "already fine".to_string(),
        ..AgentResult::default()
    });
    let mut env = Env::new(agent, false);

    env.deliver_issue(8, "delivery-nochange").await;
    env.process_next().await;

    let names = env.drain_event_names();
    assert!(!names.contains(&"JobCommitted".to_string()));
    assert!(!names.contains(&"JobPushed".to_string()));
    assert!(names.contains(&"JobCompleted".to_string()));
    // A clean tree with no unpushed work is removable.
    assert!(names.contains(&"WorktreeRemoved".to_string()));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sb_core::{CorrelationId, EventId, EventSource, JobId, Skill};
use std::path::PathBuf;

fn event(at_ms: u64, payload: EventPayload) -> DomainEvent {
    DomainEvent {
        event_id: EventId::new(format!("evt-{at_ms}")),
        occurred_at_ms: at_ms,
        correlation_id: CorrelationId::new("corr-1"),
        payload,
    }
}

fn issue_received(at_ms: u64, issue: u64) -> DomainEvent {
    event(
        at_ms,
        EventPayload::IssueReceived {
            source: EventSource::Github,
            job_id: JobId::new("github-issues.opened-ab12cd34"),
            issue_number: issue,
            title: format!("Issue {issue}"),
            url: Some(format!("https://example.invalid/issues/{issue}")),
            author: Some("someone".to_string()),
            labels: vec!["bug".to_string()],
            body: Some("it is broken".to_string()),
        },
    )
}

fn job_started(at_ms: u64, issue: u64, skill: &str) -> DomainEvent {
    event(
        at_ms,
        EventPayload::JobStarted {
            job_id: JobId::new("github-issues.opened-ab12cd34"),
            issue_number: Some(issue),
            skill: Skill::new(skill),
            worktree_path: PathBuf::from("/tmp/wt"),
            branch_name: "webhook/github/issue/7/ab12cd34".to_string(),
            attempt: 0,
        },
    )
}

fn projection() -> KanbanProjection {
    KanbanProjection::new(KanbanStore::open_in_memory().unwrap())
}

#[test]
fn issue_received_creates_card_in_issues() {
    let proj = projection();
    proj.apply(&issue_received(1_000, 7)).unwrap();

    let card = proj.store().card_by_issue(7).unwrap().unwrap();
    let issues = proj.store().list_by_name("Issues").unwrap();
    assert_eq!(card.list_id, issues.id);
    assert_eq!(card.title, "Issue 7");
    assert_eq!(card.labels, vec!["bug"]);
    assert_eq!(card.description, "it is broken");
    assert_eq!(card.issue_url.as_deref(), Some("https://example.invalid/issues/7"));
    assert!(!card.being_processed);
    assert_eq!(card.created_at_ms, 1_000);
}

#[test]
fn duplicate_issue_received_is_ignored() {
    let proj = projection();
    proj.apply(&issue_received(1_000, 7)).unwrap();
    proj.apply(&issue_received(2_000, 7)).unwrap();

    assert_eq!(proj.store().cards(None).unwrap().len(), 1);
}

#[test]
fn job_started_makes_card_live_in_skill_list() {
    let proj = projection();
    proj.apply(&issue_received(1_000, 7)).unwrap();
    proj.apply(&job_started(2_000, 7, "resolve-issue")).unwrap();

    let card = proj.store().card_by_issue(7).unwrap().unwrap();
    let active = proj.store().list_by_name("Em Andamento").unwrap();
    assert_eq!(card.list_id, active.id);
    assert!(card.being_processed);
    assert_eq!(card.position, 0);
    assert_eq!(card.processing_started_at_ms, Some(2_000));
    assert_eq!(card.processing_job_id.as_deref(), Some("github-issues.opened-ab12cd34"));
}

#[test]
fn skill_to_list_mapping() {
    for (skill, list) in [
        ("analyze-issue", "Brainstorm"),
        ("resolve-issue", "Em Andamento"),
        ("review-issue", "Em Revisão"),
        ("publish-issue", "Publicar"),
        ("anything-else", "Em Andamento"),
    ] {
        let proj = projection();
        proj.apply(&issue_received(1_000, 7)).unwrap();
        proj.apply(&job_started(2_000, 7, skill)).unwrap();

        let card = proj.store().card_by_issue(7).unwrap().unwrap();
        let expected = proj.store().list_by_name(list).unwrap();
        assert_eq!(card.list_id, expected.id, "skill {skill}");
    }
}

#[test]
fn progress_updates_step_counters() {
    let proj = projection();
    proj.apply(&issue_received(1_000, 7)).unwrap();
    proj.apply(&job_started(2_000, 7, "resolve-issue")).unwrap();
    proj.apply(&event(
        2_500,
        EventPayload::JobProgressed {
            job_id: JobId::new("github-issues.opened-ab12cd34"),
            issue_number: Some(7),
            step: 40,
            total_steps: Some(100),
            message: "drafting".to_string(),
        },
    ))
    .unwrap();

    let card = proj.store().card_by_issue(7).unwrap().unwrap();
    assert_eq!(card.processing_step, Some(40));
    assert_eq!(card.processing_total_steps, Some(100));
}

#[test]
fn pr_created_sets_url() {
    let proj = projection();
    proj.apply(&issue_received(1_000, 7)).unwrap();
    proj.apply(&event(
        3_000,
        EventPayload::PRCreated {
            job_id: JobId::new("github-issues.opened-ab12cd34"),
            issue_number: Some(7),
            pr_url: "https://example.invalid/pr/9".to_string(),
        },
    ))
    .unwrap();

    let card = proj.store().card_by_issue(7).unwrap().unwrap();
    assert_eq!(card.pr_url.as_deref(), Some("https://example.invalid/pr/9"));
}

#[test]
fn completion_parks_card_in_review() {
    let proj = projection();
    proj.apply(&issue_received(1_000, 7)).unwrap();
    proj.apply(&job_started(2_000, 7, "resolve-issue")).unwrap();
    proj.apply(&event(
        4_000,
        EventPayload::JobCompleted {
            job_id: JobId::new("github-issues.opened-ab12cd34"),
            issue_number: Some(7),
            changes_made: true,
            message: "patched".to_string(),
            duration_ms: 2_000,
        },
    ))
    .unwrap();

    let card = proj.store().card_by_issue(7).unwrap().unwrap();
    let review = proj.store().list_by_name("Em Revisão").unwrap();
    assert_eq!(card.list_id, review.id);
    assert!(!card.being_processed);

    let history = proj.store().history(card.id).unwrap();
    assert_eq!(history.last().unwrap().event, CardEvent::ProcessingCompleted);
}

#[test]
fn failure_returns_card_to_issues_with_erro_label() {
    let proj = projection();
    proj.apply(&issue_received(1_000, 7)).unwrap();
    proj.apply(&job_started(2_000, 7, "resolve-issue")).unwrap();
    proj.apply(&event(
        5_000,
        EventPayload::JobFailed {
            job_id: JobId::new("github-issues.opened-ab12cd34"),
            issue_number: Some(7),
            error_type: "AgentTimeout".to_string(),
            message: "agent timed out after 60s".to_string(),
            retryable: true,
            attempt: 0,
        },
    ))
    .unwrap();

    let card = proj.store().card_by_issue(7).unwrap().unwrap();
    let issues = proj.store().list_by_name("Issues").unwrap();
    assert_eq!(card.list_id, issues.id);
    assert!(!card.being_processed);
    assert!(card.labels.contains(&"erro".to_string()));

    let history = proj.store().history(card.id).unwrap();
    let failed = history.last().unwrap();
    assert_eq!(failed.event, CardEvent::ProcessingFailed);
    assert_eq!(failed.metadata["error_message"], "agent timed out after 60s");
}

#[test]
fn events_without_issue_numbers_are_ignored() {
    let proj = projection();
    proj.apply(&event(
        1_000,
        EventPayload::JobCompleted {
            job_id: JobId::new("j"),
            issue_number: None,
            changes_made: false,
            message: String::new(),
            duration_ms: 0,
        },
    ))
    .unwrap();
    assert!(proj.store().cards(None).unwrap().is_empty());
}

#[test]
fn replaying_the_log_reproduces_the_same_board() {
    let log = vec![
        issue_received(1_000, 7),
        issue_received(1_100, 8),
        job_started(2_000, 7, "resolve-issue"),
        event(
            2_500,
            EventPayload::JobProgressed {
                job_id: JobId::new("github-issues.opened-ab12cd34"),
                issue_number: Some(7),
                step: 50,
                total_steps: Some(100),
                message: "halfway".to_string(),
            },
        ),
        event(
            4_000,
            EventPayload::JobCompleted {
                job_id: JobId::new("github-issues.opened-ab12cd34"),
                issue_number: Some(7),
                changes_made: true,
                message: "patched".to_string(),
                duration_ms: 2_000,
            },
        ),
    ];

    let mut boards = Vec::new();
    for _ in 0..2 {
        let proj = projection();
        for entry in &log {
            proj.apply(entry).unwrap();
        }
        let cards = proj.store().cards(None).unwrap();
        let history: Vec<_> =
            cards.iter().map(|c| proj.store().history(c.id).unwrap()).collect();
        boards.push(serde_json::to_string(&(cards, history)).unwrap());
    }
    assert_eq!(boards[0], boards[1]);
}

#[tokio::test]
async fn projection_subscribes_as_a_bus_handler() {
    use sb_bus::EventHandler;

    let proj = projection();
    proj.handle(&issue_received(1_000, 7)).await.unwrap();
    assert!(proj.store().card_by_issue(7).unwrap().is_some());
}

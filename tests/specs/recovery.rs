// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S4: a worker dies mid-execution; after the grace period the job
//! returns to the head of the queue with its attempt incremented, and
//! the next loop picks it up.

use super::support::Env;
use sb_adapters::FakeAgentFacade;
use sb_core::{AgentResult, JobId, JobStatus};
use sb_queue::JobQueue;
use std::time::Duration;

#[tokio::test]
async fn killed_worker_job_is_recovered() {
    let env = Env::new(FakeAgentFacade::completing(AgentResult::default()), false);
    let core = env.core();

    let response = env.deliver_issue(4, "delivery-s4").await;
    let job_id = JobId::new(response.body["job_id"].as_str().unwrap());

    // A worker claims the job and then dies: the record sits in
    // processing/ with nobody driving it.
    let claimed = core.queue.dequeue().unwrap().unwrap();
    assert_eq!(claimed.job_id, job_id);
    assert_eq!(core.queue.pending_count().unwrap(), 0);

    // Within the grace period nothing moves.
    assert!(core.queue.recover().unwrap().is_empty());

    // After the grace period the job is back at the head.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let recovered = core.queue.recover().unwrap();
    assert_eq!(recovered, vec![job_id.clone()]);

    let (status, record) = core.queue.find(&job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Pending);
    assert_eq!(record.job.attempt, 1);

    // The next poll hands it straight to a worker.
    let redelivered =
        core.queue.wait_for_dequeue(Duration::from_secs(2)).await.unwrap().unwrap();
    assert_eq!(redelivered.job_id, job_id);
    assert_eq!(redelivered.attempt, 1);
}

#[tokio::test]
async fn restart_recovery_runs_the_job_to_completion() {
    let env = Env::new(FakeAgentFacade::completing(AgentResult {
        success: true,
        changes_made: false,
        message: "second try worked".to_string(),
        ..AgentResult::default()
    }), false);
    let core = env.core();

    let response = env.deliver_issue(5, "delivery-s4b").await;
    let job_id = JobId::new(response.body["job_id"].as_str().unwrap());

    // Simulated crash: claim and abandon.
    core.queue.dequeue().unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    core.queue.recover().unwrap();

    // "Restarted" orchestrator processes the recovered attempt.
    let job = core.queue.dequeue().unwrap().unwrap();
    assert_eq!(job.attempt, 1);
    env.orchestrator().process(job).await;

    let (status, _) = core.queue.find(&job_id).unwrap().unwrap();
    assert_eq!(status, JobStatus::Completed);
}

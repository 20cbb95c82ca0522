// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-adapters: process-boundary adapters.
//!
//! Everything that leaves the process lives here behind a trait or a
//! typed function: the agent subprocess facade, git invocations, and
//! outbound notifications. Engine code composes these; tests swap in the
//! fakes exported behind the `test-support` feature.

pub mod agent;
pub mod git;
pub mod notify;
pub mod subprocess;

pub use agent::{
    AgentContext, AgentError, AgentFacade, AgentHandle, ClaudeAgentFacade, SystemPrompt,
    NO_RESULT_ERROR,
};
#[cfg(any(test, feature = "test-support"))]
pub use agent::{FakeAgentFacade, FakeBehavior};
pub use git::{GitError, GitStatus};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
pub use notify::{
    DesktopNotifyAdapter, LogNotifyAdapter, NotifyAdapter, NotifyChannel, NotifyError,
    NOTIFY_TIMEOUT,
};
pub use subprocess::{run_with_timeout, SubprocessError, NETWORK_TIMEOUT};

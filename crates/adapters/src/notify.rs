// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound notification channels.
//!
//! The notification sink fans job outcomes out through [`NotifyAdapter`]
//! implementations. `sbd` is a headless daemon, so the default channel
//! writes structured alert records to the log stream; the desktop
//! channel exists for operators running the dispatcher on their own
//! machine. Every send is bounded by [`NOTIFY_TIMEOUT`] and failures
//! carry the channel name so the sink's log line says which one broke.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Bound on one notification send, matching the default for outbound
/// calls elsewhere in the pipeline.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{channel} notification failed: {reason}")]
    SendFailed { channel: &'static str, reason: String },
    #[error("{channel} notification timed out after {timeout:?}")]
    Timeout { channel: &'static str, timeout: Duration },
}

/// Channel names accepted by `SKYBRIDGE_NOTIFY_CHANNELS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyChannel {
    Log,
    Desktop,
}

sb_core::str_enum! {
    NotifyChannel {
        Log => "log",
        Desktop => "desktop",
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown notify channel: {0}")]
pub struct ChannelParseError(pub String);

impl std::str::FromStr for NotifyChannel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(NotifyChannel::Log),
            "desktop" => Ok(NotifyChannel::Desktop),
            other => Err(ChannelParseError(other.to_string())),
        }
    }
}

/// One outbound notification channel.
#[async_trait]
pub trait NotifyAdapter: Send + Sync + 'static {
    /// Send a notification with a title and message body.
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;

    /// Channel name used in error taxonomy and sink log lines.
    fn channel(&self) -> &'static str;
}

/// Default channel for a headless daemon: alerts become structured log
/// records under the `skybridge::alerts` target, where the operator's
/// log shipping already looks.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifyAdapter;

#[async_trait]
impl NotifyAdapter for LogNotifyAdapter {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "skybridge::alerts", title, message, "job outcome");
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

/// Desktop channel for operators running the dispatcher locally.
///
/// Display APIs are synchronous, so the send runs on the blocking pool;
/// a wedged notification service costs this channel its send, never a
/// worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotifyAdapter;

impl DesktopNotifyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifyAdapter for DesktopNotifyAdapter {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let channel = self.channel();
        let title = title.to_string();
        let message = message.to_string();
        let send = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .summary(&title)
                .body(&message)
                .show()
                .map(|_| ())
                .map_err(|e| e.to_string())
        });
        match tokio::time::timeout(NOTIFY_TIMEOUT, send).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(NotifyError::SendFailed { channel, reason }),
            Ok(Err(join_err)) => {
                Err(NotifyError::SendFailed { channel, reason: join_err.to_string() })
            }
            Err(_) => Err(NotifyError::Timeout { channel, timeout: NOTIFY_TIMEOUT }),
        }
    }

    fn channel(&self) -> &'static str {
        "desktop"
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{NotifyAdapter, NotifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded notification
    #[derive(Debug, Clone)]
    pub struct NotifyCall {
        pub title: String,
        pub message: String,
    }

    /// Fake notification adapter for testing
    #[derive(Clone, Default)]
    pub struct FakeNotifyAdapter {
        calls: Arc<Mutex<Vec<NotifyCall>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl FakeNotifyAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make subsequent sends fail (for isolation tests).
        pub fn set_failing(&self, fail: bool) {
            *self.fail.lock() = fail;
        }

        /// Get all recorded notifications
        pub fn calls(&self) -> Vec<NotifyCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl NotifyAdapter for FakeNotifyAdapter {
        async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
            if *self.fail.lock() {
                return Err(NotifyError::SendFailed {
                    channel: self.channel(),
                    reason: "configured to fail".to_string(),
                });
            }
            self.calls
                .lock()
                .push(NotifyCall { title: title.to_string(), message: message.to_string() });
            Ok(())
        }

        fn channel(&self) -> &'static str {
            "fake"
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[tokio::test]
async fn log_channel_always_succeeds() {
    let adapter = LogNotifyAdapter;
    adapter.notify("issue #7 resolved", "changes pushed").await.unwrap();
    assert_eq!(adapter.channel(), "log");
}

#[tokio::test]
async fn fake_records_calls_in_order() {
    let fake = FakeNotifyAdapter::new();
    fake.notify("first", "a").await.unwrap();
    fake.notify("second", "b").await.unwrap();

    let calls = fake.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].title, "first");
    assert_eq!(calls[1].message, "b");
}

#[tokio::test]
async fn failing_fake_reports_its_channel() {
    let fake = FakeNotifyAdapter::new();
    fake.set_failing(true);

    let err = fake.notify("t", "m").await.unwrap_err();
    assert!(matches!(err, NotifyError::SendFailed { channel: "fake", .. }));
    assert!(fake.calls().is_empty());
}

#[parameterized(
    log = { "log", NotifyChannel::Log },
    desktop = { "desktop", NotifyChannel::Desktop },
)]
fn channel_parses_and_displays(name: &str, expected: NotifyChannel) {
    let parsed: NotifyChannel = name.parse().unwrap();
    assert_eq!(parsed, expected);
    assert_eq!(parsed.as_str(), name);
}

#[test]
fn unknown_channel_is_rejected() {
    let err = "pager".parse::<NotifyChannel>().unwrap_err();
    assert_eq!(err, ChannelParseError("pager".to_string()));
}

#[test]
fn error_messages_name_the_channel() {
    let err = NotifyError::Timeout { channel: "desktop", timeout: NOTIFY_TIMEOUT };
    assert!(err.to_string().contains("desktop"));
    let err = NotifyError::SendFailed { channel: "log", reason: "sink closed".to_string() };
    assert!(err.to_string().contains("log notification failed"));
}

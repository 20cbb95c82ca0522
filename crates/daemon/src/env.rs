// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use sb_adapters::NotifyChannel;
use sb_core::EventSource;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the state directory:
/// `SKYBRIDGE_STATE_DIR` > `XDG_STATE_HOME/skybridge` > `~/.local/state/skybridge`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SKYBRIDGE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("skybridge");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local/state/skybridge")
}

/// Base directory for scratch trees (`WORKTREES_BASE_PATH`).
pub fn worktrees_base() -> PathBuf {
    std::env::var("WORKTREES_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join("worktrees"))
}

/// Base directory for per-workspace queues (`QUEUE_BASE_PATH`).
pub fn queue_base() -> PathBuf {
    std::env::var("QUEUE_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join("queues"))
}

/// Base directory for per-workspace data like `kanban.db`
/// (`WORKSPACES_BASE_PATH`).
pub fn workspaces_base() -> PathBuf {
    std::env::var("WORKSPACES_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join("workspaces"))
}

/// Base directory for daily log files.
pub fn logs_base() -> PathBuf {
    state_dir().join("logs")
}

/// Queue backend selector (`JOB_QUEUE_PROVIDER`); only `file` exists.
pub fn queue_provider() -> String {
    std::env::var("JOB_QUEUE_PROVIDER").unwrap_or_else(|_| "file".to_string())
}

/// Sources accepting webhooks (`WEBHOOK_ENABLED_SOURCES`, comma list).
pub fn enabled_sources() -> Vec<EventSource> {
    let raw = std::env::var("WEBHOOK_ENABLED_SOURCES").unwrap_or_else(|_| "github".to_string());
    raw.split(',')
        .filter_map(|name| name.trim().parse::<EventSource>().ok())
        .collect()
}

/// Per-source webhook secret (`WEBHOOK_{SOURCE}_SECRET`).
pub fn webhook_secret(source: EventSource) -> Option<String> {
    let key = format!("WEBHOOK_{}_SECRET", source.to_string().to_uppercase());
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Password guarding destructive operator endpoints
/// (`WEBUI_DELETE_PASSWORD`).
pub fn delete_password() -> Option<String> {
    std::env::var("WEBUI_DELETE_PASSWORD").ok().filter(|s| !s.is_empty())
}

/// Log filter (`SKYBRIDGE_LOG_LEVEL`), e.g. `info` or `sb_engine=debug`.
pub fn log_level() -> String {
    std::env::var("SKYBRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Grace before stale `processing/` entries are recovered
/// (`WEBHOOK_PROCESSING_RECOVERY_GRACE_SECONDS`, default 300).
pub fn recovery_grace() -> Duration {
    std::env::var("WEBHOOK_PROCESSING_RECOVERY_GRACE_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(300))
}

/// Notification channels (`SKYBRIDGE_NOTIFY_CHANNELS`, comma list of
/// `log`/`desktop`; default `log` for headless deployments).
pub fn notify_channels() -> Vec<NotifyChannel> {
    let raw = std::env::var("SKYBRIDGE_NOTIFY_CHANNELS").unwrap_or_else(|_| "log".to_string());
    raw.split(',')
        .filter_map(|name| name.trim().parse::<NotifyChannel>().ok())
        .collect()
}

/// Agent binary override (`SKYBRIDGE_AGENT_BIN`, default `claude`).
pub fn agent_binary() -> PathBuf {
    std::env::var("SKYBRIDGE_AGENT_BIN").map(PathBuf::from).unwrap_or_else(|_| "claude".into())
}

/// Optional system prompt template path (`SKYBRIDGE_SYSTEM_PROMPT_PATH`).
pub fn system_prompt_path() -> Option<PathBuf> {
    std::env::var("SKYBRIDGE_SYSTEM_PROMPT_PATH").ok().map(PathBuf::from)
}

/// Repository root for the default `core` workspace
/// (`SKYBRIDGE_REPO_PATH`, default the working directory).
pub fn repo_path() -> PathBuf {
    std::env::var("SKYBRIDGE_REPO_PATH").map(PathBuf::from).unwrap_or_else(|_| ".".into())
}

/// Optional ngrok tunnelling settings.
#[derive(Debug, Clone)]
pub struct NgrokConfig {
    pub auth_token: Option<String>,
    pub domain: Option<String>,
}

/// `NGROK_ENABLED` + `NGROK_AUTH_TOKEN` + `NGROK_DOMAIN`. The daemon
/// only records these; the tunnel itself is launched by deployment
/// tooling.
pub fn ngrok() -> Option<NgrokConfig> {
    let enabled = std::env::var("NGROK_ENABLED")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    enabled.then(|| NgrokConfig {
        auth_token: std::env::var("NGROK_AUTH_TOKEN").ok(),
        domain: std::env::var("NGROK_DOMAIN").ok(),
    })
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

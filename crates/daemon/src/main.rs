// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sbd: the Skybridge dispatcher daemon.
//!
//! Starts the job lifecycle engine for the `core` workspace and keeps
//! it running until SIGINT. The HTTP runtime that mounts the intake
//! handler and operator surface is deployment-specific and lives
//! outside this binary.

use sb_core::WorkspaceConfig;
use sb_daemon::lifecycle::{init_tracing, Daemon};
use sb_daemon::env;

#[tokio::main]
async fn main() {
    let _log_guard = init_tracing();

    if let Some(ngrok) = env::ngrok() {
        tracing::info!(domain = ?ngrok.domain, "ngrok tunnelling requested (managed externally)");
    }

    let workspaces = vec![WorkspaceConfig::new("core", env::repo_path())];
    let daemon = match Daemon::start(workspaces).await {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };

    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for shutdown signal");
    }
    daemon.shutdown().await;
}

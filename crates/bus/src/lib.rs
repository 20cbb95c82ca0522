// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-bus: in-process domain event bus.
//!
//! One bus per workspace. Subscribers register per [`EventKind`];
//! `publish` hands every matching subscriber its own clone of the event
//! on a spawned task and returns once all handlers are scheduled. A
//! failing or panicking subscriber is logged and never affects its
//! siblings or the publisher.

use async_trait::async_trait;
use parking_lot::RwLock;
use sb_core::{DomainEvent, EventKind, WorkspaceId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Buffered events for lagging stream consumers.
const STREAM_CAPACITY: usize = 256;

/// Error surfaced by a subscriber. Logged, never propagated.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An asynchronous subscriber.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;

    /// Name used in log lines when this handler fails.
    fn name(&self) -> &'static str {
        "handler"
    }
}

struct Subscriber {
    handler: Arc<dyn EventHandler>,
}

#[derive(Default)]
struct Inflight {
    count: AtomicUsize,
}

impl Inflight {
    fn enter(self: &Arc<Self>) -> InflightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InflightGuard { inflight: Arc::clone(self) }
    }
}

struct InflightGuard {
    inflight: Arc<Inflight>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-workspace publish/subscribe fabric.
pub struct EventBus {
    workspace_id: WorkspaceId,
    registry: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
    inflight: Arc<Inflight>,
    stream_tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(workspace_id: WorkspaceId) -> Self {
        let (stream_tx, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            workspace_id,
            registry: RwLock::new(HashMap::new()),
            inflight: Arc::new(Inflight::default()),
            stream_tx,
        }
    }

    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    /// Register a handler for one event kind.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.registry.write().entry(kind).or_default().push(Subscriber { handler });
    }

    /// Register a handler for every event kind.
    pub fn subscribe_all(&self, handler: Arc<dyn EventHandler>) {
        for kind in EventKind::all() {
            self.subscribe(*kind, Arc::clone(&handler));
        }
    }

    /// Number of subscribers for a kind (diagnostics).
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry.read().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Raw event stream for observability consumers. Lagging receivers
    /// drop old events rather than backpressure publishers.
    pub fn stream(&self) -> broadcast::Receiver<DomainEvent> {
        self.stream_tx.subscribe()
    }

    /// Dispatch `event` to every subscriber of its kind.
    ///
    /// Returns after all handlers have been scheduled; it does not wait
    /// for them to complete.
    pub fn publish(&self, event: DomainEvent) {
        // Stream consumers may or may not exist; a send error just means
        // nobody is listening right now.
        let _ = self.stream_tx.send(event.clone());

        let handlers: Vec<Arc<dyn EventHandler>> = {
            let registry = self.registry.read();
            match registry.get(&event.kind()) {
                Some(subscribers) => {
                    subscribers.iter().map(|s| Arc::clone(&s.handler)).collect()
                }
                None => Vec::new(),
            }
        };

        tracing::debug!(
            workspace = %self.workspace_id,
            event = event.name(),
            subscribers = handlers.len(),
            "publishing event"
        );

        for handler in handlers {
            let event = event.clone();
            let guard = self.inflight.enter();
            let workspace = self.workspace_id.clone();
            tokio::spawn(async move {
                let _guard = guard;
                let name = handler.name();
                // Run the handler on its own task so a panic is contained
                // as a JoinError instead of taking this dispatcher down.
                let joined = tokio::spawn({
                    let event = event.clone();
                    async move { handler.handle(&event).await }
                })
                .await;
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(
                            workspace = %workspace,
                            event = event.name(),
                            handler = name,
                            error = %e,
                            "event handler failed"
                        );
                    }
                    Err(join_err) => {
                        tracing::warn!(
                            workspace = %workspace,
                            event = event.name(),
                            handler = name,
                            error = %join_err,
                            "event handler panicked"
                        );
                    }
                }
            });
        }
    }

    /// Publish and wait for every handler spawned so far to finish.
    ///
    /// Projections become observable only after their handlers ran, so
    /// tests and shutdown paths use this to get a deterministic barrier.
    pub async fn publish_sync(&self, event: DomainEvent) {
        self.publish(event);
        self.drain().await;
    }

    /// Wait until no spawned handler is in flight. Bounded poll; handler
    /// tasks are short-lived, so the sleep stays in the noise.
    pub async fn drain(&self) {
        while self.inflight.count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("workspace_id", &self.workspace_id).finish()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

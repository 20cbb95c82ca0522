// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed operator surface.
//!
//! Every operation the dashboard and CLI tooling need, as plain
//! request/response types. The external HTTP runtime maps routes onto
//! these methods and renders [`SurfaceError::status`] as the response
//! code. Destructive operations require the operator password and an
//! explicit confirmation of the target's trailing hash.

use crate::registry::{WorkspaceHandle, WorkspaceRegistry};
use sb_core::{Clock, DomainEvent, JobStatus, Skill, SystemClock, WorkspaceId};
use sb_engine::{Worktree, WorktreeError};
use sb_kanban::{CardPatch, KanbanBoard, KanbanCard, KanbanError, KanbanList, NewCard};
use sb_queue::QueueError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("unknown workspace: {0}")]
    WorkspaceNotFound(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("confirmation hash does not match target")]
    ConfirmationMismatch,
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Kanban(#[from] KanbanError),
    #[error(transparent)]
    Worktree(#[from] WorktreeError),
}

impl SurfaceError {
    /// HTTP status the external runtime should render.
    pub fn status(&self) -> u16 {
        match self {
            SurfaceError::WorkspaceNotFound(_) | SurfaceError::NotFound(_) => 404,
            SurfaceError::Unauthorized(_) => 403,
            SurfaceError::ConfirmationMismatch => 400,
            SurfaceError::Queue(e) if e.is_unavailable() => 503,
            SurfaceError::Queue(_) => 500,
            SurfaceError::Kanban(KanbanError::ListNotSpecified) => 400,
            SurfaceError::Kanban(KanbanError::ListNotFound(_)) => 400,
            SurfaceError::Kanban(KanbanError::CardNotFound(_)) => 404,
            SurfaceError::Kanban(_) => 500,
            SurfaceError::Worktree(WorktreeError::NotFound(_)) => 404,
            SurfaceError::Worktree(_) => 500,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverResponse {
    pub operations: Vec<OperationDescriptor>,
    pub skills: Vec<SkillDescriptor>,
    pub workspaces: Vec<WorkspaceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: Skill,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub job_id: String,
    pub status: JobStatus,
    pub skill: Skill,
    pub attempt: u32,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCardRequest {
    pub list_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub labels: Option<Vec<String>>,
    /// Move to this list as part of the update.
    pub list_id: Option<i64>,
}

pub struct OperatorSurface {
    registry: Arc<WorkspaceRegistry>,
    delete_password: Option<String>,
    clock: SystemClock,
}

impl OperatorSurface {
    pub fn new(registry: Arc<WorkspaceRegistry>, delete_password: Option<String>) -> Self {
        Self { registry, delete_password, clock: SystemClock }
    }

    fn read(&self, workspace: Option<&str>) -> Result<Arc<WorkspaceHandle>, SurfaceError> {
        self.registry
            .resolve_read(workspace)
            .ok_or_else(|| SurfaceError::WorkspaceNotFound(workspace.unwrap_or("core").to_string()))
    }

    fn write(&self, workspace: Option<&str>) -> Result<Arc<WorkspaceHandle>, SurfaceError> {
        self.registry
            .resolve_write(workspace)
            .ok_or_else(|| SurfaceError::WorkspaceNotFound(workspace.unwrap_or("core").to_string()))
    }

    /// `GET /health`
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            version: crate::env::VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// `GET /discover`
    pub fn discover(&self) -> DiscoverResponse {
        DiscoverResponse {
            operations: vec![
                OperationDescriptor {
                    method: "POST",
                    path: "/webhooks/{source}",
                    description: "Receive a signed webhook and enqueue a job",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/health",
                    description: "Liveness and version",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/discover",
                    description: "This operation listing",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/webhooks/jobs",
                    description: "Jobs across all queue states",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/webhooks/worktrees",
                    description: "Recorded worktrees",
                },
                OperationDescriptor {
                    method: "DELETE",
                    path: "/webhooks/worktrees/{name}",
                    description: "Force-remove a worktree (password + hash confirmation)",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/kanban/boards",
                    description: "Kanban boards",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/kanban/lists",
                    description: "Kanban lists",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/kanban/cards",
                    description: "Kanban cards in display order",
                },
                OperationDescriptor {
                    method: "POST",
                    path: "/kanban/cards",
                    description: "Create a card (explicit list required)",
                },
                OperationDescriptor {
                    method: "PATCH",
                    path: "/kanban/cards/{id}",
                    description: "Update or move a card",
                },
                OperationDescriptor {
                    method: "DELETE",
                    path: "/kanban/cards/{id}",
                    description: "Delete a card",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/observability/events/stream",
                    description: "Server-sent domain events for one workspace",
                },
                OperationDescriptor {
                    method: "GET",
                    path: "/observability/metrics",
                    description: "Metrics in text exposition format",
                },
            ],
            skills: Skill::catalog()
                .map(|(name, timeout)| SkillDescriptor {
                    name,
                    timeout_seconds: timeout.as_secs(),
                })
                .collect(),
            workspaces: self.registry.ids(),
        }
    }

    /// `GET /webhooks/jobs`
    pub fn jobs(&self, workspace: Option<&str>) -> Result<Vec<JobEntry>, SurfaceError> {
        let handle = self.read(workspace)?;
        let mut entries = Vec::new();
        for status in
            [JobStatus::Pending, JobStatus::Processing, JobStatus::Completed, JobStatus::Failed]
        {
            for record in handle.queue.list(status)? {
                entries.push(JobEntry {
                    job_id: record.job.job_id.to_string(),
                    status,
                    skill: record.job.skill,
                    attempt: record.job.attempt,
                    created_at_ms: record.job.created_at_ms,
                    completed_at_ms: record.job.completed_at_ms,
                    last_error: record.job.last_error,
                });
            }
        }
        entries.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(entries)
    }

    /// `GET /webhooks/worktrees`
    pub fn worktrees(&self, workspace: Option<&str>) -> Result<Vec<Worktree>, SurfaceError> {
        Ok(self.read(workspace)?.worktrees.list()?)
    }

    /// `DELETE /webhooks/worktrees/{name}?password=…&confirm=…`
    ///
    /// Destructive: requires the operator password and confirmation of
    /// the target's trailing hash segment.
    pub async fn delete_worktree(
        &self,
        workspace: Option<&str>,
        name: &str,
        password: Option<&str>,
        confirm: &str,
    ) -> Result<(), SurfaceError> {
        let handle = self.write(workspace)?;
        let Some(expected) = self.delete_password.as_deref() else {
            return Err(SurfaceError::Unauthorized("destructive operations are disabled"));
        };
        if password != Some(expected) {
            return Err(SurfaceError::Unauthorized("wrong password"));
        }
        if confirm.is_empty() || !name.ends_with(confirm) {
            return Err(SurfaceError::ConfirmationMismatch);
        }
        handle.worktrees.remove(name, true).await?;
        Ok(())
    }

    /// `GET /kanban/boards`
    pub fn kanban_boards(&self, workspace: Option<&str>) -> Result<Vec<KanbanBoard>, SurfaceError> {
        Ok(self.read(workspace)?.kanban.boards()?)
    }

    /// `GET /kanban/lists`
    pub fn kanban_lists(&self, workspace: Option<&str>) -> Result<Vec<KanbanList>, SurfaceError> {
        Ok(self.read(workspace)?.kanban.lists()?)
    }

    /// `GET /kanban/cards[?list_id=…]`
    pub fn kanban_cards(
        &self,
        workspace: Option<&str>,
        list_id: Option<i64>,
    ) -> Result<Vec<KanbanCard>, SurfaceError> {
        Ok(self.read(workspace)?.kanban.cards(list_id)?)
    }

    /// `POST /kanban/cards` — fails with 400 when `list_id` is absent.
    pub fn create_card(
        &self,
        workspace: Option<&str>,
        req: CreateCardRequest,
    ) -> Result<KanbanCard, SurfaceError> {
        let handle = self.write(workspace)?;
        Ok(handle.kanban.create_card(
            NewCard {
                list_id: req.list_id,
                title: req.title,
                description: req.description,
                labels: req.labels,
                issue_number: None,
                issue_url: None,
            },
            self.clock.epoch_ms(),
        )?)
    }

    /// `PATCH /kanban/cards/{id}`
    pub fn update_card(
        &self,
        workspace: Option<&str>,
        id: i64,
        req: UpdateCardRequest,
    ) -> Result<KanbanCard, SurfaceError> {
        let handle = self.write(workspace)?;
        let now_ms = self.clock.epoch_ms();
        if let Some(list_id) = req.list_id {
            handle.kanban.move_card(id, list_id, now_ms)?;
        }
        Ok(handle.kanban.update_card(
            id,
            CardPatch { title: req.title, description: req.description, labels: req.labels },
            now_ms,
        )?)
    }

    /// `DELETE /kanban/cards/{id}`
    pub fn delete_card(&self, workspace: Option<&str>, id: i64) -> Result<(), SurfaceError> {
        let handle = self.write(workspace)?;
        Ok(handle.kanban.delete_card(id, self.clock.epoch_ms())?)
    }

    /// `GET /observability/events/stream` — per-workspace event feed
    /// suitable for SSE.
    pub fn events(
        &self,
        workspace: Option<&str>,
    ) -> Result<broadcast::Receiver<DomainEvent>, SurfaceError> {
        Ok(self.read(workspace)?.bus.stream())
    }

    /// `GET /observability/metrics`
    pub fn metrics_text(&self, workspace: Option<&str>) -> Result<String, SurfaceError> {
        let handle = self.read(workspace)?;
        let _ = handle.queue.refresh_gauges();
        Ok(handle.metrics.snapshot().render_text())
    }
}

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;

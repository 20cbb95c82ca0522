// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed board storage.
//!
//! One store (and one writer) per workspace; WAL mode keeps concurrent
//! readers cheap. Bootstrap creates the default board with its six
//! lists. Mutations that do not name a target list fail with
//! [`KanbanError::ListNotSpecified`] — there is no implicit default.

use crate::model::{
    CardEvent, CardHistoryEntry, KanbanBoard, KanbanCard, KanbanList, DEFAULT_LISTS,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("kanban database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("kanban I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no target list specified; allowed lists: {}", DEFAULT_LISTS.join(", "))]
    ListNotSpecified,
    #[error("kanban list not found: {0}")]
    ListNotFound(String),
    #[error("kanban card not found: {0}")]
    CardNotFound(i64),
    #[error("labels column corrupt: {0}")]
    BadLabels(#[from] serde_json::Error),
}

/// Fields for a new card. `list_id` is required; leaving it out is the
/// explicit-failure path the API surfaces as HTTP 400.
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub list_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub labels: Vec<String>,
    pub issue_number: Option<u64>,
    pub issue_url: Option<String>,
}

/// Partial update for an existing card.
#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub labels: Option<Vec<String>>,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS boards (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS lists (
    id INTEGER PRIMARY KEY,
    board_id INTEGER NOT NULL REFERENCES boards(id),
    name TEXT NOT NULL,
    position INTEGER NOT NULL,
    UNIQUE(board_id, name)
);

CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY,
    list_id INTEGER NOT NULL REFERENCES lists(id),
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    position INTEGER NOT NULL DEFAULT 0,
    labels TEXT NOT NULL DEFAULT '[]',
    being_processed INTEGER NOT NULL DEFAULT 0,
    processing_started_at_ms INTEGER,
    processing_job_id TEXT,
    processing_step INTEGER,
    processing_total_steps INTEGER,
    issue_number INTEGER UNIQUE,
    issue_url TEXT,
    pr_url TEXT,
    created_at_ms INTEGER NOT NULL,
    updated_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cards_list ON cards(list_id);

CREATE TABLE IF NOT EXISTS card_history (
    id INTEGER PRIMARY KEY,
    card_id INTEGER NOT NULL REFERENCES cards(id),
    event TEXT NOT NULL,
    from_list_id INTEGER,
    to_list_id INTEGER,
    metadata TEXT NOT NULL DEFAULT '{}',
    occurred_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_card ON card_history(card_id);
"#;

/// Card ordering used by every listing query.
const CARD_ORDER: &str = "ORDER BY being_processed DESC, position ASC, created_at_ms DESC";

#[derive(Clone)]
pub struct KanbanStore {
    conn: Arc<Mutex<Connection>>,
}

impl KanbanStore {
    /// Open (or create) the workspace board at `path`.
    pub fn open(path: &Path) -> Result<Self, KanbanError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    /// In-memory board for tests.
    pub fn open_in_memory() -> Result<Self, KanbanError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, KanbanError> {
        conn.execute_batch(SCHEMA_SQL)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.bootstrap()?;
        Ok(store)
    }

    /// Create the default board and its six lists on first use.
    fn bootstrap(&self) -> Result<(), KanbanError> {
        let conn = self.conn.lock();
        let boards: i64 = conn.query_row("SELECT COUNT(*) FROM boards", [], |r| r.get(0))?;
        if boards > 0 {
            return Ok(());
        }
        conn.execute(
            "INSERT INTO boards (name, created_at_ms) VALUES (?1, 0)",
            params!["Skybridge"],
        )?;
        let board_id = conn.last_insert_rowid();
        for (position, name) in DEFAULT_LISTS.iter().enumerate() {
            conn.execute(
                "INSERT INTO lists (board_id, name, position) VALUES (?1, ?2, ?3)",
                params![board_id, name, position as i64],
            )?;
        }
        tracing::info!(board_id, lists = DEFAULT_LISTS.len(), "kanban board bootstrapped");
        Ok(())
    }

    pub fn boards(&self) -> Result<Vec<KanbanBoard>, KanbanError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, created_at_ms FROM boards ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(KanbanBoard {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at_ms: row.get::<_, i64>(2)? as u64,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn lists(&self) -> Result<Vec<KanbanList>, KanbanError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, board_id, name, position FROM lists ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok(KanbanList {
                id: row.get(0)?,
                board_id: row.get(1)?,
                name: row.get(2)?,
                position: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Resolve a list by name; `Err(ListNotFound)` when absent.
    pub fn list_by_name(&self, name: &str) -> Result<KanbanList, KanbanError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, board_id, name, position FROM lists WHERE name = ?1",
            params![name],
            |row| {
                Ok(KanbanList {
                    id: row.get(0)?,
                    board_id: row.get(1)?,
                    name: row.get(2)?,
                    position: row.get(3)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => KanbanError::ListNotFound(name.to_string()),
            other => KanbanError::Sqlite(other),
        })
    }

    /// Create a card. Fails explicitly when no list is specified.
    pub fn create_card(&self, card: NewCard, now_ms: u64) -> Result<KanbanCard, KanbanError> {
        let Some(list_id) = card.list_id else {
            return Err(KanbanError::ListNotSpecified);
        };
        let conn = self.conn.lock();
        let exists: i64 =
            conn.query_row("SELECT COUNT(*) FROM lists WHERE id = ?1", params![list_id], |r| {
                r.get(0)
            })?;
        if exists == 0 {
            return Err(KanbanError::ListNotFound(format!("id {list_id}")));
        }
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM cards WHERE list_id = ?1",
            params![list_id],
            |r| r.get(0),
        )?;
        conn.execute(
            "INSERT INTO cards (list_id, title, description, position, labels, issue_number, \
             issue_url, created_at_ms, updated_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                list_id,
                card.title,
                card.description,
                position,
                serde_json::to_string(&card.labels)?,
                card.issue_number.map(|n| n as i64),
                card.issue_url,
                now_ms as i64,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO card_history (card_id, event, to_list_id, occurred_at_ms) \
             VALUES (?1, 'created', ?2, ?3)",
            params![id, list_id, now_ms as i64],
        )?;
        drop(conn);
        self.card(id)
    }

    pub fn card(&self, id: i64) -> Result<KanbanCard, KanbanError> {
        let conn = self.conn.lock();
        conn.query_row(&format!("{CARD_SELECT} WHERE id = ?1"), params![id], row_to_card)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => KanbanError::CardNotFound(id),
                other => KanbanError::Sqlite(other),
            })
    }

    pub fn card_by_issue(&self, issue_number: u64) -> Result<Option<KanbanCard>, KanbanError> {
        let conn = self.conn.lock();
        match conn.query_row(
            &format!("{CARD_SELECT} WHERE issue_number = ?1"),
            params![issue_number as i64],
            row_to_card,
        ) {
            Ok(card) => Ok(Some(card)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Cards, optionally filtered by list, in display order.
    pub fn cards(&self, list_id: Option<i64>) -> Result<Vec<KanbanCard>, KanbanError> {
        let conn = self.conn.lock();
        let mut cards = Vec::new();
        match list_id {
            Some(list_id) => {
                let mut stmt =
                    conn.prepare(&format!("{CARD_SELECT} WHERE list_id = ?1 {CARD_ORDER}"))?;
                let rows = stmt.query_map(params![list_id], row_to_card)?;
                for row in rows {
                    cards.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!("{CARD_SELECT} {CARD_ORDER}"))?;
                let rows = stmt.query_map([], row_to_card)?;
                for row in rows {
                    cards.push(row?);
                }
            }
        }
        Ok(cards)
    }

    /// Apply a partial update; appends an `updated` history row.
    pub fn update_card(&self, id: i64, patch: CardPatch, now_ms: u64) -> Result<KanbanCard, KanbanError> {
        let current = self.card(id)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE cards SET title = ?2, description = ?3, labels = ?4, updated_at_ms = ?5 \
             WHERE id = ?1",
            params![
                id,
                patch.title.unwrap_or(current.title),
                patch.description.unwrap_or(current.description),
                serde_json::to_string(&patch.labels.unwrap_or(current.labels))?,
                now_ms as i64,
            ],
        )?;
        conn.execute(
            "INSERT INTO card_history (card_id, event, occurred_at_ms) VALUES (?1, 'updated', ?2)",
            params![id, now_ms as i64],
        )?;
        drop(conn);
        self.card(id)
    }

    pub fn delete_card(&self, id: i64, now_ms: u64) -> Result<(), KanbanError> {
        let _ = self.card(id)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO card_history (card_id, event, occurred_at_ms) VALUES (?1, 'deleted', ?2)",
            params![id, now_ms as i64],
        )?;
        conn.execute("DELETE FROM cards WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Move a card to another list, appending it at the bottom.
    pub fn move_card(&self, id: i64, to_list_id: i64, now_ms: u64) -> Result<(), KanbanError> {
        let card = self.card(id)?;
        let conn = self.conn.lock();
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM cards WHERE list_id = ?1",
            params![to_list_id],
            |r| r.get(0),
        )?;
        conn.execute(
            "UPDATE cards SET list_id = ?2, position = ?3, updated_at_ms = ?4 WHERE id = ?1",
            params![id, to_list_id, position, now_ms as i64],
        )?;
        conn.execute(
            "INSERT INTO card_history (card_id, event, from_list_id, to_list_id, occurred_at_ms) \
             VALUES (?1, 'moved', ?2, ?3, ?4)",
            params![id, card.list_id, to_list_id, now_ms as i64],
        )?;
        Ok(())
    }

    /// Mark a card live: `being_processed = true` forces `position = 0`.
    pub fn start_processing(
        &self,
        id: i64,
        job_id: &str,
        to_list_id: i64,
        now_ms: u64,
    ) -> Result<(), KanbanError> {
        let card = self.card(id)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE cards SET being_processed = 1, position = 0, processing_started_at_ms = ?2, \
             processing_job_id = ?3, processing_step = NULL, processing_total_steps = NULL, \
             list_id = ?4, updated_at_ms = ?2 WHERE id = ?1",
            params![id, now_ms as i64, job_id, to_list_id],
        )?;
        conn.execute(
            "INSERT INTO card_history (card_id, event, from_list_id, to_list_id, metadata, occurred_at_ms) \
             VALUES (?1, 'processing_started', ?2, ?3, ?4, ?5)",
            params![
                id,
                card.list_id,
                to_list_id,
                serde_json::json!({ "job_id": job_id }).to_string(),
                now_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn set_progress(
        &self,
        id: i64,
        step: u32,
        total_steps: Option<u32>,
        now_ms: u64,
    ) -> Result<(), KanbanError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE cards SET processing_step = ?2, processing_total_steps = ?3, \
             updated_at_ms = ?4 WHERE id = ?1",
            params![id, step, total_steps, now_ms as i64],
        )?;
        if changed == 0 {
            return Err(KanbanError::CardNotFound(id));
        }
        Ok(())
    }

    pub fn set_pr_url(&self, id: i64, pr_url: &str, now_ms: u64) -> Result<(), KanbanError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE cards SET pr_url = ?2, updated_at_ms = ?3 WHERE id = ?1",
            params![id, pr_url, now_ms as i64],
        )?;
        if changed == 0 {
            return Err(KanbanError::CardNotFound(id));
        }
        conn.execute(
            "INSERT INTO card_history (card_id, event, metadata, occurred_at_ms) \
             VALUES (?1, 'pr_created', ?2, ?3)",
            params![id, serde_json::json!({ "pr_url": pr_url }).to_string(), now_ms as i64],
        )?;
        Ok(())
    }

    /// Clear the live flag and park the card in `to_list_id`.
    pub fn finish_processing(
        &self,
        id: i64,
        to_list_id: i64,
        event: CardEvent,
        metadata: serde_json::Value,
        now_ms: u64,
    ) -> Result<(), KanbanError> {
        let card = self.card(id)?;
        let conn = self.conn.lock();
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM cards WHERE list_id = ?1 AND id != ?2",
            params![to_list_id, id],
            |r| r.get(0),
        )?;
        conn.execute(
            "UPDATE cards SET being_processed = 0, processing_started_at_ms = NULL, \
             processing_job_id = NULL, processing_step = NULL, processing_total_steps = NULL, \
             list_id = ?2, position = ?3, updated_at_ms = ?4 WHERE id = ?1",
            params![id, to_list_id, position, now_ms as i64],
        )?;
        conn.execute(
            "INSERT INTO card_history (card_id, event, from_list_id, to_list_id, metadata, occurred_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                event.to_string(),
                card.list_id,
                to_list_id,
                metadata.to_string(),
                now_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn add_label(&self, id: i64, label: &str, now_ms: u64) -> Result<(), KanbanError> {
        let card = self.card(id)?;
        if card.labels.iter().any(|l| l == label) {
            return Ok(());
        }
        let mut labels = card.labels;
        labels.push(label.to_string());
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE cards SET labels = ?2, updated_at_ms = ?3 WHERE id = ?1",
            params![id, serde_json::to_string(&labels)?, now_ms as i64],
        )?;
        Ok(())
    }

    pub fn history(&self, card_id: i64) -> Result<Vec<CardHistoryEntry>, KanbanError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, card_id, event, from_list_id, to_list_id, metadata, occurred_at_ms \
             FROM card_history WHERE card_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![card_id], |row| {
            let event: String = row.get(2)?;
            let metadata: String = row.get(5)?;
            Ok(CardHistoryEntry {
                id: row.get(0)?,
                card_id: row.get(1)?,
                event: CardEvent::parse(&event).unwrap_or(CardEvent::Updated),
                from_list_id: row.get(3)?,
                to_list_id: row.get(4)?,
                metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
                occurred_at_ms: row.get::<_, i64>(6)? as u64,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

const CARD_SELECT: &str = "SELECT id, list_id, title, description, position, labels, \
    being_processed, processing_started_at_ms, processing_job_id, processing_step, \
    processing_total_steps, issue_number, issue_url, pr_url, created_at_ms, updated_at_ms \
    FROM cards";

fn row_to_card(row: &Row<'_>) -> rusqlite::Result<KanbanCard> {
    let labels: String = row.get(5)?;
    Ok(KanbanCard {
        id: row.get(0)?,
        list_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        position: row.get(4)?,
        labels: serde_json::from_str(&labels).unwrap_or_default(),
        being_processed: row.get::<_, i64>(6)? != 0,
        processing_started_at_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        processing_job_id: row.get(8)?,
        processing_step: row.get::<_, Option<i64>>(9)?.map(|v| v as u32),
        processing_total_steps: row.get::<_, Option<i64>>(10)?.map(|v| v as u32),
        issue_number: row.get::<_, Option<i64>>(11)?.map(|v| v as u64),
        issue_url: row.get(12)?,
        pr_url: row.get(13)?,
        created_at_ms: row.get::<_, i64>(14)? as u64,
        updated_at_ms: row.get::<_, i64>(15)? as u64,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

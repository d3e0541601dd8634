//! Durable conversation history backed by SQLite.
//!
//! Two tables: `conversations` (unique names, creation order by id) and
//! `entries` (append-only, display order by id). Every lookup-then-mutate
//! operation runs inside a single transaction.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

use crate::ai::{ConversationEntry, Role};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error("Conversation already exists: {0}")]
    DuplicateName(String),
    #[error("Conversation name must not be empty")]
    InvalidName,
    #[error("Corrupt entry: unknown role {0:?}")]
    UnknownRole(String),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        text TEXT NOT NULL,
        role TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS entries_by_conversation ON entries(conversation_id, id);
";

/// Session-scoped handle to the conversation database. Owned by the UI
/// context and passed explicitly; the connection closes when the store is
/// dropped or [`close`](Self::close)d.
pub struct ConversationStore {
    conn: Connection,
}

impl ConversationStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        log::info!("ConversationStore: opened {}", path.display());
        Self::init(conn)
    }

    /// Non-durable store, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Close the connection, surfacing any error instead of dropping it.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    pub fn create_conversation(&mut self, name: &str) -> Result<(), StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidName);
        }
        let tx = self.conn.transaction()?;
        if lookup_id(&tx, name)?.is_some() {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        tx.execute("INSERT INTO conversations (name) VALUES (?1)", params![name])?;
        tx.commit()?;
        log::info!("ConversationStore: created {:?}", name);
        Ok(())
    }

    /// Names in creation order.
    pub fn list_conversations(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM conversations ORDER BY id ASC")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn conversation_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(lookup_id(&self.conn, name)?.is_some())
    }

    pub fn append_entry(&mut self, name: &str, role: Role, text: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let id = require_id(&tx, name)?;
        tx.execute(
            "INSERT INTO entries (conversation_id, text, role) VALUES (?1, ?2, ?3)",
            params![id, text, role.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Every entry of `name`, oldest first.
    pub fn list_entries(&mut self, name: &str) -> Result<Vec<ConversationEntry>, StoreError> {
        let tx = self.conn.transaction()?;
        let id = require_id(&tx, name)?;
        let entries = select_entries(
            &tx,
            "SELECT role, text FROM entries WHERE conversation_id = ?1 ORDER BY id ASC",
            params![id],
        )?;
        tx.commit()?;
        Ok(entries)
    }

    /// The newest `limit` entries of `name`, still oldest first.
    pub fn recent_entries(
        &mut self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<ConversationEntry>, StoreError> {
        let tx = self.conn.transaction()?;
        let id = require_id(&tx, name)?;
        let mut entries = select_entries(
            &tx,
            "SELECT role, text FROM entries WHERE conversation_id = ?1 ORDER BY id DESC LIMIT ?2",
            params![id, limit as i64],
        )?;
        tx.commit()?;
        entries.reverse();
        Ok(entries)
    }

    /// Remove the conversation together with all of its entries.
    pub fn delete_conversation(&mut self, name: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let id = require_id(&tx, name)?;
        tx.execute("DELETE FROM entries WHERE conversation_id = ?1", params![id])?;
        tx.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        tx.commit()?;
        log::info!("ConversationStore: deleted {:?}", name);
        Ok(())
    }

    /// Remove all entries but keep the conversation.
    pub fn clear_entries(&mut self, name: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let id = require_id(&tx, name)?;
        tx.execute("DELETE FROM entries WHERE conversation_id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }
}

/// Names are stored trimmed, so every lookup trims too.
fn lookup_id(conn: &Connection, name: &str) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id FROM conversations WHERE name = ?1",
            params![name.trim()],
            |row| row.get(0),
        )
        .optional()?)
}

fn require_id(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    lookup_id(tx, name)?.ok_or_else(|| StoreError::NotFound(name.trim().to_string()))
}

fn select_entries(
    tx: &Transaction<'_>,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<ConversationEntry>, StoreError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt
        .query_map(args, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(role, text)| {
            let role = Role::parse(&role).ok_or(StoreError::UnknownRole(role))?;
            Ok(ConversationEntry { role, text })
        })
        .collect()
}

pub mod models;

use chrono::{DateTime, Utc};
use models::ChatMessage;
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Key holding the assistant thread id across chat sessions.
pub const THREAD_ID_KEY: &str = "chat-thread-id";
/// Key holding the whole deadline list as a JSON array.
pub const DEADLINES_KEY: &str = "deadlines-board";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).ok();
        Self::open(&data_dir.join("portfolio.db"))
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                is_assistant INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Local storage ──

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Transcript ──

    pub fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, content, is_assistant, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                message.id,
                message.content,
                message.is_assistant,
                message.timestamp.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Transcript in insertion order.
    pub fn get_messages(&self) -> Result<Vec<ChatMessage>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, content, is_assistant, created_at FROM messages ORDER BY seq ASC")?;
        let rows = stmt.query_map([], |row| {
            let created_at: String = row.get(3)?;
            let timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
                })?;
            Ok(ChatMessage {
                id: row.get(0)?,
                content: row.get(1)?,
                is_assistant: row.get(2)?,
                timestamp,
            })
        })?;
        rows.collect()
    }

    pub fn clear_messages(&self) -> Result<()> {
        self.conn().execute("DELETE FROM messages", [])?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

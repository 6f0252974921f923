use futures::future::BoxFuture;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::core::error::StoreError;
use crate::core::ports::store::ChatStorePort;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS chat_history (
        id TEXT PRIMARY KEY,
        article_title TEXT NOT NULL,
        article_url TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        modified_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        chat_id TEXT NOT NULL,
        text TEXT NOT NULL,
        sent INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        modified_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        FOREIGN KEY (chat_id) REFERENCES chat_history(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);

    CREATE TRIGGER IF NOT EXISTS messages_modified_at
    AFTER UPDATE ON messages
    BEGIN
        UPDATE messages
        SET modified_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = NEW.id;
    END;

    CREATE TRIGGER IF NOT EXISTS chat_history_modified_at
    AFTER UPDATE ON chat_history
    BEGIN
        UPDATE chat_history
        SET modified_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = NEW.id;
    END;
";

const MESSAGE_COLUMNS: &str = "id, chat_id, text, sent, created_at, modified_at";
const CHAT_HISTORY_COLUMNS: &str = "id, article_title, article_url, created_at, modified_at";

/// Timestamp layout shared by the SQLite defaults and in-memory records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub text: String,
    pub sent: bool,
    pub created_at: String,
    pub modified_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatHistory {
    pub id: String,
    pub article_title: String,
    pub article_url: String,
    pub created_at: String,
    pub modified_at: String,
}

pub struct ChatDb {
    conn: Connection,
}

impl ChatDb {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Worker(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // Foreign keys are off by default in SQLite and are per-connection.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn create_chat_history(
        &mut self,
        id: &str,
        article_title: &str,
        article_url: &str,
    ) -> Result<ChatHistory, StoreError> {
        let sql = format!(
            "INSERT INTO chat_history (id, article_title, article_url)
             VALUES (?1, ?2, ?3)
             RETURNING {CHAT_HISTORY_COLUMNS}"
        );
        self.conn
            .query_row(&sql, params![id, article_title, article_url], chat_history_from_row)
            .map_err(|e| classify_constraint(e, "chat history", id, None))
    }

    pub fn create_message(
        &mut self,
        id: &str,
        chat_id: &str,
        text: &str,
        sent: bool,
    ) -> Result<Message, StoreError> {
        let sql = format!(
            "INSERT INTO messages (id, chat_id, text, sent)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {MESSAGE_COLUMNS}"
        );
        self.conn
            .query_row(&sql, params![id, chat_id, text, sent], message_from_row)
            .map_err(|e| classify_constraint(e, "message", id, Some(chat_id)))
    }

    pub fn get_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], message_from_row)
            .optional()?)
    }

    pub fn get_all_messages(&self) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], message_from_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_messages_by_chat_id(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![chat_id], message_from_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn update_message(&mut self, id: &str, text: &str) -> Result<usize, StoreError> {
        Ok(self
            .conn
            .execute("UPDATE messages SET text = ?1 WHERE id = ?2", params![text, id])?)
    }

    pub fn delete_message(&mut self, id: &str) -> Result<usize, StoreError> {
        Ok(self
            .conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])?)
    }

    pub fn get_chat_history_by_id(&self, id: &str) -> Result<Option<ChatHistory>, StoreError> {
        let sql = format!("SELECT {CHAT_HISTORY_COLUMNS} FROM chat_history WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], chat_history_from_row)
            .optional()?)
    }

    pub fn get_all_chat_histories(&self) -> Result<Vec<ChatHistory>, StoreError> {
        let sql = format!(
            "SELECT {CHAT_HISTORY_COLUMNS} FROM chat_history ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], chat_history_from_row)?;

        let mut histories = Vec::new();
        for row in rows {
            histories.push(row?);
        }
        Ok(histories)
    }

    pub fn update_chat_history(
        &mut self,
        id: &str,
        article_title: &str,
        article_url: &str,
    ) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "UPDATE chat_history SET article_title = ?1, article_url = ?2 WHERE id = ?3",
            params![article_title, article_url, id],
        )?)
    }

    /// Deletes the history; its messages go with it through the cascade.
    pub fn delete_chat_history(&mut self, id: &str) -> Result<usize, StoreError> {
        Ok(self
            .conn
            .execute("DELETE FROM chat_history WHERE id = ?1", params![id])?)
    }

    pub fn reset(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            DROP TABLE IF EXISTS messages;
            DROP TABLE IF EXISTS chat_history;
            ",
        )?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        Ok(())
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        text: row.get(2)?,
        sent: row.get(3)?,
        created_at: row.get(4)?,
        modified_at: row.get(5)?,
    })
}

fn chat_history_from_row(row: &Row<'_>) -> rusqlite::Result<ChatHistory> {
    Ok(ChatHistory {
        id: row.get(0)?,
        article_title: row.get(1)?,
        article_url: row.get(2)?,
        created_at: row.get(3)?,
        modified_at: row.get(4)?,
    })
}

fn classify_constraint(
    error: rusqlite::Error,
    entity: &'static str,
    id: &str,
    chat_id: Option<&str>,
) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &error {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                return StoreError::DuplicateId {
                    entity,
                    id: id.to_string(),
                };
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                if let Some(chat_id) = chat_id {
                    return StoreError::MissingChatHistory(chat_id.to_string());
                }
            }
            _ => {}
        }
    }
    StoreError::Sqlite(error)
}

/// Async store over one shared connection; every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteChatStore {
    db: Arc<Mutex<ChatDb>>,
}

impl SqliteChatStore {
    pub fn new(db: ChatDb) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(ChatDb::open(path)?))
    }

    fn with_db<'a, T, F>(&'a self, op: F) -> BoxFuture<'a, Result<T, StoreError>>
    where
        T: Send + 'static,
        F: FnOnce(&mut ChatDb) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let mut guard = db
                    .lock()
                    .map_err(|_| StoreError::Worker("chat database lock poisoned".to_string()))?;
                op(&mut *guard)
            })
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?
        })
    }
}

impl ChatStorePort for SqliteChatStore {
    fn create_chat_history<'a>(
        &'a self,
        id: &'a str,
        article_title: &'a str,
        article_url: &'a str,
    ) -> BoxFuture<'a, Result<ChatHistory, StoreError>> {
        let (id, title, url) = (id.to_string(), article_title.to_string(), article_url.to_string());
        self.with_db(move |db| db.create_chat_history(&id, &title, &url))
    }

    fn create_message<'a>(
        &'a self,
        id: &'a str,
        chat_id: &'a str,
        text: &'a str,
        sent: bool,
    ) -> BoxFuture<'a, Result<Message, StoreError>> {
        let (id, chat_id, text) = (id.to_string(), chat_id.to_string(), text.to_string());
        self.with_db(move |db| db.create_message(&id, &chat_id, &text, sent))
    }

    fn get_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Message>, StoreError>> {
        let id = id.to_string();
        self.with_db(move |db| db.get_message(&id))
    }

    fn get_all_messages(&self) -> BoxFuture<'_, Result<Vec<Message>, StoreError>> {
        self.with_db(|db| db.get_all_messages())
    }

    fn get_messages_by_chat_id<'a>(
        &'a self,
        chat_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Message>, StoreError>> {
        let chat_id = chat_id.to_string();
        self.with_db(move |db| db.get_messages_by_chat_id(&chat_id))
    }

    fn update_message<'a>(
        &'a self,
        id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<usize, StoreError>> {
        let (id, text) = (id.to_string(), text.to_string());
        self.with_db(move |db| db.update_message(&id, &text))
    }

    fn delete_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<usize, StoreError>> {
        let id = id.to_string();
        self.with_db(move |db| db.delete_message(&id))
    }

    fn get_chat_history_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ChatHistory>, StoreError>> {
        let id = id.to_string();
        self.with_db(move |db| db.get_chat_history_by_id(&id))
    }

    fn get_all_chat_histories(&self) -> BoxFuture<'_, Result<Vec<ChatHistory>, StoreError>> {
        self.with_db(|db| db.get_all_chat_histories())
    }

    fn update_chat_history<'a>(
        &'a self,
        id: &'a str,
        article_title: &'a str,
        article_url: &'a str,
    ) -> BoxFuture<'a, Result<usize, StoreError>> {
        let (id, title, url) = (id.to_string(), article_title.to_string(), article_url.to_string());
        self.with_db(move |db| db.update_chat_history(&id, &title, &url))
    }

    fn delete_chat_history<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<usize, StoreError>> {
        let id = id.to_string();
        self.with_db(move |db| db.delete_chat_history(&id))
    }

    fn reset(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.with_db(|db| db.reset())
    }
}

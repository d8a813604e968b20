//! Message Store
//!
//! Idempotent relay bookkeeping. A relay record maps the source message key
//! (`<channel>-<ts>`) to the raw `chat.postMessage` response of its timeline
//! copy. A record exists exactly while the copy is live in the timeline.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::model::{Message, RelayedMessage, User};
use crate::slack::types::PostedMessage;
use crate::slack::ChatApi;

/// Relay bookkeeping as the coordinator sees it
#[async_trait]
pub trait MessageRepository: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool>;

    /// Relay `message` to the timeline as `user`, once per key
    async fn put(&self, user: &User, message: &Message) -> Result<()>;

    /// Look up the timeline copy of a source message
    fn find_in_timeline(&self, message: &Message) -> Result<RelayedMessage>;

    /// Delete the timeline copy and forget its record
    async fn delete(&self, relayed: &RelayedMessage) -> Result<()>;
}

/// On-disk key-value table of relay records
pub struct RelayLedger {
    conn: Mutex<Connection>,
}

impl RelayLedger {
    /// Open or create the ledger database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let ledger = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        ledger.init_schema()?;

        info!("Relay ledger opened: {}", path.display());
        Ok(ledger)
    }

    pub fn open_in_memory() -> Result<Self> {
        let ledger = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            PRAGMA synchronous = FULL;

            CREATE TABLE IF NOT EXISTS relay_records (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                relayed_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .lock()
            .query_row(
                "SELECT 1 FROM relay_records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let payload = self
            .conn
            .lock()
            .query_row(
                "SELECT payload FROM relay_records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    pub fn insert(&self, key: &str, payload: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO relay_records (key, payload, relayed_at)
             VALUES (?1, ?2, ?3)",
            params![key, payload, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Returns whether a record was removed
    pub fn remove(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .lock()
            .execute("DELETE FROM relay_records WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM relay_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Text posted to the timeline for a source message
pub fn relay_text(message: &Message) -> String {
    format!("{} (at <#{}> )", message.text, message.channel_id)
}

/// [`MessageRepository`] posting through the chat API and recording in a [`RelayLedger`]
pub struct MessageStore {
    timeline_channel_id: String,
    api: Arc<dyn ChatApi>,
    ledger: RelayLedger,
}

impl MessageStore {
    pub fn new(timeline_channel_id: &str, api: Arc<dyn ChatApi>, ledger: RelayLedger) -> Self {
        Self {
            timeline_channel_id: timeline_channel_id.to_string(),
            api,
            ledger,
        }
    }

    pub fn ledger(&self) -> &RelayLedger {
        &self.ledger
    }
}

#[async_trait]
impl MessageRepository for MessageStore {
    fn exists(&self, key: &str) -> Result<bool> {
        self.ledger.contains(key)
    }

    async fn put(&self, user: &User, message: &Message) -> Result<()> {
        let key = message.key();
        if self.exists(&key)? {
            debug!("Already relayed: {}", key);
            return Ok(());
        }

        let payload = self
            .api
            .post_message(&self.timeline_channel_id, &relay_text(message), user)
            .await?;

        self.ledger.insert(&key, &payload)?;
        debug!("Relayed {} as {}", key, user.name);
        Ok(())
    }

    fn find_in_timeline(&self, message: &Message) -> Result<RelayedMessage> {
        let key = message.key();
        let payload = self
            .ledger
            .get(&key)?
            .ok_or_else(|| RelayError::NotFound(key.clone()))?;

        let posted: PostedMessage = serde_json::from_str(&payload)?;
        let body = posted.message.unwrap_or_default();

        Ok(RelayedMessage {
            source_key: key,
            message: Message::new(
                &body.text,
                &body.user,
                &posted.channel,
                &posted.ts,
            ),
        })
    }

    async fn delete(&self, relayed: &RelayedMessage) -> Result<()> {
        self.api
            .delete_message(&relayed.message.channel_id, &relayed.message.timestamp)
            .await?;

        self.ledger.remove(&relayed.source_key)?;
        debug!("Deleted timeline copy of {}", relayed.source_key);
        Ok(())
    }
}

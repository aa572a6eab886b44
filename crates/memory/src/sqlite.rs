//! SQLite history backend.
//!
//! Uses a single SQLite database file with one table:
//! - `conversation_log`: one row per turn, keyed by an autoincrement id
//!
//! The autoincrement id is the ordering key; both turns of an exchange carry
//! the same timestamp, so ordering by time alone would be ambiguous.

use aidog_core::error::HistoryError;
use aidog_core::history::HistoryBackend;
use aidog_core::message::{ConversationTurn, Identity, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// A durable SQLite history backend.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (or create) the database file at `path`.
    ///
    /// The file, table and index are created automatically.
    pub async fn open(path: &Path) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        info!("SQLite history backend initialized at {}", path.display());
        Ok(backend)
    }

    /// An ephemeral in-process database (useful for tests).
    ///
    /// Pinned to one connection: every `:memory:` connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| HistoryError::Storage(format!("Invalid SQLite path: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Create the table and index.
    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_log (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id   INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                role      TEXT NOT NULL CHECK(role IN ('user', 'assistant')),
                content   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("conversation_log table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversation_user_id ON conversation_log(user_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("user index: {e}")))?;

        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, HistoryError> {
        let user_id: i64 = row
            .try_get("user_id")
            .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;
        let timestamp: String = row
            .try_get("timestamp")
            .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;

        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| HistoryError::QueryFailed(format!("bad timestamp '{timestamp}': {e}")))?;
        let role = Role::from_str(&role).map_err(HistoryError::QueryFailed)?;

        Ok(ConversationTurn {
            identity: Identity(user_id as u64),
            timestamp,
            role,
            content,
        })
    }
}

#[async_trait]
impl HistoryBackend for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_exchange(
        &self,
        identity: Identity,
        user: &str,
        assistant: &str,
    ) -> Result<(), HistoryError> {
        let timestamp = Utc::now().to_rfc3339();
        let user_id = identity.0 as i64;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HistoryError::Storage(format!("begin transaction: {e}")))?;

        for (role, content) in [(Role::User, user), (Role::Assistant, assistant)] {
            sqlx::query(
                "INSERT INTO conversation_log (user_id, timestamp, role, content) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(&timestamp)
            .bind(role.as_str())
            .bind(content)
            .execute(&mut *tx)
            .await
            .map_err(|e| HistoryError::QueryFailed(format!("insert {} turn: {e}", role.as_str())))?;
        }

        tx.commit()
            .await
            .map_err(|e| HistoryError::Storage(format!("commit: {e}")))?;

        debug!(user = %identity, "Stored exchange");
        Ok(())
    }

    async fn recent(
        &self,
        identity: Identity,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, HistoryError> {
        let rows = sqlx::query(
            "SELECT user_id, timestamp, role, content FROM conversation_log \
             WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(identity.0 as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn clear(&self, identity: Identity) -> Result<u64, HistoryError> {
        let result = sqlx::query("DELETE FROM conversation_log WHERE user_id = ?")
            .bind(identity.0 as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

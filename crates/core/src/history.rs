//! History backend trait: the persistence layer behind conversation history.
//!
//! The minimal interface any storage engine must satisfy: append an exchange
//! atomically, read the most recent turns of one identity, and delete
//! everything an identity ever said.

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::message::{ConversationTurn, Identity};

/// The core HistoryBackend trait.
///
/// Implementations: SQLite (durable), in-memory bounded deque (ephemeral).
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Store a user turn and its assistant reply as one unit.
    ///
    /// Readers must never observe the user turn without the reply.
    async fn append_exchange(
        &self,
        identity: Identity,
        user: &str,
        assistant: &str,
    ) -> std::result::Result<(), HistoryError>;

    /// The newest `limit` turns of `identity`, newest first.
    async fn recent(
        &self,
        identity: Identity,
        limit: usize,
    ) -> std::result::Result<Vec<ConversationTurn>, HistoryError>;

    /// Delete every turn of `identity`, returning how many were removed.
    async fn clear(&self, identity: Identity) -> std::result::Result<u64, HistoryError>;
}

//! Conversation history for AI Dog.
//!
//! Two persistence layers implement `aidog_core::HistoryBackend`:
//! [`SqliteHistory`] (durable, the default) and [`InMemoryHistory`]
//! (bounded, with a staleness cutoff). [`ConversationStore`] sits on top and
//! assembles prompt context.

pub mod in_memory;
pub mod sqlite;
pub mod store;

pub use in_memory::InMemoryHistory;
pub use sqlite::SqliteHistory;
pub use store::{ConversationStore, FIRST_CONVERSATION, HISTORY_UNAVAILABLE, truncate_chars};

use aidog_config::{BotConfig, HistoryBackendKind};
use aidog_core::error::HistoryError;
use aidog_core::history::HistoryBackend;
use std::sync::Arc;

/// Open the history backend selected by the configuration.
pub async fn open_backend(config: &BotConfig) -> Result<Arc<dyn HistoryBackend>, HistoryError> {
    let backend: Arc<dyn HistoryBackend> = match config.conversation.backend {
        HistoryBackendKind::Sqlite => Arc::new(SqliteHistory::open(&config.conversation.db_path).await?),
        HistoryBackendKind::Memory => Arc::new(InMemoryHistory::new(
            config.conversation.max_history,
            config.history_max_age(),
        )),
    };
    Ok(backend)
}

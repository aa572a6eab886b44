//! Conversation store: per-identity history with prompt-context assembly.
//!
//! Wraps a [`HistoryBackend`] and never lets a storage failure escape. A
//! failed read degrades to a fallback context line, a failed write is
//! logged and dropped.

use aidog_core::history::HistoryBackend;
use aidog_core::message::{Identity, Role};
use std::sync::Arc;
use tracing::{debug, error};

/// Context returned for an identity with no stored turns.
pub const FIRST_CONVERSATION: &str = "This is our first conversation, woof!";

/// Context returned when history could not be read.
pub const HISTORY_UNAVAILABLE: &str = "I couldn't load our earlier conversation, woof...";

/// Longest turn content rendered into the context, in characters.
pub const CONTEXT_TURN_CHARS: usize = 200;

pub struct ConversationStore {
    backend: Arc<dyn HistoryBackend>,
    max_history: usize,
}

impl ConversationStore {
    /// `max_history` is counted in exchanges; context covers up to twice as
    /// many turns.
    pub fn new(backend: Arc<dyn HistoryBackend>, max_history: usize) -> Self {
        Self {
            backend,
            max_history,
        }
    }

    pub fn backend(&self) -> &Arc<dyn HistoryBackend> {
        &self.backend
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Store a completed exchange. Failures are logged, not returned.
    pub async fn add_message(&self, identity: Identity, user_text: &str, assistant_text: &str) {
        if let Err(e) = self
            .backend
            .append_exchange(identity, user_text, assistant_text)
            .await
        {
            error!(user = %identity, backend = self.backend.name(), error = %e, "Failed to store conversation turn");
        }
    }

    /// Render the recent history of `identity` as labeled lines, oldest
    /// first.
    pub async fn get_context(&self, identity: Identity) -> String {
        let turns = match self.backend.recent(identity, self.max_history * 2).await {
            Ok(turns) => turns,
            Err(e) => {
                error!(user = %identity, backend = self.backend.name(), error = %e, "Failed to load conversation history");
                return HISTORY_UNAVAILABLE.to_string();
            }
        };

        if turns.is_empty() {
            return FIRST_CONVERSATION.to_string();
        }

        debug!(user = %identity, turns = turns.len(), "Loaded conversation context");
        turns
            .iter()
            .rev()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "my owner",
                    Role::Assistant => "AI Dog",
                };
                format!(
                    "Earlier, {speaker} said: {}",
                    truncate_chars(&turn.content, CONTEXT_TURN_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Delete all turns of `identity`, returning how many were removed.
    /// Returns 0 if the backend fails.
    pub async fn clear_history(&self, identity: Identity) -> u64 {
        match self.backend.clear(identity).await {
            Ok(count) => count,
            Err(e) => {
                error!(user = %identity, backend = self.backend.name(), error = %e, "Failed to clear conversation history");
                0
            }
        }
    }
}

/// Cut `text` to `max` characters, appending "…" when anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryHistory;
    use aidog_core::error::HistoryError;
    use aidog_core::message::ConversationTurn;
    use async_trait::async_trait;

    struct BrokenBackend;

    #[async_trait]
    impl HistoryBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        async fn append_exchange(&self, _: Identity, _: &str, _: &str) -> Result<(), HistoryError> {
            Err(HistoryError::Storage("disk on fire".into()))
        }

        async fn recent(&self, _: Identity, _: usize) -> Result<Vec<ConversationTurn>, HistoryError> {
            Err(HistoryError::Storage("disk on fire".into()))
        }

        async fn clear(&self, _: Identity) -> Result<u64, HistoryError> {
            Err(HistoryError::Storage("disk on fire".into()))
        }
    }

    fn store(max_history: usize) -> ConversationStore {
        ConversationStore::new(Arc::new(InMemoryHistory::new(max_history, None)), max_history)
    }

    #[tokio::test]
    async fn empty_history_gives_sentinel() {
        let store = store(5);
        assert_eq!(store.get_context(Identity(1)).await, FIRST_CONVERSATION);
    }

    #[tokio::test]
    async fn context_is_chronological_and_labeled() {
        let store = store(5);
        store.add_message(Identity(1), "hello", "woof! hi.").await;
        store.add_message(Identity(1), "sit", "*sits*").await;

        let context = store.get_context(Identity(1)).await;
        assert_eq!(
            context,
            "Earlier, my owner said: hello\n\
             Earlier, AI Dog said: woof! hi.\n\
             Earlier, my owner said: sit\n\
             Earlier, AI Dog said: *sits*"
        );
    }

    #[tokio::test]
    async fn long_turns_are_capped() {
        let store = store(5);
        let long = "a".repeat(250);
        store.add_message(Identity(1), &long, "short").await;

        let context = store.get_context(Identity(1)).await;
        let first = context.lines().next().unwrap();
        assert_eq!(first, format!("Earlier, my owner said: {}…", "a".repeat(200)));
    }

    #[tokio::test]
    async fn oldest_exchange_falls_out() {
        let store = store(2);
        for i in 0..3 {
            store
                .add_message(Identity(1), &format!("q{i}"), &format!("a{i}"))
                .await;
        }
        let context = store.get_context(Identity(1)).await;
        assert!(!context.contains("q0"));
        assert!(context.contains("q1") && context.contains("a2"));
        assert_eq!(context.lines().count(), 4);
    }

    #[tokio::test]
    async fn clear_then_sentinel() {
        let store = store(5);
        store.add_message(Identity(1), "a", "b").await;
        assert_eq!(store.clear_history(Identity(1)).await, 2);
        assert_eq!(store.get_context(Identity(1)).await, FIRST_CONVERSATION);
        assert_eq!(store.clear_history(Identity(1)).await, 0);
    }

    #[tokio::test]
    async fn broken_backend_degrades() {
        let store = ConversationStore::new(Arc::new(BrokenBackend), 5);
        store.add_message(Identity(1), "q", "a").await;
        assert_eq!(store.get_context(Identity(1)).await, HISTORY_UNAVAILABLE);
        assert_eq!(store.clear_history(Identity(1)).await, 0);
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("わんわん", 2), "わん…");
        assert_eq!(truncate_chars("woof", 4), "woof");
    }
}

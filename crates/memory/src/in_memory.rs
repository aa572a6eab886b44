//! In-memory backend, for deployments that do not need durable history.

use aidog_core::error::HistoryError;
use aidog_core::history::HistoryBackend;
use aidog_core::message::{ConversationTurn, Identity};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

/// Bounded per-identity deques with an optional staleness cutoff.
///
/// Each identity keeps at most `capacity` turns; turns older than `max_age`
/// are ignored and pruned whenever that identity is touched.
pub struct InMemoryHistory {
    turns: RwLock<HashMap<Identity, VecDeque<ConversationTurn>>>,
    capacity: usize,
    max_age: Option<Duration>,
}

impl InMemoryHistory {
    /// Keep up to `max_history` exchanges (twice as many turns) per identity.
    pub fn new(max_history: usize, max_age: Option<Duration>) -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
            capacity: max_history.saturating_mul(2).max(2),
            max_age,
        }
    }

    fn prune(&self, deque: &mut VecDeque<ConversationTurn>) {
        let Some(max_age) = self.max_age else {
            return;
        };
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return;
        };
        let cutoff = Utc::now() - max_age;
        while deque.front().is_some_and(|t| t.timestamp < cutoff) {
            deque.pop_front();
        }
    }
}

#[async_trait]
impl HistoryBackend for InMemoryHistory {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append_exchange(
        &self,
        identity: Identity,
        user: &str,
        assistant: &str,
    ) -> Result<(), HistoryError> {
        let user_turn = ConversationTurn::user(identity, user);
        let assistant_turn = ConversationTurn {
            timestamp: user_turn.timestamp,
            ..ConversationTurn::assistant(identity, assistant)
        };

        let mut turns = self.turns.write().await;
        let deque = turns.entry(identity).or_default();
        self.prune(deque);
        deque.push_back(user_turn);
        deque.push_back(assistant_turn);
        while deque.len() > self.capacity {
            deque.pop_front();
        }
        Ok(())
    }

    async fn recent(
        &self,
        identity: Identity,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, HistoryError> {
        let mut turns = self.turns.write().await;
        let Some(deque) = turns.get_mut(&identity) else {
            return Ok(Vec::new());
        };
        self.prune(deque);
        Ok(deque.iter().rev().take(limit).cloned().collect())
    }

    async fn clear(&self, identity: Identity) -> Result<u64, HistoryError> {
        let removed = self.turns.write().await.remove(&identity);
        Ok(removed.map(|d| d.len() as u64).unwrap_or(0))
    }
}

//! Shared test helpers for the governance core.

use aidog_core::error::ProviderError;
use aidog_core::inference::{GenerateRequest, GenerateResponse, InferenceBackend};
use aidog_memory::{ConversationStore, InMemoryHistory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a [`StubBackend`] answers with.
pub enum StubReply {
    Text(String),
    Delayed(Duration),
    Fail(ProviderError),
}

/// An inference backend that returns the same scripted reply every call.
pub struct StubBackend {
    reply: StubReply,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StubBackend {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InferenceBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt);
        match &self.reply {
            StubReply::Text(text) => Ok(GenerateResponse {
                response: text.clone(),
                ..Default::default()
            }),
            StubReply::Delayed(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(GenerateResponse {
                    response: "too late".into(),
                    ..Default::default()
                })
            }
            StubReply::Fail(e) => Err(e.clone()),
        }
    }
}

/// A conversation store over a fresh in-memory backend.
pub fn memory_store(max_history: usize) -> Arc<ConversationStore> {
    Arc::new(ConversationStore::new(
        Arc::new(InMemoryHistory::new(max_history, None)),
        max_history,
    ))
}

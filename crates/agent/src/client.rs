//! Inference client: prompt assembly, dispatch and failure mapping.
//!
//! `ask` never fails. Every failure class becomes a fixed, user-safe reply
//! with `success = false`; technical detail goes to the log only.

use crate::persona::Persona;
use aidog_config::BotConfig;
use aidog_core::error::ProviderError;
use aidog_core::health::{HealthHandle, HealthStatus};
use aidog_core::inference::{GenerateRequest, InferenceBackend, SamplingOptions};
use aidog_core::message::Identity;
use aidog_memory::ConversationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub const EMPTY_REPLY: &str = "AI Dog got a little tongue-tied... woof.";
pub const TIMEOUT_REPLY: &str = "Hmm, that took me too long to think about! Woof!";
pub const CONNECTION_REPLY: &str = "Woof! I can't seem to reach my brain right now...";
pub const CONFUSED_REPLY: &str = "Whoa! AI Dog got a little confused!";

/// Per-request parameters taken from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    pub model: String,
    pub options: SamplingOptions,
    pub timeout: Duration,
}

impl InferenceSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            model: config.ollama.model.clone(),
            options: SamplingOptions {
                temperature: config.ollama.temperature,
                num_ctx: config.ollama.num_ctx,
                top_p: config.ollama.top_p,
                repeat_penalty: config.ollama.repeat_penalty,
            },
            timeout: config.request_timeout(),
        }
    }
}

/// Result of one `ask`.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    /// Model reply, or a fallback message when `success` is false
    pub text: String,
    pub success: bool,
    pub elapsed: Duration,
}

pub struct InferenceClient {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<ConversationStore>,
    persona: Persona,
    settings: InferenceSettings,
    health: HealthHandle,
}

impl InferenceClient {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<ConversationStore>,
        persona: Persona,
        settings: InferenceSettings,
        health: HealthHandle,
    ) -> Self {
        Self {
            backend,
            store,
            persona,
            settings,
            health,
        }
    }

    pub fn settings(&self) -> &InferenceSettings {
        &self.settings
    }

    /// Generate a persona reply to `question` for `identity`.
    pub async fn ask(&self, question: &str, identity: Identity) -> InferenceResult {
        let started = Instant::now();

        let context = self.store.get_context(identity).await;
        let prompt = self.persona.render(&context, question);
        let request = GenerateRequest::new(&self.settings.model, prompt, self.settings.options)
            .with_timeout(self.settings.timeout);

        let outcome =
            tokio::time::timeout(self.settings.timeout, self.backend.generate(request)).await;

        let (text, success) = match outcome {
            Ok(Ok(response)) => {
                let reply = self.persona.strip_boilerplate(&response.response);
                if reply.is_empty() {
                    warn!(user = %identity, raw = %response.response, "Model returned an empty reply");
                    (EMPTY_REPLY.to_string(), false)
                } else {
                    (reply, true)
                }
            }
            Err(_) | Ok(Err(ProviderError::Timeout(_))) => {
                warn!(
                    user = %identity,
                    timeout_secs = self.settings.timeout.as_secs(),
                    "Inference request timed out"
                );
                (TIMEOUT_REPLY.to_string(), false)
            }
            Ok(Err(e)) if e.is_connection() => {
                error!(user = %identity, backend = self.backend.name(), error = %e, "Inference endpoint unreachable");
                self.health.set(HealthStatus::Offline);
                (CONNECTION_REPLY.to_string(), false)
            }
            Ok(Err(e)) => {
                error!(user = %identity, backend = self.backend.name(), error = ?e, "Inference request failed");
                (CONFUSED_REPLY.to_string(), false)
            }
        };

        let elapsed = started.elapsed();
        if success {
            info!(user = %identity, elapsed_ms = elapsed.as_millis() as u64, "Inference succeeded");
        } else {
            debug!(user = %identity, elapsed_ms = elapsed.as_millis() as u64, "Inference fell back");
        }

        InferenceResult {
            text,
            success,
            elapsed,
        }
    }
}

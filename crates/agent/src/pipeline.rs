//! The request pipeline: admission, inference, history and statistics.
//!
//! ```text
//! handle(identity, text)
//!   -> RateLimiter::check        (Limited -> RateLimited, nothing recorded)
//!   -> sanitize_input            (empty, no attachments -> EmptyInput)
//!   -> InferenceClient::ask      (stats recorded on every attempt)
//!   -> ConversationStore::add_message   (successful replies only)
//!   -> truncate to max_response_length
//! ```
//!
//! The limiter, store and client form one [`Governance`] bundle. A reload
//! swaps the whole bundle; requests already running finish on the old one.
//! The history backend is carried over unless the reload selects a
//! different one.

use crate::client::{InferenceClient, InferenceSettings};
use crate::persona::{Persona, PersonaError, sanitize_input};
use crate::rate_limit::{Admission, RateLimiter};
use aidog_config::{BotConfig, HistoryBackendKind};
use aidog_core::error::{HistoryError, ProviderError};
use aidog_core::health::{HealthHandle, HealthProbe, ProbeOutcome};
use aidog_core::history::HistoryBackend;
use aidog_core::inference::InferenceBackend;
use aidog_core::message::Identity;
use aidog_memory::ConversationStore;
use aidog_providers::OllamaProvider;
use aidog_telemetry::BotStats;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

pub const EMPTY_INPUT_REPLY: &str = "Woof! Did you need something from AI Dog?";
pub const TRUNCATION_MARKER: &str = "… (shortened to fit the message limit)";

/// What the chat adapter should do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send `text` (a model reply or a fallback message).
    Reply {
        text: String,
        success: bool,
        elapsed: Duration,
    },
    /// Tell the user to wait.
    RateLimited { retry_after_secs: u64 },
    /// Nothing was asked.
    EmptyInput,
}

impl Outcome {
    /// The user-facing message for this outcome.
    pub fn message(&self) -> String {
        match self {
            Self::Reply { text, .. } => text.clone(),
            Self::RateLimited { retry_after_secs } => format!(
                "I'm a little tired from all this talking... please wait {retry_after_secs} seconds!"
            ),
            Self::EmptyInput => EMPTY_INPUT_REPLY.to_string(),
        }
    }
}

/// Errors building a [`Governance`] bundle from configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("inference endpoint: {0}")]
    Provider(#[from] ProviderError),

    #[error("conversation history: {0}")]
    History(#[from] HistoryError),

    #[error("persona: {0}")]
    Persona(#[from] PersonaError),
}

/// The history backend a configuration selects. Two configurations with
/// the same source share one backend across a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HistorySource {
    Sqlite(PathBuf),
    Memory,
}

impl HistorySource {
    fn of(config: &BotConfig) -> Self {
        match config.conversation.backend {
            HistoryBackendKind::Sqlite => Self::Sqlite(config.conversation.db_path.clone()),
            HistoryBackendKind::Memory => Self::Memory,
        }
    }
}

/// Everything derived from one configuration generation.
pub struct Governance {
    limiter: RateLimiter,
    store: Arc<ConversationStore>,
    client: InferenceClient,
    probe: Option<Arc<dyn HealthProbe>>,
    history_source: Option<HistorySource>,
    max_response_length: usize,
}

impl Governance {
    /// Assemble a bundle around explicit backends.
    pub fn new(
        config: &BotConfig,
        backend: Arc<dyn InferenceBackend>,
        history: Arc<dyn HistoryBackend>,
        persona: Persona,
        health: HealthHandle,
    ) -> Self {
        let store = Arc::new(ConversationStore::new(history, config.conversation.max_history));
        let client = InferenceClient::new(
            backend,
            store.clone(),
            persona,
            InferenceSettings::from_config(config),
            health,
        );
        Self {
            limiter: RateLimiter::new(config.limits.rate_limit_per_user, config.rate_limit_window()),
            store,
            client,
            probe: None,
            history_source: None,
            max_response_length: config.limits.max_response_length,
        }
    }

    /// Probe used for health checks of this generation's endpoint.
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Open the Ollama client, history backend and persona named by `config`.
    pub async fn from_config(config: &BotConfig, health: HealthHandle) -> Result<Self, SetupError> {
        Self::build(config, health, None).await
    }

    /// Like [`Governance::from_config`], but keeps `previous`'s history
    /// backend when `config` selects the same one.
    async fn build(
        config: &BotConfig,
        health: HealthHandle,
        previous: Option<&Governance>,
    ) -> Result<Self, SetupError> {
        let provider = Arc::new(OllamaProvider::new(
            &config.ollama.api_url,
            config.probe_timeout(),
        )?);
        let source = HistorySource::of(config);
        let history = match previous {
            Some(previous) if previous.history_source.as_ref() == Some(&source) => {
                debug!(backend = previous.store.backend_name(), "Keeping history backend");
                previous.store.backend().clone()
            }
            _ => aidog_memory::open_backend(config).await?,
        };
        let persona = Persona::load(config.persona.template_path.as_deref())?;

        let mut governance =
            Self::new(config, provider.clone(), history, persona, health).with_probe(provider);
        governance.history_source = Some(source);
        Ok(governance)
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn model(&self) -> &str {
        &self.client.settings().model
    }
}

/// The orchestrator every addressed chat message goes through.
pub struct RequestPipeline {
    current: RwLock<Arc<Governance>>,
    stats: Arc<BotStats>,
    health: HealthHandle,
}

impl RequestPipeline {
    pub fn new(governance: Governance, stats: Arc<BotStats>, health: HealthHandle) -> Self {
        Self {
            current: RwLock::new(Arc::new(governance)),
            stats,
            health,
        }
    }

    /// Build a pipeline from configuration.
    pub async fn from_config(
        config: &BotConfig,
        stats: Arc<BotStats>,
        health: HealthHandle,
    ) -> Result<Self, SetupError> {
        let governance = Governance::from_config(config, health.clone()).await?;
        Ok(Self::new(governance, stats, health))
    }

    /// The bundle currently serving new requests.
    pub fn current(&self) -> Arc<Governance> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace limiter, store and client wholesale. All rate windows reset.
    pub fn swap(&self, governance: Governance) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(governance);
        info!("Request governance replaced, rate-limit windows reset");
    }

    /// Rebuild the bundle from `config` and swap it in. On error the running
    /// bundle stays untouched. History is kept unless `config` names a
    /// different backend or database file.
    pub async fn reload(&self, config: &BotConfig) -> Result<(), SetupError> {
        let running = self.current();
        let governance = Governance::build(config, self.health.clone(), Some(&running)).await?;
        self.swap(governance);
        Ok(())
    }

    pub fn stats(&self) -> &Arc<BotStats> {
        &self.stats
    }

    pub fn health(&self) -> &HealthHandle {
        &self.health
    }

    /// Run one request through admission, inference and history.
    pub async fn handle(&self, identity: Identity, raw_text: &str, has_attachments: bool) -> Outcome {
        match self.admit(identity, raw_text, has_attachments) {
            Ok(admitted) => self.answer(admitted).await,
            Err(outcome) => outcome,
        }
    }

    /// Rate-check and sanitize a request. A rejected request comes back as
    /// the outcome to send; nothing has been asked or recorded for it.
    pub fn admit(
        &self,
        identity: Identity,
        raw_text: &str,
        has_attachments: bool,
    ) -> Result<Admitted, Outcome> {
        let governance = self.current();

        if let Admission::Limited { retry_after_secs } = governance.limiter.check(identity) {
            info!(user = %identity, retry_after_secs, "Rate limited");
            return Err(Outcome::RateLimited { retry_after_secs });
        }

        let question = sanitize_input(raw_text);
        if question.is_empty() && !has_attachments {
            debug!(user = %identity, "Empty request");
            return Err(Outcome::EmptyInput);
        }

        Ok(Admitted {
            governance,
            identity,
            question,
        })
    }

    /// Ask the model, record statistics and remember a successful exchange.
    pub async fn answer(&self, admitted: Admitted) -> Outcome {
        let Admitted {
            governance,
            identity,
            question,
        } = admitted;

        info!(
            user = %identity,
            question = %question.chars().take(50).collect::<String>(),
            "Question received"
        );
        let result = governance.client.ask(&question, identity).await;
        self.stats.record(result.success, result.elapsed);

        if result.success {
            governance
                .store
                .add_message(identity, &question, &result.text)
                .await;
        }

        Outcome::Reply {
            text: truncate_reply(&result.text, governance.max_response_length),
            success: result.success,
            elapsed: result.elapsed,
        }
    }
}

/// A request that passed admission, bound to the governance that admitted it.
pub struct Admitted {
    governance: Arc<Governance>,
    identity: Identity,
    question: String,
}

impl Admitted {
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// The sanitized question.
    pub fn question(&self) -> &str {
        &self.question
    }
}

#[async_trait]
impl HealthProbe for RequestPipeline {
    async fn probe(&self) -> ProbeOutcome {
        match self.current().probe.clone() {
            Some(probe) => probe.probe().await,
            None => ProbeOutcome::Unreachable,
        }
    }
}

/// Cut `text` to `max_chars` characters and append the truncation marker.
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

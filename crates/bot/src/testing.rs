//! Test doubles shared by the command and runtime tests.

use crate::state::BotState;
use aidog_agent::{Governance, Persona, RequestPipeline};
use aidog_config::BotConfig;
use aidog_core::channel::{Channel, ChannelMessage};
use aidog_core::error::{ChannelError, ProviderError};
use aidog_core::health::HealthHandle;
use aidog_core::inference::{GenerateRequest, GenerateResponse, InferenceBackend};
use aidog_core::message::Identity;
use aidog_memory::InMemoryHistory;
use aidog_telemetry::BotStats;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Answers every prompt with a fixed text after an optional delay.
pub struct FixedBackend {
    pub reply: String,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FixedBackend {
    pub fn new(reply: &str) -> Arc<Self> {
        Self::delayed(reply, Duration::ZERO)
    }

    pub fn delayed(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl InferenceBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(GenerateResponse {
            response: self.reply.clone(),
            ..Default::default()
        })
    }
}

pub fn test_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.ollama.model = "llama3".into();
    config.ollama.api_url = "http://127.0.0.1:11434/api/generate".into();
    config.conversation.backend = aidog_config::HistoryBackendKind::Memory;
    config
}

pub fn pipeline(config: &BotConfig, backend: Arc<FixedBackend>) -> Arc<RequestPipeline> {
    let health = HealthHandle::new();
    let governance = Governance::new(
        config,
        backend,
        Arc::new(InMemoryHistory::new(config.conversation.max_history, None)),
        Persona::builtin(),
        health.clone(),
    );
    Arc::new(RequestPipeline::new(governance, Arc::new(BotStats::new()), health))
}

pub fn state_with(config: BotConfig, backend: Arc<FixedBackend>) -> Arc<BotState> {
    let pipeline = pipeline(&config, backend);
    Arc::new(BotState::new(config, "aidog-test.toml", pipeline).with_env(Arc::new(|_| None)))
}

pub fn state_with_admins(admins: Vec<u64>) -> Arc<BotState> {
    let mut config = test_config();
    config.admin_user_ids = admins;
    state_with(config, FixedBackend::new("woof"))
}

/// Records everything the runtime does to a chat platform.
pub struct RecordingChannel {
    pub sent: Mutex<Vec<(String, String)>>,
    pub typing: AtomicUsize,
    pub busy: Mutex<Vec<bool>>,
    inbox: Mutex<Option<mpsc::Receiver<ChannelMessage>>>,
    ready: watch::Sender<bool>,
}

impl RecordingChannel {
    /// A channel whose `start` yields whatever is pushed into the sender.
    pub fn new() -> (Arc<Self>, mpsc::Sender<ChannelMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let (ready, _) = watch::channel(false);
        let channel = Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            typing: AtomicUsize::new(0),
            busy: Mutex::new(Vec::new()),
            inbox: Mutex::new(Some(rx)),
            ready,
        });
        (channel, tx)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<mpsc::Receiver<ChannelMessage>, ChannelError> {
        let _ = self.ready.send(true);
        self.inbox
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChannelError::ConnectionLost("already started".into()))
    }

    async fn send(&self, chat_id: &str, content: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn send_typing(&self, _chat_id: &str) -> Result<(), ChannelError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_busy(&self, busy: bool) {
        self.busy.lock().unwrap().push(busy);
    }

    fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }
}

/// A guild message that mentions the bot.
pub fn guild_message(sender: u64, content: &str) -> ChannelMessage {
    ChannelMessage {
        channel: "recording".into(),
        sender: Identity(sender),
        sender_name: Some("owner".into()),
        chat_id: "guild-1".into(),
        content: content.into(),
        addressed: true,
        is_direct: false,
        from_bot: false,
        attachment_count: 0,
        mention: Some(format!("<@{sender}>")),
    }
}

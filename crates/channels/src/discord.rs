//! Discord channel adapter.
//!
//! Runs a serenity gateway client and forwards every message it sees as a
//! [`ChannelMessage`]; the runtime decides what to answer. The bot's own
//! mention is stripped from the text and recorded as `addressed`.

use aidog_core::channel::{Channel, ChannelMessage};
use aidog_core::error::ChannelError;
use aidog_core::message::Identity;
use async_trait::async_trait;
use serenity::all::{
    ActivityData, ChannelId, Client, Context, EventHandler, GatewayIntents, Http, Message,
    OnlineStatus, Ready, ShardManager,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const BUSY_ACTIVITY: &str = "Thinking...";
const IDLE_ACTIVITY: &str = "Mention me to chat!";

/// State shared between the channel and the gateway event handler.
struct Shared {
    bot_id: AtomicU64,
    ready: watch::Sender<bool>,
    context: Mutex<Option<Context>>,
}

pub struct DiscordChannel {
    token: String,
    shared: Arc<Shared>,
    http: Mutex<Option<Arc<Http>>>,
    shards: Mutex<Option<Arc<ShardManager>>>,
}

impl std::fmt::Debug for DiscordChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannel")
            .field("token", &"[REDACTED]")
            .field("bot_id", &self.shared.bot_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl DiscordChannel {
    pub fn new(token: impl Into<String>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            token: token.into(),
            shared: Arc::new(Shared {
                bot_id: AtomicU64::new(0),
                ready,
                context: Mutex::new(None),
            }),
            http: Mutex::new(None),
            shards: Mutex::new(None),
        }
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    fn http(&self) -> Result<Arc<Http>, ChannelError> {
        self.http
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| ChannelError::NotConfigured("discord channel not started".into()))
    }
}

fn parse_chat_id(chat_id: &str) -> Result<ChannelId, ChannelError> {
    chat_id
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
        .ok_or_else(|| ChannelError::DeliveryFailed {
            channel: "discord".into(),
            reason: format!("invalid channel id '{chat_id}'"),
        })
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> Result<mpsc::Receiver<ChannelMessage>, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        let handler = Handler {
            shared: self.shared.clone(),
            tx,
        };

        let mut client = Client::builder(&self.token, Self::intents())
            .event_handler(handler)
            .await
            .map_err(|e| ChannelError::NotConfigured(format!("discord client: {e}")))?;

        *self.http.lock().unwrap_or_else(|e| e.into_inner()) = Some(client.http.clone());
        *self.shards.lock().unwrap_or_else(|e| e.into_inner()) = Some(client.shard_manager.clone());

        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "Discord gateway client stopped");
            }
        });
        info!("Discord channel starting");
        Ok(rx)
    }

    async fn send(&self, chat_id: &str, content: &str) -> Result<(), ChannelError> {
        let channel_id = parse_chat_id(chat_id)?;
        let http = self.http()?;
        channel_id
            .say(&http, content)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "discord".into(),
                reason: e.to_string(),
            })
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        let channel_id = parse_chat_id(chat_id)?;
        let http = self.http()?;
        channel_id
            .broadcast_typing(&http)
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "discord".into(),
                reason: e.to_string(),
            })
    }

    async fn set_busy(&self, busy: bool) {
        let context = self
            .shared
            .context
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(ctx) = context else {
            return;
        };
        if busy {
            ctx.set_presence(Some(ActivityData::playing(BUSY_ACTIVITY)), OnlineStatus::DoNotDisturb);
        } else {
            ctx.set_presence(Some(ActivityData::playing(IDLE_ACTIVITY)), OnlineStatus::Online);
        }
    }

    fn ready(&self) -> watch::Receiver<bool> {
        self.shared.ready.subscribe()
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        let shards = self.shards.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(shards) = shards {
            info!("Discord channel stopping");
            shards.shutdown_all().await;
        }
        self.shared.ready.send_replace(false);
        Ok(())
    }
}

struct Handler {
    shared: Arc<Shared>,
    tx: mpsc::Sender<ChannelMessage>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        let bot_id = self.shared.bot_id.load(Ordering::Relaxed);
        let inbound = Inbound {
            author_id: msg.author.id.get(),
            author_name: msg.author.global_name.clone().unwrap_or_else(|| msg.author.name.clone()),
            author_is_bot: msg.author.bot,
            chat_id: msg.channel_id.get(),
            in_guild: msg.guild_id.is_some(),
            mentions_bot: msg.mentions.iter().any(|u| u.id.get() == bot_id),
            content: msg.content,
            attachment_count: msg.attachments.len(),
        };

        if self.tx.send(inbound.into_message(bot_id)).await.is_err() {
            warn!("Runtime inbox closed, dropping Discord message");
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        self.shared.bot_id.store(ready.user.id.get(), Ordering::Relaxed);
        ctx.set_presence(Some(ActivityData::playing(IDLE_ACTIVITY)), OnlineStatus::Online);
        *self.shared.context.lock().unwrap_or_else(|e| e.into_inner()) = Some(ctx);
        self.shared.ready.send_replace(true);
        info!(user = %ready.user.name, id = ready.user.id.get(), "Discord bot connected");
    }
}

/// The parts of a gateway message the runtime cares about.
#[derive(Debug, Clone)]
struct Inbound {
    author_id: u64,
    author_name: String,
    author_is_bot: bool,
    chat_id: u64,
    in_guild: bool,
    mentions_bot: bool,
    content: String,
    attachment_count: usize,
}

impl Inbound {
    fn into_message(self, bot_id: u64) -> ChannelMessage {
        let mentioned = self.mentions_bot || (bot_id != 0 && contains_mention(&self.content, bot_id));
        let is_direct = !self.in_guild;
        let content = strip_mentions(&self.content, bot_id);
        debug!(author = self.author_id, is_direct, mentioned, "Discord message received");

        ChannelMessage {
            channel: "discord".into(),
            sender: Identity(self.author_id),
            sender_name: Some(self.author_name),
            chat_id: self.chat_id.to_string(),
            content,
            addressed: mentioned || is_direct,
            is_direct,
            from_bot: self.author_is_bot || (bot_id != 0 && self.author_id == bot_id),
            attachment_count: self.attachment_count,
            mention: Some(format!("<@{}>", self.author_id)),
        }
    }
}

fn contains_mention(text: &str, bot_id: u64) -> bool {
    text.contains(&format!("<@{bot_id}>")) || text.contains(&format!("<@!{bot_id}>"))
}

/// Remove `<@id>` and `<@!id>` mentions of the bot and trim the result.
pub fn strip_mentions(text: &str, bot_id: u64) -> String {
    if bot_id == 0 {
        return text.trim().to_string();
    }
    text.replace(&format!("<@!{bot_id}>"), "")
        .replace(&format!("<@{bot_id}>"), "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: u64 = 4242;

    fn inbound(content: &str) -> Inbound {
        Inbound {
            author_id: 7,
            author_name: "pochi".into(),
            author_is_bot: false,
            chat_id: 1001,
            in_guild: true,
            mentions_bot: false,
            content: content.into(),
            attachment_count: 0,
        }
    }

    #[test]
    fn strips_both_mention_forms() {
        assert_eq!(strip_mentions("<@4242> hello", BOT), "hello");
        assert_eq!(strip_mentions("hey <@!4242>  there", BOT), "hey   there");
        assert_eq!(strip_mentions("<@99> hi", BOT), "<@99> hi");
    }

    #[test]
    fn mentioned_guild_message_is_addressed() {
        let msg = inbound("<@4242> how are you?").into_message(BOT);
        assert!(msg.addressed);
        assert!(!msg.is_direct);
        assert_eq!(msg.content, "how are you?");
        assert_eq!(msg.chat_id, "1001");
        assert_eq!(msg.reply_text("woof"), "<@7> woof");
    }

    #[test]
    fn guild_chatter_is_not_addressed() {
        let msg = inbound("just talking").into_message(BOT);
        assert!(!msg.addressed);
    }

    #[test]
    fn direct_messages_are_addressed() {
        let mut dm = inbound("hello");
        dm.in_guild = false;
        let msg = dm.into_message(BOT);
        assert!(msg.addressed && msg.is_direct);
        assert_eq!(msg.reply_text("woof"), "woof");
    }

    #[test]
    fn own_and_bot_messages_are_flagged() {
        let mut own = inbound("<@4242> hi");
        own.author_id = BOT;
        assert!(own.into_message(BOT).from_bot);

        let mut other = inbound("hi");
        other.author_is_bot = true;
        assert!(other.into_message(BOT).from_bot);
    }

    #[test]
    fn chat_ids_must_be_numeric() {
        assert!(parse_chat_id("1001").is_ok());
        assert!(parse_chat_id("general").is_err());
        assert!(parse_chat_id("0").is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let channel = DiscordChannel::new("super-secret");
        assert!(!format!("{channel:?}").contains("super-secret"));
        assert!(!*channel.ready().borrow());
    }
}

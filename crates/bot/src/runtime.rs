//! The message-dispatch runtime.
//!
//! Wires a [`Channel`] to the command registry and the request pipeline.
//! Every incoming message is handled on its own task, so one slow inference
//! never blocks other conversations.

use crate::command::{CommandContext, CommandRegistry, failure_message, parse_command};
use crate::state::BotState;
use aidog_agent::Outcome;
use aidog_core::channel::{Channel, ChannelMessage};
use aidog_core::error::ChannelError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// How often the typing indicator is refreshed while a request runs.
pub const TYPING_REFRESH: Duration = Duration::from_secs(8);

/// What the runtime did with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Bot-authored, not addressed, or an unknown command.
    Ignored,
    /// A command ran and its reply was sent.
    Command(String),
    /// The pipeline handled the message.
    Request(Outcome),
}

#[derive(Clone)]
pub struct Runtime {
    state: Arc<BotState>,
    commands: Arc<CommandRegistry>,
    channel: Arc<dyn Channel>,
    in_flight: Arc<AtomicUsize>,
}

impl Runtime {
    pub fn new(state: Arc<BotState>, commands: CommandRegistry, channel: Arc<dyn Channel>) -> Self {
        Self {
            state,
            commands: Arc::new(commands),
            channel,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Start the channel and dispatch messages until it closes or
    /// `shutdown` resolves. A closed channel lets in-flight requests finish;
    /// shutdown aborts them.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), ChannelError> {
        let mut inbox = self.channel.start().await?;
        info!(channel = self.channel.name(), "Runtime started");

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                message = inbox.recv() => {
                    let Some(message) = message else {
                        info!(channel = self.channel.name(), pending = tasks.len(), "Channel closed");
                        while tasks.join_next().await.is_some() {}
                        break;
                    };
                    let runtime = self.clone();
                    tasks.spawn(async move {
                        runtime.dispatch(message).await;
                    });
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                () = &mut shutdown => {
                    info!(pending = tasks.len(), "Shutdown requested");
                    tasks.abort_all();
                    break;
                }
            }
        }

        self.channel.stop().await
    }

    /// Handle one message to completion.
    pub async fn dispatch(&self, message: ChannelMessage) -> Dispatch {
        if message.from_bot {
            return Dispatch::Ignored;
        }

        let prefix = self.state.command_prefix();
        if let Some((name, args)) = parse_command(&prefix, &message.content) {
            return self.run_command(&message, &name, args).await;
        }

        if !message.addressed {
            return Dispatch::Ignored;
        }

        let outcome = self.run_request(&message).await;
        self.deliver(&message.chat_id, &message.reply_text(&outcome.message()))
            .await;
        Dispatch::Request(outcome)
    }

    async fn run_command(&self, message: &ChannelMessage, name: &str, args: &str) -> Dispatch {
        let ctx = CommandContext {
            state: self.state.clone(),
            invoker: message.sender,
            catalog: self.commands.catalog(),
        };
        let reply = match self.commands.dispatch(&ctx, name, args).await {
            None => return Dispatch::Ignored,
            Some(Ok(reply)) => reply,
            Some(Err(e)) => {
                debug!(command = %name, error = %e, "Command failed");
                failure_message(&e)
            }
        };
        self.deliver(&message.chat_id, &reply).await;
        Dispatch::Command(reply)
    }

    async fn run_request(&self, message: &ChannelMessage) -> Outcome {
        let pipeline = self.state.pipeline();
        let admitted = match pipeline.admit(message.sender, &message.content, message.has_attachments()) {
            Ok(admitted) => admitted,
            Err(outcome) => return outcome,
        };

        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.channel.set_busy(true).await;
        }

        let channel = self.channel.clone();
        let chat_id = message.chat_id.clone();
        let typing = tokio::spawn(async move {
            loop {
                if let Err(e) = channel.send_typing(&chat_id).await {
                    debug!(error = %e, "Typing indicator failed");
                }
                tokio::time::sleep(TYPING_REFRESH).await;
            }
        });

        let outcome = pipeline.answer(admitted).await;
        typing.abort();

        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.channel.set_busy(false).await;
        }
        outcome
    }

    async fn deliver(&self, chat_id: &str, content: &str) {
        if let Err(e) = self.channel.send(chat_id, content).await {
            error!(channel = self.channel.name(), chat_id, error = %e, "Failed to deliver reply");
        }
    }
}

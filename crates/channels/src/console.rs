//! Console channel: interactive terminal chat.
//!
//! Reads lines from stdin as direct messages from a fixed local identity
//! and prints replies to stdout. Used by `aidog chat`.

use aidog_core::channel::{Channel, ChannelMessage};
use aidog_core::error::ChannelError;
use aidog_core::message::Identity;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

/// Identity used for the local console user.
pub const CONSOLE_IDENTITY: Identity = Identity(0);

type Input = Box<dyn AsyncBufRead + Send + Unpin>;

pub struct ConsoleChannel {
    identity: Identity,
    input: Mutex<Option<Input>>,
    ready: watch::Sender<bool>,
}

impl ConsoleChannel {
    /// A console channel reading stdin.
    pub fn new() -> Self {
        Self::with_input(BufReader::new(io::stdin()))
    }

    /// A console channel reading from any buffered source.
    pub fn with_input(input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            identity: CONSOLE_IDENTITY,
            input: Mutex::new(Some(Box::new(input))),
            ready,
        }
    }

    /// Send messages as `identity` instead of [`CONSOLE_IDENTITY`].
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self) -> Result<mpsc::Receiver<ChannelMessage>, ChannelError> {
        let input = self
            .input
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| ChannelError::ConnectionLost("console input already consumed".into()))?;

        let (tx, rx) = mpsc::channel(32);
        let identity = self.identity;
        tokio::spawn(async move {
            let mut lines = input.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if is_exit(line) {
                            break;
                        }
                        let mut msg = ChannelMessage::direct("console", identity, line);
                        msg.sender_name = Some("You".into());
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Console input failed");
                        break;
                    }
                }
            }
        });

        self.ready.send_replace(true);
        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, content: &str) -> Result<(), ChannelError> {
        println!("🐕 {content}\n");
        Ok(())
    }

    fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }
}

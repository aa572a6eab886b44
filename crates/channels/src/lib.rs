//! Chat channel implementations for AI Dog.
//!
//! Available channels:
//! - **Discord**: serenity gateway client
//! - **Console**: interactive terminal chat (stdin/stdout)

pub mod console;
pub mod discord;

pub use console::{CONSOLE_IDENTITY, ConsoleChannel};
pub use discord::{DiscordChannel, strip_mentions};

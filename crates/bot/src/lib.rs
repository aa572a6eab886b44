//! AI Dog's chat-facing layer.
//!
//! - [`command`]: the [`Command`] trait and the explicit [`CommandRegistry`]
//! - [`builtin`]: help, stats, clear, reloadcfg and weather
//! - [`runtime`]: routes channel messages to commands or the request pipeline
//! - [`state`]: the live configuration shared by commands

pub mod builtin;
pub mod command;
pub mod runtime;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use builtin::default_registry;
pub use command::{Command, CommandContext, CommandRegistry, CommandSummary, parse_command};
pub use runtime::{Dispatch, Runtime};
pub use state::{BotState, EnvLookup};

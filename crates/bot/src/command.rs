//! Commands: prefixed chat messages handled outside the request pipeline.
//!
//! Every command implements [`Command`] and is registered explicitly in a
//! [`CommandRegistry`] at startup. The registry resolves names and aliases,
//! enforces `admin_only`, and renders the catalog `help` shows.

use crate::state::BotState;
use aidog_core::error::CommandError;
use aidog_core::message::Identity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a command can see while it runs.
pub struct CommandContext {
    pub state: Arc<BotState>,
    pub invoker: Identity,
    /// Registered commands, in registration order
    pub catalog: Arc<[CommandSummary]>,
}

impl CommandContext {
    pub fn is_admin(&self) -> bool {
        self.state.is_admin(self.invoker)
    }
}

/// Name, description and permission of a registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSummary {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub admin_only: bool,
}

#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, matched case-insensitively after the prefix.
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One line shown by `help`.
    fn description(&self) -> &str;

    fn admin_only(&self) -> bool {
        false
    }

    /// Run the command and return the text to send back.
    async fn execute(&self, ctx: &CommandContext, args: &str) -> Result<String, CommandError>;
}

/// A registry of available commands.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a command under its name and aliases. Later registrations
    /// win on name clashes.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        let slot = self.commands.len();
        self.index.insert(command.name().to_lowercase(), slot);
        for alias in command.aliases() {
            self.index.insert(alias.to_lowercase(), slot);
        }
        self.commands.push(command);
    }

    /// Look up a command by name or alias.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.index
            .get(&name.to_lowercase())
            .map(|slot| &self.commands[*slot])
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Summaries of every registered command, in registration order.
    pub fn catalog(&self) -> Arc<[CommandSummary]> {
        self.commands
            .iter()
            .map(|c| CommandSummary {
                name: c.name().to_string(),
                aliases: c.aliases().iter().map(|a| a.to_string()).collect(),
                description: c.description().to_string(),
                admin_only: c.admin_only(),
            })
            .collect()
    }

    /// Run the command called `name`. Returns `None` for unknown commands.
    pub async fn dispatch(
        &self,
        ctx: &CommandContext,
        name: &str,
        args: &str,
    ) -> Option<Result<String, CommandError>> {
        let Some(command) = self.get(name) else {
            debug!(command = %name, "Ignoring unknown command");
            return None;
        };

        if command.admin_only() && !ctx.is_admin() {
            warn!(command = command.name(), user = %ctx.invoker, "Admin command refused");
            return Some(Err(CommandError::PermissionDenied {
                command: command.name().to_string(),
            }));
        }

        info!(command = command.name(), user = %ctx.invoker, "Running command");
        Some(command.execute(ctx, args).await)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a prefixed message into a lowercased command name and its
/// arguments. Returns `None` when `text` does not start with `prefix`.
///
/// A prefix ending in whitespace (`"!aidog "`) also matches the bare word
/// (`"!aidog"`), which yields an empty command name.
pub fn parse_command<'a>(prefix: &str, text: &'a str) -> Option<(String, &'a str)> {
    let text = text.trim_start();
    let bare = prefix.trim_end();
    if bare.is_empty() {
        return None;
    }

    let rest = text.strip_prefix(bare)?;
    if bare.len() != prefix.len() && !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }

    let rest = rest.trim_start();
    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Some((name.to_lowercase(), args.trim()))
}

/// The reply sent when a command fails.
pub fn failure_message(error: &CommandError) -> String {
    match error {
        CommandError::PermissionDenied { .. } => {
            "Sorry, only my owners can use that command, woof.".to_string()
        }
        CommandError::InvalidArguments(detail) => format!("Hmm, I didn't understand that: {detail}"),
        CommandError::Unavailable(detail) => format!("That command isn't available right now: {detail}"),
        CommandError::ExecutionFailed { command, .. } => {
            format!("Woof! The {command} command ran into a problem.")
        }
    }
}

use crate::command::{Command, CommandContext};
use aidog_core::error::CommandError;
use async_trait::async_trait;
use std::fmt::Write;

pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Shows what AI Dog can do"
    }

    async fn execute(&self, ctx: &CommandContext, _args: &str) -> Result<String, CommandError> {
        let prefix = ctx.state.command_prefix();
        let mut out = String::from("🐕 **AI Dog help**\n");
        out.push_str("Mention me or send me a direct message to chat, woof!\n\n**Commands**\n");
        for command in ctx.catalog.iter() {
            let _ = write!(out, "`{prefix}{}`: {}", command.name, command.description);
            if command.admin_only {
                out.push_str(" (admin)");
            }
            out.push('\n');
        }
        Ok(out.trim_end().to_string())
    }
}

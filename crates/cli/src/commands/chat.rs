//! `aidog chat`: talk to AI Dog in the terminal.

use super::{CliResult, load_config, serve};
use aidog_channels::ConsoleChannel;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: &Path) -> CliResult {
    let config = load_config(config_path)?;

    println!("🐕 AI Dog ({})", config.ollama.model);
    println!("   Type a message, `{}help` for commands, or `exit` to quit.\n", config.command_prefix);

    serve(config, config_path, Arc::new(ConsoleChannel::new())).await
}

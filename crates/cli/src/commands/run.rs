//! `aidog run`: the Discord bot.

use super::{CliResult, load_config, serve};
use aidog_channels::DiscordChannel;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: &Path) -> CliResult {
    let config = load_config(config_path)?;
    let token = config.require_bot_token()?.to_string();

    println!("🐕 AI Dog starting");
    println!("   Model:    {}", config.ollama.model);
    println!("   Endpoint: {}", config.ollama.api_url);
    println!("   Prefix:   {:?}", config.command_prefix);

    serve(config, config_path, Arc::new(DiscordChannel::new(token))).await
}

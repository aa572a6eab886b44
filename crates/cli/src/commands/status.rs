//! `aidog status`: show the effective configuration.

use super::CliResult;
use aidog_config::BotConfig;
use std::path::Path;

pub async fn run(config_path: &Path) -> CliResult {
    let mut config =
        BotConfig::load_from(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.apply_env(|name| std::env::var(name).ok());

    println!("🐕 AI Dog Status");
    println!("================");
    println!(
        "  Config file:  {} ({})",
        config_path.display(),
        if config_path.exists() { "found" } else { "missing, using defaults" }
    );
    println!(
        "  Bot token:    {}",
        if config.bot_token.is_some() { "set" } else { "not set" }
    );
    println!("  Prefix:       {:?}", config.command_prefix);
    println!("  Admins:       {:?}", config.admin_user_ids);
    println!("  Model:        {}", config.ollama.model);
    println!("  Endpoint:     {}", config.ollama.api_url);
    println!("  Timeout:      {}s", config.ollama.request_timeout_secs);
    println!("  Health check: every {}s", config.ollama.health_check_interval_secs);
    println!(
        "  History:      {} (last {} exchanges)",
        config.conversation.backend, config.conversation.max_history
    );
    println!(
        "  Rate limit:   {} per {}s",
        config.limits.rate_limit_per_user, config.limits.rate_limit_window_secs
    );
    println!("  Max reply:    {} chars", config.limits.max_response_length);
    println!(
        "  Weather:      {}",
        if config.weather.api_key.is_some() { "enabled" } else { "disabled" }
    );

    match config.validate() {
        Ok(()) => println!("\n  ✅ Configuration valid"),
        Err(e) => println!("\n  ❌ {e}"),
    }

    Ok(())
}

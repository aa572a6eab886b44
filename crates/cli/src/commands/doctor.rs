//! `aidog doctor`: diagnose the inference server and history store.

use super::CliResult;
use aidog_config::BotConfig;
use aidog_core::health::{HealthProbe, HealthStatus};
use aidog_core::history::HistoryBackend;
use aidog_providers::OllamaProvider;
use std::path::Path;

pub async fn run(config_path: &Path) -> CliResult {
    println!("🩺 AI Dog Doctor");
    println!("================\n");

    let mut issues = 0;

    let config = match BotConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid ({})", config_path.display());
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Err("configuration must be fixed first".into());
        }
    };

    if config.bot_token.is_none() {
        println!("  ⚠️  No bot token, `aidog run` will not start");
        issues += 1;
    }

    match OllamaProvider::new(&config.ollama.api_url, config.probe_timeout()) {
        Ok(provider) => {
            let status = HealthStatus::from(provider.probe().await);
            if status == HealthStatus::Online {
                println!("  ✅ Inference server online ({})", provider.root_url());
            } else {
                println!("  ❌ Inference server {status} ({})", provider.root_url());
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ❌ Inference endpoint unusable: {e}");
            issues += 1;
        }
    }

    match aidog_memory::open_backend(&config).await {
        Ok(backend) => println!("  ✅ History store opened ({})", backend.name()),
        Err(e) => {
            println!("  ❌ History store failed: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

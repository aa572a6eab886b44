//! AI Dog CLI: the main entry point.
//!
//! Commands:
//! - `run`     Connect to Discord and serve until Ctrl-C
//! - `chat`    Talk to AI Dog in the terminal
//! - `ask`     Send a single question and print the reply
//! - `status`  Show the effective configuration
//! - `doctor`  Check the inference server and history store

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "aidog",
    about = "AI Dog: a persona chat bot backed by a local Ollama model",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./aidog.toml)
    #[arg(short, long, global = true, env = "AIDOG_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and answer until interrupted
    Run,

    /// Chat with AI Dog in the terminal
    Chat,

    /// Ask a single question
    Ask {
        /// The question to send
        #[arg(short, long)]
        message: String,
    },

    /// Show the effective configuration (secrets redacted)
    Status,

    /// Diagnose the inference server and history store
    Doctor,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = aidog_config::BotConfig::resolve_path(cli.config.as_deref());

    match cli.command {
        Commands::Run => commands::run::run(&config_path).await?,
        Commands::Chat => commands::chat::run(&config_path).await?,
        Commands::Ask { message } => commands::ask::run(&config_path, &message).await?,
        Commands::Status => commands::status::run(&config_path).await?,
        Commands::Doctor => commands::doctor::run(&config_path).await?,
    }

    Ok(())
}

//! `aidog ask -m`: one question through the full pipeline.

use super::{CliResult, build_pipeline, load_config};
use aidog_agent::Outcome;
use aidog_channels::CONSOLE_IDENTITY;
use std::path::Path;

pub async fn run(config_path: &Path, message: &str) -> CliResult {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config).await?;

    let outcome = pipeline.handle(CONSOLE_IDENTITY, message, false).await;
    println!("{}", outcome.message());

    match outcome {
        Outcome::Reply { success: false, .. } => Err("AI Dog could not answer".into()),
        _ => Ok(()),
    }
}

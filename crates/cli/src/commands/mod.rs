pub mod ask;
pub mod chat;
pub mod doctor;
pub mod run;
pub mod status;

use aidog_agent::RequestPipeline;
use aidog_bot::{BotState, Runtime, default_registry};
use aidog_config::BotConfig;
use aidog_core::channel::Channel;
use aidog_core::health::{HealthHandle, HealthProbe};
use aidog_telemetry::BotStats;
use aidog_workflow::HealthMonitor;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load and validate the configuration, with a readable error.
pub fn load_config(path: &Path) -> Result<BotConfig, Box<dyn std::error::Error>> {
    BotConfig::load(path).map_err(|e| format!("Failed to load config {}: {e}", path.display()).into())
}

/// Build the request pipeline for `config`.
pub async fn build_pipeline(config: &BotConfig) -> Result<Arc<RequestPipeline>, Box<dyn std::error::Error>> {
    let pipeline = RequestPipeline::from_config(config, Arc::new(BotStats::new()), HealthHandle::new())
        .await
        .map_err(|e| format!("Failed to start AI Dog: {e}"))?;
    info!(
        model = %config.ollama.model,
        history = %config.conversation.backend,
        "Request pipeline ready"
    );
    Ok(Arc::new(pipeline))
}

/// Serve `channel` with the built-in commands and a health monitor until
/// the channel closes or Ctrl-C is pressed.
pub async fn serve(config: BotConfig, config_path: &Path, channel: Arc<dyn Channel>) -> CliResult {
    let pipeline = build_pipeline(&config).await?;
    let interval = config.health_check_interval();

    let probe: Arc<dyn HealthProbe> = pipeline.clone();
    let monitor = HealthMonitor::new(probe, pipeline.health().clone(), interval).start(channel.ready());

    let state = Arc::new(BotState::new(config, config_path, pipeline));
    let runtime = Runtime::new(state, default_registry(), channel);

    let result = runtime
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    monitor.stop().await;
    result.map_err(Into::into)
}

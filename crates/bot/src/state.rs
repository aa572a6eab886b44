//! Shared bot state: the live configuration and the request pipeline.

use aidog_agent::RequestPipeline;
use aidog_config::BotConfig;
use aidog_core::error::CommandError;
use aidog_core::message::Identity;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Environment lookup used when the configuration is reloaded.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct BotState {
    config: RwLock<BotConfig>,
    config_path: PathBuf,
    pipeline: Arc<RequestPipeline>,
    env: EnvLookup,
    /// Held for a whole reload so pipeline and config change together.
    reloading: tokio::sync::Mutex<()>,
}

impl BotState {
    pub fn new(config: BotConfig, config_path: impl Into<PathBuf>, pipeline: Arc<RequestPipeline>) -> Self {
        Self {
            config: RwLock::new(config),
            config_path: config_path.into(),
            pipeline,
            env: Arc::new(|name| std::env::var(name).ok()),
            reloading: tokio::sync::Mutex::new(()),
        }
    }

    /// Replace the environment lookup used by [`BotState::reload`].
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// A copy of the running configuration.
    pub fn config(&self) -> BotConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    pub fn command_prefix(&self) -> String {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .command_prefix
            .clone()
    }

    pub fn is_admin(&self, identity: Identity) -> bool {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_admin(identity.0)
    }

    /// Re-read the config file and environment, rebuild the pipeline's
    /// governance, and adopt the new configuration. Returns the changed
    /// keys. Nothing changes when loading or rebuilding fails.
    pub async fn reload(&self) -> Result<Vec<String>, CommandError> {
        let failed = |reason: String| CommandError::ExecutionFailed {
            command: "reloadcfg".into(),
            reason,
        };

        let _reloading = self.reloading.lock().await;
        let env = self.env.clone();
        let fresh = BotConfig::load_with_env(&self.config_path, |name| env(name)).map_err(|e| {
            warn!(path = %self.config_path.display(), error = %e, "Config reload rejected");
            failed(e.to_string())
        })?;

        self.pipeline.reload(&fresh).await.map_err(|e| {
            warn!(error = %e, "Pipeline rebuild failed, keeping running configuration");
            failed(e.to_string())
        })?;

        let previous = std::mem::replace(
            &mut *self.config.write().unwrap_or_else(|e| e.into_inner()),
            fresh.clone(),
        );
        let changes = BotConfig::diff(&previous, &fresh);
        info!(changes = changes.len(), "Configuration reloaded");
        Ok(changes)
    }
}

//! Configuration loading, validation, and management for AI Dog.
//!
//! Loads configuration from a TOML file (`--config`, `AIDOG_CONFIG`, or
//! `./aidog.toml`) and applies environment variable overrides on top.
//! Validates all settings at startup and again on every reload.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "AIDOG_CONFIG";

/// File used when neither `--config` nor `AIDOG_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "aidog.toml";

/// The root configuration structure.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Discord bot token (only needed when the Discord channel starts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Prefix marking a message as a command
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Users allowed to run admin commands
    #[serde(default)]
    pub admin_user_ids: Vec<u64>,

    /// Inference endpoint settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Conversation history settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Rate limiting and reply size
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Persona template override
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Weather command settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

fn default_command_prefix() -> String {
    "!aidog ".into()
}

/// Redact a secret for Debug and diff output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("command_prefix", &self.command_prefix)
            .field("admin_user_ids", &self.admin_user_ids)
            .field("ollama", &self.ollama)
            .field("conversation", &self.conversation)
            .field("limits", &self.limits)
            .field("persona", &self.persona)
            .field("weather", &self.weather)
            .finish()
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_city", &self.default_city)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Model name (required)
    #[serde(default)]
    pub model: String,

    /// Full URL of the generate endpoint (required)
    #[serde(default)]
    pub api_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f64,

    /// Upper bound for one generation request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Period of the background health probe
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,

    /// Timeout of a single health probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_num_ctx() -> u32 {
    4096
}
fn default_top_p() -> f64 {
    0.9
}
fn default_repeat_penalty() -> f64 {
    1.1
}
fn default_request_timeout() -> u64 {
    180
}
fn default_health_interval() -> u64 {
    120
}
fn default_probe_timeout() -> u64 {
    5
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_url: String::new(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            request_timeout_secs: default_request_timeout(),
            health_check_interval_secs: default_health_interval(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

/// Which persistence layer backs conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackendKind {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for HistoryBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for HistoryBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "in_memory" => Ok(Self::Memory),
            other => Err(format!("unknown history backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default)]
    pub backend: HistoryBackendKind,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Exchanges (user + assistant pairs) fed back as context
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Staleness cutoff of the memory backend; 0 disables it
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ai_dog_conversation_history.sqlite3")
}
fn default_max_history() -> usize {
    5
}
fn default_max_age() -> u64 {
    3600
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackendKind::default(),
            db_path: default_db_path(),
            max_history: default_max_history(),
            max_age_secs: default_max_age(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_user: usize,

    #[serde(default = "default_rate_window")]
    pub rate_limit_window_secs: u64,

    /// Longest reply sent to the chat, in characters
    #[serde(default = "default_max_response_length")]
    pub max_response_length: usize,
}

fn default_rate_limit() -> usize {
    5
}
fn default_rate_window() -> u64 {
    60
}
fn default_max_response_length() -> usize {
    1900
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_user: default_rate_limit(),
            rate_limit_window_secs: default_rate_window(),
            max_response_length: default_max_response_length(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// File replacing the built-in persona template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap key; the weather command is disabled without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_city")]
    pub default_city: String,
}

fn default_city() -> String {
    "Tokyo".into()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_city: default_city(),
        }
    }
}

impl BotConfig {
    /// Resolve the config file path: explicit path, then `AIDOG_CONFIG`,
    /// then `./aidog.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load the file at `path`, apply process environment overrides, and
    /// validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Like [`BotConfig::load`] but with an injectable environment lookup.
    pub fn load_with_env(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file without environment overrides or
    /// validation. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment variable overrides.
    ///
    /// Unparseable values are logged and ignored, keeping the previous value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = &lookup;

        override_secret(lookup, "BOT_TOKEN", &mut self.bot_token);
        override_string(lookup, "COMMAND_PREFIX", &mut self.command_prefix);
        if let Some(raw) = lookup("ADMIN_USER_IDS") {
            let ids: Vec<u64> = raw
                .split(',')
                .filter_map(|item| item.trim().parse().ok())
                .collect();
            if ids.is_empty() {
                tracing::warn!("ADMIN_USER_IDS is set but contains no numeric ids");
            } else {
                self.admin_user_ids = ids;
            }
        }

        override_string(lookup, "OLLAMA_MODEL_NAME", &mut self.ollama.model);
        override_string(lookup, "OLLAMA_API_URL", &mut self.ollama.api_url);
        override_parsed(lookup, "OLLAMA_TEMPERATURE", &mut self.ollama.temperature);
        override_parsed(lookup, "OLLAMA_NUM_CTX", &mut self.ollama.num_ctx);
        override_parsed(lookup, "OLLAMA_TOP_P", &mut self.ollama.top_p);
        override_parsed(lookup, "OLLAMA_REPEAT_PENALTY", &mut self.ollama.repeat_penalty);
        override_parsed(lookup, "REQUEST_TIMEOUT", &mut self.ollama.request_timeout_secs);
        override_parsed(
            lookup,
            "HEALTH_CHECK_INTERVAL",
            &mut self.ollama.health_check_interval_secs,
        );

        override_parsed(lookup, "HISTORY_BACKEND", &mut self.conversation.backend);
        if let Some(raw) = lookup("CONVERSATION_DB_PATH").filter(|v| !v.is_empty()) {
            self.conversation.db_path = PathBuf::from(raw);
        }
        override_parsed(lookup, "MAX_CONVERSATION_HISTORY", &mut self.conversation.max_history);

        override_parsed(lookup, "RATE_LIMIT_PER_USER", &mut self.limits.rate_limit_per_user);
        override_parsed(lookup, "RATE_LIMIT_WINDOW", &mut self.limits.rate_limit_window_secs);
        override_parsed(lookup, "MAX_RESPONSE_LENGTH", &mut self.limits.max_response_length);

        if let Some(raw) = lookup("PERSONA_TEMPLATE_PATH").filter(|v| !v.is_empty()) {
            self.persona.template_path = Some(PathBuf::from(raw));
        }

        override_secret(lookup, "OPENWEATHERMAP_API_KEY", &mut self.weather.api_key);
        override_string(lookup, "WEATHER_DEFAULT_CITY", &mut self.weather.default_city);
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.ollama.model.trim().is_empty() {
            missing.push("ollama.model (OLLAMA_MODEL_NAME)");
        }
        if self.ollama.api_url.trim().is_empty() {
            missing.push("ollama.api_url (OLLAMA_API_URL)");
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired(missing.join(", ")));
        }

        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            return Err(ConfigError::ValidationError(
                "ollama.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let positive = [
            ("limits.rate_limit_per_user", self.limits.rate_limit_per_user as u64),
            ("limits.rate_limit_window_secs", self.limits.rate_limit_window_secs),
            ("limits.max_response_length", self.limits.max_response_length as u64),
            ("conversation.max_history", self.conversation.max_history as u64),
            ("ollama.request_timeout_secs", self.ollama.request_timeout_secs),
            ("ollama.health_check_interval_secs", self.ollama.health_check_interval_secs),
            ("ollama.probe_timeout_secs", self.ollama.probe_timeout_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        Ok(())
    }

    /// The bot token, or an error naming the missing setting.
    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        self.bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("bot_token (BOT_TOKEN)".into()))
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_user_ids.contains(&user_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.request_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.ollama.health_check_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.probe_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.limits.rate_limit_window_secs)
    }

    /// Staleness cutoff of the memory backend, `None` when disabled.
    pub fn history_max_age(&self) -> Option<Duration> {
        match self.conversation.max_age_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Changed settings between two configurations as `key: old -> new`
    /// lines, with secrets redacted.
    pub fn diff(old: &Self, new: &Self) -> Vec<String> {
        old.entries()
            .into_iter()
            .zip(new.entries())
            .filter(|(before, after)| before.value != after.value)
            .map(|(before, after)| {
                if before.secret {
                    format!(
                        "{}: {} -> {}",
                        before.key,
                        redact(&before.value),
                        redact(&after.value)
                    )
                } else {
                    format!(
                        "{}: {} -> {}",
                        before.key,
                        before.value.unwrap_or_default(),
                        after.value.unwrap_or_default()
                    )
                }
            })
            .collect()
    }

    /// Flattened view of every setting, in a fixed order.
    fn entries(&self) -> Vec<Entry> {
        vec![
            Entry::secret("bot_token", &self.bot_token),
            Entry::plain("command_prefix", format!("{:?}", self.command_prefix)),
            Entry::plain("admin_user_ids", format!("{:?}", self.admin_user_ids)),
            Entry::plain("ollama.model", &self.ollama.model),
            Entry::plain("ollama.api_url", &self.ollama.api_url),
            Entry::plain("ollama.temperature", self.ollama.temperature),
            Entry::plain("ollama.num_ctx", self.ollama.num_ctx),
            Entry::plain("ollama.top_p", self.ollama.top_p),
            Entry::plain("ollama.repeat_penalty", self.ollama.repeat_penalty),
            Entry::plain("ollama.request_timeout_secs", self.ollama.request_timeout_secs),
            Entry::plain(
                "ollama.health_check_interval_secs",
                self.ollama.health_check_interval_secs,
            ),
            Entry::plain("ollama.probe_timeout_secs", self.ollama.probe_timeout_secs),
            Entry::plain("conversation.backend", self.conversation.backend),
            Entry::plain("conversation.db_path", self.conversation.db_path.display()),
            Entry::plain("conversation.max_history", self.conversation.max_history),
            Entry::plain("conversation.max_age_secs", self.conversation.max_age_secs),
            Entry::plain("limits.rate_limit_per_user", self.limits.rate_limit_per_user),
            Entry::plain("limits.rate_limit_window_secs", self.limits.rate_limit_window_secs),
            Entry::plain("limits.max_response_length", self.limits.max_response_length),
            Entry::plain(
                "persona.template_path",
                self.persona
                    .template_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(built-in)".into()),
            ),
            Entry::secret("weather.api_key", &self.weather.api_key),
            Entry::plain("weather.default_city", &self.weather.default_city),
        ]
    }

    /// The default configuration rendered as TOML (for `aidog status`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            command_prefix: default_command_prefix(),
            admin_user_ids: vec![],
            ollama: OllamaConfig::default(),
            conversation: ConversationConfig::default(),
            limits: LimitsConfig::default(),
            persona: PersonaConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

struct Entry {
    key: &'static str,
    value: Option<String>,
    secret: bool,
}

impl Entry {
    fn plain(key: &'static str, value: impl Display) -> Self {
        Self {
            key,
            value: Some(value.to_string()),
            secret: false,
        }
    }

    fn secret(key: &'static str, value: &Option<String>) -> Self {
        Self {
            key,
            value: value.clone(),
            secret: true,
        }
    }
}

fn override_string(lookup: &dyn Fn(&str) -> Option<String>, name: &str, slot: &mut String) {
    if let Some(raw) = lookup(name) {
        *slot = raw;
    }
}

fn override_secret(lookup: &dyn Fn(&str) -> Option<String>, name: &str, slot: &mut Option<String>) {
    if let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) {
        *slot = Some(raw);
    }
}

fn override_parsed<T>(lookup: &dyn Fn(&str) -> Option<String>, name: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(e) => tracing::warn!(
            var = name,
            value = %raw,
            error = %e,
            "Ignoring unparseable environment override, keeping previous value"
        ),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Missing required settings: {0}")]
    MissingRequired(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

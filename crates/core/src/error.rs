//! Error types for the AI Dog domain.
//!
//! Each bounded context has its own `thiserror` enum; callers convert into
//! their own error types (`SetupError`, `CliResult`) where contexts meet.

use thiserror::Error;

/// Failures talking to the inference endpoint.
///
/// The variants mirror the failure classes the request pipeline treats
/// differently: a slow endpoint (`Timeout`) is not an unreachable one
/// (`Network`), and neither is a reachable endpoint answering with an
/// error status (`ApiError`).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether this failure means the endpoint could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid command arguments: {0}")]
    InvalidArguments(String),

    #[error("Permission denied: {command}")]
    PermissionDenied { command: String },

    #[error("Command failed: {command}: {reason}")]
    ExecutionFailed { command: String, reason: String },

    #[error("Command unavailable: {0}")]
    Unavailable(String),
}

//! Inference backend trait, the abstraction over the text-generation endpoint.
//!
//! The request shape is a fixed external contract: `model`, `prompt`,
//! `stream` and an `options` object with the sampling parameters, answered
//! by a JSON object whose `response` field holds the generated text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;

/// Sampling parameters, passed through to the endpoint unvalidated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: f64,
    pub num_ctx: u32,
    pub top_p: f64,
    pub repeat_penalty: f64,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            num_ctx: 4096,
            top_p: 0.9,
            repeat_penalty: 1.1,
        }
    }
}

/// One generation request. Serializes to the endpoint's request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model name as known to the endpoint
    pub model: String,

    /// Fully assembled prompt (persona + context + question)
    pub prompt: String,

    /// Always `false`; replies are read as one JSON document
    pub stream: bool,

    /// Sampling parameters
    pub options: SamplingOptions,

    /// Upper bound for the whole exchange; not part of the wire format
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, options: SamplingOptions) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            options,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The endpoint's reply. Only `response` matters to the bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

/// The core InferenceBackend trait.
///
/// Implemented by the HTTP client for the real endpoint and by test stubs.
/// Implementations report failures through [`ProviderError`]; turning them
/// into user-facing fallbacks is the caller's job.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// A human-readable name (e.g. "ollama").
    fn name(&self) -> &str;

    /// Send one generation request and wait for the complete reply.
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_wire_envelope() {
        let req = GenerateRequest::new("llama3", "hello", SamplingOptions::default())
            .with_timeout(Duration::from_secs(180));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama3",
                "prompt": "hello",
                "stream": false,
                "options": {
                    "temperature": 0.7,
                    "num_ctx": 4096,
                    "top_p": 0.9,
                    "repeat_penalty": 1.1
                }
            })
        );
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert!(parsed.response.is_empty());
        assert_eq!(parsed.done, Some(true));
    }
}

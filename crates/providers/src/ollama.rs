//! Ollama provider implementation.
//!
//! Talks to the `/api/generate` endpoint with streaming disabled, and
//! probes the server root (which answers `Ollama is running`) for health.

use async_trait::async_trait;
use aidog_core::error::ProviderError;
use aidog_core::health::{HealthProbe, ProbeOutcome};
use aidog_core::inference::{GenerateRequest, GenerateResponse, InferenceBackend};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, warn};

/// Marker the server root returns when the daemon is up.
const RUNNING_MARKER: &str = "Ollama is running";

/// Client for a single Ollama endpoint.
pub struct OllamaProvider {
    generate_url: Url,
    root_url: Url,
    probe_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for the given generate URL
    /// (e.g. `http://localhost:11434/api/generate`).
    pub fn new(api_url: &str, probe_timeout: Duration) -> Result<Self, ProviderError> {
        let generate_url = Url::parse(api_url)
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid api_url '{api_url}': {e}")))?;
        let root_url = generate_url
            .join("/")
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid api_url '{api_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            generate_url,
            root_url,
            probe_timeout,
            client,
        })
    }

    /// The URL health probes are sent to.
    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    fn map_send_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl InferenceBackend for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        debug!(
            model = %request.model,
            prompt_chars = request.prompt.chars().count(),
            "Sending generate request"
        );

        let mut builder = self.client.post(self.generate_url.clone()).json(&request);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Inference endpoint returned error");
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_body,
            });
        }

        response.json::<GenerateResponse>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::InvalidResponse(format!("Failed to parse response: {e}"))
            }
        })
    }
}

#[async_trait]
impl HealthProbe for OllamaProvider {
    async fn probe(&self) -> ProbeOutcome {
        let response = match self
            .client
            .get(self.root_url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                return ProbeOutcome::Unreachable;
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "Health probe body unreadable");
                return ProbeOutcome::Unreachable;
            }
        };

        if status == 200 && body.contains(RUNNING_MARKER) {
            ProbeOutcome::Healthy
        } else {
            ProbeOutcome::Status(status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidog_core::inference::SamplingOptions;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/generate")
    }

    fn request(timeout: Duration) -> GenerateRequest {
        GenerateRequest::new("llama3", "say woof", SamplingOptions::default()).with_timeout(timeout)
    }

    #[test]
    fn root_url_strips_path() {
        let provider =
            OllamaProvider::new("http://ollama:11434/api/generate", Duration::from_secs(5)).unwrap();
        assert_eq!(provider.root_url().as_str(), "http://ollama:11434/");
    }

    #[test]
    fn invalid_url_rejected() {
        assert!(OllamaProvider::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn generate_sends_envelope_and_reads_response() {
        let app = Router::new().route(
            "/api/generate",
            post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                assert_eq!(body["stream"], false);
                assert_eq!(body["options"]["num_ctx"], 4096);
                let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
                axum::Json(serde_json::json!({ "response": format!("echo: {prompt}"), "done": true }))
            }),
        );
        let url = serve(app).await;
        let provider = OllamaProvider::new(&url, Duration::from_secs(1)).unwrap();

        let reply = provider.generate(request(Duration::from_secs(5))).await.unwrap();
        assert_eq!(reply.response, "echo: say woof");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let url = serve(app).await;
        let provider = OllamaProvider::new(&url, Duration::from_secs(1)).unwrap();

        let err = provider.generate(request(Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 500, .. }));
    }

    #[tokio::test]
    async fn slow_endpoint_is_timeout() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                axum::Json(serde_json::json!({ "response": "late" }))
            }),
        );
        let url = serve(app).await;
        let provider = OllamaProvider::new(&url, Duration::from_secs(1)).unwrap();

        let err = provider.generate(request(Duration::from_millis(200))).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider =
            OllamaProvider::new(&format!("http://{addr}/api/generate"), Duration::from_secs(1)).unwrap();
        let err = provider.generate(request(Duration::from_secs(5))).await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(provider.probe().await, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn probe_requires_marker() {
        let app = Router::new().route("/", get(|| async { "Ollama is running" }));
        let url = serve(app).await;
        let provider = OllamaProvider::new(&url, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.probe().await, ProbeOutcome::Healthy);

        let app = Router::new().route("/", get(|| async { "nginx welcome page" }));
        let url = serve(app).await;
        let provider = OllamaProvider::new(&url, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.probe().await, ProbeOutcome::Status(200));
    }

    #[tokio::test]
    async fn probe_reports_error_status() {
        let app = Router::new().route("/", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let url = serve(app).await;
        let provider = OllamaProvider::new(&url, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.probe().await, ProbeOutcome::Status(503));
    }
}

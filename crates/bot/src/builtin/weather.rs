//! Current weather from OpenWeatherMap.

use crate::command::{Command, CommandContext};
use aidog_core::error::CommandError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, warn};

pub const OPENWEATHERMAP_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WeatherCommand {
    http: reqwest::Client,
    endpoint: String,
}

impl WeatherCommand {
    pub fn new() -> Self {
        Self::with_endpoint(OPENWEATHERMAP_URL)
    }

    /// Query a different OpenWeatherMap-compatible endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WeatherCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct WeatherReport {
    name: Option<String>,
    #[serde(default)]
    weather: Vec<Condition>,
    main: Option<Readings>,
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Readings {
    temp: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

fn celsius(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}°C")).unwrap_or_else(|| "N/A".into())
}

impl WeatherReport {
    fn render(&self, requested: &str) -> String {
        let place = self.name.as_deref().unwrap_or(requested);
        let description = self
            .weather
            .first()
            .and_then(|c| c.description.as_deref())
            .unwrap_or("unknown");
        let main = self.main.as_ref();
        let humidity = main
            .and_then(|m| m.humidity)
            .map(|h| format!("{h}%"))
            .unwrap_or_else(|| "N/A".into());
        let wind = self
            .wind
            .as_ref()
            .and_then(|w| w.speed)
            .map(|s| format!("{s:.1} m/s"))
            .unwrap_or_else(|| "N/A".into());

        format!(
            "🐕 **Weather in {place}**\n\
             Conditions: {description}\n\
             Temperature: {temp}\n\
             High / low: {high} / {low}\n\
             Humidity: {humidity}\n\
             Wind: {wind}\n\
             Have a nice walk, woof! 🐾",
            temp = celsius(main.and_then(|m| m.temp)),
            high = celsius(main.and_then(|m| m.temp_max)),
            low = celsius(main.and_then(|m| m.temp_min)),
        )
    }
}

#[async_trait]
impl Command for WeatherCommand {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Current weather for a city (default city when omitted)"
    }

    async fn execute(&self, ctx: &CommandContext, args: &str) -> Result<String, CommandError> {
        let config = ctx.state.config();
        let Some(api_key) = config.weather.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok("Sorry, woof... I don't have a weather API key, so I can't check the weather.".into());
        };

        let city = match args.trim() {
            "" => config.weather.default_city.trim(),
            city => city,
        };
        if city.is_empty() {
            return Ok(format!(
                "Which city should I check? Try `{}weather <city>`, woof!",
                config.command_prefix
            ));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!(city, error = %e, "Weather request failed");
                CommandError::ExecutionFailed {
                    command: "weather".into(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(city, status = status.as_u16(), "Weather API returned an error");
            return Ok(match status.as_u16() {
                401 => "I couldn't get the weather... the API key seems to be invalid, woof.".into(),
                404 => format!("I couldn't find `{city}`, woof... try the English name."),
                code => format!("Something went wrong while fetching the weather (code: {code})."),
            });
        }

        let report: WeatherReport = response.json().await.map_err(|e| {
            error!(city, error = %e, "Weather API returned an unreadable body");
            CommandError::ExecutionFailed {
                command: "weather".into(),
                reason: e.to_string(),
            }
        })?;
        Ok(report.render(city))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandRegistry;
    use crate::testing::{FixedBackend, state_with, test_config};
    use aidog_core::message::Identity;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/data/2.5/weather")
    }

    async fn fake_owm(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<serde_json::Value>) {
        if params.get("appid").map(String::as_str) != Some("good-key") {
            return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"cod": 401})));
        }
        assert_eq!(params.get("units").map(String::as_str), Some("metric"));
        match params.get("q").map(String::as_str) {
            Some("Tokyo") => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "name": "Tokyo",
                    "weather": [{"description": "clear sky", "icon": "01d"}],
                    "main": {"temp": 21.44, "temp_min": 18.0, "temp_max": 24.5, "humidity": 40},
                    "wind": {"speed": 3.6}
                })),
            ),
            _ => (StatusCode::NOT_FOUND, Json(serde_json::json!({"cod": "404"}))),
        }
    }

    fn context(api_key: Option<&str>) -> CommandContext {
        let mut config = test_config();
        config.weather.api_key = api_key.map(String::from);
        CommandContext {
            state: state_with(config, FixedBackend::new("woof")),
            invoker: Identity(1),
            catalog: CommandRegistry::new().catalog(),
        }
    }

    #[tokio::test]
    async fn default_city_is_used_without_args() {
        let endpoint = serve(Router::new().route("/data/2.5/weather", get(fake_owm))).await;
        let text = WeatherCommand::with_endpoint(endpoint)
            .execute(&context(Some("good-key")), "")
            .await
            .unwrap();
        assert!(text.contains("Weather in Tokyo"));
        assert!(text.contains("Temperature: 21.4°C"));
        assert!(text.contains("High / low: 24.5°C / 18.0°C"));
        assert!(text.contains("Wind: 3.6 m/s"));
    }

    #[tokio::test]
    async fn unknown_city_and_bad_key_have_their_own_messages() {
        let endpoint = serve(Router::new().route("/data/2.5/weather", get(fake_owm))).await;
        let command = WeatherCommand::with_endpoint(endpoint);

        let missing = command.execute(&context(Some("good-key")), "Atlantis").await.unwrap();
        assert!(missing.contains("couldn't find `Atlantis`"));

        let bad_key = command.execute(&context(Some("bad-key")), "Tokyo").await.unwrap();
        assert!(bad_key.contains("API key seems to be invalid"));
    }

    #[tokio::test]
    async fn disabled_without_api_key() {
        let text = WeatherCommand::with_endpoint("http://127.0.0.1:1/")
            .execute(&context(None), "Tokyo")
            .await
            .unwrap();
        assert!(text.contains("don't have a weather API key"));
    }

    #[tokio::test]
    async fn unreachable_service_is_an_execution_failure() {
        let err = WeatherCommand::with_endpoint("http://127.0.0.1:1/weather")
            .execute(&context(Some("good-key")), "Tokyo")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::ExecutionFailed { .. }));
    }
}

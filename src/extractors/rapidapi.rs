use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::TranscriptStrategy;
use crate::transcribe::{SourceStrategy, TranscriptResult};
use crate::Result;

/// Paid secondary transcript provider (RapidAPI), used as the last resort
pub struct SecondaryProviderStrategy {
    client: Client,
    api_key: String,
    host: String,
    base_url: String,
}

impl SecondaryProviderStrategy {
    pub fn new(client: Client, api_key: String, host: String) -> Self {
        let base_url = format!("https://{}", host);
        Self {
            client,
            api_key,
            host,
            base_url,
        }
    }

    /// Send requests somewhere other than `https://{host}`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, video_id: &str) -> Result<Option<Value>> {
        let url = format!("{}/api/transcript", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("videoId", video_id)])
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(
                video_id,
                status = %response.status(),
                "Secondary provider returned an error"
            );
            return Ok(None);
        }

        Ok(Some(response.json::<Value>().await?))
    }
}

#[async_trait]
impl TranscriptStrategy for SecondaryProviderStrategy {
    async fn attempt(&self, video_id: &str, language: &str) -> Result<Option<TranscriptResult>> {
        let Some(payload) = self.request(video_id).await? else {
            return Ok(None);
        };

        Ok(parse_secondary_payload(&payload).map(|text| TranscriptResult {
            text,
            resolved_language: language.to_string(),
            source: SourceStrategy::Secondary,
        }))
    }

    fn name(&self) -> &'static str {
        "rapidapi"
    }
}

/// Extract transcript text from a provider response.
///
/// Accepts a `transcript` array of segments, a top-level array of segments, or a flat
/// `text` string. Returns `None` when the result would be blank.
pub fn parse_secondary_payload(payload: &Value) -> Option<String> {
    let segments = payload
        .get("transcript")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array());

    if let Some(segments) = segments.filter(|s| !s.is_empty()) {
        let joined = segments
            .iter()
            .map(|segment| segment.get("text").and_then(Value::as_str).unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    payload
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extractors::{testing, TranscriptFetcher};
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    const HOST: &str = "provider.test";
    const KEY: &str = "secret-key";

    /// Provider that only answers when both RapidAPI headers are present
    async fn provider_site() -> String {
        testing::spawn(|_| {
            Router::new().route(
                "/api/transcript",
                get(
                    |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                        let header = |name: &str| {
                            headers
                                .get(name)
                                .and_then(|value| value.to_str().ok())
                                .map(str::to_string)
                        };
                        if header("x-rapidapi-key").as_deref() != Some(KEY)
                            || header("x-rapidapi-host").as_deref() != Some(HOST)
                        {
                            return (StatusCode::FORBIDDEN, Json(json!({"message": "bad key"})));
                        }

                        match query.get("videoId").map(String::as_str) {
                            Some("known") => (
                                StatusCode::OK,
                                Json(json!({"transcript": [{"text": "from"}, {"text": "provider"}]})),
                            ),
                            _ => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))),
                        }
                    },
                ),
            )
        })
        .await
    }

    fn strategy(base: &str, key: &str) -> SecondaryProviderStrategy {
        SecondaryProviderStrategy::new(Client::new(), key.to_string(), HOST.to_string())
            .with_base_url(base)
    }

    #[tokio::test]
    async fn test_attempt_sends_provider_headers() {
        let base = provider_site().await;

        let result = strategy(&base, KEY).attempt("known", "de").await.unwrap().unwrap();
        assert_eq!(result.text, "from provider");
        assert_eq!(result.resolved_language, "de");
        assert_eq!(result.source, SourceStrategy::Secondary);
    }

    #[tokio::test]
    async fn test_error_status_is_a_miss() {
        let base = provider_site().await;

        assert!(strategy(&base, KEY).attempt("unknown", "en").await.unwrap().is_none());
        assert!(strategy(&base, "wrong").attempt("known", "en").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chain_reaches_configured_provider() {
        let base = provider_site().await;
        let mut config = Config::default();
        // No watch page on this site, so both caption-track strategies fail
        config.youtube.watch_base_url = base.clone();
        config.secondary.api_key = Some(KEY.to_string());
        config.secondary.host = HOST.to_string();
        config.secondary.base_url = Some(base);

        let fetcher = TranscriptFetcher::from_config(&config, Client::new());
        let result = fetcher.fetch("known", "en").await.unwrap();
        assert_eq!(result.source, SourceStrategy::Secondary);
        assert_eq!(result.text, "from provider");
    }

    #[test]
    fn test_default_base_url_uses_host() {
        let strategy = SecondaryProviderStrategy::new(Client::new(), KEY.into(), HOST.into());
        assert_eq!(strategy.base_url, "https://provider.test");
    }

    #[test]
    fn test_transcript_array() {
        let payload = json!({
            "transcript": [{"text": "hello", "start": 0.0}, {"text": "there"}, {"start": 3.0}]
        });
        assert_eq!(parse_secondary_payload(&payload).as_deref(), Some("hello there"));
    }

    #[test]
    fn test_top_level_array() {
        let payload = json!([{"text": " one"}, {"text": "two "}]);
        assert_eq!(parse_secondary_payload(&payload).as_deref(), Some("one two"));
    }

    #[test]
    fn test_flat_text() {
        let payload = json!({"text": "  full text  "});
        assert_eq!(parse_secondary_payload(&payload).as_deref(), Some("full text"));
    }

    #[test]
    fn test_blank_results_are_none() {
        assert_eq!(parse_secondary_payload(&json!({"transcript": [{"text": " "}]})), None);
        assert_eq!(parse_secondary_payload(&json!({"text": ""})), None);
        assert_eq!(parse_secondary_payload(&json!({"error": "not found"})), None);
        assert_eq!(parse_secondary_payload(&json!([])), None);
    }
}

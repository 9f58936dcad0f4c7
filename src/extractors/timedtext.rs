use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use super::TranscriptStrategy;
use crate::transcribe::{SourceStrategy, TranscriptResult};
use crate::utils::{base_language, vtt_to_plain};
use crate::Result;

static ASR_NOT_SUPPORTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)kind="asr" not supported"#).expect("valid regex"));

/// Raw caption file returned by the timed-text endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionFile {
    /// WebVTT markup
    pub vtt: String,

    /// Language variant that produced the file
    pub language: String,
}

/// One URL variant to try against the timed-text endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackVariant {
    pub language: String,
    pub auto_generated: bool,
}

/// Fetches WebVTT caption files straight from the timed-text endpoint
pub struct TimedTextStrategy {
    client: Client,
    watch_base_url: String,
}

impl TimedTextStrategy {
    pub fn new(client: Client, watch_base_url: String) -> Self {
        Self {
            client,
            watch_base_url,
        }
    }

    fn variant_url(&self, video_id: &str, variant: &TrackVariant) -> String {
        let mut url = format!(
            "{}/api/timedtext?fmt=vtt&lang={}",
            self.watch_base_url.trim_end_matches('/'),
            urlencoding::encode(&variant.language)
        );
        if variant.auto_generated {
            url.push_str("&kind=asr");
        }
        url.push_str("&v=");
        url.push_str(&urlencoding::encode(video_id));
        url
    }

    /// Try each language/kind variant in order and return the first valid caption file
    pub async fn fetch_vtt(&self, video_id: &str, language: &str) -> Result<Option<CaptionFile>> {
        for variant in track_variants(language) {
            let url = self.variant_url(video_id, &variant);
            tracing::debug!("Trying timed-text variant: {}", url);

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(error = %e, "Timed-text request failed");
                    continue;
                }
            };

            if !response.status().is_success() {
                tracing::debug!(status = %response.status(), "Timed-text variant unavailable");
                continue;
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, "Timed-text body read failed");
                    continue;
                }
            };
            if is_valid_caption_body(&body) {
                return Ok(Some(CaptionFile {
                    vtt: body,
                    language: variant.language,
                }));
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl TranscriptStrategy for TimedTextStrategy {
    async fn attempt(&self, video_id: &str, language: &str) -> Result<Option<TranscriptResult>> {
        let Some(file) = self.fetch_vtt(video_id, language).await? else {
            return Ok(None);
        };

        let text = vtt_to_plain(&file.vtt);
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(TranscriptResult {
            text,
            resolved_language: file.language,
            source: SourceStrategy::Timedtext,
        }))
    }

    fn name(&self) -> &'static str {
        "timedtext"
    }
}

/// `{language, base language} x {manual, auto-generated}`, without duplicate languages
pub fn track_variants(language: &str) -> Vec<TrackVariant> {
    let mut languages = vec![language.to_string()];
    let base = base_language(language);
    if !base.is_empty() && base != language {
        languages.push(base.to_string());
    }

    languages
        .into_iter()
        .filter(|lang| !lang.is_empty())
        .flat_map(|lang| {
            [false, true].map(|auto_generated| TrackVariant {
                language: lang.clone(),
                auto_generated,
            })
        })
        .collect()
}

/// A usable body carries the WebVTT header and is not the "kind not supported" error
pub fn is_valid_caption_body(body: &str) -> bool {
    !body.is_empty() && body.contains("WEBVTT") && !ASR_NOT_SUPPORTED.is_match(body)
}

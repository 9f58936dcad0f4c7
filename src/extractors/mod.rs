use async_trait::async_trait;

pub mod rapidapi;
pub mod timedtext;
pub mod youtube;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::Config;
use crate::transcribe::{TranscriptResult, TranscriptSegment};
use crate::Result;

/// One way of obtaining a transcript for a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Try to produce a transcript.
    ///
    /// `Ok(None)` and `Err` both mean "this strategy produced nothing"; the fetcher moves on.
    async fn attempt(&self, video_id: &str, language: &str) -> Result<Option<TranscriptResult>>;

    /// Short name used in logs and listings
    fn name(&self) -> &'static str;
}

/// Ordered fallback chain of transcript strategies
pub struct TranscriptFetcher {
    strategies: Vec<Box<dyn TranscriptStrategy>>,
}

impl TranscriptFetcher {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Build the default chain: free strategies first, the paid provider last and only
    /// when a credential is configured
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let mut fetcher = Self::new();
        let watch_base = config.youtube.watch_base_url.clone();

        let (requested, any_track) =
            youtube::CaptionTrackStrategy::pair(client.clone(), watch_base.clone());
        fetcher.register(Box::new(requested));
        fetcher.register(Box::new(any_track));

        if config.transcripts.timedtext_fallback {
            fetcher.register(Box::new(timedtext::TimedTextStrategy::new(
                client.clone(),
                watch_base,
            )));
        }

        if let Some(key) = &config.secondary.api_key {
            let mut strategy = rapidapi::SecondaryProviderStrategy::new(
                client,
                key.clone(),
                config.secondary.host.clone(),
            );
            if let Some(base_url) = &config.secondary.base_url {
                strategy = strategy.with_base_url(base_url.clone());
            }
            fetcher.register(Box::new(strategy));
        }

        fetcher
    }

    /// Create a chain from explicit strategies, tried in the given order
    pub fn with_strategies(strategies: Vec<Box<dyn TranscriptStrategy>>) -> Self {
        Self { strategies }
    }

    /// Append a strategy to the end of the chain
    pub fn register(&mut self, strategy: Box<dyn TranscriptStrategy>) {
        self.strategies.push(strategy);
    }

    /// Names of the registered strategies in order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .map(|strategy| strategy.name())
            .collect()
    }

    /// Return the first transcript any strategy produces, or `None` when all of them miss
    pub async fn fetch(&self, video_id: &str, language: &str) -> Option<TranscriptResult> {
        for strategy in &self.strategies {
            match strategy.attempt(video_id, language).await {
                Ok(Some(result)) => {
                    tracing::debug!(
                        video_id,
                        strategy = strategy.name(),
                        language = %result.resolved_language,
                        "Transcript found"
                    );
                    return Some(result);
                }
                Ok(None) => {
                    tracing::debug!(video_id, strategy = strategy.name(), "Strategy produced nothing");
                }
                Err(e) => {
                    tracing::debug!(video_id, strategy = strategy.name(), error = %e, "Strategy failed");
                }
            }
        }

        tracing::info!(video_id, language, "No transcript found");
        None
    }
}

impl Default for TranscriptFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Join segment texts with single spaces; `None` when nothing but blanks remain
pub fn join_segments(segments: &[TranscriptSegment]) -> Option<String> {
    let texts: Vec<&str> = segments
        .iter()
        .map(|segment| segment.text.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join(" "))
    }
}

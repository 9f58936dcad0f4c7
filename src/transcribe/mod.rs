use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{CatalogResolver, YoutubeDataClient};
use crate::config::Config;
use crate::extractors::timedtext::TimedTextStrategy;
use crate::extractors::TranscriptFetcher;
use crate::utils::{build_http_client, canonical_url, strip_handle};
use crate::ServiceError;

pub mod bulk;

pub use bulk::BulkAggregator;

/// Message carried by single-video responses when every strategy missed
pub const NOT_FOUND_MESSAGE: &str = "No transcript found for requested language";

/// Individual caption segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset in seconds
    pub start: f64,

    /// Duration in seconds, when the source provides one
    pub duration: Option<f64>,

    /// Caption text
    pub text: String,
}

/// Which retrieval strategy produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStrategy {
    /// Caption track listed on the watch page
    Primary,
    /// Raw timed-text caption file
    Timedtext,
    /// Paid secondary provider
    Secondary,
}

impl std::fmt::Display for SourceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStrategy::Primary => write!(f, "primary"),
            SourceStrategy::Timedtext => write!(f, "timedtext"),
            SourceStrategy::Secondary => write!(f, "secondary"),
        }
    }
}

/// Transcript text plus where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResult {
    /// Segment texts joined with single spaces
    pub text: String,

    /// Language that produced the text (`auto` for the default track)
    pub resolved_language: String,

    /// Strategy that produced the text
    pub source: SourceStrategy,
}

/// Lightweight video metadata from the listing API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMeta {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub url: String,
}

impl VideoMeta {
    /// Metadata for an id the listing API did not describe
    pub fn placeholder(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: String::new(),
            channel: String::new(),
            url: canonical_url(video_id),
        }
    }
}

/// One video of a bulk response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItem {
    #[serde(flatten)]
    pub meta: VideoMeta,

    /// Resolved language on success, the requested language otherwise
    pub language: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    pub transcript_found: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceStrategy>,
}

impl BulkItem {
    pub fn found(meta: VideoMeta, result: TranscriptResult) -> Self {
        Self {
            meta,
            language: result.resolved_language,
            text: Some(result.text),
            transcript_found: true,
            source: Some(result.source),
        }
    }

    pub fn missing(meta: VideoMeta, requested_language: &str) -> Self {
        Self {
            meta,
            language: requested_language.to_string(),
            text: None,
            transcript_found: false,
            source: None,
        }
    }
}

/// Ordered per-video results of a bulk request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub count: usize,
    pub items: Vec<BulkItem>,
}

impl BulkResult {
    pub fn new(items: Vec<BulkItem>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }

    /// Number of items whose transcript was found
    pub fn found_count(&self) -> usize {
        self.items.iter().filter(|item| item.transcript_found).count()
    }
}

/// Single-video response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub video_id: String,
    pub language: String,
    pub text: String,
    pub url: String,
    pub transcript_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Single-video response body for `mode=vtt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionMarkupResponse {
    pub video_id: String,
    pub language: String,
    pub vtt: String,
    pub url: String,
    pub transcript_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Main transcript pipeline shared by the router and the CLI
pub struct TranscriptPipeline {
    config: Config,
    fetcher: Arc<TranscriptFetcher>,
    catalog: Option<CatalogResolver>,
    timedtext: TimedTextStrategy,
}

impl TranscriptPipeline {
    /// Create a pipeline with the default strategy chain and, when a YouTube API key is
    /// configured, a catalog resolver
    pub fn new(config: Config) -> crate::Result<Self> {
        let client = build_http_client(&config)?;
        let fetcher = TranscriptFetcher::from_config(&config, client.clone());

        let catalog = config.youtube.api_key.as_ref().map(|key| {
            CatalogResolver::new(Arc::new(YoutubeDataClient::new(
                client.clone(),
                config.youtube.data_api_base_url.clone(),
                key.clone(),
            )))
        });

        let timedtext = TimedTextStrategy::new(client, config.youtube.watch_base_url.clone());

        Ok(Self::from_parts(config, fetcher, catalog, timedtext))
    }

    /// Assemble a pipeline from explicit collaborators
    pub fn from_parts(
        config: Config,
        fetcher: TranscriptFetcher,
        catalog: Option<CatalogResolver>,
        timedtext: TimedTextStrategy,
    ) -> Self {
        Self {
            config,
            fetcher: Arc::new(fetcher),
            catalog,
            timedtext,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fetcher(&self) -> &TranscriptFetcher {
        &self.fetcher
    }

    /// Requested language, or the configured default
    pub fn language_or_default(&self, language: Option<&str>) -> String {
        language
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .unwrap_or(&self.config.transcripts.default_language)
            .to_string()
    }

    /// Clamp a requested video count to the configured ceiling
    pub fn clamp_max(&self, max: Option<usize>) -> usize {
        max.unwrap_or(self.config.transcripts.default_max_videos)
            .min(self.config.transcripts.max_videos_ceiling)
    }

    /// Fetch the transcript of one video. A miss is reported in the body, not as an error.
    pub async fn transcript(&self, video_id: &str, language: &str) -> TranscriptResponse {
        tracing::info!(video_id, language, "Fetching transcript");
        let url = canonical_url(video_id);

        match self.fetcher.fetch(video_id, language).await {
            Some(result) => TranscriptResponse {
                video_id: video_id.to_string(),
                language: result.resolved_language,
                text: result.text,
                url,
                transcript_found: true,
                source: Some(result.source),
                error: None,
            },
            None => TranscriptResponse {
                video_id: video_id.to_string(),
                language: language.to_string(),
                text: String::new(),
                url,
                transcript_found: false,
                source: None,
                error: Some(NOT_FOUND_MESSAGE.to_string()),
            },
        }
    }

    /// Fetch raw WebVTT caption markup for one video
    pub async fn caption_markup(&self, video_id: &str, language: &str) -> CaptionMarkupResponse {
        tracing::info!(video_id, language, "Fetching caption markup");
        let url = canonical_url(video_id);

        let file = match self.timedtext.fetch_vtt(video_id, language).await {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(video_id, error = %e, "Timed-text lookup failed");
                None
            }
        };

        match file {
            Some(file) => CaptionMarkupResponse {
                video_id: video_id.to_string(),
                language: file.language,
                vtt: file.vtt,
                url,
                transcript_found: true,
                error: None,
            },
            None => CaptionMarkupResponse {
                video_id: video_id.to_string(),
                language: language.to_string(),
                vtt: String::new(),
                url,
                transcript_found: false,
                error: Some(NOT_FOUND_MESSAGE.to_string()),
            },
        }
    }

    /// Transcripts for the latest uploads of a channel
    pub async fn bulk_channel(
        &self,
        handle: Option<&str>,
        language: &str,
        max: usize,
    ) -> Result<BulkResult, ServiceError> {
        let catalog = self.require_catalog()?;
        let handle = handle
            .map(str::trim)
            .filter(|h| !strip_handle(h).is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest("Missing ?handle".to_string()))?;

        tracing::info!(handle, language, max, "Bulk channel request");
        let uploads = catalog.resolve_channel_uploads(handle).await?;
        self.bulk_from_playlist(catalog, &uploads, language, max).await
    }

    /// Transcripts for the videos of a playlist
    pub async fn bulk_playlist(
        &self,
        playlist_id: Option<&str>,
        language: &str,
        max: usize,
    ) -> Result<BulkResult, ServiceError> {
        let catalog = self.require_catalog()?;
        let playlist_id = playlist_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest("Missing ?list (playlistId)".to_string()))?;

        tracing::info!(playlist_id, language, max, "Bulk playlist request");
        self.bulk_from_playlist(catalog, playlist_id, language, max).await
    }

    fn require_catalog(&self) -> Result<&CatalogResolver, ServiceError> {
        self.catalog
            .as_ref()
            .ok_or_else(|| ServiceError::MissingCredential("YOUTUBE_API_KEY".to_string()))
    }

    async fn bulk_from_playlist(
        &self,
        catalog: &CatalogResolver,
        playlist_id: &str,
        language: &str,
        max: usize,
    ) -> Result<BulkResult, ServiceError> {
        let ids = catalog.list_playlist_video_ids(playlist_id, max).await?;
        let metas = catalog.resolve_video_meta(&ids).await;

        let aggregator = BulkAggregator::new(
            Arc::clone(&self.fetcher),
            self.config.transcripts.max_concurrent_fetches,
        );
        let result = aggregator.aggregate(metas, language).await;

        tracing::info!(
            playlist_id,
            count = result.count,
            found = result.found_count(),
            "Bulk request complete"
        );
        Ok(result)
    }
}

//! Tubescribe - fetch YouTube transcripts for single videos, channels and playlists
//!
//! This library resolves a video's caption track through an ordered chain of retrieval
//! strategies, normalizes the captions to plain text, and aggregates results across the
//! videos of a channel or playlist while tolerating per-video failures.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod server;
pub mod transcribe;
pub mod utils;

pub use catalog::{CatalogResolver, DataApi, YoutubeDataClient};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{TranscriptFetcher, TranscriptStrategy};
pub use transcribe::{
    BulkItem, BulkResult, SourceStrategy, TranscriptPipeline, TranscriptResult, VideoMeta,
};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors that abort a request, as opposed to per-video misses which are data
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Missing {0} env")]
    MissingCredential(String),

    #[error("{0}")]
    Upstream(String),
}

impl ServiceError {
    /// HTTP status code the router answers with
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InvalidRequest(_) | ServiceError::MissingCredential(_) => 400,
            ServiceError::Upstream(_) => 500,
        }
    }
}

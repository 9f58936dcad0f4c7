use futures_util::stream::{self, StreamExt};
use std::sync::Arc;

use super::{BulkItem, BulkResult, VideoMeta};
use crate::extractors::TranscriptFetcher;

/// Runs the transcript fetcher over a resolved video list
pub struct BulkAggregator {
    fetcher: Arc<TranscriptFetcher>,
    concurrency: usize,
}

impl BulkAggregator {
    /// `concurrency` of 1 processes videos strictly one after another
    pub fn new(fetcher: Arc<TranscriptFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Produce one item per video, in input order.
    ///
    /// A missing transcript becomes an item with `transcriptFound: false` carrying the
    /// requested language; it never aborts the batch.
    pub async fn aggregate(&self, metas: Vec<VideoMeta>, language: &str) -> BulkResult {
        let total = metas.len();

        // `buffered` yields in submission order regardless of completion order
        let items: Vec<BulkItem> = stream::iter(metas.into_iter().enumerate())
            .map(|(index, meta)| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    tracing::debug!(index, total, video_id = %meta.video_id, "Fetching bulk item");
                    match fetcher.fetch(&meta.video_id, language).await {
                        Some(result) => BulkItem::found(meta, result),
                        None => BulkItem::missing(meta, language),
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        BulkResult::new(items)
    }
}

//! Catalog resolution against the YouTube Data API v3.
//!
//! Resolves a channel handle to its uploads playlist, pages through playlist items, and
//! looks up snippet metadata for the resulting video ids.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::transcribe::VideoMeta;
use crate::utils::canonical_url;
use crate::ServiceError;

/// Page-size ceiling of the listing endpoints
pub const PAGE_SIZE: usize = 50;

/// Minimal read access to the Data API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataApi: Send + Sync {
    /// GET `<base>/<resource>` with the given query parameters and return the JSON body
    async fn get(&self, resource: &str, params: Vec<(&'static str, String)>) -> Result<Value, ServiceError>;
}

/// Data API client over reqwest; appends the API key to every call
pub struct YoutubeDataClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YoutubeDataClient {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl DataApi for YoutubeDataClient {
    async fn get(&self, resource: &str, params: Vec<(&'static str, String)>) -> Result<Value, ServiceError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), resource);
        tracing::debug!(resource, "Data API request");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("{} list failed: {}", resource, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Upstream(format!(
                "{} list failed: {}",
                resource,
                status.as_u16()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::Upstream(format!("{} list returned invalid JSON: {}", resource, e)))
    }
}

/// Resolves channels and playlists to ordered video lists
#[derive(Clone)]
pub struct CatalogResolver {
    api: Arc<dyn DataApi>,
}

impl CatalogResolver {
    pub fn new(api: Arc<dyn DataApi>) -> Self {
        Self { api }
    }

    /// Uploads playlist id of the channel with the given handle
    pub async fn resolve_channel_uploads(&self, handle: &str) -> Result<String, ServiceError> {
        let handle = crate::utils::strip_handle(handle);
        let body = self
            .api
            .get(
                "channels",
                vec![
                    ("part", "contentDetails".to_string()),
                    ("forHandle", handle.to_string()),
                ],
            )
            .await?;

        body.pointer("/items/0/contentDetails/relatedPlaylists/uploads")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Upstream("uploads playlist not found for handle".to_string()))
    }

    /// Up to `max` video ids of a playlist, in playlist order.
    ///
    /// Any failed page fails the whole call.
    pub async fn list_playlist_video_ids(
        &self,
        playlist_id: &str,
        max: usize,
    ) -> Result<Vec<String>, ServiceError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < max {
            let page_size = PAGE_SIZE.min(max - ids.len());
            let mut params = vec![
                ("part", "contentDetails".to_string()),
                ("playlistId", playlist_id.to_string()),
                ("maxResults", page_size.to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let body = self.api.get("playlistItems", params).await?;

            let page_ids = body
                .get("items")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|item| item.pointer("/contentDetails/videoId").and_then(Value::as_str))
                .map(str::to_string);
            ids.extend(page_ids);

            page_token = body
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);

            if page_token.is_none() {
                break;
            }
        }

        ids.truncate(max);
        tracing::debug!(playlist_id, count = ids.len(), "Playlist resolved");
        Ok(ids)
    }

    /// Metadata for each id, in input order.
    ///
    /// Never fails and never drops an id: ids the provider does not describe, including
    /// those of a failed batch, come back as placeholders.
    pub async fn resolve_video_meta(&self, ids: &[String]) -> Vec<VideoMeta> {
        let mut found: HashMap<String, VideoMeta> = HashMap::new();

        for batch in ids.chunks(PAGE_SIZE) {
            let params = vec![("part", "snippet".to_string()), ("id", batch.join(","))];

            match self.api.get("videos", params).await {
                Ok(body) => {
                    for item in body.get("items").and_then(Value::as_array).into_iter().flatten() {
                        if let Some(meta) = parse_video_item(item) {
                            found.insert(meta.video_id.clone(), meta);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, batch = batch.len(), "Video metadata lookup failed");
                }
            }
        }

        ids.iter()
            .map(|id| found.get(id).cloned().unwrap_or_else(|| VideoMeta::placeholder(id)))
            .collect()
    }
}

fn parse_video_item(item: &Value) -> Option<VideoMeta> {
    let id = item.get("id").and_then(Value::as_str)?;
    let text = |pointer: &str| {
        item.pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Some(VideoMeta {
        video_id: id.to_string(),
        title: text("/snippet/title"),
        channel: text("/snippet/channelTitle"),
        url: canonical_url(id),
    })
}

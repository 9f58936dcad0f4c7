use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{join_segments, TranscriptStrategy};
use crate::transcribe::{SourceStrategy, TranscriptResult, TranscriptSegment};
use crate::utils::decode_entities;
use crate::Result;

const CAPTION_TRACKS_MARKER: &str = "\"captionTracks\":";

static TEXT_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<text start="([^"]*)"(?: dur="([^"]*)")?[^>]*>(.*?)</text>"#)
        .expect("valid regex")
});

static INLINE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Listings waiting to be picked up by `caption-track-any`
const HANDOFF_LIMIT: usize = 256;

type TrackHandoff = Arc<Mutex<HashMap<String, Vec<CaptionTrack>>>>;

/// A caption track advertised by the watch page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Auto-generated (speech recognition) track
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Which caption track the strategy asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackSelection {
    Requested,
    Any,
}

/// Primary strategy: reads the caption tracks listed on a video's watch page
pub struct CaptionTrackStrategy {
    client: Client,
    watch_base_url: String,
    selection: TrackSelection,
    handoff: Option<TrackHandoff>,
}

impl CaptionTrackStrategy {
    /// Track in the preferred language only
    pub fn requested(client: Client, watch_base_url: String) -> Self {
        Self {
            client,
            watch_base_url,
            selection: TrackSelection::Requested,
            handoff: None,
        }
    }

    /// Whatever track the video offers, reported as language `auto`
    pub fn any_track(client: Client, watch_base_url: String) -> Self {
        Self {
            client,
            watch_base_url,
            selection: TrackSelection::Any,
            handoff: None,
        }
    }

    /// `requested` and `any_track` sharing one watch-page listing per video.
    ///
    /// When the requested strategy lists tracks but produces nothing, it hands the
    /// listing to the any-track strategy, which then skips its own page fetch.
    pub fn pair(client: Client, watch_base_url: String) -> (Self, Self) {
        let handoff = TrackHandoff::default();
        let requested = Self {
            handoff: Some(handoff.clone()),
            ..Self::requested(client.clone(), watch_base_url.clone())
        };
        let any_track = Self {
            handoff: Some(handoff),
            ..Self::any_track(client, watch_base_url)
        };
        (requested, any_track)
    }

    /// List caption tracks for a video
    pub async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>> {
        let url = format!(
            "{}/watch?v={}",
            self.watch_base_url.trim_end_matches('/'),
            urlencoding::encode(video_id)
        );
        tracing::debug!("Fetching watch page: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Watch page request failed: HTTP {}", response.status());
        }

        let html = response.text().await?;

        if html.contains("class=\"g-recaptcha\"") {
            anyhow::bail!("YouTube is rate limiting this client (captcha page)");
        }

        parse_caption_tracks(&html)
    }

    fn hand_off(&self, video_id: &str, tracks: Vec<CaptionTrack>) {
        if self.selection != TrackSelection::Requested {
            return;
        }
        if let Some(Ok(mut pending)) = self.handoff.as_ref().map(|h| h.lock()) {
            if pending.len() >= HANDOFF_LIMIT {
                pending.clear();
            }
            pending.insert(video_id.to_string(), tracks);
        }
    }

    fn take_handoff(&self, video_id: &str) -> Option<Vec<CaptionTrack>> {
        if self.selection != TrackSelection::Any {
            return None;
        }
        let mut pending = self.handoff.as_ref()?.lock().ok()?;
        pending.remove(video_id)
    }

    async fn tracks_for(&self, video_id: &str) -> Result<Vec<CaptionTrack>> {
        match self.take_handoff(video_id) {
            Some(tracks) => {
                tracing::debug!(video_id, "Reusing caption track listing");
                Ok(tracks)
            }
            None => self.list_tracks(video_id).await,
        }
    }

    async fn transcript_from(&self, tracks: &[CaptionTrack], language: &str) -> Result<Option<String>> {
        let track = match self.selection {
            TrackSelection::Requested => select_track(tracks, Some(language)),
            TrackSelection::Any => select_track(tracks, None),
        };
        let Some(track) = track else {
            tracing::debug!(language, available = tracks.len(), "No matching caption track");
            return Ok(None);
        };

        let segments = self.download_segments(track).await?;
        Ok(join_segments(&segments))
    }

    async fn download_segments(&self, track: &CaptionTrack) -> Result<Vec<TranscriptSegment>> {
        let response = self.client.get(&track.base_url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Caption track request failed: HTTP {}", response.status());
        }

        let xml = response.text().await?;
        Ok(parse_timed_text_xml(&xml))
    }
}

#[async_trait]
impl TranscriptStrategy for CaptionTrackStrategy {
    async fn attempt(&self, video_id: &str, language: &str) -> Result<Option<TranscriptResult>> {
        let tracks = self.tracks_for(video_id).await?;

        let outcome = self.transcript_from(&tracks, language).await;
        let text = match outcome {
            Ok(Some(text)) => text,
            other => {
                self.hand_off(video_id, tracks);
                return other.map(|_| None);
            }
        };

        let resolved_language = match self.selection {
            TrackSelection::Requested => language.to_string(),
            TrackSelection::Any => "auto".to_string(),
        };

        Ok(Some(TranscriptResult {
            text,
            resolved_language,
            source: SourceStrategy::Primary,
        }))
    }

    fn name(&self) -> &'static str {
        match self.selection {
            TrackSelection::Requested => "caption-track",
            TrackSelection::Any => "caption-track-any",
        }
    }
}

/// Pick a track: exact language match (case-insensitive) when a language is given,
/// otherwise any track. Manually authored tracks win over auto-generated ones.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: Option<&str>) -> Option<&'a CaptionTrack> {
    let candidates = move || {
        tracks.iter().filter(move |track| {
            language.map_or(true, |lang| track.language_code.eq_ignore_ascii_case(lang))
        })
    };

    candidates()
        .find(|track| !track.is_auto_generated())
        .or_else(|| candidates().next())
}

/// Extract the `captionTracks` array embedded in a watch page
pub fn parse_caption_tracks(html: &str) -> Result<Vec<CaptionTrack>> {
    let start = html
        .find(CAPTION_TRACKS_MARKER)
        .map(|idx| idx + CAPTION_TRACKS_MARKER.len())
        .context("No caption tracks on watch page")?;

    let array = extract_json_array(&html[start..]).context("Malformed captionTracks array")?;
    let tracks: Vec<CaptionTrack> =
        serde_json::from_str(array).context("Failed to parse captionTracks")?;

    Ok(tracks)
}

/// Return the balanced JSON array at the start of `input`, ignoring brackets inside strings
fn extract_json_array(input: &str) -> Option<&str> {
    let input = input.trim_start();
    if !input.starts_with('[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&input[..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a timed-text XML document into segments
pub fn parse_timed_text_xml(xml: &str) -> Vec<TranscriptSegment> {
    TEXT_ELEMENT
        .captures_iter(xml)
        .map(|caps| {
            let start = caps[1].parse::<f64>().unwrap_or(0.0);
            let duration = caps.get(2).and_then(|d| d.as_str().parse::<f64>().ok());
            // Caption payloads arrive double-escaped ("&amp;#39;")
            let decoded = decode_entities(&decode_entities(&caps[3]));
            let text = INLINE_TAG.replace_all(&decoded, "").to_string();

            TranscriptSegment {
                start,
                duration,
                text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extractors::{testing, TranscriptFetcher};
    use axum::{routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CAPTION_XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0" dur="1.5">Hallo</text><text start="1.5" dur="1">Welt</text></transcript>"#;

    /// Watch page offering a single German track served by the same site
    async fn german_only_site(watch_hits: Arc<AtomicUsize>) -> String {
        testing::spawn(move |base| {
            let page = format!(
                r#"<html><script>var ytInitialPlayerResponse = {{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{}/caption","languageCode":"de"}}]}}}}}};</script></html>"#,
                base
            );
            Router::new()
                .route(
                    "/watch",
                    get(move || {
                        let hits = watch_hits.clone();
                        let page = page.clone();
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            page
                        }
                    }),
                )
                .route("/caption", get(|| async { CAPTION_XML }))
        })
        .await
    }

    #[tokio::test]
    async fn test_requested_language_track() {
        let base = german_only_site(Arc::new(AtomicUsize::new(0))).await;
        let strategy = CaptionTrackStrategy::requested(Client::new(), base);

        let result = strategy.attempt("vid", "de").await.unwrap().unwrap();
        assert_eq!(result.text, "Hallo Welt");
        assert_eq!(result.resolved_language, "de");
        assert_eq!(result.source, SourceStrategy::Primary);
    }

    #[tokio::test]
    async fn test_any_track_reports_auto_language() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = german_only_site(hits.clone()).await;
        let (requested, any_track) = CaptionTrackStrategy::pair(Client::new(), base);

        assert!(requested.attempt("vid", "en").await.unwrap().is_none());

        let result = any_track.attempt("vid", "en").await.unwrap().unwrap();
        assert_eq!(result.text, "Hallo Welt");
        assert_eq!(result.resolved_language, "auto");
        assert_eq!(result.source, SourceStrategy::Primary);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unpaired_any_track_fetches_its_own_listing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = german_only_site(hits.clone()).await;
        let strategy = CaptionTrackStrategy::any_track(Client::new(), base);

        let result = strategy.attempt("vid", "en").await.unwrap().unwrap();
        assert_eq!(result.resolved_language, "auto");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetcher_falls_back_to_any_track() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = german_only_site(hits.clone()).await;
        let mut config = Config::default();
        config.youtube.watch_base_url = base;

        let fetcher = TranscriptFetcher::from_config(&config, Client::new());
        let result = fetcher.fetch("vid", "en").await.unwrap();

        assert_eq!(result.resolved_language, "auto");
        assert_eq!(result.text, "Hallo Welt");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watch_page_error_is_reported() {
        let base = testing::spawn(|_| Router::new()).await;
        let strategy = CaptionTrackStrategy::requested(Client::new(), base);
        assert!(strategy.attempt("vid", "en").await.is_err());
    }

    const WATCH_PAGE: &str = r#"<html><script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","name":{"simpleText":"English [auto]"},"languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=de","name":{"simpleText":"Deutsch ]["},"languageCode":"de"}],"audioTracks":[]}}};</script></html>"#;

    #[test]
    fn test_parse_caption_tracks() {
        let tracks = parse_caption_tracks(WATCH_PAGE).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "en");
        assert!(tracks[0].is_auto_generated());
        assert_eq!(
            tracks[1].base_url,
            "https://www.youtube.com/api/timedtext?v=abc&lang=de"
        );
        assert!(!tracks[1].is_auto_generated());
    }

    #[test]
    fn test_parse_caption_tracks_missing() {
        assert!(parse_caption_tracks("<html>no captions here</html>").is_err());
    }

    #[test]
    fn test_select_track() {
        let tracks = parse_caption_tracks(WATCH_PAGE).unwrap();
        assert_eq!(select_track(&tracks, Some("DE")).unwrap().language_code, "de");
        assert!(select_track(&tracks, Some("fr")).is_none());
        assert_eq!(select_track(&tracks, Some("en")).unwrap().language_code, "en");
        assert_eq!(select_track(&tracks, None).unwrap().language_code, "de");
        assert!(select_track(&[], None).is_none());
    }

    #[test]
    fn test_select_track_prefers_manual() {
        let track = |kind: Option<&str>, url: &str| CaptionTrack {
            base_url: url.to_string(),
            language_code: "en".to_string(),
            kind: kind.map(str::to_string),
        };
        let tracks = vec![track(Some("asr"), "auto"), track(None, "manual")];

        assert_eq!(select_track(&tracks, Some("en")).unwrap().base_url, "manual");
        assert_eq!(select_track(&tracks[..1], Some("en")).unwrap().base_url, "auto");
    }

    #[test]
    fn test_parse_timed_text_xml() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.5" dur="1.2">Hello &amp;amp; welcome</text><text start="1.7" dur="2">it&amp;#39;s
here</text><text start="4">tail</text></transcript>"#;
        let segments = parse_timed_text_xml(xml);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start, 0.5);
        assert_eq!(segments[0].duration, Some(1.2));
        assert_eq!(segments[0].text, "Hello & welcome");
        assert_eq!(segments[1].text, "it's\nhere");
        assert_eq!(segments[2].duration, None);
    }

    #[test]
    fn test_parse_timed_text_strips_inline_markup() {
        let xml = r#"<transcript><text start="0" dur="1">&lt;font color=&quot;#E5E5E5&quot;&gt;loud&lt;/font&gt; noise</text></transcript>"#;
        let segments = parse_timed_text_xml(xml);
        assert_eq!(segments[0].text, "loud noise");
    }
}

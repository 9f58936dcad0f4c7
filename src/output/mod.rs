use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::transcribe::{BulkResult, CaptionMarkupResponse, TranscriptResponse};

/// Something the CLI can print as text or JSON
pub trait Render: Serialize {
    fn render_text(&self) -> String;
}

impl Render for TranscriptResponse {
    fn render_text(&self) -> String {
        if self.transcript_found {
            self.text.clone()
        } else {
            format!(
                "No transcript found for {} ({})",
                self.video_id, self.language
            )
        }
    }
}

impl Render for CaptionMarkupResponse {
    fn render_text(&self) -> String {
        if self.transcript_found {
            self.vtt.clone()
        } else {
            format!(
                "No caption file found for {} ({})",
                self.video_id, self.language
            )
        }
    }
}

impl Render for BulkResult {
    fn render_text(&self) -> String {
        let mut out = format!(
            "{} videos, {} transcripts found\n",
            self.count,
            self.found_count()
        );

        for item in &self.items {
            let title = if item.meta.title.is_empty() {
                item.meta.video_id.as_str()
            } else {
                item.meta.title.as_str()
            };
            out.push_str(&format!("\n## {}\n{}\n", title, item.meta.url));

            match &item.text {
                Some(text) if item.transcript_found => {
                    out.push_str(&format!("[{}] {}\n", item.language, text));
                }
                _ => out.push_str(&format!("(no transcript, tried {})\n", item.language)),
            }
        }

        out
    }
}

fn format_content<T: Render>(value: &T, format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => value.render_text(),
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
    };
    Ok(content)
}

/// Save rendered output to file
pub async fn save_to_file<T: Render>(value: &T, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = format_content(value, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print rendered output to console
pub fn print_to_console<T: Render>(value: &T, format: &OutputFormat) -> Result<()> {
    let content = format_content(value, format)?;
    println!("{}", content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::{BulkItem, SourceStrategy, TranscriptResult, VideoMeta};

    #[test]
    fn test_bulk_text_rendering() {
        let mut meta = VideoMeta::placeholder("v1");
        meta.title = "First".to_string();
        let result = BulkResult::new(vec![
            BulkItem::found(
                meta,
                TranscriptResult {
                    text: "hello world".to_string(),
                    resolved_language: "en".to_string(),
                    source: SourceStrategy::Primary,
                },
            ),
            BulkItem::missing(VideoMeta::placeholder("v2"), "en"),
        ]);

        let text = format_content(&result, &OutputFormat::Text).unwrap();
        assert!(text.starts_with("2 videos, 1 transcripts found"));
        assert!(text.contains("## First\nhttps://www.youtube.com/watch?v=v1\n[en] hello world"));
        assert!(text.contains("## v2\n"));
        assert!(text.contains("(no transcript, tried en)"));
    }

    #[test]
    fn test_json_matches_api_shape() {
        let response = TranscriptResponse {
            video_id: "abc".to_string(),
            language: "en".to_string(),
            text: "a b c".to_string(),
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            transcript_found: true,
            source: Some(SourceStrategy::Primary),
            error: None,
        };

        let json = format_content(&response, &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["videoId"], "abc");
        assert_eq!(value["transcriptFound"], true);
        assert!(value.get("error").is_none());
        assert_eq!(response.render_text(), "a b c");
    }
}

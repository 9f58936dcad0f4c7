use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use crate::config::Config;

/// Browser-like user agent; the watch page serves a reduced document to unknown clients
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid regex"));

/// Convert subtitle markup (WebVTT) into a single line of plain text.
///
/// Drops the `WEBVTT` header, numeric cue indices, timing lines and blank lines, joins
/// the remaining lines with a space and collapses whitespace runs.
pub fn vtt_to_plain(vtt: &str) -> String {
    let joined = vtt
        .replace('\r', "")
        .split('\n')
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !is_cue_index(line)
                && !line.contains("-->")
                && trimmed != "WEBVTT"
        })
        .collect::<Vec<_>>()
        .join(" ");

    WHITESPACE.replace_all(&joined, " ").trim().to_string()
}

fn is_cue_index(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}

/// Canonical watch URL for a video
pub fn canonical_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Strip surrounding whitespace and a single leading `@` from a channel handle
pub fn strip_handle(handle: &str) -> &str {
    let trimmed = handle.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

/// Language code without its region suffix (`en-US` -> `en`)
pub fn base_language(lang: &str) -> &str {
    lang.split('-').next().unwrap_or(lang)
}

/// Decode the XML/HTML entities that appear in caption payloads
pub fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });

    // `&amp;` last so "&amp;lt;" decodes to the literal "&lt;"
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Build the shared outbound HTTP client
pub fn build_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);

    if let Some(secs) = config.transcripts.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(builder.build()?)
}

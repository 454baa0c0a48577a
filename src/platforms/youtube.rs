#![forbid(unsafe_code)]

//! YouTube metadata via the oEmbed endpoint, the only interface the
//! platform leaves open to hosted servers. Direct media extraction is the
//! business of external tooling; this module resolves titles, authors and
//! thumbnails and synthesizes a minimal record when even oEmbed is blocked.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::BROWSER_USER_AGENT;
use crate::error::ApiError;

static URL_PATTERNS: LazyLock<[Regex; 6]> = LazyLock::new(|| {
    [
        Regex::new(r"^https?://(www\.)?youtube\.com/watch\?v=[\w-]+").unwrap(),
        Regex::new(r"^https?://(www\.)?youtube\.com/embed/[\w-]+").unwrap(),
        Regex::new(r"^https?://(www\.)?youtube\.com/v/[\w-]+").unwrap(),
        Regex::new(r"^https?://youtu\.be/[\w-]+").unwrap(),
        Regex::new(r"^https?://(www\.)?youtube\.com/shorts/[\w-]+").unwrap(),
        Regex::new(r"^https?://(m\.)?youtube\.com/watch\?v=[\w-]+").unwrap(),
    ]
});

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/|youtube\.com/shorts/)([^"&?/\s]{11})"#,
    )
    .unwrap()
});

pub fn is_valid_url(url: &str) -> bool {
    URL_PATTERNS.iter().any(|pattern| pattern.is_match(url))
}

pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

fn max_res_thumbnail(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}

/// Strips characters that break `Content-Disposition` headers and trims the
/// result to a sane length.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed: String = collapsed.chars().take(100).collect();
    if trimmed.is_empty() {
        "youtube_video".to_string()
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRef {
    pub name: String,
    pub channel: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatistics {
    pub views: u64,
    pub likes: u64,
}

/// Normalized video record. oEmbed carries no statistics, upload date or
/// category, so those fields hold the documented placeholder values.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct YouTubeVideo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: u64,
    pub thumbnail: String,
    pub author: ChannelRef,
    pub statistics: ViewStatistics,
    pub upload_date: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub method: String,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    author_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

pub struct YouTubeClient {
    http: reqwest::Client,
    oembed_base: String,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client, oembed_base: &str) -> Self {
        Self {
            http,
            oembed_base: oembed_base.to_string(),
        }
    }

    /// oEmbed first, minimal synthesized record when it fails. Always
    /// succeeds; the `method` field tells the caller which rung answered.
    pub async fn fetch_with_fallback(&self, video_id: &str) -> YouTubeVideo {
        match self.fetch_oembed(video_id).await {
            Ok(video) => video,
            Err(err) => {
                warn!(video_id, error = %err, "oEmbed failed, using basic fallback");
                basic_record(video_id)
            }
        }
    }

    pub async fn fetch_oembed(&self, video_id: &str) -> Result<YouTubeVideo, ApiError> {
        let endpoint = format!("{}/oembed", self.oembed_base);
        let response = self
            .http
            .get(&endpoint)
            .query(&[("url", watch_url(video_id).as_str()), ("format", "json")])
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::upstream(
                response.status().as_u16(),
                format!("oEmbed responded with status {}", response.status()),
            ));
        }

        let oembed: OEmbedResponse = response.json().await?;
        Ok(YouTubeVideo {
            id: video_id.to_string(),
            title: oembed.title,
            description: "Video information retrieved via YouTube oEmbed API".to_string(),
            duration: 0,
            thumbnail: oembed
                .thumbnail_url
                .unwrap_or_else(|| max_res_thumbnail(video_id)),
            author: ChannelRef {
                name: oembed.author_name.unwrap_or_else(|| "Unknown".to_string()),
                channel: oembed.author_url.unwrap_or_else(|| watch_url(video_id)),
            },
            statistics: ViewStatistics::default(),
            upload_date: "Unknown".to_string(),
            category: "Unknown".to_string(),
            width: oembed.width,
            height: oembed.height,
            method: "youtube-oembed".to_string(),
        })
    }
}

/// Last rung: nothing but the ID survived, so synthesize what the
/// thumbnail CDN and URL conventions guarantee.
fn basic_record(video_id: &str) -> YouTubeVideo {
    YouTubeVideo {
        id: video_id.to_string(),
        title: format!("YouTube Video {video_id}"),
        description: "Basic video information - YouTube API access limited on hosted servers"
            .to_string(),
        duration: 0,
        thumbnail: max_res_thumbnail(video_id),
        author: ChannelRef {
            name: "Unknown Author".to_string(),
            channel: watch_url(video_id),
        },
        statistics: ViewStatistics::default(),
        upload_date: "Unknown".to_string(),
        category: "Unknown".to_string(),
        width: None,
        height: None,
        method: "basic-fallback".to_string(),
    }
}

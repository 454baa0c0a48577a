#![forbid(unsafe_code)]

//! TikTok extraction via the public-but-undocumented resolver services.
//!
//! Primary rung is the tikwm.com JSON API (no-watermark and HD variants);
//! when it fails the tikmate-style endpoint is tried, which only
//! acknowledges the job, so its rung produces a minimal placeholder record.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{BROWSER_USER_AGENT, VideoAuthor, VideoStatistics};
use crate::error::ApiError;

static URL_PATTERNS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        Regex::new(r"^https?://(www\.)?tiktok\.com/@[\w.-]+/video/\d+").unwrap(),
        Regex::new(r"^https?://(www\.)?tiktok\.com/t/[\w-]+").unwrap(),
        Regex::new(r"^https?://vm\.tiktok\.com/[\w-]+").unwrap(),
        Regex::new(r"^https?://vt\.tiktok\.com/[\w-]+").unwrap(),
        Regex::new(r"^https?://m\.tiktok\.com/v/\d+").unwrap(),
    ]
});

pub fn is_valid_url(url: &str) -> bool {
    URL_PATTERNS.iter().any(|pattern| pattern.is_match(url))
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MusicTrack {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Normalized download payload, `camelCase` on the wire.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TikTokVideo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub id: String,
    pub title: String,
    pub author: VideoAuthor,
    pub statistics: VideoStatistics,
    pub create_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicTrack>,
    pub method: String,
}

/// The `/info` subset.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TikTokInfo {
    pub id: String,
    pub title: String,
    pub author: VideoAuthor,
    pub statistics: VideoStatistics,
    pub create_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct TikwmEnvelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<TikwmData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TikwmData {
    id: Option<String>,
    title: Option<String>,
    play: Option<String>,
    hdplay: Option<String>,
    duration: Option<u64>,
    create_time: Option<i64>,
    play_count: Option<u64>,
    digg_count: Option<u64>,
    share_count: Option<u64>,
    comment_count: Option<u64>,
    download_count: Option<u64>,
    author: Option<TikwmAuthor>,
    music_info: Option<TikwmMusic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TikwmAuthor {
    unique_id: Option<String>,
    nickname: Option<String>,
    avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TikwmMusic {
    title: Option<String>,
    play: Option<String>,
}

#[derive(Serialize)]
struct TikwmRequest<'a> {
    url: &'a str,
    hd: u8,
}

pub struct TikTokClient {
    http: reqwest::Client,
    tikwm_base: String,
    tikmate_base: String,
}

impl TikTokClient {
    pub fn new(http: reqwest::Client, tikwm_base: &str, tikmate_base: &str) -> Self {
        Self {
            http,
            tikwm_base: tikwm_base.to_string(),
            tikmate_base: tikmate_base.to_string(),
        }
    }

    /// Full resilience chain: tikwm, then the tikmate acknowledgement rung.
    pub async fn fetch_video(&self, url: &str) -> Result<TikTokVideo, ApiError> {
        match self.fetch_from_tikwm(url).await {
            Ok(data) => return Ok(map_video(data, "tikwm")),
            Err(err) => warn!(error = %err, "tikwm lookup failed, trying tikmate"),
        }

        match self.ping_tikmate(url).await {
            Ok(()) => Ok(placeholder_video(url)),
            Err(err) => {
                warn!(error = %err, "tikmate fallback failed");
                Err(ApiError::bad_gateway(
                    "All TikTok download methods failed. TikTok may be blocking requests.",
                ))
            }
        }
    }

    /// Info endpoint uses the primary service only; a placeholder record
    /// would carry nothing worth returning.
    pub async fn fetch_info(&self, url: &str) -> Result<TikTokInfo, ApiError> {
        let data = self.fetch_from_tikwm(url).await?;
        Ok(map_info(data))
    }

    async fn fetch_from_tikwm(&self, url: &str) -> Result<TikwmData, ApiError> {
        let endpoint = format!("{}/api/", self.tikwm_base);
        let response = self
            .http
            .post(&endpoint)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .json(&TikwmRequest { url, hd: 1 })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::upstream(
                response.status().as_u16(),
                format!("tikwm responded with status {}", response.status()),
            ));
        }

        let envelope: TikwmEnvelope = response.json().await?;
        if envelope.code != 0 {
            let msg = envelope
                .msg
                .unwrap_or_else(|| "Failed to fetch video data".to_string());
            return Err(ApiError::bad_gateway(format!("tikwm error: {msg}")));
        }
        envelope
            .data
            .ok_or_else(|| ApiError::bad_gateway("tikwm returned no video data"))
    }

    async fn ping_tikmate(&self, url: &str) -> Result<(), ApiError> {
        let endpoint = format!("{}/download", self.tikmate_base);
        let response = self
            .http
            .post(&endpoint)
            .form(&[("url", url)])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::upstream(
                response.status().as_u16(),
                format!("tikmate responded with status {}", response.status()),
            ))
        }
    }
}

fn map_video(data: TikwmData, method: &str) -> TikTokVideo {
    let statistics = map_statistics(&data);
    let author = map_author(data.author);
    let music = data.music_info.and_then(|music| {
        music.title.map(|title| MusicTrack {
            title,
            url: music.play,
        })
    });

    TikTokVideo {
        // HD link when the service produced one, the plain no-watermark
        // link otherwise.
        download_url: data.hdplay.or(data.play),
        id: data.id.unwrap_or_else(|| "N/A".to_string()),
        title: data.title.unwrap_or_else(|| "No title".to_string()),
        author,
        statistics,
        create_time: data
            .create_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        duration: data.duration,
        kind: "video".to_string(),
        music,
        method: method.to_string(),
    }
}

fn map_info(data: TikwmData) -> TikTokInfo {
    let statistics = map_statistics(&data);
    let author = map_author(data.author);
    TikTokInfo {
        id: data.id.unwrap_or_else(|| "N/A".to_string()),
        title: data.title.unwrap_or_else(|| "No title".to_string()),
        author,
        statistics,
        create_time: data
            .create_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        duration: data.duration,
        kind: "video".to_string(),
    }
}

fn map_statistics(data: &TikwmData) -> VideoStatistics {
    VideoStatistics {
        play_count: data.play_count.unwrap_or(0),
        like_count: data.digg_count.unwrap_or(0),
        share_count: data.share_count.unwrap_or(0),
        comment_count: data.comment_count.unwrap_or(0),
        download_count: data.download_count.unwrap_or(0),
    }
}

fn map_author(author: Option<TikwmAuthor>) -> VideoAuthor {
    let author = author.unwrap_or_default();
    VideoAuthor {
        username: author.unique_id.unwrap_or_else(|| "Unknown".to_string()),
        nickname: author.nickname.unwrap_or_else(|| "Unknown".to_string()),
        avatar: author.avatar,
    }
}

/// Minimal record for the acknowledgement-only rung: the service has the
/// job but hands back no direct link or metadata.
fn placeholder_video(url: &str) -> TikTokVideo {
    TikTokVideo {
        download_url: Some(url.to_string()),
        id: "N/A".to_string(),
        title: "TikTok Video (Processing)".to_string(),
        author: VideoAuthor {
            username: "Unknown".to_string(),
            nickname: "TikTok User".to_string(),
            avatar: None,
        },
        statistics: VideoStatistics::default(),
        create_time: chrono::Utc::now().timestamp(),
        duration: None,
        kind: "video".to_string(),
        music: None,
        method: "tikmate-fallback".to_string(),
    }
}

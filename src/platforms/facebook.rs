#![forbid(unsafe_code)]

//! Facebook videos via a hosted search API that does the scraping for us.
//! The service hands back HD/SD links plus whatever metadata it could pull;
//! this module validates the URL shapes, passes the call through and
//! reshapes the answer.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BROWSER_USER_AGENT;
use crate::error::ApiError;

static URL_PATTERNS: LazyLock<[Regex; 10]> = LazyLock::new(|| {
    [
        Regex::new(r"^https?://(www\.)?facebook\.com/.*/videos?/.*$").unwrap(),
        Regex::new(r"^https?://(www\.)?facebook\.com/watch\?v=.*$").unwrap(),
        Regex::new(r"^https?://(www\.)?facebook\.com/.*/posts/.*$").unwrap(),
        Regex::new(r"^https?://(www\.)?facebook\.com/video\.php\?v=.*$").unwrap(),
        Regex::new(r"^https?://(www\.)?facebook\.com/.*/videos/.*$").unwrap(),
        Regex::new(r"^https?://(m\.)?facebook\.com/.*/videos?/.*$").unwrap(),
        Regex::new(r"^https?://fb\.watch/.*$").unwrap(),
        Regex::new(r"^https?://(www\.)?facebook\.com/reel/.*$").unwrap(),
        Regex::new(r"^https?://(www\.)?facebook\.com/share/r/.*$").unwrap(),
        Regex::new(r"^https?://(www\.)?facebook\.com/share/v/.*$").unwrap(),
    ]
});

static ID_PATTERNS: LazyLock<[Regex; 7]> = LazyLock::new(|| {
    [
        Regex::new(r"/videos/(\d+)").unwrap(),
        Regex::new(r"[?&]v=(\d+)").unwrap(),
        Regex::new(r"/posts/(\d+)").unwrap(),
        Regex::new(r"fb\.watch/([^/?]+)").unwrap(),
        Regex::new(r"/reel/(\d+)").unwrap(),
        Regex::new(r"/share/r/([^/?]+)").unwrap(),
        Regex::new(r"/share/v/([^/?]+)").unwrap(),
    ]
});

pub fn is_valid_url(url: &str) -> bool {
    URL_PATTERNS.iter().any(|pattern| pattern.is_match(url))
}

/// Pattern cascade with a deterministic hash of the URL as the last resort,
/// so share links without a numeric ID still get a stable identifier.
pub fn extract_video_id(url: &str) -> String {
    for pattern in ID_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url) {
            if let Some(id) = caps.get(1) {
                return id.as_str().to_string();
            }
        }
    }
    url_hash_id(url)
}

/// 32-bit additive string hash (`h = h * 31 + byte`, wrapping), absolute
/// value rendered in decimal.
fn url_hash_id(url: &str) -> String {
    let mut hash: i32 = 0;
    for byte in url.bytes() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(byte as i32);
    }
    hash.unsigned_abs().to_string()
}

pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "Facebook_Video".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QualityFlags {
    pub hd: bool,
    pub sd: bool,
}

/// Normalized download payload, `camelCase` on the wire. Loosely typed
/// upstream extras (duration, views, author...) pass through untouched.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FacebookVideo {
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url_hd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url_sd: Option<String>,
    pub title: String,
    pub safe_title: String,
    pub url: String,
    pub qualities: QualityFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: String,
}

/// The `/info` subset: metadata only, no download links.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FacebookInfo {
    pub title: String,
    pub safe_title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    pub has_hd: bool,
    pub has_sd: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FbSearchResponse {
    title: Option<String>,
    hd: Option<String>,
    sd: Option<String>,
    thumbnail: Option<String>,
    duration: Option<Value>,
    views: Option<Value>,
    likes: Option<Value>,
    author: Option<Value>,
}

pub struct FacebookClient {
    http: reqwest::Client,
    api_base: String,
}

impl FacebookClient {
    pub fn new(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.to_string(),
        }
    }

    pub async fn fetch_video(&self, url: &str) -> Result<FacebookVideo, ApiError> {
        let data = self.search(url).await?;
        let download_url = data
            .hd
            .clone()
            .or_else(|| data.sd.clone())
            .ok_or_else(|| {
                ApiError::not_found("No video URL available: HD or SD video URL not found")
            })?;
        let title = data.title.unwrap_or_else(|| "Facebook Video".to_string());
        let safe_title = sanitize_title(&title);

        Ok(FacebookVideo {
            download_url,
            qualities: QualityFlags {
                hd: data.hd.is_some(),
                sd: data.sd.is_some(),
            },
            download_url_hd: data.hd,
            download_url_sd: data.sd,
            title,
            safe_title,
            url: url.to_string(),
            duration: data.duration,
            thumbnail: data.thumbnail,
            views: data.views,
            likes: data.likes,
            author: data.author,
            kind: "video".to_string(),
            platform: "facebook".to_string(),
        })
    }

    pub async fn fetch_info(&self, url: &str) -> Result<FacebookInfo, ApiError> {
        let data = self.search(url).await?;
        let title = data.title.unwrap_or_else(|| "Facebook Video".to_string());
        let safe_title = sanitize_title(&title);
        Ok(FacebookInfo {
            title,
            safe_title,
            url: url.to_string(),
            thumbnail: data.thumbnail,
            duration: data.duration,
            views: data.views,
            likes: data.likes,
            author: data.author,
            has_hd: data.hd.is_some(),
            has_sd: data.sd.is_some(),
            kind: "video".to_string(),
            platform: "facebook".to_string(),
        })
    }

    async fn search(&self, url: &str) -> Result<FbSearchResponse, ApiError> {
        let endpoint = format!("{}/fbvideo/search", self.api_base);
        let response = self
            .http
            .get(&endpoint)
            .query(&[("url", url)])
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let data: FbSearchResponse = response.json().await?;
            return Ok(data);
        }
        match status.as_u16() {
            503 => Err(ApiError::unavailable(
                "Facebook video service temporarily unavailable. Please try again later.",
            )),
            404 => Err(ApiError::not_found(
                "Video not found. The video may be private, deleted, or the URL is invalid.",
            )),
            code => Err(ApiError::upstream(
                code,
                format!("Facebook API responded with status {code}"),
            )),
        }
    }
}

#![forbid(unsafe_code)]

//! Platform modules wrapping the external services that do the actual
//! extraction work. Each submodule owns its URL validation, its upstream
//! client and its normalized response shapes; this module holds what they
//! share.

pub mod facebook;
pub mod instagram;
pub mod tiktok;
pub mod youtube;

use serde::Serialize;
use url::Url;

/// Browser user agent sent on every upstream request. The platforms serve
/// different markup (or nothing) to obvious bots.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    TikTok,
    YouTube,
    Instagram,
    Facebook,
}

impl Platform {
    /// Host-based detection backing the cross-platform download endpoint.
    /// The per-platform validators are stricter.
    pub fn detect(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        let host = url.host_str()?;
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));
        if matches("tiktok.com") {
            Some(Self::TikTok)
        } else if matches("youtube.com") || matches("youtu.be") {
            Some(Self::YouTube)
        } else if matches("instagram.com") {
            Some(Self::Instagram)
        } else if matches("facebook.com") || matches("fb.watch") {
            Some(Self::Facebook)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
        }
    }

    pub const ALL: [Platform; 4] = [
        Platform::TikTok,
        Platform::YouTube,
        Platform::Instagram,
        Platform::Facebook,
    ];
}

/// Author block shared by the TikTok payloads.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoAuthor {
    pub username: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Engagement counters, zeroed when the upstream omits them.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub play_count: u64,
    pub like_count: u64,
    pub share_count: u64,
    pub comment_count: u64,
    pub download_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_known_hosts() {
        assert_eq!(
            Platform::detect("https://vm.tiktok.com/ZMabc123/"),
            Some(Platform::TikTok)
        );
        assert_eq!(
            Platform::detect("https://youtu.be/dQw4w9WgXcQ"),
            Some(Platform::YouTube)
        );
        assert_eq!(
            Platform::detect("https://www.instagram.com/reel/CtjoC2BNsB2/"),
            Some(Platform::Instagram)
        );
        assert_eq!(
            Platform::detect("https://fb.watch/abc123/"),
            Some(Platform::Facebook)
        );
    }

    #[test]
    fn detect_rejects_lookalikes_and_junk() {
        assert_eq!(Platform::detect("https://nottiktok.com/video/1"), None);
        assert_eq!(Platform::detect("https://example.com/youtube.com"), None);
        assert_eq!(Platform::detect("not a url"), None);
    }
}

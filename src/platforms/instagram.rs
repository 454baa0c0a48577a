#![forbid(unsafe_code)]

//! Instagram media via the web GraphQL endpoint. No cookies or login; the
//! request mimics what instagram.com's own frontend sends, down to the
//! hardcoded `doc_id` and LSD token. Those constants will rot when the
//! frontend ships a new query — they are not reverse-engineered with any
//! rigor here, just copied from live traffic.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::BROWSER_USER_AGENT;
use crate::error::ApiError;

const GRAPHQL_DOC_ID: &str = "10015901848480474";
const LSD_TOKEN: &str = "AVqbxe3J_YA";
const IG_APP_ID: &str = "936619743392459";
const ASBD_ID: &str = "129477";

static SHORTCODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"instagram\.com/(?:[A-Za-z0-9_.]+/)?(?:p|reels|reel|stories)/([A-Za-z0-9_-]+)")
        .unwrap()
});

pub fn extract_shortcode(url: &str) -> Option<String> {
    SHORTCODE_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|code| code.as_str().to_string())
}

/// Post owner with the engagement counts flattened out of their edges.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MediaOwner {
    pub id: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub profile_pic_url: Option<String>,
    pub is_verified: Option<bool>,
    pub is_private: Option<bool>,
    pub follower_count: Option<u64>,
    pub following_count: Option<u64>,
    pub post_count: Option<u64>,
}

/// One child of a carousel post.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SidecarMedia {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    pub id: Option<String>,
    pub shortcode: Option<String>,
    pub dimensions: Option<Value>,
    pub display_url: Option<String>,
    pub display_resources: Option<Value>,
    pub is_video: Option<bool>,
    pub video_url: Option<String>,
    pub has_audio: Option<bool>,
    pub video_duration: Option<f64>,
    pub thumbnail_src: Option<String>,
}

/// Full normalized media record. Instagram responses keep their native
/// `snake_case` on the wire, unlike the other platforms.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InstagramMedia {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    pub shortcode: Option<String>,
    pub id: Option<String>,
    pub dimensions: Option<Value>,
    pub display_url: Option<String>,
    pub display_resources: Option<Value>,
    pub has_audio: Option<bool>,
    pub video_url: Option<String>,
    pub video_view_count: Option<u64>,
    pub video_play_count: Option<u64>,
    pub is_video: Option<bool>,
    pub caption: Option<String>,
    pub is_paid_partnership: Option<bool>,
    pub location: Option<Value>,
    pub owner: MediaOwner,
    pub product_type: Option<String>,
    pub video_duration: Option<f64>,
    pub thumbnail_src: Option<String>,
    pub thumbnail_resources: Option<Value>,
    pub clips_music_attribution_info: Option<Value>,
    pub sidecar: Option<Vec<SidecarMedia>>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub taken_at_timestamp: Option<i64>,
    pub accessibility_caption: Option<String>,
}

impl InstagramMedia {
    pub fn is_video(&self) -> bool {
        self.is_video.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<GraphqlData>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    #[serde(default)]
    xdt_shortcode_media: Option<ShortcodeMedia>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShortcodeMedia {
    #[serde(rename = "__typename")]
    typename: Option<String>,
    shortcode: Option<String>,
    id: Option<String>,
    dimensions: Option<Value>,
    display_url: Option<String>,
    display_resources: Option<Value>,
    has_audio: Option<bool>,
    video_url: Option<String>,
    video_view_count: Option<u64>,
    video_play_count: Option<u64>,
    is_video: Option<bool>,
    edge_media_to_caption: Option<Edges<CaptionNode>>,
    is_paid_partnership: Option<bool>,
    location: Option<Value>,
    owner: Option<GraphqlOwner>,
    product_type: Option<String>,
    video_duration: Option<f64>,
    thumbnail_src: Option<String>,
    thumbnail_resources: Option<Value>,
    clips_music_attribution_info: Option<Value>,
    edge_sidecar_to_children: Option<Edges<SidecarNode>>,
    edge_media_preview_like: Option<CountEdge>,
    edge_media_to_comment: Option<CountEdge>,
    taken_at_timestamp: Option<i64>,
    accessibility_caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Edges<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct CaptionNode {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CountEdge {
    count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GraphqlOwner {
    id: Option<String>,
    username: Option<String>,
    full_name: Option<String>,
    profile_pic_url: Option<String>,
    is_verified: Option<bool>,
    is_private: Option<bool>,
    edge_followed_by: Option<CountEdge>,
    edge_follow: Option<CountEdge>,
    edge_owner_to_timeline_media: Option<CountEdge>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SidecarNode {
    #[serde(rename = "__typename")]
    typename: Option<String>,
    id: Option<String>,
    shortcode: Option<String>,
    dimensions: Option<Value>,
    display_url: Option<String>,
    display_resources: Option<Value>,
    is_video: Option<bool>,
    video_url: Option<String>,
    has_audio: Option<bool>,
    video_duration: Option<f64>,
    thumbnail_src: Option<String>,
}

pub struct InstagramClient {
    http: reqwest::Client,
    api_base: String,
}

impl InstagramClient {
    pub fn new(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.to_string(),
        }
    }

    pub async fn fetch_media(&self, url: &str) -> Result<InstagramMedia, ApiError> {
        let shortcode = extract_shortcode(url)
            .ok_or_else(|| ApiError::bad_request("Invalid Instagram URL format"))?;
        debug!(shortcode, "resolving instagram post");

        let endpoint = format!("{}/api/graphql", self.api_base);
        let variables = serde_json::json!({ "shortcode": shortcode }).to_string();
        let response = self
            .http
            .post(&endpoint)
            .query(&[
                ("variables", variables.as_str()),
                ("doc_id", GRAPHQL_DOC_ID),
                ("lsd", LSD_TOKEN),
            ])
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .header("X-IG-App-ID", IG_APP_ID)
            .header("X-FB-LSD", LSD_TOKEN)
            .header("X-ASBD-ID", ASBD_ID)
            .header("Sec-Fetch-Site", "same-origin")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::upstream(
                response.status().as_u16(),
                format!(
                    "Instagram API responded with status: {}",
                    response.status().as_u16()
                ),
            ));
        }

        let envelope: GraphqlEnvelope = response.json().await?;
        let media = envelope
            .data
            .and_then(|data| data.xdt_shortcode_media)
            .ok_or_else(|| {
                ApiError::not_found("No media data found. Post may be private or deleted.")
            })?;
        Ok(map_media(media))
    }
}

fn map_media(media: ShortcodeMedia) -> InstagramMedia {
    let caption = media
        .edge_media_to_caption
        .and_then(|captions| captions.edges.into_iter().next())
        .and_then(|edge| edge.node.text);
    let owner = media.owner.map(map_owner).unwrap_or_default();
    let sidecar = media.edge_sidecar_to_children.map(|children| {
        children
            .edges
            .into_iter()
            .map(|edge| map_sidecar(edge.node))
            .collect()
    });

    InstagramMedia {
        typename: media.typename,
        shortcode: media.shortcode,
        id: media.id,
        dimensions: media.dimensions,
        display_url: media.display_url,
        display_resources: media.display_resources,
        has_audio: media.has_audio,
        video_url: media.video_url,
        video_view_count: media.video_view_count,
        video_play_count: media.video_play_count,
        is_video: media.is_video,
        caption,
        is_paid_partnership: media.is_paid_partnership,
        location: media.location,
        owner,
        product_type: media.product_type,
        video_duration: media.video_duration,
        thumbnail_src: media.thumbnail_src,
        thumbnail_resources: media.thumbnail_resources,
        clips_music_attribution_info: media.clips_music_attribution_info,
        sidecar,
        like_count: media.edge_media_preview_like.and_then(|edge| edge.count),
        comment_count: media.edge_media_to_comment.and_then(|edge| edge.count),
        taken_at_timestamp: media.taken_at_timestamp,
        accessibility_caption: media.accessibility_caption,
    }
}

fn map_owner(owner: GraphqlOwner) -> MediaOwner {
    MediaOwner {
        id: owner.id,
        username: owner.username,
        full_name: owner.full_name,
        profile_pic_url: owner.profile_pic_url,
        is_verified: owner.is_verified,
        is_private: owner.is_private,
        follower_count: owner.edge_followed_by.and_then(|edge| edge.count),
        following_count: owner.edge_follow.and_then(|edge| edge.count),
        post_count: owner
            .edge_owner_to_timeline_media
            .and_then(|edge| edge.count),
    }
}

fn map_sidecar(node: SidecarNode) -> SidecarMedia {
    SidecarMedia {
        typename: node.typename,
        id: node.id,
        shortcode: node.shortcode,
        dimensions: node.dimensions,
        display_url: node.display_url,
        display_resources: node.display_resources,
        is_video: node.is_video,
        video_url: node.video_url,
        has_audio: node.has_audio,
        video_duration: node.video_duration,
        thumbnail_src: node.thumbnail_src,
    }
}

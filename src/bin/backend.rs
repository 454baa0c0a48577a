#![forbid(unsafe_code)]

//! Axum backend aggregating the social video platforms behind one JSON API.
//!
//! Every endpoint is a thin shim: validate the submitted URL, call the
//! platform module (which talks to the external extraction services) and
//! reshape the answer into the envelope callers expect. The only state kept
//! between requests is the expiring short-link store behind the proxy
//! redirect and a handful of counters feeding the stats endpoints.

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use reelproxy_tools::config::{RunMode, Settings, SettingsOverrides, resolve_settings};
use reelproxy_tools::error::{ApiError, ApiResult};
use reelproxy_tools::platforms::{
    Platform,
    facebook::{self, FacebookClient},
    instagram::InstagramClient,
    tiktok::{self, TikTokClient},
    youtube::{self, YouTubeClient},
};
use reelproxy_tools::urlcache::UrlCache;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone, Default)]
struct BackendArgs {
    port: Option<u16>,
    host: Option<String>,
    production: bool,
    env_file: Option<PathBuf>,
}

impl BackendArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(std::env::args().skip(1))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = iter.into_iter();
        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--port=") {
                parsed.port = Some(parse_port_arg(value)?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--host=") {
                parsed.host = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env-file=") {
                parsed.env_file = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--port" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--port requires a value"))?;
                    parsed.port = Some(parse_port_arg(&value)?);
                }
                "--host" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--host requires a value"))?;
                    parsed.host = Some(value);
                }
                "--env-file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--env-file requires a value"))?;
                    parsed.env_file = Some(PathBuf::from(value));
                }
                "--production" => parsed.production = true,
                _ => return Err(anyhow!("unknown argument: {arg}")),
            }
        }
        Ok(parsed)
    }

    fn into_overrides(self) -> SettingsOverrides {
        SettingsOverrides {
            port: self.port,
            host: self.host,
            mode: self.production.then_some(RunMode::Production),
            env_path: self.env_file,
        }
    }
}

fn parse_port_arg(value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .context("expected a numeric port between 0 and 65535")
}

/// Per-service success counters for the stats endpoints.
#[derive(Default)]
struct ServiceCounters {
    tiktok: AtomicU64,
    youtube: AtomicU64,
    instagram: AtomicU64,
    facebook: AtomicU64,
}

impl ServiceCounters {
    fn bump(&self, platform: Platform) {
        self.counter(platform).fetch_add(1, Ordering::Relaxed);
    }

    fn total(&self, platform: Platform) -> u64 {
        self.counter(platform).load(Ordering::Relaxed)
    }

    fn counter(&self, platform: Platform) -> &AtomicU64 {
        match platform {
            Platform::TikTok => &self.tiktok,
            Platform::YouTube => &self.youtube,
            Platform::Instagram => &self.instagram,
            Platform::Facebook => &self.facebook,
        }
    }
}

/// Shared state injected into every handler.
#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    http: reqwest::Client,
    links: Arc<UrlCache>,
    counters: Arc<ServiceCounters>,
    started: Instant,
}

impl AppState {
    fn new(settings: Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("building HTTP client")?;
        let links = Arc::new(UrlCache::new(settings.proxy_link_ttl));
        Ok(Self {
            settings: Arc::new(settings),
            http,
            links,
            counters: Arc::new(ServiceCounters::default()),
            started: Instant::now(),
        })
    }

    fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    fn mode(&self) -> RunMode {
        self.settings.mode
    }

    fn tiktok_client(&self) -> TikTokClient {
        TikTokClient::new(
            self.http.clone(),
            &self.settings.upstreams.tikwm_api,
            &self.settings.upstreams.tikmate_api,
        )
    }

    fn youtube_client(&self) -> YouTubeClient {
        YouTubeClient::new(self.http.clone(), &self.settings.upstreams.youtube_oembed)
    }

    fn instagram_client(&self) -> InstagramClient {
        InstagramClient::new(self.http.clone(), &self.settings.upstreams.instagram_api)
    }

    fn facebook_client(&self) -> FacebookClient {
        FacebookClient::new(self.http.clone(), &self.settings.upstreams.facebook_api)
    }
}

#[derive(Debug, Deserialize)]
struct UrlBody {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = BackendArgs::parse()?;
    let settings = resolve_settings(args.into_overrides())?;
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", settings.host, settings.port))?;
    let mode = settings.mode;

    let state = AppState::new(settings)?;
    spawn_link_sweeper(state.links.clone());

    let app = router(state).layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!(%addr, environment = mode.as_str(), "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/health/{service}", get(service_health))
        .route(API_PREFIX, get(api_directory))
        // Cross-platform entry point: detect the platform from the URL host
        // and run that platform's chain.
        .route("/api/v1/download", post(auto_download))
        // TikTok. The versioned download aliases all run the same chain;
        // they survive because callers of the original service still hit
        // them.
        .route("/api/v1/tiktok/download", post(tiktok_download))
        .route("/api/v1/tiktok/download/v1", post(tiktok_download))
        .route("/api/v1/tiktok/download/v2", post(tiktok_download))
        .route("/api/v1/tiktok/info", post(tiktok_info))
        .route("/api/v1/tiktok/stats", get(tiktok_stats))
        .route("/api/v1/tiktok/methods", get(tiktok_methods))
        // YouTube.
        .route("/api/v1/youtube/download", post(youtube_download))
        .route("/api/v1/youtube/info", post(youtube_info))
        .route("/api/v1/youtube/stats", get(youtube_stats))
        .route("/api/v1/youtube/methods", get(youtube_methods))
        .route("/api/v1/youtube/proxy/{hash}", get(youtube_proxy))
        // Instagram keeps its query-parameter GET surface.
        .route("/api/v1/instagram/video", get(instagram_video))
        .route("/api/v1/instagram/media", get(instagram_media))
        .route("/api/v1/instagram/info", get(instagram_info))
        .route("/api/v1/instagram/methods", get(instagram_methods))
        // Facebook.
        .route("/api/v1/facebook/download", post(facebook_download))
        .route("/api/v1/facebook/download/auto", post(facebook_download))
        .route("/api/v1/facebook/info", post(facebook_info))
        .route("/api/v1/facebook/stats", get(facebook_stats))
        .route("/api/v1/facebook/methods", get(facebook_methods))
        .fallback(not_found)
        .with_state(state)
}

fn spawn_link_sweeper(links: Arc<UrlCache>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(links.sweep_interval());
        loop {
            ticker.tick().await;
            let removed = links.sweep();
            if removed > 0 {
                debug!(removed, remaining = links.len(), "swept expired proxy links");
            }
        }
    });
}

async fn shutdown_signal() {
    // Graceful shutdown only; the process still dies if the handler cannot
    // be installed.
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
    }
}

fn require_url(url: Option<String>, message: &str) -> ApiResult<String> {
    url.filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

// ---------------------------------------------------------------------------
// Service meta endpoints
// ---------------------------------------------------------------------------

async fn banner() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Social Media Downloader Backend API",
        "version": VERSION,
        "status": "Server is running",
        "services": ["TikTok", "YouTube", "Instagram", "Facebook"],
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let mut services = serde_json::Map::new();
    for platform in Platform::ALL {
        services.insert(
            platform.as_str().to_string(),
            json!({
                "status": "active",
                "endpoint": format!("{API_PREFIX}/{}", platform.as_str()),
            }),
        );
    }
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.uptime_secs(),
        "version": VERSION,
        "environment": state.mode().as_str(),
        "services": services,
    }))
}

async fn service_health(
    State(state): State<AppState>,
    AxumPath(service): AxumPath<String>,
) -> ApiResult<Json<Value>> {
    let platform = Platform::ALL
        .into_iter()
        .find(|platform| platform.as_str() == service)
        .ok_or_else(|| ApiError::not_found(format!("unknown service: {service}")))?;
    Ok(Json(json!({
        "success": true,
        "service": platform.as_str(),
        "status": "active",
        "endpoint": format!("{API_PREFIX}/{}", platform.as_str()),
        "totalDownloads": state.counters.total(platform),
    })))
}

async fn api_directory() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Social Media Downloader API",
        "version": VERSION,
        "services": {
            "tiktok": {
                "endpoint": format!("{API_PREFIX}/tiktok"),
                "status": "active",
                "methods": ["download", "info", "stats", "methods"],
            },
            "youtube": {
                "endpoint": format!("{API_PREFIX}/youtube"),
                "status": "active",
                "methods": ["download", "info", "stats", "methods", "proxy"],
            },
            "instagram": {
                "endpoint": format!("{API_PREFIX}/instagram"),
                "status": "active",
                "methods": ["video", "media", "info", "methods"],
            },
            "facebook": {
                "endpoint": format!("{API_PREFIX}/facebook"),
                "status": "active",
                "methods": ["download", "info", "stats", "methods"],
            },
        },
        "availableEndpoints": std::iter::once(format!("{API_PREFIX}/download"))
            .chain(
                Platform::ALL
                    .iter()
                    .map(|platform| format!("{API_PREFIX}/{}", platform.as_str())),
            )
            .collect::<Vec<_>>(),
    }))
}

async fn not_found(req: Request<Body>) -> Response {
    let body = json!({
        "success": false,
        "message": "API endpoint not found",
        "path": req.uri().path(),
        "method": req.method().as_str(),
        "availableEndpoints": [
            "/health",
            API_PREFIX,
            format!("{API_PREFIX}/download"),
            format!("{API_PREFIX}/tiktok/download"),
            format!("{API_PREFIX}/youtube/download"),
            format!("{API_PREFIX}/instagram/video"),
            format!("{API_PREFIX}/facebook/download"),
        ],
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Cross-platform auto-detect
// ---------------------------------------------------------------------------

async fn auto_download(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> ApiResult<Json<Value>> {
    let url = require_url(body.url, "URL is required")?;
    let platform = Platform::detect(&url)
        .ok_or_else(|| ApiError::bad_request("Unsupported or unrecognized video URL"))?;

    info!(url, platform = platform.as_str(), "processing auto-detected download");
    let data = match platform {
        Platform::TikTok => {
            let video = state
                .tiktok_client()
                .fetch_video(&url)
                .await
                .map_err(|err| err.redacted(state.mode()))?;
            json!(video)
        }
        Platform::YouTube => {
            let video_id = youtube::extract_video_id(&url)
                .ok_or_else(|| ApiError::bad_request("Could not extract video ID from URL"))?;
            json!(state.youtube_client().fetch_with_fallback(&video_id).await)
        }
        Platform::Instagram => {
            let media = state
                .instagram_client()
                .fetch_media(&url)
                .await
                .map_err(|err| err.redacted(state.mode()))?;
            json!(media)
        }
        Platform::Facebook => {
            let video = state
                .facebook_client()
                .fetch_video(&url)
                .await
                .map_err(|err| err.redacted(state.mode()))?;
            json!(video)
        }
    };
    state.counters.bump(platform);

    Ok(Json(json!({
        "success": true,
        "message": "Download URL retrieved successfully",
        "platform": platform.as_str(),
        "data": data,
    })))
}

// ---------------------------------------------------------------------------
// TikTok
// ---------------------------------------------------------------------------

async fn tiktok_download(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> ApiResult<Json<Value>> {
    let url = require_url(body.url, "TikTok URL is required")?;
    if !tiktok::is_valid_url(&url) {
        return Err(ApiError::bad_request("Invalid TikTok URL format"));
    }

    info!(url, "processing TikTok download");
    let video = state
        .tiktok_client()
        .fetch_video(&url)
        .await
        .map_err(|err| err.redacted(state.mode()))?;
    state.counters.bump(Platform::TikTok);

    Ok(Json(json!({
        "success": true,
        "message": "Video download URL retrieved successfully",
        "data": video,
    })))
}

async fn tiktok_info(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> ApiResult<Json<Value>> {
    let url = require_url(body.url, "TikTok URL is required")?;
    if !tiktok::is_valid_url(&url) {
        return Err(ApiError::bad_request("Invalid TikTok URL format"));
    }

    info!(url, "fetching TikTok info");
    let details = state
        .tiktok_client()
        .fetch_info(&url)
        .await
        .map_err(|err| err.redacted(state.mode()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Video info retrieved successfully",
        "data": details,
    })))
}

async fn tiktok_stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "stats": {
            "totalDownloads": state.counters.total(Platform::TikTok),
            "uptime": state.uptime_secs(),
            "availableMethods": ["tikwm", "tikmate-fallback"],
            "supportedFormats": ["video", "music"],
            "features": [
                "Direct download URLs",
                "No watermark downloads",
                "HD quality support",
                "Video statistics",
                "Author information",
            ],
        },
    }))
}

async fn tiktok_methods() -> Json<Value> {
    Json(json!({
        "success": true,
        "methods": {
            "tikwm": {
                "name": "tikwm.com resolver",
                "description": "Primary method, no-watermark and HD links",
                "endpoint": format!("{API_PREFIX}/tiktok/download"),
                "reliability": "High",
                "features": ["No watermark", "HD quality", "Music", "Statistics"],
            },
            "auto": {
                "name": "Auto method",
                "description": "Primary service with acknowledgement-only fallback",
                "endpoint": format!("{API_PREFIX}/tiktok/download"),
                "reliability": "Highest",
                "features": ["All features", "Automatic fallback"],
            },
        },
    }))
}

// ---------------------------------------------------------------------------
// YouTube
// ---------------------------------------------------------------------------

async fn youtube_download(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> ApiResult<Json<Value>> {
    let url = require_url(body.url, "YouTube URL is required")?;
    if !youtube::is_valid_url(&url) {
        return Err(ApiError::bad_request("Invalid YouTube URL format"));
    }
    let video_id = youtube::extract_video_id(&url)
        .ok_or_else(|| ApiError::bad_request("Could not extract video ID from URL"))?;

    info!(url, video_id, "processing YouTube download");
    let video = state.youtube_client().fetch_with_fallback(&video_id).await;

    // No direct media link survives oEmbed, so the short link points at the
    // canonical watch URL; the proxy still gives callers a stable, expiring
    // redirect to hand out.
    let target = youtube::watch_url(&video_id);
    let key = state.links.shorten(&video_id, &target, &video.title);
    state.counters.bump(Platform::YouTube);

    Ok(Json(json!({
        "success": true,
        "message": "Download information retrieved successfully",
        "method": video.method,
        "environment": state.mode().as_str(),
        "data": {
            "videoId": video_id,
            "title": video.title,
            "thumbnail": video.thumbnail,
            "author": video.author,
            "originalUrl": url,
            "proxyUrl": format!("{API_PREFIX}/youtube/proxy/{key}"),
            "proxyExpiresInSecs": state.links.ttl().as_secs(),
            "method": video.method,
        },
    })))
}

async fn youtube_info(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> ApiResult<Json<Value>> {
    let url = require_url(body.url, "YouTube URL is required")?;
    if !youtube::is_valid_url(&url) {
        return Err(ApiError::bad_request("Invalid YouTube URL format"));
    }
    let video_id = youtube::extract_video_id(&url)
        .ok_or_else(|| ApiError::bad_request("Could not extract video ID from URL"))?;

    info!(url, video_id, "fetching YouTube info");
    let video = state.youtube_client().fetch_with_fallback(&video_id).await;

    Ok(Json(json!({
        "success": true,
        "message": "Video info retrieved successfully",
        "method": video.method,
        "environment": state.mode().as_str(),
        "data": video,
    })))
}

async fn youtube_proxy(
    State(state): State<AppState>,
    AxumPath(hash): AxumPath<String>,
) -> ApiResult<Response> {
    let link = state
        .links
        .resolve(&hash)
        .ok_or_else(|| ApiError::not_found("Download link not found or expired"))?;

    let filename = youtube::sanitize_filename(&link.title);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        link.url
            .parse()
            .map_err(|_| ApiError::internal("stored URL is not a valid header value"))?,
    );
    if let Ok(disposition) = format!("attachment; filename=\"{filename}.mp4\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok((StatusCode::FOUND, headers).into_response())
}

async fn youtube_stats(State(state): State<AppState>) -> Json<Value> {
    let production = state.mode().is_production();
    Json(json!({
        "success": true,
        "stats": {
            "environment": state.mode().as_str(),
            "status": if production { "Limited (oEmbed only)" } else { "Full functionality" },
            "availableMethods": ["youtube-oembed", "basic-fallback"],
            "totalDownloads": state.counters.total(Platform::YouTube),
            "activeProxyLinks": state.links.len(),
            "uptime": state.uptime_secs(),
            "note": "YouTube restricts access from hosted servers",
        },
    }))
}

async fn youtube_methods() -> Json<Value> {
    Json(json!({
        "success": true,
        "methods": {
            "oembed": {
                "name": "YouTube oEmbed API",
                "description": "Primary method, metadata only, works from hosted servers",
                "endpoint": format!("{API_PREFIX}/youtube/download"),
                "reliability": "High",
                "features": ["Title", "Author", "Thumbnail", "Short proxy URLs"],
            },
            "proxy": {
                "name": "Short link redirect",
                "description": "Expiring redirect for previously resolved videos",
                "endpoint": format!("{API_PREFIX}/youtube/proxy/{{hash}}"),
                "method": "GET",
            },
        },
    }))
}

// ---------------------------------------------------------------------------
// Instagram
// ---------------------------------------------------------------------------

async fn instagram_video(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    let url = require_url(query.url, "URL parameter is required")?;

    info!(url, "extracting Instagram media");
    let media = state
        .instagram_client()
        .fetch_media(&url)
        .await
        .map_err(|err| err.redacted(state.mode()))?;

    if media.is_video() {
        if let Some(video_url) = &media.video_url {
            state.counters.bump(Platform::Instagram);
            return Ok(Json(json!({
                "success": true,
                "videoUrl": video_url,
            })));
        }
    }

    // Images and carousels fall back to the display URL; the field name
    // stays `videoUrl` because existing callers read it.
    if let Some(display_url) = &media.display_url {
        state.counters.bump(Platform::Instagram);
        return Ok(Json(json!({
            "success": true,
            "videoUrl": display_url,
            "imageUrl": display_url,
            "isVideo": false,
        })));
    }

    Err(ApiError::not_found("No media URL found in the post"))
}

async fn instagram_media(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    let url = require_url(query.url, "URL parameter is required")?;

    info!(url, "extracting full Instagram media data");
    let media = state
        .instagram_client()
        .fetch_media(&url)
        .await
        .map_err(|err| err.redacted(state.mode()))?;

    Ok(Json(json!({
        "success": true,
        "data": media,
    })))
}

async fn instagram_info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    let url = require_url(query.url, "URL parameter is required")?;

    info!(url, "extracting Instagram post info");
    let media = state
        .instagram_client()
        .fetch_media(&url)
        .await
        .map_err(|err| err.redacted(state.mode()))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "shortcode": media.shortcode,
            "id": media.id,
            "caption": media.caption,
            "is_video": media.is_video,
            "has_audio": media.has_audio,
            "dimensions": media.dimensions,
            "owner": media.owner,
            "like_count": media.like_count,
            "comment_count": media.comment_count,
            "taken_at_timestamp": media.taken_at_timestamp,
            "product_type": media.product_type,
            "video_duration": media.video_duration,
            "is_paid_partnership": media.is_paid_partnership,
            "location": media.location,
            "clips_music_attribution_info": media.clips_music_attribution_info,
        },
    })))
}

async fn instagram_methods() -> Json<Value> {
    Json(json!({
        "success": true,
        "api": {
            "name": "Instagram Media Scraper API",
            "description": "Instagram media scraper using the web GraphQL API - no cookies required",
            "method": "GraphQL",
            "features": [
                "Video URL extraction",
                "Image URL extraction",
                "Full media data",
                "Post information",
                "Carousel/sidecar support",
                "Owner details",
                "Engagement metrics",
                "No authentication required",
            ],
            "endpoints": {
                "video": {
                    "path": format!("{API_PREFIX}/instagram/video"),
                    "method": "GET",
                    "parameters": { "url": "Instagram post/reel URL" },
                },
                "media": {
                    "path": format!("{API_PREFIX}/instagram/media"),
                    "method": "GET",
                    "parameters": { "url": "Instagram post/reel URL" },
                },
                "info": {
                    "path": format!("{API_PREFIX}/instagram/info"),
                    "method": "GET",
                    "parameters": { "url": "Instagram post/reel URL" },
                },
            },
            "supportedUrls": [
                "https://www.instagram.com/p/{post_id}/",
                "https://www.instagram.com/reel/{reel_id}/",
                "https://www.instagram.com/reels/{reel_id}/",
                "https://www.instagram.com/stories/{story_id}/",
            ],
        },
    }))
}

// ---------------------------------------------------------------------------
// Facebook
// ---------------------------------------------------------------------------

async fn facebook_download(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> ApiResult<Json<Value>> {
    let url = require_url(body.url, "Facebook URL is required")?;
    if !facebook::is_valid_url(&url) {
        return Err(ApiError::bad_request("Invalid Facebook URL format"));
    }

    info!(url, "processing Facebook download");
    let video = state
        .facebook_client()
        .fetch_video(&url)
        .await
        .map_err(|err| err.redacted(state.mode()))?;
    state.counters.bump(Platform::Facebook);

    let id = facebook::extract_video_id(&url);
    Ok(Json(json!({
        "success": true,
        "message": "Facebook video download URL retrieved successfully",
        "data": {
            "id": id,
            "video": video,
        },
    })))
}

async fn facebook_info(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> ApiResult<Json<Value>> {
    let url = require_url(body.url, "Facebook URL is required")?;
    if !facebook::is_valid_url(&url) {
        return Err(ApiError::bad_request("Invalid Facebook URL format"));
    }

    info!(url, "fetching Facebook info");
    let details = state
        .facebook_client()
        .fetch_info(&url)
        .await
        .map_err(|err| err.redacted(state.mode()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Facebook video info retrieved",
        "data": details,
    })))
}

async fn facebook_stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "stats": {
            "apiUrl": state.settings.upstreams.facebook_api,
            "totalDownloads": state.counters.total(Platform::Facebook),
            "uptime": state.uptime_secs(),
            "supportedFormats": ["HD", "SD", "MP4"],
            "features": [
                "Direct download URLs",
                "HD & SD quality support",
                "Video metadata",
                "Title sanitization",
            ],
            "supportedUrls": [
                "facebook.com/*/videos/*",
                "facebook.com/watch?v=*",
                "facebook.com/*/posts/*",
                "fb.watch/*",
                "facebook.com/reel/*",
                "facebook.com/share/r/*",
                "facebook.com/share/v/*",
            ],
        },
    }))
}

async fn facebook_methods() -> Json<Value> {
    Json(json!({
        "success": true,
        "api": {
            "name": "Facebook Video Downloader API",
            "description": "Facebook video downloading via hosted search API",
            "endpoint": format!("{API_PREFIX}/facebook/download"),
            "method": "POST",
            "features": ["HD quality", "SD quality", "Video metadata", "Title sanitization"],
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reelproxy_tools::config::Upstreams;
    use std::time::Duration;

    fn test_settings() -> Settings {
        Settings {
            port: 0,
            host: "127.0.0.1".to_string(),
            mode: RunMode::Development,
            request_timeout: Duration::from_secs(2),
            proxy_link_ttl: Duration::from_secs(60),
            upstreams: Upstreams::default(),
        }
    }

    fn test_state() -> AppState {
        AppState::new(test_settings()).unwrap()
    }

    fn state_against(mode: RunMode, base: &str) -> AppState {
        let mut settings = test_settings();
        settings.mode = mode;
        settings.upstreams = Upstreams {
            tikwm_api: base.to_string(),
            tikmate_api: base.to_string(),
            youtube_oembed: base.to_string(),
            instagram_api: base.to_string(),
            facebook_api: base.to_string(),
        };
        AppState::new(settings).unwrap()
    }

    #[test]
    fn backend_args_defaults() {
        let args = BackendArgs::from_iter(Vec::new()).unwrap();
        assert_eq!(args.port, None);
        assert_eq!(args.host, None);
        assert!(!args.production);
    }

    #[test]
    fn backend_args_equals_and_space_forms() {
        let args = BackendArgs::from_iter(
            ["--port=8081", "--host", "0.0.0.0", "--production"]
                .iter()
                .map(|s| s.to_string()),
        )
        .unwrap();
        assert_eq!(args.port, Some(8081));
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert!(args.production);
        let overrides = args.into_overrides();
        assert_eq!(overrides.mode, Some(RunMode::Production));
    }

    #[test]
    fn backend_args_reject_unknown_flag() {
        let err = BackendArgs::from_iter(["--verbose".to_string()]).unwrap_err();
        assert!(err.to_string().contains("unknown argument"));
    }

    #[test]
    fn backend_args_reject_bad_port() {
        assert!(BackendArgs::from_iter(["--port=70000".to_string()]).is_err());
        assert!(BackendArgs::from_iter(["--port".to_string()]).is_err());
    }

    #[tokio::test]
    async fn banner_lists_all_services() {
        let body = banner().await.0;
        assert_eq!(body["success"], true);
        assert_eq!(body["services"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn health_reports_every_platform_active() {
        let body = health(State(test_state())).await.0;
        assert_eq!(body["status"], "healthy");
        for platform in Platform::ALL {
            assert_eq!(body["services"][platform.as_str()]["status"], "active");
        }
    }

    #[tokio::test]
    async fn service_health_known_and_unknown() {
        let state = test_state();
        let body = service_health(State(state.clone()), AxumPath("tiktok".to_string()))
            .await
            .unwrap()
            .0;
        assert_eq!(body["service"], "tiktok");
        assert_eq!(body["status"], "active");

        let err = service_health(State(state), AxumPath("myspace".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directory_lists_endpoints() {
        let body = api_directory().await.0;
        assert_eq!(
            body["services"]["instagram"]["methods"]
                .as_array()
                .unwrap()
                .len(),
            4
        );
        let endpoints = body["availableEndpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 5);
        assert_eq!(endpoints[0], "/api/v1/download");
    }

    #[tokio::test]
    async fn fallback_returns_not_found_payload() {
        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/vimeo/download")
            .body(Body::empty())
            .unwrap();
        let response = not_found(req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["path"], "/api/v1/vimeo/download");
    }

    #[tokio::test]
    async fn tiktok_download_requires_url() {
        let err = tiktok_download(State(test_state()), Json(UrlBody { url: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "TikTok URL is required");
    }

    #[tokio::test]
    async fn tiktok_download_rejects_foreign_url() {
        let err = tiktok_download(
            State(test_state()),
            Json(UrlBody {
                url: Some("https://vimeo.com/123".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message(), "Invalid TikTok URL format");
    }

    #[tokio::test]
    async fn auto_download_requires_url() {
        let err = auto_download(State(test_state()), Json(UrlBody { url: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "URL is required");
    }

    #[tokio::test]
    async fn auto_download_rejects_unknown_host() {
        let err = auto_download(
            State(test_state()),
            Json(UrlBody {
                url: Some("https://vimeo.com/12345".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message(), "Unsupported or unrecognized video URL");
    }

    #[tokio::test]
    async fn auto_download_dispatches_on_host() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/");
                then.status(200).json_body(serde_json::json!({
                    "code": 0,
                    "data": {
                        "id": "7212345678901234567",
                        "title": "clip",
                        "play": "https://cdn.test/v.mp4"
                    }
                }));
            })
            .await;

        let state = state_against(RunMode::Development, &server.base_url());
        let body = auto_download(
            State(state.clone()),
            Json(UrlBody {
                url: Some("https://vm.tiktok.com/ZMabc123".to_string()),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(body["success"], true);
        assert_eq!(body["platform"], "tiktok");
        assert_eq!(body["data"]["title"], "clip");
        assert_eq!(state.counters.total(Platform::TikTok), 1);
    }

    #[tokio::test]
    async fn production_keeps_upstream_outage_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fbvideo/search");
                then.status(503);
            })
            .await;

        let state = state_against(RunMode::Production, &server.base_url());
        let err = facebook_info(
            State(state),
            Json(UrlBody {
                url: Some("https://fb.watch/abc123/".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.message().contains("temporarily unavailable"));
    }

    #[tokio::test]
    async fn youtube_download_rejects_missing_id() {
        let err = youtube_download(
            State(test_state()),
            Json(UrlBody {
                url: Some("https://www.youtube.com/".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn instagram_video_requires_url_parameter() {
        let err = instagram_video(State(test_state()), Query(UrlQuery { url: None }))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "URL parameter is required");
    }

    #[tokio::test]
    async fn proxy_redirects_seeded_link() {
        let state = test_state();
        let key = state.links.shorten(
            "dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "Never Gonna Give You Up",
        );

        let response = youtube_proxy(State(state.clone()), AxumPath(key))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("Never Gonna Give You Up.mp4"));
    }

    #[tokio::test]
    async fn proxy_unknown_hash_is_not_found() {
        let err = youtube_proxy(State(test_state()), AxumPath("missing_12345678".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "Download link not found or expired");
    }

    #[tokio::test]
    async fn stats_report_download_counters() {
        let state = test_state();
        state.counters.bump(Platform::TikTok);
        state.counters.bump(Platform::TikTok);
        state.counters.bump(Platform::Facebook);

        let body = tiktok_stats(State(state.clone())).await.0;
        assert_eq!(body["stats"]["totalDownloads"], 2);

        let body = facebook_stats(State(state.clone())).await.0;
        assert_eq!(body["stats"]["totalDownloads"], 1);

        let body = youtube_stats(State(state)).await.0;
        assert_eq!(body["stats"]["totalDownloads"], 0);
        assert_eq!(body["stats"]["status"], "Full functionality");
    }

    #[tokio::test]
    async fn methods_endpoints_are_well_formed() {
        assert_eq!(tiktok_methods().await.0["success"], true);
        assert_eq!(youtube_methods().await.0["success"], true);
        assert_eq!(instagram_methods().await.0["success"], true);
        assert_eq!(facebook_methods().await.0["success"], true);
    }
}

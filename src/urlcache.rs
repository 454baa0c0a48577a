#![forbid(unsafe_code)]

//! Short-lived URL mapping behind the `/proxy/{hash}` redirect endpoint.
//!
//! Download URLs handed out by the platforms are long, signed and ugly, so
//! the server stores them under a short key and redirects on lookup. Entries
//! expire after a configurable TTL; a periodic sweep removes the dead ones
//! by linear scan. Nothing is persisted and there is no eviction besides
//! expiry, so the TTL is the only thing bounding the map.

use std::{
    collections::HashMap,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;

/// Key suffix length, hex characters of the md5 digest.
const SHORT_HASH_LEN: usize = 8;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on the configured TTL. `Instant + Duration` panics on
/// overflow, and the config layer accepts any `u64` seconds value.
const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

#[derive(Debug, Clone)]
struct StoredLink {
    url: String,
    title: String,
    expires_at: Instant,
}

/// A resolved mapping, returned to the redirect handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: String,
    pub title: String,
}

pub struct UrlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, StoredLink>>,
}

impl UrlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(MAX_TTL),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// How often the background task should run the sweep. A quarter of the
    /// TTL keeps the map close to its live size without waking up a
    /// one-hour-TTL server every few milliseconds.
    pub fn sweep_interval(&self) -> Duration {
        (self.ttl / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
    }

    /// Stores `url` under a fresh short key and returns the key.
    ///
    /// The key is `{video_id}_{hash8}` where `hash8` is the first eight hex
    /// characters of `md5(url + current epoch millis)`, so repeated requests
    /// for the same video produce distinct, unguessable-enough keys.
    pub fn shorten(&self, video_id: &str, url: &str, title: &str) -> String {
        let salt = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        self.shorten_with(video_id, url, title, Instant::now(), salt)
    }

    fn shorten_with(
        &self,
        video_id: &str,
        url: &str,
        title: &str,
        now: Instant,
        salt: u128,
    ) -> String {
        let digest = md5::compute(format!("{url}{salt}"));
        let hex = format!("{digest:x}");
        let key = format!("{video_id}_{}", &hex[..SHORT_HASH_LEN]);
        self.entries.lock().insert(
            key.clone(),
            StoredLink {
                url: url.to_string(),
                title: title.to_string(),
                expires_at: now + self.ttl,
            },
        );
        key
    }

    /// Looks up a key, treating expired entries as absent even if the sweep
    /// has not removed them yet.
    pub fn resolve(&self, key: &str) -> Option<ResolvedLink> {
        self.resolve_at(key, Instant::now())
    }

    fn resolve_at(&self, key: &str, now: Instant) -> Option<ResolvedLink> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.expires_at <= now {
            return None;
        }
        Some(ResolvedLink {
            url: entry.url.clone(),
            title: entry.title.clone(),
        })
    }

    /// Removes expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_secs: u64) -> UrlCache {
        UrlCache::new(Duration::from_secs(ttl_secs))
    }

    #[test]
    fn shorten_key_shape() {
        let cache = cache(60);
        let key = cache.shorten("dQw4w9WgXcQ", "https://example.test/v.mp4", "Video");
        let (id, hash) = key.rsplit_once('_').unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
        assert_eq!(hash.len(), SHORT_HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_salts_give_distinct_keys() {
        let cache = cache(60);
        let now = Instant::now();
        let a = cache.shorten_with("vid", "https://example.test/v.mp4", "t", now, 1);
        let b = cache.shorten_with("vid", "https://example.test/v.mp4", "t", now, 2);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn resolve_before_expiry() {
        let cache = cache(60);
        let key = cache.shorten("vid", "https://example.test/v.mp4", "My Clip");
        let resolved = cache.resolve(&key).unwrap();
        assert_eq!(resolved.url, "https://example.test/v.mp4");
        assert_eq!(resolved.title, "My Clip");
    }

    #[test]
    fn resolve_after_expiry_is_none() {
        let cache = cache(60);
        let now = Instant::now();
        let key = cache.shorten_with("vid", "https://example.test/v.mp4", "t", now, 7);
        assert!(cache.resolve_at(&key, now + Duration::from_secs(59)).is_some());
        assert!(cache.resolve_at(&key, now + Duration::from_secs(60)).is_none());
        // Entry is still in the map until the sweep runs.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sweep_removes_only_expired_keys() {
        let cache = cache(60);
        let now = Instant::now();
        let old = cache.shorten_with("old", "https://example.test/a", "a", now, 1);
        let fresh = cache.shorten_with(
            "new",
            "https://example.test/b",
            "b",
            now + Duration::from_secs(30),
            2,
        );

        let removed = cache.sweep_at(now + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert!(cache.resolve_at(&old, now + Duration::from_secs(61)).is_none());
        assert!(cache.resolve_at(&fresh, now + Duration::from_secs(61)).is_some());
    }

    #[test]
    fn sweep_interval_clamps() {
        assert_eq!(cache(4).sweep_interval(), Duration::from_secs(5));
        assert_eq!(cache(120).sweep_interval(), Duration::from_secs(30));
        assert_eq!(cache(3600).sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn absurd_ttl_is_clamped_and_usable() {
        let cache = UrlCache::new(Duration::from_secs(u64::MAX));
        assert_eq!(cache.ttl(), MAX_TTL);
        let key = cache.shorten("vid", "https://example.test/v.mp4", "t");
        assert!(cache.resolve(&key).is_some());
    }

    #[test]
    fn unknown_key_is_none() {
        let cache = cache(60);
        assert!(cache.resolve("nope_12345678").is_none());
        assert!(cache.is_empty());
    }
}

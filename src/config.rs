#![forbid(unsafe_code)]

//! Runtime settings for the aggregator backend.
//!
//! Values are resolved from three layers, highest precedence first:
//! explicit overrides (CLI flags), process environment variables, and a
//! `.env`-style file next to the binary. Everything has a default so the
//! server starts with no configuration at all.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PROXY_LINK_TTL_SECS: u64 = 3600;

const DEFAULT_TIKWM_API: &str = "https://www.tikwm.com";
const DEFAULT_TIKMATE_API: &str = "https://tikmate.online";
const DEFAULT_YOUTUBE_OEMBED: &str = "https://www.youtube.com";
const DEFAULT_INSTAGRAM_API: &str = "https://www.instagram.com";
const DEFAULT_FACEBOOK_API: &str = "https://myapi-2f5b.onrender.com";

/// Deployment mode. Production redacts upstream error detail and reports the
/// reduced method set that hosted providers leave available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
}

impl RunMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" => Some(Self::Development),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Base URLs of the external services each platform module talks to.
///
/// These exist as settings only so tests can point them at a local mock
/// server; nobody is expected to override them in a real deployment.
#[derive(Debug, Clone)]
pub struct Upstreams {
    pub tikwm_api: String,
    pub tikmate_api: String,
    pub youtube_oembed: String,
    pub instagram_api: String,
    pub facebook_api: String,
}

impl Default for Upstreams {
    fn default() -> Self {
        Self {
            tikwm_api: DEFAULT_TIKWM_API.to_string(),
            tikmate_api: DEFAULT_TIKMATE_API.to_string(),
            youtube_oembed: DEFAULT_YOUTUBE_OEMBED.to_string(),
            instagram_api: DEFAULT_INSTAGRAM_API.to_string(),
            facebook_api: DEFAULT_FACEBOOK_API.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub host: String,
    pub mode: RunMode,
    pub request_timeout: Duration,
    pub proxy_link_ttl: Duration,
    pub upstreams: Upstreams,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub mode: Option<RunMode>,
    pub env_path: Option<PathBuf>,
}

pub fn load_settings() -> Result<Settings> {
    resolve_settings(SettingsOverrides::default())
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Settings {
    let port = overrides
        .port
        .or_else(|| {
            lookup_value("REELPROXY_PORT", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_PORT);
    let host = overrides
        .host
        .and_then(non_blank)
        .or_else(|| lookup_value("REELPROXY_HOST", file_vars, &env_lookup))
        .and_then(non_blank)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let mode = overrides
        .mode
        .or_else(|| {
            lookup_value("REELPROXY_ENV", file_vars, &env_lookup)
                .as_deref()
                .and_then(RunMode::parse)
        })
        .unwrap_or(RunMode::Development);
    let request_timeout = lookup_value("REELPROXY_TIMEOUT_SECS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    let proxy_link_ttl = lookup_value("REELPROXY_LINK_TTL_SECS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_PROXY_LINK_TTL_SECS);

    let defaults = Upstreams::default();
    let upstream = |key: &str, default: String| {
        lookup_value(key, file_vars, &env_lookup)
            .and_then(non_blank)
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or(default)
    };
    let upstreams = Upstreams {
        tikwm_api: upstream("TIKWM_API_URL", defaults.tikwm_api),
        tikmate_api: upstream("TIKMATE_API_URL", defaults.tikmate_api),
        youtube_oembed: upstream("YOUTUBE_OEMBED_URL", defaults.youtube_oembed),
        instagram_api: upstream("INSTAGRAM_API_URL", defaults.instagram_api),
        facebook_api: upstream("FACEBOOK_API_URL", defaults.facebook_api),
    };

    Settings {
        port,
        host,
        mode,
        request_timeout: Duration::from_secs(request_timeout),
        proxy_link_ttl: Duration::from_secs(proxy_link_ttl),
        upstreams,
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn settings_from(contents: &str) -> Settings {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_settings(&vars, |_| None)
    }

    #[test]
    fn settings_read_port_and_host() {
        let settings = settings_from("REELPROXY_PORT=\"4242\"\nREELPROXY_HOST=\"0.0.0.0\"\n");
        assert_eq!(settings.port, 4242);
        assert_eq!(settings.host, "0.0.0.0");
    }

    #[test]
    fn settings_default_when_file_empty() {
        let settings = settings_from("");
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.host, DEFAULT_HOST);
        assert_eq!(settings.mode, RunMode::Development);
        assert_eq!(
            settings.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(
            settings.proxy_link_ttl,
            Duration::from_secs(DEFAULT_PROXY_LINK_TTL_SECS)
        );
    }

    #[test]
    fn settings_parse_run_mode_aliases() {
        assert_eq!(RunMode::parse("production"), Some(RunMode::Production));
        assert_eq!(RunMode::parse("PROD"), Some(RunMode::Production));
        assert_eq!(RunMode::parse("dev"), Some(RunMode::Development));
        assert_eq!(RunMode::parse("staging"), None);
        let settings = settings_from("REELPROXY_ENV=\"production\"\n");
        assert!(settings.mode.is_production());
    }

    #[test]
    fn settings_upstream_override_strips_trailing_slash() {
        let settings = settings_from("TIKWM_API_URL=\"http://127.0.0.1:9999/\"\n");
        assert_eq!(settings.upstreams.tikwm_api, "http://127.0.0.1:9999");
        assert_eq!(settings.upstreams.facebook_api, DEFAULT_FACEBOOK_API);
    }

    #[test]
    fn settings_prefer_env_over_file() {
        let vars = read_env_file(make_config("REELPROXY_PORT=\"1000\"\n").path()).unwrap();
        let settings = build_settings(&vars, |key| {
            if key == "REELPROXY_PORT" {
                Some("2000".to_string())
            } else {
                None
            }
        });
        assert_eq!(settings.port, 2000);
    }

    #[test]
    fn settings_override_precedence() {
        let vars = read_env_file(
            make_config("REELPROXY_PORT=\"1000\"\nREELPROXY_HOST=\"file-host\"\n").path(),
        )
        .unwrap();
        let settings = build_settings_with_overrides(
            &vars,
            |key| {
                if key == "REELPROXY_HOST" {
                    Some("env-host".to_string())
                } else {
                    None
                }
            },
            SettingsOverrides {
                port: Some(9000),
                host: None,
                mode: Some(RunMode::Production),
                env_path: None,
            },
        );
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.host, "env-host");
        assert!(settings.mode.is_production());
    }

    #[test]
    fn settings_ignore_blank_host_override() {
        let settings = build_settings_with_overrides(
            &HashMap::new(),
            |_| None,
            SettingsOverrides {
                host: Some("   ".into()),
                ..SettingsOverrides::default()
            },
        );
        assert_eq!(settings.host, DEFAULT_HOST);
    }

    #[test]
    fn settings_invalid_port_defaults() {
        let settings = settings_from("REELPROXY_PORT=\"nope\"\n");
        assert_eq!(settings.port, DEFAULT_PORT);
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export REELPROXY_HOST="0.0.0.0"
            REELPROXY_PORT='9090'
            REELPROXY_ENV =  "production"
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("REELPROXY_HOST").unwrap(), "0.0.0.0");
        assert_eq!(vars.get("REELPROXY_PORT").unwrap(), "9090");
        assert_eq!(vars.get("REELPROXY_ENV").unwrap(), "production");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }
}

//! Environment-driven configuration.
//!
//! Loaded once at startup with `figment` from raw environment variables
//! (`DATABASE_URL`, `REDIS_URL`, ...). Durations accept either plain seconds
//! or unit-suffixed strings such as `30s`, `60m`, `1h`.

use crate::sitemap::SitemapSettings;
use crate::sitemap::refresh::DEFAULT_REFRESH_INTERVAL;
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer, de};
use std::time::Duration;

const LOCAL_ORIGIN: &str = "http://localhost:5000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
    /// No store: every read misses and every request regenerates.
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Crate log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database_url: String,
    /// Redis or Valkey URL; `rediss://` enables TLS.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Explicit backend choice; inferred from `redis_url` when unset.
    #[serde(default)]
    pub cache_backend: Option<CacheBackend>,
    /// Host the sitemap URLs point at. Falls back to `cms_host`.
    #[serde(default)]
    pub sitemap_host: Option<String>,
    /// Host this service is reachable on, used for sitemap index pointers.
    #[serde(default)]
    pub cms_host: Option<String>,
    #[serde(default = "default_refresh_interval", deserialize_with = "duration")]
    pub sitemap_refresh_interval: Duration,
    #[serde(default = "default_shutdown_timeout", deserialize_with = "duration")]
    pub shutdown_timeout: Duration,
    /// Comma-separated bearer tokens accepted in addition to the `api_tokens` table.
    #[serde(default)]
    pub api_tokens: Option<String>,
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn cache_backend(&self) -> CacheBackend {
        match (self.cache_backend, &self.redis_url) {
            (Some(backend), _) => backend,
            (None, Some(_)) => CacheBackend::Redis,
            (None, None) => CacheBackend::Memory,
        }
    }

    /// Public origin of the site the sitemap URLs point at.
    pub fn sitemap_origin(&self) -> String {
        self.sitemap_host
            .as_deref()
            .or(self.cms_host.as_deref())
            .map_or_else(|| LOCAL_ORIGIN.to_owned(), origin_from_host)
    }

    /// Public origin of this service.
    pub fn cms_origin(&self) -> String {
        self.cms_host
            .as_deref()
            .map_or_else(|| LOCAL_ORIGIN.to_owned(), origin_from_host)
    }

    pub fn sitemap_settings(&self) -> SitemapSettings {
        SitemapSettings::new(self.sitemap_origin(), self.cms_origin())
    }

    pub fn static_tokens(&self) -> Vec<String> {
        self.api_tokens
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Hosts are configured bare (`cms.example.com`); an explicit scheme is kept.
fn origin_from_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    }
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
    ]);
    let parsed = parser
        .parse(input.trim())
        .map_err(|e| format!("invalid duration {input:?}: {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration {input:?}: {e}"))
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(de::Error::custom),
    }
}

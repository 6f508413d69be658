use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use rocket::figment::{
    providers::{Format, Toml},
    Figment, Profile,
};
use serde::Deserialize;
use thiserror::Error;

use crate::images::DimensionProbe;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid header rule pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid header '{0}': {1}")]
    InvalidHeader(String, String),

    #[error("Invalid outbound proxy '{0}': {1}")]
    InvalidProxy(String, String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How failures on image endpoints are rendered.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    #[default]
    Json,
    Svg,
}

/// Extra outbound headers for hosts matching `pattern`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HeaderRuleConfig {
    pub pattern: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_address")]
    pub address: String,
    /// Upstream fetch timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Cache entry lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Seconds between two sweeps of expired entries.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
    #[serde(default = "default_true")]
    pub require_https: bool,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_quality")]
    pub default_quality: u8,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub dimension_probe: DimensionProbe,
    #[serde(default)]
    pub error_format: ErrorFormat,
    #[serde(default)]
    pub outbound_proxy: Option<String>,
    #[serde(default = "default_fetch_headers")]
    pub fetch_headers: BTreeMap<String, String>,
    #[serde(default = "default_header_rules")]
    pub header_rules: Vec<HeaderRuleConfig>,
}

impl AppConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            timeout: default_timeout(),
            cache_ttl: default_cache_ttl(),
            sweep_interval: default_sweep_interval(),
            require_https: true,
            max_dimension: default_max_dimension(),
            default_quality: default_quality(),
            user_agent: default_user_agent(),
            dimension_probe: DimensionProbe::default(),
            error_format: ErrorFormat::default(),
            outbound_proxy: None,
            fetch_headers: default_fetch_headers(),
            header_rules: default_header_rules(),
        }
    }
}

/// Builds the figment shared by Rocket and `AppConfig`.
///
/// Sources, lowest priority first: Rocket defaults, `App.toml` (nested
/// profiles), then a handful of environment variables.
pub fn figment() -> Figment {
    let mut figment = Figment::from(rocket::Config::default())
        .merge(Toml::file("App.toml").nested());

    if let Ok(ttl) = env::var("CACHE_TTL") {
        if let Ok(ttl) = ttl.trim().parse::<u64>() {
            figment = figment.merge(("cache_ttl", ttl));
        }
    }

    if let Ok(interval) = env::var("SWEEP_INTERVAL") {
        if let Ok(interval) = interval.trim().parse::<u64>() {
            figment = figment.merge(("sweep_interval", interval));
        }
    }

    if let Ok(timeout) = env::var("FETCH_TIMEOUT") {
        if let Ok(timeout) = timeout.trim().parse::<u64>() {
            figment = figment.merge(("timeout", timeout));
        }
    }

    if let Ok(proxy) = env::var("OUTBOUND_PROXY") {
        figment = figment.merge(("outbound_proxy", proxy.trim().to_string()));
    }

    figment.select(Profile::from_env_or("APP_PROFILE", "default"))
}

fn default_port() -> u16 {
    8000
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_max_dimension() -> u32 {
    4096
}

fn default_quality() -> u8 {
    85
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_fetch_headers() -> BTreeMap<String, String> {
    [
        ("Accept", "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Cache-Control", "no-cache"),
        ("Pragma", "no-cache"),
        ("Referer", "https://www.google.com/"),
        ("Sec-Fetch-Dest", "image"),
        ("Sec-Fetch-Mode", "no-cors"),
        ("Sec-Fetch-Site", "cross-site"),
        ("Sec-Ch-Ua", "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\""),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Windows\""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn site_rule(pattern: &str, site: &str) -> HeaderRuleConfig {
    let mut headers = BTreeMap::new();
    headers.insert("Referer".to_string(), format!("https://{}/", site));
    headers.insert("Origin".to_string(), format!("https://{}", site));
    HeaderRuleConfig {
        pattern: pattern.to_string(),
        headers,
    }
}

fn default_header_rules() -> Vec<HeaderRuleConfig> {
    vec![
        site_rule(r"(^|\.)kiryuu02\.com$", "kiryuu02.com"),
        site_rule(r"(^|\.)unsplash\.com$", "unsplash.com"),
        site_rule(r"(^|\.)picsum\.photos$", "picsum.photos"),
    ]
}

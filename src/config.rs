// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Every setting has a default matching the production deployment, so the
//! service starts with no environment at all apart from the API tokens.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Production Duo endpoints.
pub const DEFAULT_AUTH_BASE_URL: &str = "https://auth.prod.uno.svt.se/authentication/v5";
pub const DEFAULT_AMIGO_BASE_URL: &str = "https://amigo.prod.uno.svt.se/amigo/v3";
pub const DEFAULT_HIGHSCORE_BASE_URL: &str = "https://highscore.prod.duo.svt.se/v2";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- HTTP server ---
    /// Listen address
    pub host: String,
    /// Server port
    pub port: u16,
    /// `max-age` advertised in the `Cache-Control` response header
    pub cache_max_age: Duration,

    // --- Credentials ---
    /// Durable token file (JSON with `access_token` and `refresh_token`)
    pub token_file: PathBuf,

    // --- Scheduler ---
    pub token_refresh_interval: Duration,
    pub highscore_refresh_interval: Duration,
    pub scheduler_tick: Duration,
    /// Minimum pause before a failed task is attempted again
    pub retry_delay: Duration,

    // --- Upstream ---
    pub request_timeout: Duration,
    pub auth_base_url: String,
    pub amigo_base_url: String,
    pub highscore_base_url: String,
    /// Product key sent to the highscore service
    pub app_key: String,
    pub season: u32,
    /// Fixed episode set requested every refresh
    pub episodes: Vec<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cache_max_age: Duration::from_secs(600),
            token_file: PathBuf::from(".tokens.json"),
            token_refresh_interval: Duration::from_secs(60 * 60),
            highscore_refresh_interval: Duration::from_secs(60),
            scheduler_tick: Duration::from_secs(1),
            retry_delay: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            amigo_base_url: DEFAULT_AMIGO_BASE_URL.to_string(),
            highscore_base_url: DEFAULT_HIGHSCORE_BASE_URL.to_string(),
            app_key: "pa-sparet".to_string(),
            season: 34,
            episodes: (1..=13).collect(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        let episodes = match env::var("DUO_EPISODES") {
            Ok(raw) => parse_episodes(&raw)?,
            Err(_) => defaults.episodes,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", defaults.port),
            cache_max_age: secs_or("CACHE_MAX_AGE_SECS", defaults.cache_max_age),
            token_file: env::var("TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.token_file),
            token_refresh_interval: secs_or(
                "TOKEN_REFRESH_INTERVAL_SECS",
                defaults.token_refresh_interval,
            ),
            highscore_refresh_interval: secs_or(
                "HIGHSCORE_REFRESH_INTERVAL_SECS",
                defaults.highscore_refresh_interval,
            ),
            scheduler_tick: env::var("SCHEDULER_TICK_MILLIS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.scheduler_tick),
            retry_delay: secs_or("RETRY_DELAY_SECS", defaults.retry_delay),
            request_timeout: secs_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            auth_base_url: base_url_or("DUO_AUTH_BASE_URL", defaults.auth_base_url),
            amigo_base_url: base_url_or("DUO_AMIGO_BASE_URL", defaults.amigo_base_url),
            highscore_base_url: base_url_or(
                "DUO_HIGHSCORE_BASE_URL",
                defaults.highscore_base_url,
            ),
            app_key: env::var("DUO_APP_KEY").unwrap_or(defaults.app_key),
            season: parse_or("DUO_SEASON", defaults.season),
            episodes,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn secs_or(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn base_url_or(key: &str, default: String) -> String {
    env::var(key)
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .unwrap_or(default)
}

/// Parse a comma-separated episode list such as `"1,2,3"`.
pub fn parse_episodes(raw: &str) -> Result<Vec<u32>, ConfigError> {
    let mut episodes = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let episode = part
            .parse()
            .map_err(|_| ConfigError::Invalid("DUO_EPISODES", part.to_string()))?;
        if !episodes.contains(&episode) {
            episodes.push(episode);
        }
    }

    if episodes.is_empty() {
        return Err(ConfigError::Invalid("DUO_EPISODES", raw.to_string()));
    }
    Ok(episodes)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("No API tokens: token file {0} not found and DUO_ACCESS_TOKEN/DUO_REFRESH_TOKEN not set")]
    MissingCredentials(String),
}

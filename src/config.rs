use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

use crate::services::transfer::TransferSettings;
use crate::services::transfer::committer::CommitSettings;
use crate::services::transfer::resolver::ResolverSettings;
use crate::services::transfer::types::JitterRange;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Client-side pacing of API calls. Unset or 0 disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<u32>,
}

/// How the Spotify client gets its bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyCredentials {
    AccessToken(String),
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl SpotifyConfig {
    /// Resolve credentials from the config file, falling back to environment
    /// variables for each missing value.
    pub fn credentials(&self) -> Result<SpotifyCredentials> {
        self.credentials_with(|key| std::env::var(key).ok())
    }

    fn credentials_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<SpotifyCredentials> {
        let pick = |value: &Option<String>, key: &str| {
            value
                .clone()
                .or_else(|| env(key))
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(access_token) = pick(&self.access_token, "SPOTIFY_ACCESS_TOKEN") {
            return Ok(SpotifyCredentials::AccessToken(access_token));
        }

        match (
            pick(&self.client_id, "SPOTIFY_CLIENT_ID"),
            pick(&self.client_secret, "SPOTIFY_CLIENT_SECRET"),
            pick(&self.refresh_token, "SPOTIFY_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Ok(SpotifyCredentials::RefreshToken {
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            _ => Err(eyre!(
                "No Spotify credentials configured. Set spotify.access_token, or \
                 spotify.client_id, spotify.client_secret and spotify.refresh_token \
                 (or the matching SPOTIFY_* environment variables)"
            )),
        }
    }
}

/// Spotify rejects search limits above this.
const MAX_SEARCH_LIMIT: u32 = 50;
/// Spotify accepts at most this many items per add call.
const MAX_BATCH_SIZE: usize = 100;

/// `value` clamped into `min..=max`, warning when it had to change.
fn clamp_setting<T>(name: &str, value: T, min: T, max: T) -> T
where
    T: Ord + Copy + std::fmt::Display,
{
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::warn!(
            "transfer.{} = {} is outside {}..={}, using {}",
            name,
            value,
            min,
            max,
            clamped
        );
    }
    clamped
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub concurrency: usize,
    pub search_limit: u32,
    pub batch_size: usize,
    pub add_max_attempts: u32,
    pub default_retry_after_secs: u64,
    pub search_jitter_ms: [u64; 2],
    pub rate_limit_jitter_ms: [u64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_timeout_secs: Option<u64>,
    pub not_found_directory: String,
    pub sort_not_found_by_ordinal: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            search_limit: 5,
            batch_size: 100,
            add_max_attempts: 3,
            default_retry_after_secs: 1,
            search_jitter_ms: [100, 300],
            rate_limit_jitter_ms: [500, 1500],
            record_timeout_secs: None,
            not_found_directory: "not_found_songs".to_string(),
            sort_not_found_by_ordinal: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("trackswap").join("config.toml"))
    }

    /// Load the default config file, or built-in defaults when there is none.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config to the default path unless a file is already there.
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or(eyre!("Could not determine config directory"))?;
        if path.exists() {
            log::info!("Config already exists at {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(&Self::default())
            .wrap_err("Failed to serialize default config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    pub fn not_found_directory(&self) -> PathBuf {
        self.expand_path(&self.transfer.not_found_directory)
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        let transfer = &self.transfer;
        let default_retry_after = Duration::from_secs(transfer.default_retry_after_secs);
        let rate_limit_jitter =
            JitterRange::from_millis(transfer.rate_limit_jitter_ms[0], transfer.rate_limit_jitter_ms[1]);

        TransferSettings {
            concurrency: transfer.concurrency,
            resolver: ResolverSettings {
                search_limit: clamp_setting(
                    "search_limit",
                    transfer.search_limit,
                    1,
                    MAX_SEARCH_LIMIT,
                ),
                search_jitter: JitterRange::from_millis(
                    transfer.search_jitter_ms[0],
                    transfer.search_jitter_ms[1],
                ),
                rate_limit_jitter,
                default_retry_after,
                record_timeout: transfer.record_timeout_secs.map(Duration::from_secs),
            },
            commit: CommitSettings {
                batch_size: clamp_setting("batch_size", transfer.batch_size, 1, MAX_BATCH_SIZE),
                max_attempts: transfer.add_max_attempts,
                rate_limit_jitter,
                default_retry_after,
            },
            not_found_directory: self.not_found_directory(),
            sort_not_found_by_ordinal: transfer.sort_not_found_by_ordinal,
        }
    }
}

//! Client configuration.
//!
//! A single JSON document describes where the notes API lives and how long
//! tokens and the edit debounce window last. Every field has a default, so a
//! missing or partial file is valid; environment variables override the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option, MAX_LIFETIME_SECS};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 900;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 604_800;
const DEFAULT_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_BASE_URL: &str = "SCRAWL_API_BASE_URL";
pub const ENV_DEBOUNCE_MS: &str = "SCRAWL_DEBOUNCE_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the notes API, without a trailing slash
    pub api_base_url: String,
    /// Lifetime of an access token and of the cookie carrying it
    pub access_token_ttl_secs: u64,
    /// Lifetime of the token pair in the durable store
    pub refresh_token_ttl_secs: u64,
    /// Quiescence window before buffered edits are flushed
    pub debounce_ms: u64,
    /// Upper bound the HTTP transport applies to a single request
    pub http_timeout_secs: u64,
    /// Treat access tokens as expired this many seconds early
    pub expiry_skew_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            expiry_skew_secs: 0,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Failed to read config at {}: {}",
                path.display(),
                error
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {}",
                path.display(),
                error
            ))
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;
        std::fs::write(path, serialized).map_err(|error| {
            Error::Config(format!(
                "Failed to write config at {}: {}",
                path.display(),
                error
            ))
        })
    }

    /// Apply `SCRAWL_API_BASE_URL` and `SCRAWL_DEBOUNCE_MS` on top of the
    /// loaded values.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(ENV_API_BASE_URL).ok(),
            std::env::var(ENV_DEBOUNCE_MS).ok(),
        )
    }

    pub fn with_overrides(
        mut self,
        api_base_url: Option<String>,
        debounce_ms: Option<String>,
    ) -> Result<Self> {
        if let Some(url) = normalize_text_option(api_base_url) {
            self.api_base_url = url;
        }
        if let Some(raw) = normalize_text_option(debounce_ms) {
            self.debounce_ms = raw.parse().map_err(|_| {
                Error::Config(format!("{ENV_DEBOUNCE_MS} must be a whole number, got '{raw}'"))
            })?;
        }
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api_base_url) {
            return Err(Error::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        if self.access_token_ttl_secs == 0 || self.refresh_token_ttl_secs == 0 {
            return Err(Error::Config("token lifetimes must be non-zero".to_string()));
        }
        if self.access_token_ttl_secs > MAX_LIFETIME_SECS
            || self.refresh_token_ttl_secs > MAX_LIFETIME_SECS
        {
            return Err(Error::Config(format!(
                "token lifetimes must not exceed {MAX_LIFETIME_SECS} seconds"
            )));
        }
        if self.debounce_ms == 0 {
            return Err(Error::Config("debounce_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn normalize(&mut self) {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
    }
}

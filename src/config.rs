//! Configuration types for feed definitions
//!
//! A feed is one paginated HTTP endpoint described in YAML: where it lives,
//! how its pages are decoded, and how the paginator over it behaves.

use crate::decode::{CursorSource, DecoderConfig};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::pagination::PaginatorOptions;
use crate::types::{BackoffType, StringMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

// ============================================================================
// Feed Config
// ============================================================================

/// Complete feed configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed name, used in logs
    pub name: String,

    /// Base URL; relative cursors are resolved against it
    pub base_url: String,

    /// Path of the first page, relative to `base_url`
    #[serde(default)]
    pub path: String,

    /// Query parameters sent with the first page
    #[serde(default)]
    pub query: StringMap,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: StringMap,

    /// Path to the items array (the body itself when unset)
    #[serde(default)]
    pub items_path: Option<String>,

    /// Where the next-page cursor comes from
    #[serde(default)]
    pub cursor: CursorSource,

    /// Dot path to an item's identity; pages merge distinct by it
    #[serde(default)]
    pub dedup_key: Option<String>,

    /// Paginator behaviour
    #[serde(default)]
    pub pagination: PaginatorOptions,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,
}

impl FeedConfig {
    /// Create a minimal feed config
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            path: String::new(),
            query: StringMap::new(),
            headers: StringMap::new(),
            items_path: None,
            cursor: CursorSource::None,
            dedup_key: None,
            pagination: PaginatorOptions::default(),
            http: HttpConfig::default(),
        }
    }

    /// Set the first-page path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the items path
    #[must_use]
    pub fn with_items_path(mut self, path: impl Into<String>) -> Self {
        self.items_path = Some(path.into());
        self
    }

    /// Set the cursor source
    #[must_use]
    pub fn with_cursor(mut self, cursor: CursorSource) -> Self {
        self.cursor = cursor;
        self
    }

    /// Add a default query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set the dedup key
    #[must_use]
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Set the paginator options
    #[must_use]
    pub fn with_pagination(mut self, options: PaginatorOptions) -> Self {
        self.pagination = options;
        self
    }

    /// Set the HTTP configuration
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("base_url", format!("'{}': {e}", self.base_url)))
    }

    /// Decoder settings for this feed
    pub fn decoder_config(&self) -> DecoderConfig {
        let config = DecoderConfig::new().with_cursor(self.cursor.clone());
        match &self.items_path {
            Some(path) => config.with_items_path(path.clone()),
            None => config,
        }
    }

    /// HTTP client settings for this feed
    pub fn client_config(&self) -> HttpClientConfig {
        let mut config = self.http.to_client_config();
        config.default_headers.extend(self.headers.clone());
        config
    }

    /// Validate the definition
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("Feed name cannot be empty"));
        }

        if self.base_url.trim().is_empty() {
            return Err(Error::missing_field("base_url"));
        }
        let base = self.base_url()?;
        if base.cannot_be_a_base() {
            return Err(Error::invalid_value(
                "base_url",
                format!("'{}' cannot be used as a base URL", self.base_url),
            ));
        }

        if let CursorSource::NextUrl { path } = &self.cursor {
            if path.trim().is_empty() {
                return Err(Error::invalid_value(
                    "cursor.path",
                    "next_url cursor requires a path",
                ));
            }
        }

        if let Some(key) = &self.dedup_key {
            if key.trim().is_empty() {
                return Err(Error::invalid_value("dedup_key", "cannot be empty"));
            }
        }

        self.http.validate()
    }
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Rate limiting; unlimited when absent
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffConfig::default(),
            rate_limit: None,
        }
    }
}

impl HttpConfig {
    /// Convert into client settings
    pub fn to_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.retry_backoff.initial_ms),
            max_backoff: Duration::from_millis(self.retry_backoff.max_ms),
            backoff_type: self.retry_backoff.backoff_type,
            rate_limit: self.rate_limit.as_ref().map(|r| {
                RateLimiterConfig::new(
                    r.requests_per_second,
                    r.burst.unwrap_or(r.requests_per_second),
                )
            }),
            ..HttpClientConfig::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(Error::invalid_value(
                "http.timeout_seconds",
                "must be greater than 0",
            ));
        }
        if self.retry_backoff.initial_ms > self.retry_backoff.max_ms {
            return Err(Error::invalid_value(
                "http.retry_backoff",
                "initial_ms cannot exceed max_ms",
            ));
        }
        if let Some(rate) = &self.rate_limit {
            if rate.requests_per_second == 0 {
                return Err(Error::invalid_value(
                    "http.rate_limit.requests_per_second",
                    "must be greater than 0",
                ));
            }
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Backoff configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    60000
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per second limit
    pub requests_per_second: u32,

    /// Burst size, defaults to `requests_per_second`
    #[serde(default)]
    pub burst: Option<u32>,
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate a feed definition from a YAML file
pub fn load_feed_config(path: impl AsRef<Path>) -> Result<FeedConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read feed file '{}'", path.display()))?;
    load_feed_config_from_str(&content)
}

/// Load and validate a feed definition from a YAML string
pub fn load_feed_config_from_str(yaml: &str) -> Result<FeedConfig> {
    let config: FeedConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

//! Sync Configuration Settings
//!
//! Configuration types for the synchronization layer, loaded from environment
//! variables. Every endpoint is derived from one origin unless overridden.

use std::time::Duration;

use reqwest::Url;

/// Origin used when `FLEET_ORIGIN` is not set.
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// Resolved endpoints of the fleet manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `scheme://host[:port]` of the fleet manager.
    pub origin: String,
    /// WebSocket URL of the push stream.
    pub stream_url: String,
    /// Base URL every REST path is appended to.
    pub api_base: String,
    /// Top-level health URL.
    pub health_url: String,
}

impl Endpoints {
    /// Derive all endpoints from an `http`/`https` origin.
    ///
    /// The stream uses `ws` for `http` and `wss` for `https`, at path `/ws`.
    /// REST lives under `/api`, health at `/health`. Any path on `origin` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `origin` is not an absolute `http`/`https` URL.
    pub fn from_origin(origin: &str) -> Result<Self, ConfigError> {
        let url = parse_url("FLEET_ORIGIN", origin)?;
        let stream_scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ConfigError::UnsupportedScheme {
                    key: "FLEET_ORIGIN".to_string(),
                    scheme: other.to_string(),
                });
            }
        };

        let origin = url.origin().ascii_serialization();
        let authority = origin
            .split_once("://")
            .map_or(origin.as_str(), |(_, rest)| rest);

        Ok(Self {
            stream_url: format!("{stream_scheme}://{authority}/ws"),
            api_base: format!("{origin}/api"),
            health_url: format!("{origin}/health"),
            origin,
        })
    }

    /// Use a different stream URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute `ws`/`wss` URL.
    pub fn with_stream_url(mut self, url: &str) -> Result<Self, ConfigError> {
        let parsed = parse_url("FLEET_STREAM_URL", url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(ConfigError::UnsupportedScheme {
                key: "FLEET_STREAM_URL".to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }
        self.stream_url = url.to_string();
        Ok(self)
    }

    /// Use a different REST base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute `http`/`https` URL.
    pub fn with_api_base(mut self, url: &str) -> Result<Self, ConfigError> {
        let parsed = parse_url("FLEET_API_URL", url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                key: "FLEET_API_URL".to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }
        self.api_base = url.trim_end_matches('/').to_string();
        Ok(self)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            stream_url: "ws://localhost:8080/ws".to_string(),
            api_base: "http://localhost:8080/api".to_string(),
            health_url: "http://localhost:8080/health".to_string(),
        }
    }
}

/// Stream connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// WebSocket URL.
    pub url: String,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Jitter fraction applied to each delay (0 = exact schedule).
    pub reconnect_jitter: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: Endpoints::default().stream_url,
            reconnect_delay_initial: Duration::from_millis(1000),
            reconnect_delay_max: Duration::from_millis(30_000),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 10,
        }
    }
}

/// REST client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestSettings {
    /// Base URL every REST path is appended to.
    pub base_url: String,
    /// Top-level health URL.
    pub health_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RestSettings {
    fn default() -> Self {
        let endpoints = Endpoints::default();
        Self {
            base_url: endpoints.api_base,
            health_url: endpoints.health_url,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilitySettings {
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

/// Complete synchronization layer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Fleet manager origin.
    pub origin: String,
    /// Stream connection settings.
    pub stream: StreamSettings,
    /// REST client settings.
    pub rest: RestSettings,
    /// Observability settings.
    pub observability: ObservabilitySettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            stream: StreamSettings::default(),
            rest: RestSettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

impl SyncConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint variable is not a valid URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// Unset or empty variables use defaults; numeric values that do not
    /// parse fall back to defaults as well.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint variable is not a valid URL.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let origin = var("FLEET_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let mut endpoints = Endpoints::from_origin(origin.trim())?;
        if let Some(url) = var("FLEET_STREAM_URL") {
            endpoints = endpoints.with_stream_url(url.trim())?;
        }
        if let Some(url) = var("FLEET_API_URL") {
            endpoints = endpoints.with_api_base(url.trim())?;
        }

        let stream_defaults = StreamSettings::default();
        let stream = StreamSettings {
            url: endpoints.stream_url,
            reconnect_delay_initial: parse_duration_millis(
                var("FLEET_RECONNECT_DELAY_INITIAL_MS"),
                stream_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_duration_millis(
                var("FLEET_RECONNECT_DELAY_MAX_MS"),
                stream_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_or(
                var("FLEET_RECONNECT_MULTIPLIER"),
                stream_defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_or(
                var("FLEET_RECONNECT_JITTER"),
                stream_defaults.reconnect_jitter,
            ),
            max_reconnect_attempts: parse_or(
                var("FLEET_MAX_RECONNECT_ATTEMPTS"),
                stream_defaults.max_reconnect_attempts,
            ),
        };

        let rest = RestSettings {
            base_url: endpoints.api_base,
            health_url: endpoints.health_url,
            timeout: parse_duration_secs(
                var("FLEET_HTTP_TIMEOUT_SECS"),
                RestSettings::default().timeout,
            ),
        };

        let observability = ObservabilitySettings {
            metrics_port: parse_or(var("FLEET_METRICS_PORT"), 0),
        };

        Ok(Self {
            origin: endpoints.origin,
            stream,
            rest,
            observability,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An endpoint is not a valid absolute URL.
    #[error("{key} is not a valid URL ({value}): {reason}")]
    InvalidUrl {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// An endpoint uses a scheme that does not fit its role.
    #[error("{key} has unsupported scheme `{scheme}`")]
    UnsupportedScheme {
        /// Variable name.
        key: String,
        /// Offending scheme.
        scheme: String,
    },
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

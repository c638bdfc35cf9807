//! Application configuration loaded from environment variables.
//!
//! # Required
//!
//! - `STORE_URI`: key registry address (`mongodb://...`, or `memory://` for a
//!   process-local store)
//! - `SERVICE_NAME`: this service's declared identity
//! - `JWT_SECRET`: HMAC secret for user-plane bearer tokens
//!
//! # Service Plane
//!
//! - `BOOTSTRAP_TOKEN`: one-time secret letting a bootstrap-eligible service
//!   register its first key (feature inert when unset or empty)
//! - `BOOTSTRAP_SERVICES`: comma-separated bootstrap-eligible names (default: `auth`)
//! - `SYNC_WRITERS`: comma-separated services allowed to call key sync
//!   (default: `auth`; empty allows any admitted service)
//!
//! Service names in `SERVICE_NAME`, `BOOTSTRAP_SERVICES` and `SYNC_WRITERS`
//! must be 1-128 ASCII alphanumerics, dots, underscores or hyphens; the key
//! registry accepts no other names, so anything else fails at startup.
//!
//! # Prefixes
//!
//! [`Config::from_env_with_prefix`] reads every variable as `<PREFIX><NAME>`,
//! so several gated services can share one environment file.

use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::validation::validate_service_name;

/// Default route catalog endpoint.
pub const DEFAULT_ROUTE_CATALOG_URL: &str = "http://rbac:5001/api/v1/routes";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Maximum request body size in bytes (default: 64KB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Key Store Configuration
    // =========================================================================
    pub store_uri: String,

    pub store_username: Option<String>,

    pub store_password: Option<String>,

    /// Database holding the key collection (default: "serviceauth")
    pub store_database: String,

    /// Collection holding one document per service (default: "service_keys")
    pub store_collection: String,

    /// Upper bound for every store call on the request path (default: 2s)
    pub store_timeout: Duration,

    /// Bound for the startup health check and connection establishment (default: 2s)
    pub store_connect_timeout: Duration,

    // =========================================================================
    // Trust Configuration
    // =========================================================================
    pub service_name: String,

    pub bootstrap_token: Option<String>,

    pub bootstrap_services: Vec<String>,

    pub sync_writers: Vec<String>,

    pub jwt_secret: String,

    // =========================================================================
    // Announcements
    // =========================================================================
    /// Identity-issuing service base URL; self-registration is skipped when unset.
    pub auth_service_url: Option<String>,

    /// Route catalog endpoint; `None` disables the route push.
    pub route_catalog_url: Option<String>,

    /// Delay before pushing routes, giving the listener time to come up.
    pub route_catalog_delay: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Emit JSON log lines instead of text (`LOG_FORMAT=json`)
    pub log_json: bool,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a required variable is missing or
    /// any value fails to parse or validate.
    pub fn from_env() -> AppResult<Self> {
        Self::from_env_with_prefix("")
    }

    /// Load configuration reading every variable as `<prefix><NAME>`.
    pub fn from_env_with_prefix(prefix: &str) -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(prefix, |name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { prefix, lookup };

        let config = Self {
            // Server
            host: vars.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: vars.parse("PORT", 3000)?,
            max_request_body_size: vars.parse("MAX_REQUEST_BODY_SIZE", 64 * 1024)?,

            // Key store
            store_uri: vars.required("STORE_URI")?,
            store_username: vars.non_empty("STORE_USERNAME"),
            store_password: vars.non_empty("STORE_PASSWORD"),
            store_database: vars
                .non_empty("STORE_DATABASE")
                .unwrap_or_else(|| "serviceauth".to_string()),
            store_collection: vars
                .non_empty("STORE_COLLECTION")
                .unwrap_or_else(|| "service_keys".to_string()),
            store_timeout: Duration::from_millis(vars.parse("STORE_TIMEOUT_MS", 2000)?),
            store_connect_timeout: Duration::from_secs(
                vars.parse("STORE_CONNECT_TIMEOUT_SECS", 2)?,
            ),

            // Trust
            service_name: vars.required("SERVICE_NAME")?,
            bootstrap_token: vars.non_empty("BOOTSTRAP_TOKEN"),
            bootstrap_services: vars.list("BOOTSTRAP_SERVICES", "auth"),
            sync_writers: vars.list("SYNC_WRITERS", "auth"),
            jwt_secret: vars.required("JWT_SECRET")?,

            // Announcements
            auth_service_url: vars
                .non_empty("AUTH_SERVICE_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
            route_catalog_url: match vars.get("ROUTE_CATALOG_URL") {
                None => Some(DEFAULT_ROUTE_CATALOG_URL.to_string()),
                Some(url) if url.trim().is_empty() => None,
                Some(url) => Some(url.trim().to_string()),
            },
            route_catalog_delay: Duration::from_millis(vars.parse("ROUTE_CATALOG_DELAY_MS", 2000)?),

            // Observability (RUST_LOG is never prefixed)
            log_level: (vars.lookup)("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_json: vars
                .get("LOG_FORMAT")
                .is_some_and(|f| f.eq_ignore_ascii_case("json")),
            metrics_port: vars.parse("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    fn validate(&self) -> AppResult<()> {
        if self.store_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "STORE_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.store_connect_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "STORE_CONNECT_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.store_password.is_some() && self.store_username.is_none() {
            return Err(AppError::ConfigError(
                "STORE_PASSWORD requires STORE_USERNAME".to_string(),
            ));
        }

        let names = std::iter::once(("SERVICE_NAME", &self.service_name))
            .chain(self.bootstrap_services.iter().map(|n| ("BOOTSTRAP_SERVICES", n)))
            .chain(self.sync_writers.iter().map(|n| ("SYNC_WRITERS", n)));
        for (var, name) in names {
            validate_service_name(name).map_err(|e| {
                AppError::ConfigError(format!("Invalid {var} entry '{name}': {e}"))
            })?;
        }

        if self.bootstrap_token.is_some() && self.bootstrap_services.is_empty() {
            return Err(AppError::ConfigError(
                "BOOTSTRAP_TOKEN is set but BOOTSTRAP_SERVICES is empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the bootstrap exception can ever apply.
    pub fn bootstrap_enabled(&self) -> bool {
        self.bootstrap_token.is_some()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }
}

/// Prefixed view over a variable source.
struct Vars<'a, F> {
    prefix: &'a str,
    lookup: F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn key(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&self.key(name))
    }

    fn non_empty(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.non_empty(name).ok_or_else(|| {
            AppError::ConfigError(format!(
                "Missing required environment variable: {}",
                self.key(name)
            ))
        })
    }

    fn parse<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(val) => val.trim().parse().map_err(|e| {
                AppError::ConfigError(format!("Invalid {}: {e}", self.key(name)))
            }),
            None => Ok(default),
        }
    }

    fn list(&self, name: &str, default: &str) -> Vec<String> {
        self.get(name)
            .unwrap_or_else(|| default.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Development/test configuration backed by the in-memory store.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_request_body_size: 64 * 1024,
            store_uri: crate::store::MEMORY_STORE_URI.to_string(),
            store_username: None,
            store_password: None,
            store_database: "serviceauth".to_string(),
            store_collection: "service_keys".to_string(),
            store_timeout: Duration::from_secs(2),
            store_connect_timeout: Duration::from_secs(2),
            service_name: "gateway".to_string(),
            bootstrap_token: None,
            bootstrap_services: vec!["auth".to_string()],
            sync_writers: vec!["auth".to_string()],
            jwt_secret: "dev-only-jwt-secret".to_string(),
            auth_service_url: None,
            route_catalog_url: None,
            route_catalog_delay: Duration::from_secs(2),
            log_level: "info".to_string(),
            log_json: false,
            metrics_port: 0,
        }
    }
}

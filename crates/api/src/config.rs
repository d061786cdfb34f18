//! Server and coordinator configuration loaded from environment variables.
//!
//! All values have defaults suitable for local development. Parsing goes
//! through a lookup function so tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use waveline_dispatch::{RetryPolicy, RetryStrategy};
use waveline_engine::CoordinatorConfig;

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Reads a variable, returning `None` when it is unset.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

fn string_or(lookup: Lookup<'_>, var: &str, default: &str) -> String {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(
    lookup: Lookup<'_>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `120`). Must outlast a
    /// dispatch that exhausts its retries.
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load from the process environment.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `120`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let cors_origins = string_or(lookup, "CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|_| ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    expected: "a comma-separated list of origins",
                    value: origin.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            host: string_or(lookup, "HOST", "0.0.0.0"),
            port: parse_or(lookup, "PORT", 3000, "a valid port number")?,
            cors_origins,
            request_timeout_secs: parse_or(
                lookup,
                "REQUEST_TIMEOUT_SECS",
                120,
                "a whole number of seconds",
            )?,
            shutdown_timeout_secs: parse_or(
                lookup,
                "SHUTDOWN_TIMEOUT_SECS",
                30,
                "a whole number of seconds",
            )?,
        })
    }

    /// Fail when a request could time out while its dispatch is still
    /// retrying against the migration service.
    pub fn check_dispatch_budget(&self, settings: &CoordinatorSettings) -> Result<(), ConfigError> {
        let budget = settings.dispatch_budget();
        if Duration::from_secs(self.request_timeout_secs) <= budget {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                expected: "longer than HTTP_RETRY_ATTEMPTS x HTTP_REQUEST_TIMEOUT_SECS plus retry delays",
                value: format!("{} (dispatch may take {}s)", self.request_timeout_secs, budget.as_secs()),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Where job and wave records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Where lock records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    File,
    Postgres,
}

impl FromStr for LockBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(()),
        }
    }
}

/// Everything needed to wire the coordination engine.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub engine: CoordinatorConfig,
    pub retry: RetryPolicy,
    /// Per-attempt timeout of outbound HTTP calls.
    pub http_timeout: Duration,
    pub migration_service_url: String,
    pub lock_dir: PathBuf,
    pub store_backend: StoreBackend,
    pub lock_backend: LockBackend,
    pub database_url: Option<String>,
}

impl CoordinatorSettings {
    /// Load from the process environment.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `LIVENESS_SWEEP_INTERVAL_SECS` | `10`                    |
    /// | `STALE_LOCK_THRESHOLD_SECS`    | `600`                   |
    /// | `HTTP_RETRY_ATTEMPTS`          | `3`                     |
    /// | `HTTP_RETRY_DELAY_SECS`        | `5`                     |
    /// | `HTTP_RETRY_STRATEGY`          | `fixed`                 |
    /// | `HTTP_REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `PUBLIC_BASE_URL`              | `http://localhost:3000` |
    /// | `MIGRATION_SERVICE_URL`        | `http://localhost:8080` |
    /// | `LOCK_DIR`                     | `./data/locks`          |
    /// | `ARTIFACT_DIR`                 | `./data/artifacts`      |
    /// | `STORE_BACKEND`                | `postgres`              |
    /// | `LOCK_BACKEND`                 | `file`                  |
    /// | `DATABASE_URL`                 | required for postgres   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        const SECONDS: &str = "a whole number of seconds";

        let sweep_secs: u64 = parse_or(lookup, "LIVENESS_SWEEP_INTERVAL_SECS", 10, SECONDS)?;
        if sweep_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "LIVENESS_SWEEP_INTERVAL_SECS",
                expected: "greater than zero",
                value: "0".into(),
            });
        }
        let stale_secs: u64 = parse_or(lookup, "STALE_LOCK_THRESHOLD_SECS", 600, SECONDS)?;

        let retry = RetryPolicy {
            max_attempts: parse_or(lookup, "HTTP_RETRY_ATTEMPTS", 3, "a positive integer")?,
            delay: Duration::from_secs(parse_or(lookup, "HTTP_RETRY_DELAY_SECS", 5, SECONDS)?),
            strategy: parse_or(
                lookup,
                "HTTP_RETRY_STRATEGY",
                RetryStrategy::Fixed,
                "'fixed' or 'exponential'",
            )?,
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "HTTP_RETRY_ATTEMPTS",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let store_backend = parse_or(
            lookup,
            "STORE_BACKEND",
            StoreBackend::Postgres,
            "'postgres' or 'memory'",
        )?;
        let lock_backend = parse_or(lookup, "LOCK_BACKEND", LockBackend::File, "'file' or 'postgres'")?;
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let needs_database =
            store_backend == StoreBackend::Postgres || lock_backend == LockBackend::Postgres;
        if needs_database && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            engine: CoordinatorConfig {
                sweep_interval: Duration::from_secs(sweep_secs),
                stale_threshold: Duration::from_secs(stale_secs),
                public_base_url: string_or(lookup, "PUBLIC_BASE_URL", "http://localhost:3000"),
                artifact_dir: PathBuf::from(string_or(lookup, "ARTIFACT_DIR", "./data/artifacts")),
            },
            retry,
            http_timeout: Duration::from_secs(parse_or(
                lookup,
                "HTTP_REQUEST_TIMEOUT_SECS",
                30,
                SECONDS,
            )?),
            migration_service_url: string_or(
                lookup,
                "MIGRATION_SERVICE_URL",
                "http://localhost:8080",
            ),
            lock_dir: PathBuf::from(string_or(lookup, "LOCK_DIR", "./data/locks")),
            store_backend,
            lock_backend,
            database_url,
        })
    }
}

impl CoordinatorSettings {
    /// Longest a single dispatch call can take, retries included.
    pub fn dispatch_budget(&self) -> Duration {
        self.retry.worst_case(self.http_timeout)
    }
}

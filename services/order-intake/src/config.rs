//! Service configuration, loaded from environment variables.
//!
//! A `.env` file in the working directory (or an ancestor) is read first when
//! present; real environment variables take precedence.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors surfaced at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which ledger/publisher adapters to wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Postgres ledger + Kafka publisher
    #[default]
    External,
    /// Process-local adapters, for local runs and smoke tests
    Memory,
}

impl Backend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "external" => Some(Self::External),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Build metadata reported by `/__version` and `/readyz`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub env: String,
    pub version: String,
    pub git_sha: String,
    pub build_ts: String,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            env: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: "dev".to_string(),
            build_ts: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub backend: Backend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub kafka_brokers: Option<String>,
    pub orders_topic: String,
    /// Upper-cased allow-list; empty means every symbol is allowed
    pub allowed_symbols: HashSet<String>,
    pub readiness_timeout: Duration,
    pub request_timeout: Duration,
    pub dependency_timeout: Duration,
    pub idempotency_ttl: Duration,
    pub log_format: LogFormat,
    pub build: BuildInfo,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend: Backend::External,
            database_url: None,
            db_max_connections: 50,
            kafka_brokers: None,
            orders_topic: "orders.in".to_string(),
            allowed_symbols: HashSet::new(),
            readiness_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_millis(5_000),
            dependency_timeout: Duration::from_millis(3_000),
            idempotency_ttl: Duration::from_secs(86_400),
            log_format: LogFormat::Text,
            build: BuildInfo::default(),
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let listen_addr = match get("LISTEN_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "LISTEN_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.listen_addr,
        };

        let backend = match get("INTAKE_BACKEND") {
            Some(raw) => Backend::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "INTAKE_BACKEND",
                value: raw.clone(),
                reason: "expected external or memory".to_string(),
            })?,
            None => defaults.backend,
        };

        let database_url = get("DATABASE_URL");
        let kafka_brokers = get("KAFKA_BROKERS");
        if backend == Backend::External {
            if database_url.is_none() {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
            if kafka_brokers.is_none() {
                return Err(ConfigError::Missing("KAFKA_BROKERS"));
            }
        }

        let log_format = match get("LOG_FORMAT").map(|v| v.to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(v) if v == "text" => LogFormat::Text,
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: v,
                    reason: "expected text or json".to_string(),
                });
            }
        };

        let build = BuildInfo {
            env: get("APP_ENV").unwrap_or_default(),
            version: get("APP_VERSION").unwrap_or(defaults.build.version),
            git_sha: get("GIT_SHA").unwrap_or(defaults.build.git_sha),
            build_ts: get("BUILD_TS").unwrap_or_default(),
        };

        Ok(Self {
            listen_addr,
            backend,
            database_url,
            db_max_connections: parse_number(&get, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            kafka_brokers,
            orders_topic: get("ORDERS_TOPIC").unwrap_or(defaults.orders_topic),
            allowed_symbols: get("ALLOWED_SYMBOLS")
                .map(|raw| parse_symbol_list(&raw))
                .unwrap_or_default(),
            readiness_timeout: parse_millis(&get, "READINESS_TIMEOUT_MS", defaults.readiness_timeout)?,
            request_timeout: parse_millis(&get, "REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            dependency_timeout: parse_millis(&get, "DEPENDENCY_TIMEOUT_MS", defaults.dependency_timeout)?,
            idempotency_ttl: Duration::from_secs(parse_number(
                &get,
                "IDEMPOTENCY_TTL_SECS",
                defaults.idempotency_ttl.as_secs(),
            )?),
            log_format,
            build,
        })
    }
}

/// Split a comma separated symbol list, trimming and upper-casing entries.
pub fn parse_symbol_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

fn parse_number<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_millis<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let millis: u64 = parse_number(get, var, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

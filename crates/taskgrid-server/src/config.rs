//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use taskgrid_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_HOURS, DEFAULT_WS_QUEUE_CAPACITY,
    MAX_SESSION_TTL_HOURS,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./taskgrid.db`
    pub database_path: PathBuf,

    /// Human-readable name for this instance, reported by `/info`.
    /// Env: `INSTANCE_NAME`
    /// Default: `"TaskGrid"`
    pub instance_name: String,

    /// Whether `/auth/register` accepts new accounts.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Lifetime of a login session, between one hour and ten years.
    /// Env: `SESSION_TTL_HOURS`
    /// Default: `720`
    pub session_ttl_hours: i64,

    /// Outbound event queue per socket connection. Events beyond this are
    /// dropped for that connection.
    /// Env: `WS_QUEUE_CAPACITY`
    /// Default: `64`
    pub ws_queue_capacity: usize,

    /// Sustained requests per second per client IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `10`
    pub rate_limit_per_sec: f64,

    /// Burst size per client IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./taskgrid.db"),
            instance_name: "TaskGrid".to_string(),
            registration_open: true,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            ws_queue_capacity: DEFAULT_WS_QUEUE_CAPACITY,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            parse_into(&mut config.http_addr, "HTTP_ADDR", &addr);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = lookup("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        if let Some(val) = lookup("SESSION_TTL_HOURS") {
            parse_in_range(
                &mut config.session_ttl_hours,
                "SESSION_TTL_HOURS",
                &val,
                1..=MAX_SESSION_TTL_HOURS,
            );
        }

        if let Some(val) = lookup("WS_QUEUE_CAPACITY") {
            parse_into(&mut config.ws_queue_capacity, "WS_QUEUE_CAPACITY", &val);
            config.ws_queue_capacity = config.ws_queue_capacity.max(1);
        }

        if let Some(val) = lookup("RATE_LIMIT_PER_SEC") {
            parse_into(&mut config.rate_limit_per_sec, "RATE_LIMIT_PER_SEC", &val);
        }

        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            parse_into(&mut config.rate_limit_burst, "RATE_LIMIT_BURST", &val);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}

fn parse_into<T: std::str::FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
        }
    }
}

fn parse_in_range<T>(slot: &mut T, key: &str, raw: &str, range: RangeInclusive<T>)
where
    T: std::str::FromStr + PartialOrd,
{
    match raw.trim().parse::<T>() {
        Ok(value) if range.contains(&value) => *slot = value,
        _ => {
            tracing::warn!(key, value = %raw, "Configuration value out of range, using default");
        }
    }
}

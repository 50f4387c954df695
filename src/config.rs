use crate::error::ConfigError;
use crate::models::EntityKind;
use std::env;
use std::time::Duration;

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Configuration for the telematics API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("OASA_BASE_URL", "http://telematics.oasa.gr"),
            request_timeout: env_duration_millis("OASA_REQUEST_TIMEOUT_MS", 10_000),
            connect_timeout: env_duration_millis("OASA_CONNECT_TIMEOUT_MS", 10_000),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Batch capacities and tuning for sync runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub line_batch_size: usize,
    pub route_batch_size: usize,
    pub stop_batch_size: usize,
    pub route_stop_batch_size: usize,
    /// Relax durability settings inside each sync transaction.
    pub bulk_tuning: bool,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            line_batch_size: env_usize(
                "SYNC_LINE_BATCH_SIZE",
                EntityKind::Line.default_batch_size(),
            ),
            route_batch_size: env_usize(
                "SYNC_ROUTE_BATCH_SIZE",
                EntityKind::Route.default_batch_size(),
            ),
            stop_batch_size: env_usize(
                "SYNC_STOP_BATCH_SIZE",
                EntityKind::Stop.default_batch_size(),
            ),
            route_stop_batch_size: env_usize(
                "SYNC_ROUTE_STOP_BATCH_SIZE",
                EntityKind::RouteStop.default_batch_size(),
            ),
            bulk_tuning: env_bool("SYNC_BULK_TUNING", false),
        }
    }

    /// Capacity of the insert buffer for `kind`, never below one.
    pub fn batch_size(&self, kind: EntityKind) -> usize {
        let size = match kind {
            EntityKind::Line => self.line_batch_size,
            EntityKind::Route => self.route_batch_size,
            EntityKind::Stop => self.stop_batch_size,
            EntityKind::RouteStop => self.route_stop_batch_size,
        };
        size.max(1)
    }

    /// Same capacity for every entity type.
    pub fn uniform(batch_size: usize) -> Self {
        Self {
            line_batch_size: batch_size,
            route_batch_size: batch_size,
            stop_batch_size: batch_size,
            route_stop_batch_size: batch_size,
            bulk_tuning: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            line_batch_size: EntityKind::Line.default_batch_size(),
            route_batch_size: EntityKind::Route.default_batch_size(),
            stop_batch_size: EntityKind::Stop.default_batch_size(),
            route_stop_batch_size: EntityKind::RouteStop.default_batch_size(),
            bulk_tuning: false,
        }
    }
}

/// Connection settings for the reference-data database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        Self::with_url(url)
    }

    pub fn with_url(url: String) -> Result<Self, ConfigError> {
        if url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "DATABASE_URL",
                value: url,
            });
        }

        Ok(Self {
            url,
            max_connections: env_u32("DATABASE_MAX_CONNECTIONS", 5).max(1),
        })
    }
}

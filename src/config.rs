use crate::error::{AppError, Result};

/// Default radius of the neighbor query, in meters.
pub const NEARBY_RADIUS_M: f64 = 500.0;

/// Default age of `computed.updated_at` after which stats are recomputed (hours).
pub const STALE_THRESHOLD_HOURS: u64 = 25;

/// Default candidates per batch.
pub const BATCH_SIZE: usize = 100;

/// Default cap on concurrent work units within one batch.
pub const MAX_CONCURRENCY: usize = 16;

/// Default schedule interval (seconds) — one compute run per day.
pub const COMPUTE_INTERVAL_SECS: u64 = 86_400;

/// Default time budget for a single store call (seconds).
pub const QUERY_TIMEOUT_SECS: u64 = 30;

/// Capacity of the manual-trigger channel.
pub const TRIGGER_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Neighbor query radius in meters (NEARBY_RADIUS_M)
    pub nearby_radius_m: f64,
    /// Stats older than this are recomputed (STALE_THRESHOLD_HOURS)
    pub stale_threshold_hours: u64,
    /// Candidates per batch (BATCH_SIZE)
    pub batch_size: usize,
    /// Concurrent work units within a batch (MAX_CONCURRENCY)
    pub max_concurrency: usize,
    /// Seconds between scheduled compute runs (COMPUTE_INTERVAL_SECS)
    pub compute_interval_secs: u64,
    /// Per-store-call time budget in seconds (QUERY_TIMEOUT_SECS)
    pub query_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "listings.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            nearby_radius_m: std::env::var("NEARBY_RADIUS_M")
                .unwrap_or_default()
                .parse::<f64>()
                .unwrap_or(NEARBY_RADIUS_M),
            stale_threshold_hours: std::env::var("STALE_THRESHOLD_HOURS")
                .unwrap_or_default()
                .parse::<u64>()
                .unwrap_or(STALE_THRESHOLD_HOURS),
            batch_size: std::env::var("BATCH_SIZE")
                .unwrap_or_default()
                .parse::<usize>()
                .unwrap_or(BATCH_SIZE),
            max_concurrency: std::env::var("MAX_CONCURRENCY")
                .unwrap_or_default()
                .parse::<usize>()
                .unwrap_or(MAX_CONCURRENCY),
            compute_interval_secs: std::env::var("COMPUTE_INTERVAL_SECS")
                .unwrap_or_default()
                .parse::<u64>()
                .unwrap_or(COMPUTE_INTERVAL_SECS),
            query_timeout_secs: std::env::var("QUERY_TIMEOUT_SECS")
                .unwrap_or_default()
                .parse::<u64>()
                .unwrap_or(QUERY_TIMEOUT_SECS),
        };

        if cfg.batch_size == 0 {
            return Err(AppError::Config("BATCH_SIZE must be at least 1".to_string()));
        }
        if cfg.max_concurrency == 0 {
            return Err(AppError::Config("MAX_CONCURRENCY must be at least 1".to_string()));
        }
        if cfg.nearby_radius_m <= 0.0 {
            return Err(AppError::Config("NEARBY_RADIUS_M must be positive".to_string()));
        }

        Ok(cfg)
    }

    pub fn stale_threshold_secs(&self) -> i64 {
        (self.stale_threshold_hours * 3_600) as i64
    }
}

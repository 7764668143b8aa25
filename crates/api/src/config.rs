//! Application configuration loaded from environment variables.

use std::time::Duration;

use outbox::{OutboxProcessorConfig, RetryPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Outbox worker settings.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub enabled: bool,
    pub worker_id: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub lease: Duration,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl OutboxConfig {
    /// Builds the processor configuration for all tenants.
    pub fn processor_config(&self) -> OutboxProcessorConfig {
        OutboxProcessorConfig {
            worker_id: self.worker_id.clone(),
            batch_size: self.batch_size,
            poll_interval: self.poll_interval,
            lease: self.lease,
            concurrency: self.concurrency,
            retry: self.retry,
            ..OutboxProcessorConfig::default()
        }
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        let processor = OutboxProcessorConfig::default();
        Self {
            enabled: true,
            worker_id: processor.worker_id,
            batch_size: processor.batch_size,
            poll_interval: processor.poll_interval,
            lease: processor.lease,
            concurrency: processor.concurrency,
            retry: processor.retry,
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `json` for JSON lines, anything else for plain text
/// - `DATABASE_URL` — PostgreSQL connection string; unset uses the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `OUTBOX_ENABLED` — run the outbox worker (default: `true`)
/// - `OUTBOX_WORKER_ID`, `OUTBOX_BATCH_SIZE`, `OUTBOX_POLL_INTERVAL_MS`,
///   `OUTBOX_LEASE_SECS`, `OUTBOX_CONCURRENCY`
/// - `OUTBOX_MAX_ATTEMPTS`, `OUTBOX_BASE_DELAY_MS`, `OUTBOX_MAX_DELAY_MS` — retry policy
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub outbox: OutboxConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults.
    ///
    /// Counts and durations the outbox worker cannot run with (zero batch
    /// size, poll interval, lease, concurrency or attempts) keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let parse = |name: &str| text(name).and_then(|v| v.trim().parse::<u64>().ok());
        let positive = |name: &str| parse(name).filter(|v| *v > 0);

        let defaults = Self::default();
        let outbox = defaults.outbox;

        Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: parse("PORT")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match text("LOG_FORMAT") {
                Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: text("DATABASE_URL"),
            database_max_connections: positive("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.database_max_connections),
            outbox: OutboxConfig {
                enabled: text("OUTBOX_ENABLED")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(outbox.enabled),
                worker_id: text("OUTBOX_WORKER_ID").unwrap_or(outbox.worker_id),
                batch_size: positive("OUTBOX_BATCH_SIZE")
                    .map(|v| v as usize)
                    .unwrap_or(outbox.batch_size),
                poll_interval: positive("OUTBOX_POLL_INTERVAL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(outbox.poll_interval),
                lease: positive("OUTBOX_LEASE_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(outbox.lease),
                concurrency: positive("OUTBOX_CONCURRENCY")
                    .map(|v| v as usize)
                    .unwrap_or(outbox.concurrency),
                retry: RetryPolicy {
                    max_attempts: positive("OUTBOX_MAX_ATTEMPTS")
                        .and_then(|v| u32::try_from(v).ok())
                        .unwrap_or(outbox.retry.max_attempts),
                    base_delay: parse("OUTBOX_BASE_DELAY_MS")
                        .map(Duration::from_millis)
                        .unwrap_or(outbox.retry.base_delay),
                    max_delay: parse("OUTBOX_MAX_DELAY_MS")
                        .map(Duration::from_millis)
                        .unwrap_or(outbox.retry.max_delay),
                },
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 10,
            outbox: OutboxConfig::default(),
        }
    }
}

use std::env;
use tracing::warn;

/// Runtime configuration for the scheduling API, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_port: u16,
    /// Upper bound on any single commitment-store operation, in milliseconds.
    pub store_timeout_ms: u64,
    /// Bounded retry count for the optimistic-concurrency conflict loop.
    pub conflict_retry_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_port: env::var("BIND_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    warn!("BIND_PORT not set, defaulting to 3000");
                    3000
                }),
            store_timeout_ms: env::var("STORE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    warn!("STORE_TIMEOUT_MS not set, defaulting to 5000");
                    5000
                }),
            conflict_retry_attempts: env::var("CONFLICT_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    warn!("CONFLICT_RETRY_ATTEMPTS not set, defaulting to 3");
                    3
                }),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_port: 3000,
            store_timeout_ms: 5000,
            conflict_retry_attempts: 3,
        }
    }
}

//! Saga configuration loaded from environment variables.

use transport::DEFAULT_MAX_REDELIVERIES;

/// Saga runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SAGA_EXCHANGE` — logical exchange name (default: `"nova.orders.saga.exchange"`)
/// - `SAGA_MAX_REDELIVERIES` — redelivery budget per message (default: `3`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct SagaConfig {
    pub exchange: String,
    pub max_redeliveries: u32,
    pub log_level: String,
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            exchange: std::env::var("SAGA_EXCHANGE")
                .unwrap_or_else(|_| crate::routing::SAGA_EXCHANGE.to_string()),
            max_redeliveries: std::env::var("SAGA_MAX_REDELIVERIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_REDELIVERIES),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            exchange: crate::routing::SAGA_EXCHANGE.to_string(),
            max_redeliveries: DEFAULT_MAX_REDELIVERIES,
            log_level: "info".to_string(),
        }
    }
}

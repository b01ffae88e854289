//! Application configuration loaded from environment variables.

use domain::{Money, PricingPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL URL; in-memory stores when unset
/// - `FREE_SHIPPING_THRESHOLD_CENTS` — free-shipping cutoff (default: `15000`)
/// - `SHIPPING_FEE_CENTS` — flat shipping fee (default: `1500`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub free_shipping_threshold_cents: i64,
    pub shipping_fee_cents: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            free_shipping_threshold_cents: std::env::var("FREE_SHIPPING_THRESHOLD_CENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15000),
            shipping_fee_cents: std::env::var("SHIPPING_FEE_CENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the pricing policy derived from configuration.
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            free_shipping_threshold: Money::from_cents(self.free_shipping_threshold_cents),
            shipping_fee: Money::from_cents(self.shipping_fee_cents),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            free_shipping_threshold_cents: 15000,
            shipping_fee_cents: 1500,
        }
    }
}

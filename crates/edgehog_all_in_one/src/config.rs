use common::http::{HttpLoggingConfig, HttpServerConfig, HttpTracingConfig};
use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP configuration
    /// Webhook server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Webhook server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Path prefixes excluded from request logs and traces (comma-separated)
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Connection pool size
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// Seconds closers get to flush on shutdown
    #[serde(default = "default_closer_timeout_secs")]
    pub closer_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    4000
}

fn default_http_ignored_paths() -> String {
    "/health".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "edgehog".to_string()
}

fn default_postgres_username() -> String {
    "edgehog".to_string()
}

fn default_postgres_password() -> String {
    "edgehog".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_migrations_dir() -> String {
    "crates/common/migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "edgehog-device-events".to_string()
}

fn default_closer_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    /// Load configuration from `EDGEHOG_`-prefixed environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("EDGEHOG"))
            .build()?
            .try_deserialize()
    }

    pub fn ignored_paths(&self) -> Vec<String> {
        self.http_ignored_paths
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn http_server_config(&self) -> HttpServerConfig {
        let ignored_paths = self.ignored_paths();
        HttpServerConfig {
            host: self.http_host.clone(),
            port: self.http_port,
            logging_config: HttpLoggingConfig::new(ignored_paths.clone()),
            tracing_config: HttpTracingConfig::new(ignored_paths),
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn closer_timeout(&self) -> Duration {
        Duration::from_secs(self.closer_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "EDGEHOG_LOG_LEVEL",
        "EDGEHOG_HTTP_PORT",
        "EDGEHOG_HTTP_IGNORED_PATHS",
        "EDGEHOG_POSTGRES_MAX_POOL_SIZE",
        "EDGEHOG_OTEL_ENABLED",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: Test runs with mutex lock to prevent concurrent env access
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.http_port, 4000);
        assert_eq!(config.ignored_paths(), vec!["/health".to_string()]);
        assert!(!config.otel_enabled);
        assert_eq!(config.closer_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("EDGEHOG_LOG_LEVEL", "debug");
            std::env::set_var("EDGEHOG_HTTP_PORT", "8080");
            std::env::set_var("EDGEHOG_HTTP_IGNORED_PATHS", "/health, /metrics,");
            std::env::set_var("EDGEHOG_POSTGRES_MAX_POOL_SIZE", "3");
            std::env::set_var("EDGEHOG_OTEL_ENABLED", "true");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.http_server_config().port, 8080);
        assert_eq!(
            config.ignored_paths(),
            vec!["/health".to_string(), "/metrics".to_string()]
        );
        assert_eq!(config.postgres_config().max_pool_size, 3);
        assert!(config.telemetry_config().otel_enabled);

        clear_env();
    }
}

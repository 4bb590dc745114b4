//! Reusable HTTP server wrapping an axum [`Router`] with the logging and
//! tracing layers.
//!
//! # Example
//!
//! ```ignore
//! use common::http::{HttpServerConfig, run_http_server};
//!
//! let router = Router::new().route("/health", get(|| async { "ok" }));
//! run_http_server(HttpServerConfig::default(), router, cancellation_token).await?;
//! ```

use std::net::SocketAddr;

use anyhow::Context as _;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{HttpLoggingConfig, HttpLoggingLayer, HttpTracingConfig, HttpTracingLayer};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Logging middleware configuration.
    pub logging_config: HttpLoggingConfig,
    /// Tracing middleware configuration.
    pub tracing_config: HttpTracingConfig,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            logging_config: HttpLoggingConfig::default(),
            tracing_config: HttpTracingConfig::default(),
        }
    }
}

impl HttpServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid server address {}:{}", self.host, self.port))
    }
}

/// Apply the logging and tracing layers to a router.
///
/// The tracing layer is outermost so request log lines carry its span.
pub fn with_middleware(router: Router, config: &HttpServerConfig) -> Router {
    router
        .layer(HttpLoggingLayer::new(config.logging_config.clone()))
        .layer(HttpTracingLayer::new(config.tracing_config.clone()))
}

/// Run an HTTP server until the cancellation token fires.
pub async fn run_http_server(
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> Result<(), anyhow::Error> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", addr))?;

    debug!(address = %addr, "Starting HTTP server");

    let app = with_middleware(router, &config);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        debug!("HTTP server shutdown signal received");
    });

    match serve.await {
        Ok(_) => {
            debug!("HTTP server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("HTTP server error: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = HttpServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_socket_addr() {
        let config = HttpServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }

    #[tokio::test]
    async fn test_server_stops_on_cancellation() {
        let config = HttpServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let token = CancellationToken::new();
        token.cancel();

        let result = run_http_server(config, Router::new(), token).await;
        assert!(result.is_ok());
    }
}

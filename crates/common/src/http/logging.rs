use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{Instrument, Span, error, info, warn};

/// Configuration for HTTP request logging
#[derive(Clone, Debug)]
pub struct HttpLoggingConfig {
    /// Path prefixes that are never logged (e.g. health checks)
    pub ignored_paths: Vec<String>,
}

impl Default for HttpLoggingConfig {
    fn default() -> Self {
        Self {
            ignored_paths: vec!["/health".to_string()],
        }
    }
}

impl HttpLoggingConfig {
    pub fn new(ignored_paths: Vec<String>) -> Self {
        Self { ignored_paths }
    }

    fn should_ignore(&self, path: &str) -> bool {
        self.ignored_paths
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}

/// Tower layer that logs one line per HTTP request
#[derive(Clone)]
pub struct HttpLoggingLayer {
    config: HttpLoggingConfig,
}

impl HttpLoggingLayer {
    pub fn new(config: HttpLoggingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for HttpLoggingLayer {
    type Service = HttpLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpLoggingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HttpLoggingService<S> {
    inner: S,
    config: HttpLoggingConfig,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for HttpLoggingService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let should_ignore = self.config.should_ignore(&path);
        let start = Instant::now();
        let future = self.inner.call(req);

        // Keep log lines correlated with the request span
        let span = Span::current();

        Box::pin(
            async move {
                let result = future.await;

                if should_ignore {
                    return result;
                }

                let duration_ms = start.elapsed().as_millis();
                match &result {
                    Ok(response) if response.status().is_server_error() => {
                        error!(
                            method = %method,
                            path = %path,
                            http_status = response.status().as_u16(),
                            duration_ms = %duration_ms,
                            "{} {} - {}ms - {}",
                            method,
                            path,
                            duration_ms,
                            response.status()
                        );
                    }
                    Ok(response) if response.status().is_client_error() => {
                        warn!(
                            method = %method,
                            path = %path,
                            http_status = response.status().as_u16(),
                            duration_ms = %duration_ms,
                            "{} {} - {}ms - {}",
                            method,
                            path,
                            duration_ms,
                            response.status()
                        );
                    }
                    Ok(response) => {
                        info!(
                            method = %method,
                            path = %path,
                            http_status = response.status().as_u16(),
                            duration_ms = %duration_ms,
                            "{} {} - {}ms - {}",
                            method,
                            path,
                            duration_ms,
                            response.status()
                        );
                    }
                    Err(e) => {
                        error!(
                            method = %method,
                            path = %path,
                            duration_ms = %duration_ms,
                            error = %e,
                            "{} {} - {}ms - ERROR: {}",
                            method,
                            path,
                            duration_ms,
                            e
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::MatchedPath;
use http::{Request, Response};
use opentelemetry::{global, propagation::Extractor, trace::TraceContextExt as _};
use tower::{Layer, Service};
use tracing::{Instrument, Span, field, info_span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Configuration for HTTP tracing middleware
#[derive(Clone, Debug)]
pub struct HttpTracingConfig {
    /// List of path prefixes to skip tracing (e.g., "/health")
    pub ignored_paths: Vec<String>,
}

impl Default for HttpTracingConfig {
    fn default() -> Self {
        Self {
            ignored_paths: vec!["/health".to_string()],
        }
    }
}

impl HttpTracingConfig {
    pub fn new(ignored_paths: Vec<String>) -> Self {
        Self { ignored_paths }
    }

    fn should_ignore(&self, path: &str) -> bool {
        self.ignored_paths
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}

/// Tower layer for OpenTelemetry tracing of HTTP requests
#[derive(Clone)]
pub struct HttpTracingLayer {
    config: HttpTracingConfig,
}

impl HttpTracingLayer {
    pub fn new(config: HttpTracingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for HttpTracingLayer {
    type Service = HttpTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpTracingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

/// Service that adds OpenTelemetry tracing to HTTP requests
#[derive(Clone)]
pub struct HttpTracingService<S> {
    inner: S,
    config: HttpTracingConfig,
}

struct HttpHeaderExtractor<'a>(&'a http::HeaderMap);

impl Extractor for HttpHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Span name in the `{METHOD} {route}` form, falling back to the raw path
/// when the request did not match a route template.
fn span_name<B>(req: &Request<B>) -> String {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    format!("{} {}", req.method(), route)
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HttpTracingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let path = req.uri().path().to_string();

        if self.config.should_ignore(&path) {
            return Box::pin(self.inner.call(req));
        }

        let parent_context = global::get_text_map_propagator(|propagator| {
            propagator.extract(&HttpHeaderExtractor(req.headers()))
        });

        let name = span_name(&req);
        let method = req.method().to_string();

        let span = info_span!(
            target: "http",
            "http_request",
            otel.name = %name,
            otel.status_code = field::Empty,
            http.request.method = %method,
            url.path = %path,
            http.response.status_code = field::Empty,
            trace_id = field::Empty,
            span_id = field::Empty,
        );

        span.set_parent(parent_context);

        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let current_span = Span::current();
                let otel_context = current_span.context();
                let otel_span = otel_context.span();
                let span_context = otel_span.span_context();
                if span_context.is_valid() {
                    current_span.record("trace_id", span_context.trace_id().to_string());
                    current_span.record("span_id", span_context.span_id().to_string());
                }

                let result = inner.call(req).await;

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        current_span.record("http.response.status_code", status.as_u16());
                        if status.is_server_error() {
                            current_span.record("otel.status_code", "ERROR");
                        }
                    }
                    Err(_) => {
                        current_span.record("otel.status_code", "ERROR");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

//! Tower middleware that defers span naming to the response.
//!
//! The stage wraps a downstream service, lets it run to completion, and
//! only then decides how the request span should be identified, based on
//! headers the downstream chain wrote. Stack it inside the span-making
//! layer so the request span is current when it runs:
//!
//! ```ignore
//! let service = tower::ServiceBuilder::new()
//!     .layer(otel_span_rename::http_server::layer())
//!     .layer(otel_span_rename::SpanRenameLayer::new(config))
//!     .service(app);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{Request, Response};
use opentelemetry::trace::TraceContextExt;
use tower::{Layer, Service};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::annotate::{self, ActiveSpan};
use crate::config::Config;

/// Layer applying [`SpanRename`] to an inner service.
#[derive(Clone, Debug, Default)]
pub struct SpanRenameLayer {
    config: Arc<Config>,
}

impl SpanRenameLayer {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for SpanRenameLayer {
    type Service = SpanRename<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SpanRename {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Middleware service that invokes the inner service exactly once and, on
/// success, renames the active request span from the response headers.
///
/// An inner error is returned unchanged and skips annotation entirely.
#[derive(Clone, Debug)]
pub struct SpanRename<S> {
    inner: S,
    config: Arc<Config>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SpanRename<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: 'static,
    S::Future: Send + 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The span-making layer further out has entered the request span
        // by the time this runs.
        let span = OtelSpan::current();
        let config = Arc::clone(&self.config);
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            annotate::annotate_span(&span, response.headers(), &config);
            Ok(response)
        })
    }
}

/// [`ActiveSpan`] backed by a `tracing` span, bridged to OpenTelemetry by
/// `tracing-opentelemetry`.
///
/// Renaming and tagging go through the `otel.name` and `cache.hit` span
/// fields, which must have been declared when the span was created. Spans
/// made by [`crate::http_server::layer`] declare both; a host composing
/// its own `MakeSpan` needs to do the same for the rename to take effect.
#[derive(Clone, Debug)]
pub struct OtelSpan(Span);

impl OtelSpan {
    /// Captures the span current at the call site.
    pub fn current() -> Self {
        Self(Span::current())
    }
}

impl From<Span> for OtelSpan {
    fn from(span: Span) -> Self {
        Self(span)
    }
}

impl ActiveSpan for OtelSpan {
    fn is_valid(&self) -> bool {
        // No subscriber, no OpenTelemetry layer, and an unsampled span all
        // surface here as an invalid span context.
        self.0.context().span().span_context().is_valid()
    }

    fn set_name(&self, name: &str) {
        self.0.record("otel.name", name);
    }

    fn set_bool(&self, key: &'static str, value: bool) {
        self.0.record(key, value);
    }
}

//! An in-memory span collector, used for testing.
//!
//! Spans ended under a tracer provider built by [`tracer_provider`] land
//! directly in a shared [`State`], where a test can read them back and
//! assert on their final names and attributes. No collector process, no
//! network.

use std::sync::{Arc, Mutex, RwLock};

use futures_util::future::{BoxFuture, FutureExt};
use opentelemetry::trace::TraceResult;
use opentelemetry::Context;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::trace::{Span, SpanProcessor, TracerProvider};

/// The captured-span state. Create a new one per test.
///
/// A clone of this will share the underlying state.
#[derive(Clone, Debug)]
pub struct State {
    spans: Arc<RwLock<Vec<SpanData>>>,
}

impl State {
    /// Creates a new, empty state.
    pub fn new() -> Self {
        Self {
            spans: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Appends a batch of finished spans.
    fn append(&self, mut batch: Vec<SpanData>) {
        let mut spans = self.spans.write().unwrap();
        spans.append(&mut batch);
    }

    /// Gets all the spans captured up until now.
    pub fn read(&self) -> Vec<SpanData> {
        let spans = self.spans.read().unwrap();
        spans.clone()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Exporter that appends every batch into a [`State`].
#[derive(Debug)]
pub struct CaptureExporter {
    state: State,
}

impl CaptureExporter {
    pub fn new(state: &State) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl SpanExporter for CaptureExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        self.state.append(batch);
        Box::pin(std::future::ready(Ok(())))
    }
}

/// Span processor that exports each span into a [`CaptureExporter`] the
/// instant it ends.
///
/// The SDK's stock `SimpleSpanProcessor` hands spans to a background thread,
/// so a span is not guaranteed to be visible the moment `Span::end` returns.
/// [`CaptureExporter`] completes synchronously (its export future is always
/// ready), so driving it here inside `on_end` keeps the documented
/// "readable the moment they close" guarantee.
#[derive(Debug)]
struct SyncProcessor {
    exporter: Mutex<CaptureExporter>,
}

impl SpanProcessor for SyncProcessor {
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    fn on_end(&self, span: SpanData) {
        if let Ok(mut exporter) = self.exporter.lock() {
            // The exporter's future is `ready`, so it completes in place.
            let _ = exporter.export(vec![span]).now_or_never();
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> TraceResult<()> {
        Ok(())
    }
}

/// Builds a tracer provider that ends every span into `state`.
///
/// Uses a simple (synchronous) processor, so spans are readable the moment
/// they close.
pub fn tracer_provider(state: &State) -> TracerProvider {
    TracerProvider::builder()
        .with_span_processor(SyncProcessor {
            exporter: Mutex::new(CaptureExporter::new(state)),
        })
        .build()
}

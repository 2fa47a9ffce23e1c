//! # Profiler Module
//!
//! Per-request span recorder. The dispatcher owns one [`Profiler`] per request,
//! wraps the whole request in a `request` span and hands the profiler to the
//! renderer for a `render` span. Nothing in here calls back into the pipeline.
//!
//! ## Policies
//!
//! - Starting a label that is already running replaces it (last start wins).
//! - Stopping a label that was never started is a no-op.
//! - Durations come from a monotonic clock; the recorded `stop` is
//!   `start + total`, so `total == stop - start` always holds.
//! - [`Profiler::complete`] consumes the profiler, so a request can only be
//!   persisted once. Without a sink it does nothing.
//!
//! ## Record Format
//!
//! Sinks receive one record per request:
//!
//! ```json
//! {"url":"/posts/1","data":{"request":{"label":"request","data":{},"start":1700000000000,"stop":1700000000004,"total":4}}}
//! ```

mod sink;

pub use sink::{FileSink, MemorySink, ProfilerSink};

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// One timed interval
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub label: String,
    /// Auxiliary data attached at start and merged at stop
    pub data: Map<String, Value>,
    /// Wall-clock start, milliseconds since the Unix epoch
    pub start: u64,
    pub stop: Option<u64>,
    /// Milliseconds between start and stop
    pub total: Option<u64>,
    #[serde(skip)]
    started: Instant,
    #[serde(skip)]
    elapsed: Option<Duration>,
}

impl Span {
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }

    /// Precise duration, available once the span is stopped
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }
}

/// What a sink receives from [`Profiler::complete`]
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRecord {
    pub url: String,
    pub data: BTreeMap<String, Span>,
}

/// Span recorder for a single request
pub struct Profiler {
    url: String,
    sink: Option<Arc<dyn ProfilerSink>>,
    spans: BTreeMap<String, Span>,
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("url", &self.url)
            .field("has_sink", &self.sink.is_some())
            .field("spans", &self.spans.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Recursive merge: objects merge key by key, anything else is replaced
fn merge_value(target: &mut Value, src: Value) {
    match (target, src) {
        (Value::Object(t), Value::Object(s)) => merge_map(t, s),
        (t, s) => *t = s,
    }
}

fn merge_map(target: &mut Map<String, Value>, src: Map<String, Value>) {
    for (k, v) in src {
        match target.get_mut(&k) {
            Some(existing) => merge_value(existing, v),
            None => {
                target.insert(k, v);
            }
        }
    }
}

impl Profiler {
    #[must_use]
    pub fn new(url: impl Into<String>, sink: Option<Arc<dyn ProfilerSink>>) -> Self {
        Self {
            url: url.into(),
            sink,
            spans: BTreeMap::new(),
        }
    }

    /// Profiler that records spans but never persists them
    #[must_use]
    pub fn detached(url: impl Into<String>) -> Self {
        Self::new(url, None)
    }

    pub fn start(&mut self, label: &str) {
        self.start_with(label, Map::new());
    }

    pub fn start_with(&mut self, label: &str, data: Map<String, Value>) {
        if self.spans.contains_key(label) {
            debug!(label = %label, "Profiler span restarted");
        }
        self.spans.insert(
            label.to_string(),
            Span {
                label: label.to_string(),
                data,
                start: epoch_millis(),
                stop: None,
                total: None,
                started: Instant::now(),
                elapsed: None,
            },
        );
    }

    pub fn stop(&mut self, label: &str) {
        self.stop_with(label, Map::new());
    }

    pub fn stop_with(&mut self, label: &str, data: Map<String, Value>) {
        let Some(span) = self.spans.get_mut(label) else {
            debug!(label = %label, "Profiler stop for unknown span ignored");
            return;
        };
        let elapsed = span.started.elapsed();
        let total = elapsed.as_millis() as u64;
        span.elapsed = Some(elapsed);
        span.total = Some(total);
        span.stop = Some(span.start.saturating_add(total));
        merge_map(&mut span.data, data);
    }

    /// Stop every span that is still open, tagging it `aborted`
    pub fn stop_open(&mut self) {
        let open: Vec<String> = self
            .spans
            .values()
            .filter(|s| !s.is_stopped())
            .map(|s| s.label.clone())
            .collect();
        for label in open {
            let mut data = Map::new();
            data.insert("aborted".to_string(), Value::Bool(true));
            self.stop_with(&label, data);
        }
    }

    /// Wrap `f` so that calling it also stops the `label` span
    ///
    /// The span is stopped after `f` returns.
    ///
    /// ```rust
    /// use brrtmvc::profiler::Profiler;
    ///
    /// let mut profiler = Profiler::detached("/posts");
    /// profiler.start("query");
    /// let on_rows = profiler.decorate("query", |rows: usize| rows + 1);
    /// assert_eq!(on_rows(2), 3);
    /// assert!(profiler.span("query").unwrap().is_stopped());
    /// ```
    pub fn decorate<'a, A, R, F>(&'a mut self, label: &str, f: F) -> impl FnOnce(A) -> R + 'a
    where
        F: FnOnce(A) -> R + 'a,
        A: 'a,
        R: 'a,
    {
        let label = label.to_string();
        move |arg| {
            let out = f(arg);
            self.stop(&label);
            out
        }
    }

    #[must_use]
    pub fn span(&self, label: &str) -> Option<&Span> {
        self.spans.get(label)
    }

    #[must_use]
    pub fn spans(&self) -> &BTreeMap<String, Span> {
        &self.spans
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Persist the collected spans to the sink, if any. Never fails.
    pub fn complete(self) {
        let Some(sink) = self.sink else {
            return;
        };
        let record = ProfileRecord {
            url: self.url,
            data: self.spans,
        };
        if let Err(e) = sink.persist(&record) {
            warn!(
                url = %record.url,
                error = %e,
                "Failed to persist profile record"
            );
        }
    }
}

//! Trace adapter seam between the pipelines and span storage.
//!
//! The pipelines never talk to a tracing backend directly; they emit spans
//! and attributes through [`TraceAdapter`] and [`TraceSpan`]. The default
//! [`TracingAdapter`] leans on the `tracing` ecosystem — it works with any
//! subscriber and compiles away when instrumentation is disabled — while
//! [`RecordingAdapter`] captures everything in memory so guardrail behavior
//! can be asserted in tests without a collector.
//!
//! Span scoping (the "run this handler under that span" contract) is done
//! with [`tracing::Instrument`] on the handler future; every [`TraceSpan`]
//! exposes the `tracing` span to attach via [`TraceSpan::tracing_span`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::context::Operation;
use crate::error::{Direction, Error, RuleKind};
use crate::payload::Payload;

/// Completion status of a span or of a whole operation trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    /// The unit of work completed normally.
    Ok,
    /// The unit of work failed.
    Error,
}

/// An attribute value recorded on a span.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// A string attribute.
    Str(String),
    /// An integer attribute.
    Int(i64),
    /// A boolean attribute.
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One tracing unit of work, opened per rule invocation.
pub trait TraceSpan: Send {
    /// Record an attribute on this span.
    fn set_attribute(&mut self, key: &str, value: AttrValue);

    /// Set the span's completion status.
    fn set_status(&mut self, status: SpanStatus, message: Option<&str>);

    /// Record a handler exception on this span.
    fn record_exception(&mut self, error: &Error);

    /// End the span. Attributes recorded after this are ignored.
    fn end(&mut self);

    /// The `tracing` span to scope the handler's async work under.
    fn tracing_span(&self) -> &tracing::Span;
}

/// The externally supplied tracing backend for one operation.
pub trait TraceAdapter: Send + Sync {
    /// Open a child span for one rule invocation.
    fn child_span(&self, name: &str, kind: RuleKind, label: &str) -> Box<dyn TraceSpan>;

    /// Publish the final (possibly modified) input value.
    fn set_input(&self, value: &Payload);

    /// Publish the final (possibly modified) output value.
    fn set_output(&self, value: &Payload);

    /// End the operation's span tree.
    fn end(&self, status: SpanStatus, error: Option<&Error>);
}

/// Spans opened during a streaming pass, keyed by rule id (or index), for
/// the trailing buffered pass to adopt instead of opening duplicates.
pub type StreamSpanMap = HashMap<String, Box<dyn TraceSpan>>;

/// Everything needed to open and annotate a rule's span.
pub(crate) struct RuleSpanInfo<'a> {
    pub kind: RuleKind,
    pub direction: Direction,
    pub operation: Operation,
    pub index: usize,
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub tags: &'a [String],
    pub severity: Option<&'a str>,
    pub metadata: Option<&'a serde_json::Value>,
    pub retry_count: Option<u32>,
}

/// Open a child span named `<kind>.<direction>.<id-or-ordinal>` and stamp
/// the rule's identity attributes on it.
pub(crate) fn open_rule_span(
    trace: &dyn TraceAdapter,
    info: &RuleSpanInfo<'_>,
) -> Box<dyn TraceSpan> {
    let prefix = info.kind.label();
    let ordinal = info
        .id
        .map_or_else(|| (info.index + 1).to_string(), str::to_string);
    let name = format!("{prefix}.{}.{ordinal}", info.direction.label());

    let mut span = trace.child_span(&name, info.kind, info.name);
    span.set_attribute(
        &format!("{prefix}.direction"),
        info.direction.label().into(),
    );
    span.set_attribute(
        &format!("{prefix}.operation"),
        info.operation.as_str().into(),
    );
    span.set_attribute(
        &format!("{prefix}.index"),
        i64::try_from(info.index).unwrap_or(i64::MAX).into(),
    );
    if let Some(id) = info.id {
        span.set_attribute(&format!("{prefix}.id"), id.into());
    }
    span.set_attribute(&format!("{prefix}.name"), info.name.into());
    if let Some(description) = info.description {
        span.set_attribute(&format!("{prefix}.description"), description.into());
    }
    if !info.tags.is_empty() {
        let tags = serde_json::to_string(info.tags).unwrap_or_default();
        span.set_attribute(&format!("{prefix}.tags"), tags.into());
    }
    if let Some(severity) = info.severity {
        span.set_attribute(&format!("{prefix}.severity"), severity.into());
    }
    if let Some(metadata) = info.metadata {
        span.set_attribute(&format!("{prefix}.metadata"), metadata.to_string().into());
    }
    if let Some(retry_count) = info.retry_count {
        span.set_attribute(&format!("{prefix}.retry_count"), i64::from(retry_count).into());
    }
    span
}

/// Default adapter: spans and events through the `tracing` dispatcher.
///
/// Works with any subscriber; add an OpenTelemetry layer for OTLP export.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAdapter;

impl TraceAdapter for TracingAdapter {
    fn child_span(&self, name: &str, kind: RuleKind, label: &str) -> Box<dyn TraceSpan> {
        let span = tracing::debug_span!(
            "pipeline_rule",
            rule = %name,
            kind = %kind,
            label = %label,
        );
        Box::new(TracingSpan { span })
    }

    fn set_input(&self, value: &Payload) {
        tracing::debug!(input = %value.to_trace_string(), "pipeline input updated");
    }

    fn set_output(&self, value: &Payload) {
        tracing::debug!(output = %value.to_trace_string(), "pipeline output updated");
    }

    fn end(&self, status: SpanStatus, error: Option<&Error>) {
        match (status, error) {
            (SpanStatus::Error, Some(error)) => {
                tracing::debug!(%error, "pipeline operation ended with error");
            }
            (SpanStatus::Error, None) => {
                tracing::debug!("pipeline operation ended with error");
            }
            (SpanStatus::Ok, _) => tracing::debug!("pipeline operation ended"),
        }
    }
}

struct TracingSpan {
    span: tracing::Span,
}

impl TraceSpan for TracingSpan {
    fn set_attribute(&mut self, key: &str, value: AttrValue) {
        tracing::debug!(parent: &self.span, attribute = key, value = %value, "span attribute");
    }

    fn set_status(&mut self, status: SpanStatus, message: Option<&str>) {
        match status {
            SpanStatus::Ok => tracing::debug!(parent: &self.span, "rule completed"),
            SpanStatus::Error => {
                tracing::debug!(parent: &self.span, message = message.unwrap_or(""), "rule failed");
            }
        }
    }

    fn record_exception(&mut self, error: &Error) {
        tracing::debug!(parent: &self.span, %error, "rule handler exception");
    }

    fn end(&mut self) {
        // The tracing span closes when the handle drops.
    }

    fn tracing_span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Adapter that drops everything. Useful when a caller wants pipeline
/// semantics without any telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdapter;

impl TraceAdapter for NoopAdapter {
    fn child_span(&self, _name: &str, _kind: RuleKind, _label: &str) -> Box<dyn TraceSpan> {
        Box::new(NoopSpan {
            span: tracing::Span::none(),
        })
    }

    fn set_input(&self, _value: &Payload) {}

    fn set_output(&self, _value: &Payload) {}

    fn end(&self, _status: SpanStatus, _error: Option<&Error>) {}
}

struct NoopSpan {
    span: tracing::Span,
}

impl TraceSpan for NoopSpan {
    fn set_attribute(&mut self, _key: &str, _value: AttrValue) {}

    fn set_status(&mut self, _status: SpanStatus, _message: Option<&str>) {}

    fn record_exception(&mut self, _error: &Error) {}

    fn end(&mut self) {}

    fn tracing_span(&self) -> &tracing::Span {
        &self.span
    }
}

/// A span captured by [`RecordingAdapter`].
#[derive(Debug, Clone, Default)]
pub struct RecordedSpan {
    /// Span name (`guardrail.input.1` etc.).
    pub name: String,
    /// Human label: the rule's resolved name.
    pub label: String,
    /// Recorded attributes in call order.
    pub attributes: Vec<(String, AttrValue)>,
    /// Last status set on the span.
    pub status: Option<(SpanStatus, Option<String>)>,
    /// Rendered handler exceptions.
    pub exceptions: Vec<String>,
    /// Whether `end` was called.
    pub ended: bool,
}

impl RecordedSpan {
    /// Look up the last value recorded for an attribute key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Default)]
struct Recording {
    spans: Vec<Arc<Mutex<RecordedSpan>>>,
    inputs: Vec<Payload>,
    outputs: Vec<Payload>,
    ends: Vec<(SpanStatus, Option<String>)>,
}

/// Adapter that records spans and published values in memory.
///
/// Intended for tests: assert which spans a pipeline opened, what it stamped
/// on them, and whether it published a modified value.
#[derive(Debug, Clone, Default)]
pub struct RecordingAdapter {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingAdapter {
    /// Create an empty recording adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans opened so far.
    #[must_use]
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .spans
            .iter()
            .map(|span| span.lock().expect("trace recording poisoned").clone())
            .collect()
    }

    /// Values published through `set_input`.
    #[must_use]
    pub fn inputs(&self) -> Vec<Payload> {
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .inputs
            .clone()
    }

    /// Values published through `set_output`.
    #[must_use]
    pub fn outputs(&self) -> Vec<Payload> {
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .outputs
            .clone()
    }

    /// Operation-level `end` calls.
    #[must_use]
    pub fn ends(&self) -> Vec<(SpanStatus, Option<String>)> {
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .ends
            .clone()
    }
}

impl TraceAdapter for RecordingAdapter {
    fn child_span(&self, name: &str, _kind: RuleKind, label: &str) -> Box<dyn TraceSpan> {
        let record = Arc::new(Mutex::new(RecordedSpan {
            name: name.to_string(),
            label: label.to_string(),
            ..RecordedSpan::default()
        }));
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .spans
            .push(Arc::clone(&record));
        Box::new(RecordingSpan {
            record,
            span: tracing::Span::none(),
        })
    }

    fn set_input(&self, value: &Payload) {
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .inputs
            .push(value.clone());
    }

    fn set_output(&self, value: &Payload) {
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .outputs
            .push(value.clone());
    }

    fn end(&self, status: SpanStatus, error: Option<&Error>) {
        self.recording
            .lock()
            .expect("trace recording poisoned")
            .ends
            .push((status, error.map(ToString::to_string)));
    }
}

struct RecordingSpan {
    record: Arc<Mutex<RecordedSpan>>,
    span: tracing::Span,
}

impl TraceSpan for RecordingSpan {
    fn set_attribute(&mut self, key: &str, value: AttrValue) {
        self.record
            .lock()
            .expect("trace recording poisoned")
            .attributes
            .push((key.to_string(), value));
    }

    fn set_status(&mut self, status: SpanStatus, message: Option<&str>) {
        self.record.lock().expect("trace recording poisoned").status =
            Some((status, message.map(ToString::to_string)));
    }

    fn record_exception(&mut self, error: &Error) {
        self.record
            .lock()
            .expect("trace recording poisoned")
            .exceptions
            .push(error.to_string());
    }

    fn end(&mut self) {
        self.record.lock().expect("trace recording poisoned").ended = true;
    }

    fn tracing_span(&self) -> &tracing::Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_adapter_captures_span_lifecycle() {
        let adapter = RecordingAdapter::new();
        let mut span = adapter.child_span("guardrail.input.1", RuleKind::Guardrail, "pii");
        span.set_attribute("guardrail.pass", true.into());
        span.set_status(SpanStatus::Ok, None);
        span.end();

        let spans = adapter.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "guardrail.input.1");
        assert_eq!(spans[0].label, "pii");
        assert_eq!(spans[0].attribute("guardrail.pass"), Some(&AttrValue::Bool(true)));
        assert!(spans[0].ended);
    }

    #[test]
    fn recording_adapter_captures_published_values() {
        let adapter = RecordingAdapter::new();
        adapter.set_input(&Payload::from("modified"));
        adapter.end(SpanStatus::Error, Some(&Error::handler("boom")));

        assert_eq!(adapter.inputs(), vec![Payload::from("modified")]);
        assert!(adapter.outputs().is_empty());
        assert_eq!(adapter.ends().len(), 1);
        assert_eq!(adapter.ends()[0].0, SpanStatus::Error);
    }
}

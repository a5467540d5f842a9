//! Middleware pipelines — transform-or-abort interception without block
//! semantics.
//!
//! Middleware is the lighter-weight sibling of the guardrail pipeline: a
//! handler may return a replacement value or nothing, and may abort the
//! whole operation with a typed [`MiddlewareAbort`] that callers can branch
//! on (notably its `retry` hint). Ordering, chaining, and span-per-stage
//! behavior mirror the guardrail runners exactly, minus the pass/block
//! decision.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{Instrument, debug};

use crate::context::{Operation, OperationContext, Usage};
use crate::error::{Direction, Error, MiddlewareAbort, Result, RuleKind};
use crate::guardrail::{OutputInfo, default_rule_name};
use crate::payload::Payload;
use crate::trace::{RuleSpanInfo, SpanStatus, TraceSpan, open_rule_span};

/// Arguments passed to an input middleware handler.
#[derive(Debug)]
pub struct InputMiddlewareArgs<'a> {
    /// The current value under transformation.
    pub input: &'a Payload,
    /// The value the pipeline started with.
    pub original_input: &'a Payload,
    /// The shared operation context.
    pub context: &'a OperationContext,
    /// The operation this pipeline run is attached to.
    pub operation: Operation,
    /// How many times the surrounding operation has been retried.
    pub retry_count: u32,
}

/// Arguments passed to an output middleware handler.
#[derive(Debug)]
pub struct OutputMiddlewareArgs<'a> {
    /// The current value under transformation.
    pub output: &'a Payload,
    /// The value the pipeline started with.
    pub original_output: &'a Payload,
    /// The shared operation context.
    pub context: &'a OperationContext,
    /// The operation this pipeline run is attached to.
    pub operation: Operation,
    /// How many times the surrounding operation has been retried.
    pub retry_count: u32,
    /// Token usage for the call, when known.
    pub usage: Option<Usage>,
    /// Finish reason for the call, when known.
    pub finish_reason: Option<&'a str>,
    /// Provider warnings for the call.
    pub warnings: &'a [Value],
}

/// Trait for implementing input middleware logic.
///
/// Return `Ok(Some(value))` to replace the current value, `Ok(None)` to
/// leave it unchanged, or `Err(`[`MiddlewareAbort`]`.into())` to abort the
/// operation.
#[async_trait]
pub trait InputMiddlewareHandler: Send + Sync {
    /// Transform the input or abort.
    async fn handle(&self, args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>>;
}

#[async_trait]
impl<F> InputMiddlewareHandler for F
where
    F: for<'a> Fn(InputMiddlewareArgs<'a>) -> BoxFuture<'a, Result<Option<Payload>>> + Send + Sync,
{
    async fn handle(&self, args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
        self(args).await
    }
}

/// Trait for implementing output middleware logic.
#[async_trait]
pub trait OutputMiddlewareHandler: Send + Sync {
    /// Transform the output or abort.
    async fn handle(&self, args: OutputMiddlewareArgs<'_>) -> Result<Option<Payload>>;
}

#[async_trait]
impl<F> OutputMiddlewareHandler for F
where
    F: for<'a> Fn(OutputMiddlewareArgs<'a>) -> BoxFuture<'a, Result<Option<Payload>>> + Send + Sync,
{
    async fn handle(&self, args: OutputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
        self(args).await
    }
}

/// An input middleware registration.
#[derive(Clone, Default)]
pub struct InputMiddleware {
    /// Stable id, used in span names and abort attribution.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// What this middleware does.
    pub description: Option<String>,
    /// Free-form tags for telemetry.
    pub tags: Vec<String>,
    /// Arbitrary metadata recorded on the stage's span.
    pub metadata: Option<Value>,
    /// The handler implementation.
    pub handler: Option<Arc<dyn InputMiddlewareHandler>>,
}

impl InputMiddleware {
    /// Register a bare handler; the pipeline assigns a default name.
    #[must_use]
    pub fn new(handler: impl InputMiddlewareHandler + 'static) -> Self {
        Self {
            handler: Some(Arc::new(handler)),
            ..Self::default()
        }
    }

    /// Register a named handler.
    #[must_use]
    pub fn named(name: impl Into<String>, handler: impl InputMiddlewareHandler + 'static) -> Self {
        Self {
            name: Some(name.into()),
            handler: Some(Arc::new(handler)),
            ..Self::default()
        }
    }

    /// Set the stable id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Debug for InputMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputMiddleware")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An output middleware registration.
#[derive(Clone, Default)]
pub struct OutputMiddleware {
    /// Stable id, used in span names and abort attribution.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// What this middleware does.
    pub description: Option<String>,
    /// Free-form tags for telemetry.
    pub tags: Vec<String>,
    /// Arbitrary metadata recorded on the stage's span.
    pub metadata: Option<Value>,
    /// The handler implementation.
    pub handler: Option<Arc<dyn OutputMiddlewareHandler>>,
}

impl OutputMiddleware {
    /// Register a bare handler; the pipeline assigns a default name.
    #[must_use]
    pub fn new(handler: impl OutputMiddlewareHandler + 'static) -> Self {
        Self {
            handler: Some(Arc::new(handler)),
            ..Self::default()
        }
    }

    /// Register a named handler.
    #[must_use]
    pub fn named(name: impl Into<String>, handler: impl OutputMiddlewareHandler + 'static) -> Self {
        Self {
            name: Some(name.into()),
            handler: Some(Arc::new(handler)),
            ..Self::default()
        }
    }

    /// Set the stable id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Debug for OutputMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputMiddleware")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An input middleware after normalization.
#[derive(Clone)]
pub struct NormalizedInputMiddleware {
    /// Stable id, when given.
    pub id: Option<String>,
    /// Resolved display name.
    pub name: String,
    /// What this middleware does.
    pub description: Option<String>,
    /// Free-form tags for telemetry.
    pub tags: Vec<String>,
    /// Arbitrary metadata recorded on the stage's span.
    pub metadata: Option<Value>,
    /// The handler implementation.
    pub handler: Arc<dyn InputMiddlewareHandler>,
}

impl fmt::Debug for NormalizedInputMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedInputMiddleware")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An output middleware after normalization.
#[derive(Clone)]
pub struct NormalizedOutputMiddleware {
    /// Stable id, when given.
    pub id: Option<String>,
    /// Resolved display name.
    pub name: String,
    /// What this middleware does.
    pub description: Option<String>,
    /// Free-form tags for telemetry.
    pub tags: Vec<String>,
    /// Arbitrary metadata recorded on the stage's span.
    pub metadata: Option<Value>,
    /// The handler implementation.
    pub handler: Arc<dyn OutputMiddlewareHandler>,
}

impl fmt::Debug for NormalizedOutputMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedOutputMiddleware")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Canonicalize input middleware registrations into uniform records.
///
/// # Errors
///
/// Returns [`Error::InvalidRule`] for any registration without a handler.
pub fn normalize_input_middlewares(
    middlewares: &[InputMiddleware],
    start_index: usize,
) -> Result<Vec<NormalizedInputMiddleware>> {
    middlewares
        .iter()
        .enumerate()
        .map(|(offset, middleware)| {
            let index = start_index + offset;
            let handler = middleware.handler.clone().ok_or(Error::InvalidRule {
                kind: RuleKind::Middleware,
                direction: Direction::Input,
                index,
            })?;
            let name = middleware
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| {
                    default_rule_name(RuleKind::Middleware, Direction::Input, index)
                });
            Ok(NormalizedInputMiddleware {
                id: middleware.id.clone(),
                name,
                description: middleware.description.clone(),
                tags: middleware.tags.clone(),
                metadata: middleware.metadata.clone(),
                handler,
            })
        })
        .collect()
}

/// Canonicalize output middleware registrations into uniform records.
///
/// # Errors
///
/// Returns [`Error::InvalidRule`] for any registration without a handler.
pub fn normalize_output_middlewares(
    middlewares: &[OutputMiddleware],
    start_index: usize,
) -> Result<Vec<NormalizedOutputMiddleware>> {
    middlewares
        .iter()
        .enumerate()
        .map(|(offset, middleware)| {
            let index = start_index + offset;
            let handler = middleware.handler.clone().ok_or(Error::InvalidRule {
                kind: RuleKind::Middleware,
                direction: Direction::Output,
                index,
            })?;
            let name = middleware
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| {
                    default_rule_name(RuleKind::Middleware, Direction::Output, index)
                });
            Ok(NormalizedOutputMiddleware {
                id: middleware.id.clone(),
                name,
                description: middleware.description.clone(),
                tags: middleware.tags.clone(),
                metadata: middleware.metadata.clone(),
                handler,
            })
        })
        .collect()
}

/// Execute input middlewares against a buffered value.
///
/// Same ordering, chaining, and span behavior as the input guardrail
/// pipeline, with no pass/block decision: handlers transform or abort.
///
/// # Errors
///
/// Returns [`Error::MiddlewareAborted`] when a handler aborts (with the
/// middleware's id attributed), or the handler's own error unchanged.
pub async fn run_input_middlewares(
    input: Payload,
    oc: &OperationContext,
    middlewares: &[NormalizedInputMiddleware],
    operation: Operation,
    retry_count: u32,
) -> Result<Payload> {
    if middlewares.is_empty() {
        return Ok(input);
    }

    let original = input;
    let mut current = original.clone();

    for (index, middleware) in middlewares.iter().enumerate() {
        let mut span = open_rule_span(
            oc.trace().as_ref(),
            &RuleSpanInfo {
                kind: RuleKind::Middleware,
                direction: Direction::Input,
                operation,
                index,
                id: middleware.id.as_deref(),
                name: &middleware.name,
                description: middleware.description.as_deref(),
                tags: &middleware.tags,
                severity: None,
                metadata: middleware.metadata.as_ref(),
                retry_count: Some(retry_count),
            },
        );
        span.set_attribute(
            "middleware.input.original",
            original.to_trace_string().into(),
        );
        span.set_attribute("middleware.input.current", current.to_trace_string().into());

        let args = InputMiddlewareArgs {
            input: &current,
            original_input: &original,
            context: oc,
            operation,
            retry_count,
        };
        let result = middleware
            .handler
            .handle(args)
            .instrument(span.tracing_span().clone())
            .await;

        let modified = match result {
            Ok(Some(value)) => {
                current = value;
                true
            }
            Ok(None) => false,
            Err(error) => {
                let error = attribute_abort(error, middleware.id.as_deref());
                span.record_exception(&error);
                span.set_status(SpanStatus::Error, Some(&error.to_string()));
                span.end();
                return Err(error);
            }
        };

        span.set_attribute("middleware.input.after", current.to_trace_string().into());
        span.set_status(SpanStatus::Ok, None);
        span.end();

        debug!(
            middleware = %middleware.name,
            modified,
            "input middleware evaluated"
        );
    }

    if current != original {
        oc.trace().set_input(&current);
    }

    Ok(current)
}

/// Execute output middlewares against a buffered value.
///
/// # Errors
///
/// Returns [`Error::MiddlewareAborted`] when a handler aborts (with the
/// middleware's id attributed), or the handler's own error unchanged.
pub async fn run_output_middlewares(
    output: Payload,
    oc: &OperationContext,
    middlewares: &[NormalizedOutputMiddleware],
    operation: Operation,
    retry_count: u32,
    info: &OutputInfo,
) -> Result<Payload> {
    if middlewares.is_empty() {
        return Ok(output);
    }

    let original = output;
    let mut current = original.clone();

    for (index, middleware) in middlewares.iter().enumerate() {
        let mut span = open_rule_span(
            oc.trace().as_ref(),
            &RuleSpanInfo {
                kind: RuleKind::Middleware,
                direction: Direction::Output,
                operation,
                index,
                id: middleware.id.as_deref(),
                name: &middleware.name,
                description: middleware.description.as_deref(),
                tags: &middleware.tags,
                severity: None,
                metadata: middleware.metadata.as_ref(),
                retry_count: Some(retry_count),
            },
        );
        span.set_attribute(
            "middleware.output.original",
            original.to_trace_string().into(),
        );
        span.set_attribute(
            "middleware.output.current",
            current.to_trace_string().into(),
        );
        apply_info_attributes(span.as_mut(), info);

        let args = OutputMiddlewareArgs {
            output: &current,
            original_output: &original,
            context: oc,
            operation,
            retry_count,
            usage: info.usage,
            finish_reason: info.finish_reason.as_deref(),
            warnings: &info.warnings,
        };
        let result = middleware
            .handler
            .handle(args)
            .instrument(span.tracing_span().clone())
            .await;

        let modified = match result {
            Ok(Some(value)) => {
                current = value;
                true
            }
            Ok(None) => false,
            Err(error) => {
                let error = attribute_abort(error, middleware.id.as_deref());
                span.record_exception(&error);
                span.set_status(SpanStatus::Error, Some(&error.to_string()));
                span.end();
                return Err(error);
            }
        };

        span.set_attribute("middleware.output.after", current.to_trace_string().into());
        span.set_status(SpanStatus::Ok, None);
        span.end();

        debug!(
            middleware = %middleware.name,
            modified,
            "output middleware evaluated"
        );
    }

    if current != original {
        oc.trace().set_output(&current);
    }

    Ok(current)
}

/// Stamp the originating middleware's id onto an abort that lacks one.
fn attribute_abort(error: Error, middleware_id: Option<&str>) -> Error {
    match error {
        Error::MiddlewareAborted(mut abort) => {
            if abort.middleware_id.is_none() {
                abort.middleware_id = middleware_id.map(ToString::to_string);
            }
            Error::MiddlewareAborted(abort)
        }
        other => other,
    }
}

fn apply_info_attributes(span: &mut dyn TraceSpan, info: &OutputInfo) {
    if let Some(usage) = info.usage {
        let serialized = serde_json::to_string(&usage).unwrap_or_default();
        span.set_attribute("middleware.usage", serialized.into());
    }
    if let Some(finish_reason) = &info.finish_reason {
        span.set_attribute("middleware.finish_reason", finish_reason.as_str().into());
    }
    if !info.warnings.is_empty() {
        let serialized = serde_json::to_string(&info.warnings).unwrap_or_default();
        span.set_attribute("middleware.warnings", serialized.into());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::trace::{AttrValue, RecordingAdapter};

    use super::*;

    struct TrimInput;

    #[async_trait]
    impl InputMiddlewareHandler for TrimInput {
        async fn handle(&self, args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
            match args.input {
                Payload::Text(text) => Ok(Some(Payload::from(text.trim()))),
                _ => Ok(None),
            }
        }
    }

    struct NoChange;

    #[async_trait]
    impl InputMiddlewareHandler for NoChange {
        async fn handle(&self, _args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
            Ok(None)
        }
    }

    struct AbortWithRetry;

    #[async_trait]
    impl InputMiddlewareHandler for AbortWithRetry {
        async fn handle(&self, _args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
            Err(MiddlewareAbort::new("rate limited upstream")
                .with_retry(true)
                .with_metadata(json!({"window_ms": 500}))
                .into())
        }
    }

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl InputMiddlewareHandler for CountingHandler {
        async fn handle(&self, _args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn recording_context() -> (OperationContext, RecordingAdapter) {
        let adapter = RecordingAdapter::new();
        let oc = OperationContext::with_trace(Arc::new(adapter.clone()));
        (oc, adapter)
    }

    #[tokio::test]
    async fn empty_middlewares_return_input_untouched() {
        let (oc, adapter) = recording_context();
        let input = Payload::from("  spaced  ");
        let result =
            run_input_middlewares(input.clone(), &oc, &[], Operation::GenerateText, 0)
                .await
                .unwrap();
        assert_eq!(result, input);
        assert!(adapter.spans().is_empty());
    }

    #[tokio::test]
    async fn transform_chain_applies_in_order() {
        struct Stamp;

        #[async_trait]
        impl InputMiddlewareHandler for Stamp {
            async fn handle(&self, args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
                let text = args.input.project_text().unwrap_or_default();
                Ok(Some(Payload::from(format!("{text}!"))))
            }
        }

        let (oc, adapter) = recording_context();
        let middlewares = normalize_input_middlewares(
            &[
                InputMiddleware::named("trim", TrimInput),
                InputMiddleware::named("stamp", Stamp),
            ],
            0,
        )
        .unwrap();

        let result = run_input_middlewares(
            Payload::from("  hello  "),
            &oc,
            &middlewares,
            Operation::GenerateText,
            0,
        )
        .await
        .unwrap();

        assert_eq!(result, Payload::from("hello!"));
        assert_eq!(adapter.inputs(), vec![Payload::from("hello!")]);
    }

    #[tokio::test]
    async fn no_change_handlers_publish_nothing() {
        let (oc, adapter) = recording_context();
        let middlewares =
            normalize_input_middlewares(&[InputMiddleware::new(NoChange)], 0).unwrap();
        run_input_middlewares(
            Payload::from("same"),
            &oc,
            &middlewares,
            Operation::GenerateText,
            0,
        )
        .await
        .unwrap();
        assert!(adapter.inputs().is_empty());
    }

    #[tokio::test]
    async fn abort_stops_the_chain_and_is_attributed() {
        let (oc, adapter) = recording_context();
        let calls = Arc::new(AtomicUsize::new(0));
        let middlewares = normalize_input_middlewares(
            &[
                InputMiddleware::named("throttle", AbortWithRetry).with_id("throttle-1"),
                InputMiddleware::new(CountingHandler {
                    calls: Arc::clone(&calls),
                }),
            ],
            0,
        )
        .unwrap();

        let error = run_input_middlewares(
            Payload::from("hi"),
            &oc,
            &middlewares,
            Operation::GenerateText,
            1,
        )
        .await
        .unwrap_err();

        assert_eq!(error.retry_hint(), Some(true));
        match &error {
            Error::MiddlewareAborted(abort) => {
                assert_eq!(abort.reason, "rate limited upstream");
                assert_eq!(abort.middleware_id.as_deref(), Some("throttle-1"));
                assert_eq!(abort.metadata, Some(json!({"window_ms": 500})));
            }
            other => panic!("expected a middleware abort, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // An abort is not a guardrail rejection: the context stays active.
        assert!(oc.is_active());
        let spans = adapter.spans();
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].exceptions.is_empty());
    }

    #[tokio::test]
    async fn retry_count_reaches_handlers_and_spans() {
        struct CaptureRetry {
            seen: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl InputMiddlewareHandler for CaptureRetry {
            async fn handle(&self, args: InputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
                self.seen.store(args.retry_count as usize, Ordering::SeqCst);
                Ok(None)
            }
        }

        let (oc, adapter) = recording_context();
        let seen = Arc::new(AtomicUsize::new(0));
        let middlewares = normalize_input_middlewares(
            &[InputMiddleware::new(CaptureRetry {
                seen: Arc::clone(&seen),
            })],
            0,
        )
        .unwrap();

        run_input_middlewares(
            Payload::from("hi"),
            &oc,
            &middlewares,
            Operation::GenerateText,
            3,
        )
        .await
        .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(
            adapter.spans()[0].attribute("middleware.retry_count"),
            Some(&AttrValue::Int(3))
        );
    }

    #[tokio::test]
    async fn output_middlewares_transform_and_publish() {
        struct Footer;

        #[async_trait]
        impl OutputMiddlewareHandler for Footer {
            async fn handle(&self, args: OutputMiddlewareArgs<'_>) -> Result<Option<Payload>> {
                let text = args.output.project_text().unwrap_or_default();
                Ok(Some(Payload::from(format!("{text}\n-- served"))))
            }
        }

        let (oc, adapter) = recording_context();
        let middlewares =
            normalize_output_middlewares(&[OutputMiddleware::named("footer", Footer)], 0)
                .unwrap();
        let info = OutputInfo {
            usage: Some(Usage {
                input_tokens: 1,
                output_tokens: 2,
                total_tokens: 3,
            }),
            finish_reason: Some("stop".into()),
            warnings: Vec::new(),
        };

        let result = run_output_middlewares(
            Payload::from("answer"),
            &oc,
            &middlewares,
            Operation::GenerateText,
            0,
            &info,
        )
        .await
        .unwrap();

        assert_eq!(result, Payload::from("answer\n-- served"));
        assert_eq!(adapter.outputs(), vec![Payload::from("answer\n-- served")]);
        assert_eq!(
            adapter.spans()[0].attribute("middleware.finish_reason"),
            Some(&AttrValue::Str("stop".into()))
        );
    }

    #[test]
    fn normalization_defaults_middleware_names() {
        let middlewares =
            normalize_input_middlewares(&[InputMiddleware::new(NoChange)], 0).unwrap();
        assert_eq!(middlewares[0].name, "Input Middleware #1");

        let error = normalize_output_middlewares(&[OutputMiddleware::default()], 0).unwrap_err();
        assert!(matches!(
            error,
            Error::InvalidRule {
                kind: RuleKind::Middleware,
                direction: Direction::Output,
                index: 0,
            }
        ));
    }
}

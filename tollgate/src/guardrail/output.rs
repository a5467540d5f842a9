//! Output guardrail types and the output blocking pipeline.
//!
//! Output guardrails inspect the model's buffered output after generation.
//! They follow the same ordering, chaining, and rejection contract as the
//! input pipeline, with two extras: usage/finish-reason metadata is exposed
//! for span attributes and handler visibility (never for decision logic),
//! and spans opened during a streaming pass can be adopted instead of
//! duplicated via an explicit span map.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{Instrument, debug};

use crate::context::{Operation, OperationContext, Usage};
use crate::error::{Direction, Error, Result, RuleKind};
use crate::payload::Payload;
use crate::trace::{RuleSpanInfo, SpanStatus, StreamSpanMap, TraceSpan, open_rule_span};

use super::stream::StreamTransform;
use super::{Decision, Severity, StepOutcome, default_rule_name, resolve_decision};

/// Usage, finish-reason, and warning metadata for one model call.
///
/// Surfaced to handlers and recorded as span attributes; decision logic
/// must not depend on it.
#[derive(Debug, Clone, Default)]
pub struct OutputInfo {
    /// Token usage reported by the model call.
    pub usage: Option<Usage>,
    /// Why the model stopped generating.
    pub finish_reason: Option<String>,
    /// Provider warnings attached to the call.
    pub warnings: Vec<Value>,
}

/// Arguments passed to an output guardrail handler.
#[derive(Debug)]
pub struct OutputGuardrailArgs<'a> {
    /// The current value under inspection.
    pub output: &'a Payload,
    /// Text projection of the current value.
    pub output_text: Option<&'a str>,
    /// The value the pipeline started with.
    pub original_output: &'a Payload,
    /// Text projection of the original value.
    pub original_output_text: Option<&'a str>,
    /// The shared operation context.
    pub context: &'a OperationContext,
    /// The operation this pipeline run is attached to.
    pub operation: Operation,
    /// Token usage for the call, when known.
    pub usage: Option<Usage>,
    /// Finish reason for the call, when known.
    pub finish_reason: Option<&'a str>,
    /// Provider warnings for the call.
    pub warnings: &'a [Value],
}

/// Trait for implementing output guardrail check logic.
#[async_trait]
pub trait OutputCheck: Send + Sync {
    /// Inspect the output and return a decision.
    async fn check(&self, args: OutputGuardrailArgs<'_>) -> Result<Decision>;
}

#[async_trait]
impl<F> OutputCheck for F
where
    F: for<'a> Fn(OutputGuardrailArgs<'a>) -> BoxFuture<'a, Result<Decision>> + Send + Sync,
{
    async fn check(&self, args: OutputGuardrailArgs<'_>) -> Result<Decision> {
        self(args).await
    }
}

/// An output guardrail registration.
///
/// Besides the buffered check, an output guardrail may declare a per-chunk
/// [`StreamTransform`]; without one the rule only runs in the buffered pass.
#[derive(Clone, Default)]
pub struct OutputGuardrail {
    /// Stable id, used in span names when present.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// What this guardrail checks.
    pub description: Option<String>,
    /// Free-form tags for telemetry.
    pub tags: Vec<String>,
    /// Severity of this guardrail's findings.
    pub severity: Option<Severity>,
    /// Arbitrary metadata recorded on the rule's span.
    pub metadata: Option<Value>,
    /// The buffered check implementation.
    pub check: Option<Arc<dyn OutputCheck>>,
    /// Optional incremental transform for streaming text deltas.
    pub stream: Option<Arc<dyn StreamTransform>>,
}

impl OutputGuardrail {
    /// Register a bare check; the pipeline assigns a default name.
    #[must_use]
    pub fn new(check: impl OutputCheck + 'static) -> Self {
        Self {
            check: Some(Arc::new(check)),
            ..Self::default()
        }
    }

    /// Register a named check.
    #[must_use]
    pub fn named(name: impl Into<String>, check: impl OutputCheck + 'static) -> Self {
        Self {
            name: Some(name.into()),
            check: Some(Arc::new(check)),
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

    /// Set the severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Declare a per-chunk transform for streaming runs.
    #[must_use]
    pub fn with_stream(mut self, transform: impl StreamTransform + 'static) -> Self {
        self.stream = Some(Arc::new(transform));
        self
    }
}

impl fmt::Debug for OutputGuardrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputGuardrail")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("streaming", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

/// An output guardrail after normalization: resolved name, guaranteed check.
#[derive(Clone)]
pub struct NormalizedOutputGuardrail {
    /// Stable id, when given.
    pub id: Option<String>,
    /// Resolved display name.
    pub name: String,
    /// What this guardrail checks.
    pub description: Option<String>,
    /// Free-form tags for telemetry.
    pub tags: Vec<String>,
    /// Severity of this guardrail's findings.
    pub severity: Option<Severity>,
    /// Arbitrary metadata recorded on the rule's span.
    pub metadata: Option<Value>,
    /// The buffered check implementation.
    pub check: Arc<dyn OutputCheck>,
    /// Optional incremental transform for streaming text deltas.
    pub stream: Option<Arc<dyn StreamTransform>>,
}

impl NormalizedOutputGuardrail {
    /// The key this rule's streaming span is filed under in a
    /// [`StreamSpanMap`]: the id when given, otherwise the index.
    #[must_use]
    pub fn span_key(&self, index: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| index.to_string())
    }
}

impl fmt::Debug for NormalizedOutputGuardrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedOutputGuardrail")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("streaming", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

/// Canonicalize output guardrail registrations into uniform records.
///
/// # Errors
///
/// Returns [`Error::InvalidRule`] for any registration without a check.
pub fn normalize_output_guardrails(
    guardrails: &[OutputGuardrail],
    start_index: usize,
) -> Result<Vec<NormalizedOutputGuardrail>> {
    guardrails
        .iter()
        .enumerate()
        .map(|(offset, guardrail)| {
            let index = start_index + offset;
            let check = guardrail.check.clone().ok_or(Error::InvalidRule {
                kind: RuleKind::Guardrail,
                direction: Direction::Output,
                index,
            })?;
            let name = guardrail
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| {
                    default_rule_name(RuleKind::Guardrail, Direction::Output, index)
                });
            Ok(NormalizedOutputGuardrail {
                id: guardrail.id.clone(),
                name,
                description: guardrail.description.clone(),
                tags: guardrail.tags.clone(),
                severity: guardrail.severity,
                metadata: guardrail.metadata.clone(),
                check,
                stream: guardrail.stream.clone(),
            })
        })
        .collect()
}

/// Everything one output pipeline run needs.
pub struct OutputGuardrailRun<'a> {
    /// The value to inspect.
    pub output: Payload,
    /// The shared operation context.
    pub context: &'a OperationContext,
    /// The rules to execute, in order.
    pub guardrails: &'a [NormalizedOutputGuardrail],
    /// The operation this pipeline run is attached to.
    pub operation: Operation,
    /// Usage/finish-reason/warning metadata for span attributes and handler
    /// visibility.
    pub info: OutputInfo,
    /// Substitute original value, used by the trailing streaming pass so
    /// rules never see their own partial transformations as input.
    pub original_override: Option<Payload>,
    /// Spans opened during a streaming pass, to adopt instead of duplicate.
    pub span_map: Option<&'a mut StreamSpanMap>,
}

impl fmt::Debug for OutputGuardrailRun<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputGuardrailRun")
            .field("operation", &self.operation)
            .field("guardrails", &self.guardrails.len())
            .finish_non_exhaustive()
    }
}

/// Execute output guardrails against a buffered value.
///
/// Same algorithm as [`run_input_guardrails`](super::run_input_guardrails),
/// parameterized for the output direction: rejection produces
/// [`Error::OutputBlocked`], call metadata lands on spans, and spans from a
/// prior streaming pass are adopted through
/// [`span_map`](OutputGuardrailRun::span_map).
///
/// # Errors
///
/// Returns [`Error::OutputBlocked`] when a rule rejects, or the handler's
/// own error unchanged when one fails.
pub async fn run_output_guardrails(run: OutputGuardrailRun<'_>) -> Result<Payload> {
    let OutputGuardrailRun {
        output,
        context: oc,
        guardrails,
        operation,
        info,
        original_override,
        mut span_map,
    } = run;

    if guardrails.is_empty() {
        return Ok(output);
    }

    let entry = output.clone();
    let original = original_override.unwrap_or_else(|| output.clone());
    let mut current = output;
    let original_text = original.project_text();
    let mut current_text = current.project_text();

    for (index, guardrail) in guardrails.iter().enumerate() {
        let adopted = span_map
            .as_mut()
            .and_then(|map| map.remove(&guardrail.span_key(index)));
        let mut span = match adopted {
            Some(span) => span,
            None => open_rule_span(
                oc.trace().as_ref(),
                &RuleSpanInfo {
                    kind: RuleKind::Guardrail,
                    direction: Direction::Output,
                    operation,
                    index,
                    id: guardrail.id.as_deref(),
                    name: &guardrail.name,
                    description: guardrail.description.as_deref(),
                    tags: &guardrail.tags,
                    severity: guardrail.severity.map(Severity::as_str),
                    metadata: guardrail.metadata.as_ref(),
                    retry_count: None,
                },
            ),
        };
        span.set_attribute(
            "guardrail.output.original",
            original.to_trace_string().into(),
        );
        span.set_attribute("guardrail.output.current", current.to_trace_string().into());
        apply_info_attributes(span.as_mut(), &info);

        let args = OutputGuardrailArgs {
            output: &current,
            output_text: current_text.as_deref(),
            original_output: &original,
            original_output_text: original_text.as_deref(),
            context: oc,
            operation,
            usage: info.usage,
            finish_reason: info.finish_reason.as_deref(),
            warnings: &info.warnings,
        };
        let decision = match guardrail
            .check
            .check(args)
            .instrument(span.tracing_span().clone())
            .await
        {
            Ok(decision) => decision,
            Err(error) => {
                span.record_exception(&error);
                span.set_status(SpanStatus::Error, Some(&error.to_string()));
                span.end();
                return Err(error);
            }
        };

        let resolved = resolve_decision(decision, "Output blocked by guardrail");
        span.set_attribute("guardrail.pass", resolved.pass.into());
        span.set_attribute("guardrail.action", resolved.action.as_str().into());
        if let Some(message) = &resolved.message {
            span.set_attribute("guardrail.message", message.as_str().into());
        }
        if let Some(metadata) = &resolved.metadata {
            span.set_attribute("guardrail.result.metadata", metadata.to_string().into());
        }

        match resolved.outcome {
            StepOutcome::Blocked(message) => {
                let error = Error::OutputBlocked {
                    name: guardrail.name.clone(),
                    message: message.clone(),
                };
                span.set_status(SpanStatus::Error, Some(&message));
                span.end();
                oc.set_inactive();
                oc.trace().end(SpanStatus::Error, Some(&error));
                return Err(error);
            }
            StepOutcome::Modified(value) => {
                current = value;
                current_text = current.project_text();
            }
            StepOutcome::Allowed => {}
        }

        span.set_attribute("guardrail.output.after", current.to_trace_string().into());
        span.set_status(SpanStatus::Ok, None);
        span.end();

        debug!(
            guardrail = %guardrail.name,
            action = %resolved.action,
            modified = resolved.action == super::Action::Modify,
            "output guardrail evaluated"
        );
    }

    if current != entry {
        oc.trace().set_output(&current);
    }

    Ok(current)
}

fn apply_info_attributes(span: &mut dyn TraceSpan, info: &OutputInfo) {
    if let Some(usage) = info.usage {
        let serialized = serde_json::to_string(&usage).unwrap_or_default();
        span.set_attribute("guardrail.usage", serialized.into());
    }
    if let Some(finish_reason) = &info.finish_reason {
        span.set_attribute("guardrail.finish_reason", finish_reason.as_str().into());
    }
    if !info.warnings.is_empty() {
        let serialized = serde_json::to_string(&info.warnings).unwrap_or_default();
        span.set_attribute("guardrail.warnings", serialized.into());
    }
}

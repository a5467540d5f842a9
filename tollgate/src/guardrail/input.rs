//! Input guardrail types and the input blocking pipeline.
//!
//! Input guardrails observe, rewrite, or reject the user's value before the
//! model call. They run strictly in registration order; a modify decision
//! replaces the current value for every later rule, and a block decision
//! stops the pipeline with a direction-tagged error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{Instrument, debug};

use crate::context::{Operation, OperationContext};
use crate::error::{Direction, Error, Result, RuleKind};
use crate::payload::Payload;
use crate::trace::{RuleSpanInfo, SpanStatus, open_rule_span};

use super::{Decision, Severity, StepOutcome, default_rule_name, resolve_decision};

/// Arguments passed to an input guardrail handler.
///
/// `input` is the current (possibly already modified) value; `original_input`
/// is the value the pipeline started with, for handlers that want to
/// compare. Text projections are precomputed.
#[derive(Debug)]
pub struct InputGuardrailArgs<'a> {
    /// The current value under inspection.
    pub input: &'a Payload,
    /// Text projection of the current value.
    pub input_text: Option<&'a str>,
    /// The value the pipeline started with.
    pub original_input: &'a Payload,
    /// Text projection of the original value.
    pub original_input_text: Option<&'a str>,
    /// The shared operation context.
    pub context: &'a OperationContext,
    /// The operation this pipeline run is attached to.
    pub operation: Operation,
}

/// Trait for implementing input guardrail check logic.
///
/// Implement this on your own struct, or pass a function returning a boxed
/// future — both registration shapes normalize to the same record.
#[async_trait]
pub trait InputCheck: Send + Sync {
    /// Inspect the input and return a decision.
    async fn check(&self, args: InputGuardrailArgs<'_>) -> Result<Decision>;
}

#[async_trait]
impl<F> InputCheck for F
where
    F: for<'a> Fn(InputGuardrailArgs<'a>) -> BoxFuture<'a, Result<Decision>> + Send + Sync,
{
    async fn check(&self, args: InputGuardrailArgs<'_>) -> Result<Decision> {
        self(args).await
    }
}

/// An input guardrail registration.
///
/// All identity fields are optional; normalization assigns a deterministic
/// numbered name when none is given. A registration without a check fails
/// normalization with a configuration error.
#[derive(Clone, Default)]
pub struct InputGuardrail {
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
    /// The check implementation.
    pub check: Option<Arc<dyn InputCheck>>,
}

impl InputGuardrail {
    /// Register a bare check; the pipeline assigns a default name.
    #[must_use]
    pub fn new(check: impl InputCheck + 'static) -> Self {
        Self {
            check: Some(Arc::new(check)),
            ..Self::default()
        }
    }

    /// Register a named check.
    #[must_use]
    pub fn named(name: impl Into<String>, check: impl InputCheck + 'static) -> Self {
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
}

impl fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// An input guardrail after normalization: resolved name, guaranteed check.
///
/// Rebuilt per pipeline invocation; immutable once built.
#[derive(Clone)]
pub struct NormalizedInputGuardrail {
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
    /// The check implementation.
    pub check: Arc<dyn InputCheck>,
}

impl fmt::Debug for NormalizedInputGuardrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedInputGuardrail")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// Canonicalize input guardrail registrations into uniform records.
///
/// `start_index` offsets default numbering so rules collected from several
/// registration sources (agent-level plus call-level) number continuously.
///
/// # Errors
///
/// Returns [`Error::InvalidRule`] for any registration without a check.
pub fn normalize_input_guardrails(
    guardrails: &[InputGuardrail],
    start_index: usize,
) -> Result<Vec<NormalizedInputGuardrail>> {
    guardrails
        .iter()
        .enumerate()
        .map(|(offset, guardrail)| {
            let index = start_index + offset;
            let check = guardrail.check.clone().ok_or(Error::InvalidRule {
                kind: RuleKind::Guardrail,
                direction: Direction::Input,
                index,
            })?;
            let name = guardrail
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| default_rule_name(RuleKind::Guardrail, Direction::Input, index));
            Ok(NormalizedInputGuardrail {
                id: guardrail.id.clone(),
                name,
                description: guardrail.description.clone(),
                tags: guardrail.tags.clone(),
                severity: guardrail.severity,
                metadata: guardrail.metadata.clone(),
                check,
            })
        })
        .collect()
}

/// Execute input guardrails against a buffered value.
///
/// Empty rule lists return the value unchanged and touch no telemetry.
/// Otherwise rules run in array order; each sees the previous rule's
/// modifications, a block stops the loop, and the final value is published
/// through the trace adapter exactly once if it differs from the input.
///
/// # Errors
///
/// Returns [`Error::InputBlocked`] when a rule rejects, or the handler's own
/// error unchanged when one fails.
pub async fn run_input_guardrails(
    input: Payload,
    oc: &OperationContext,
    guardrails: &[NormalizedInputGuardrail],
    operation: Operation,
) -> Result<Payload> {
    if guardrails.is_empty() {
        return Ok(input);
    }

    let original = input;
    let mut current = original.clone();
    let original_text = original.project_text();
    let mut current_text = original_text.clone();

    for (index, guardrail) in guardrails.iter().enumerate() {
        let mut span = open_rule_span(
            oc.trace().as_ref(),
            &RuleSpanInfo {
                kind: RuleKind::Guardrail,
                direction: Direction::Input,
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
        );
        span.set_attribute("guardrail.input.original", original.to_trace_string().into());
        span.set_attribute("guardrail.input.current", current.to_trace_string().into());

        let args = InputGuardrailArgs {
            input: &current,
            input_text: current_text.as_deref(),
            original_input: &original,
            original_input_text: original_text.as_deref(),
            context: oc,
            operation,
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

        let resolved = resolve_decision(decision, "Input blocked by guardrail");
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
                let error = Error::InputBlocked {
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

        span.set_attribute("guardrail.input.after", current.to_trace_string().into());
        span.set_status(SpanStatus::Ok, None);
        span.end();

        debug!(
            guardrail = %guardrail.name,
            action = %resolved.action,
            modified = resolved.action == super::Action::Modify,
            "input guardrail evaluated"
        );
    }

    if current != original {
        oc.trace().set_input(&current);
    }

    Ok(current)
}

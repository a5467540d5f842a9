//! Guardrail pipelines — inspection and transformation rules for agent
//! input and output.
//!
//! A guardrail is an independently-authored rule with a pass/modify/block
//! decision contract. Rules are registered either as bare handlers or as
//! descriptors with identity fields, normalized into one uniform record,
//! then executed in registration order:
//!
//! - **[`run_input_guardrails`]** runs before the model call, over the
//!   buffered input value.
//! - **[`run_output_guardrails`]** runs after the model call, over the
//!   buffered output value.
//! - **[`GuardrailStreamPipeline`]** applies per-chunk transforms to a live
//!   chunk sequence while accumulating text, then runs the buffered output
//!   pass once at stream completion for canonical telemetry.
//!
//! Semantic guarantees are identical in the buffered and streaming shapes:
//! registration-order execution, chained modification (a later rule sees
//! the previous rule's output, never the pre-modification value), and
//! at-most-one block that stops the pipeline.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tollgate::{Decision, InputCheck, InputGuardrail, InputGuardrailArgs, Result};
//!
//! struct ForbiddenWords;
//!
//! #[async_trait::async_trait]
//! impl InputCheck for ForbiddenWords {
//!     async fn check(&self, args: InputGuardrailArgs<'_>) -> Result<Decision> {
//!         match args.input_text {
//!             Some(text) if text.contains("forbidden") => {
//!                 Ok(Decision::block("Forbidden content detected"))
//!             }
//!             _ => Ok(Decision::allow()),
//!         }
//!     }
//! }
//!
//! let rules = normalize_input_guardrails(
//!     &[InputGuardrail::named("forbidden-words", ForbiddenWords)],
//!     0,
//! )?;
//! let cleared = run_input_guardrails(input, &context, &rules, Operation::GenerateText).await?;
//! ```

mod input;
mod output;
mod stream;

pub use input::{
    InputCheck, InputGuardrail, InputGuardrailArgs, NormalizedInputGuardrail,
    normalize_input_guardrails, run_input_guardrails,
};
pub use output::{
    NormalizedOutputGuardrail, OutputCheck, OutputGuardrail, OutputGuardrailArgs,
    OutputGuardrailRun, OutputInfo, normalize_output_guardrails, run_output_guardrails,
};
pub use stream::{
    ChunkStream, GuardrailStreamPipeline, SanitizedChunkStream, SanitizedTextStream, StreamChunk,
    StreamState, StreamTransform,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Direction, RuleKind};
use crate::payload::Payload;

/// How severe a guardrail's findings are, for telemetry and triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Worth surfacing but not dangerous.
    Warning,
    /// A policy violation.
    Error,
    /// A violation that must never reach the user.
    Critical,
}

impl Severity {
    /// The severity's wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a guardrail decided to do with the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Let the value through unchanged.
    Allow,
    /// Replace the value with [`Decision::modified`].
    Modify,
    /// Reject the value and stop the pipeline.
    Block,
}

impl Action {
    /// The action's wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Modify => "modify",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_pass() -> bool {
    true
}

/// The structured return value of a guardrail handler.
///
/// `action == Block` and `pass == false` are equivalent rejection triggers.
/// When `action` is absent it derives from `pass`. A `Modify` action with no
/// [`modified`](Self::modified) value is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the value passed the check. Defaults to `true`.
    #[serde(default = "default_pass")]
    pub pass: bool,
    /// Explicit action; derived from `pass` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Replacement value for a modify decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<Payload>,
    /// Human-readable reason, used as the rejection message on block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Arbitrary metadata recorded on the rule's span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            pass: true,
            action: None,
            modified: None,
            message: None,
            metadata: None,
        }
    }
}

impl Decision {
    /// A passing decision with nothing to say.
    #[must_use]
    pub fn allow() -> Self {
        Self::default()
    }

    /// A blocking decision with the given rejection message.
    #[must_use]
    pub fn block(message: impl Into<String>) -> Self {
        Self {
            pass: false,
            action: Some(Action::Block),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A modify decision replacing the value.
    #[must_use]
    pub fn modify(value: impl Into<Payload>) -> Self {
        Self {
            action: Some(Action::Modify),
            modified: Some(value.into()),
            ..Self::default()
        }
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach metadata for observability.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Convenience conversion: a string becomes a blocking decision.
impl From<&str> for Decision {
    fn from(message: &str) -> Self {
        Self::block(message)
    }
}

/// What one pipeline step resolved to, kept explicit so the core loop does
/// not drive control flow through errors.
pub(crate) enum StepOutcome {
    Allowed,
    Modified(Payload),
    Blocked(String),
}

pub(crate) struct ResolvedDecision {
    pub pass: bool,
    pub action: Action,
    pub message: Option<String>,
    pub metadata: Option<Value>,
    pub outcome: StepOutcome,
}

/// Resolve a raw decision into its effective action and step outcome.
pub(crate) fn resolve_decision(decision: Decision, default_message: &str) -> ResolvedDecision {
    let Decision {
        pass,
        action,
        modified,
        message,
        metadata,
    } = decision;

    let action = action.unwrap_or(if pass { Action::Allow } else { Action::Block });
    let outcome = if !pass || action == Action::Block {
        StepOutcome::Blocked(
            message
                .clone()
                .unwrap_or_else(|| default_message.to_string()),
        )
    } else if action == Action::Modify {
        match modified {
            Some(value) => StepOutcome::Modified(value),
            // Modify with nothing to apply is a no-op.
            None => StepOutcome::Allowed,
        }
    } else {
        StepOutcome::Allowed
    };

    ResolvedDecision {
        pass,
        action,
        message,
        metadata,
        outcome,
    }
}

/// Deterministic default name for an unnamed rule.
pub(crate) fn default_rule_name(kind: RuleKind, direction: Direction, index: usize) -> String {
    format!("{} {} #{}", direction.title(), kind.title(), index + 1)
}

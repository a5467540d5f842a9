//! Unified error types for the tollgate pipelines.
//!
//! Three kinds of failure leave a pipeline run:
//!
//! - **Rule rejection** — a guardrail returned a block decision. Surfaced as
//!   [`Error::InputBlocked`] or [`Error::OutputBlocked`] carrying the rule's
//!   message.
//! - **Middleware abort** — a middleware handler returned a
//!   [`MiddlewareAbort`], optionally hinting that the whole operation is
//!   worth retrying.
//! - **Handler fault** — a rule's own logic failed. Whatever error the
//!   handler returned propagates unchanged.
//!
//! None of these are retried inside the pipeline; retry policy belongs to
//! the caller.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result type alias for tollgate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of the model call a rule is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Rules applied to the value entering the model call.
    Input,
    /// Rules applied to the value produced by the model call.
    Output,
}

impl Direction {
    /// Lowercase label used in span names and attributes.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    /// Capitalized label used in default rule names.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two rule families the pipelines execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// A rule with a pass/modify/block decision contract.
    Guardrail,
    /// A rule with transform-or-abort semantics only.
    Middleware,
}

impl RuleKind {
    /// Lowercase label used as the span attribute prefix.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Guardrail => "guardrail",
            Self::Middleware => "middleware",
        }
    }

    /// Capitalized label used in default rule names.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Guardrail => "Guardrail",
            Self::Middleware => "Middleware",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The main error type for the tollgate pipelines.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An input guardrail rejected the value.
    #[error("{message}")]
    InputBlocked {
        /// Name of the guardrail that blocked.
        name: String,
        /// The rule's rejection message.
        message: String,
    },

    /// An output guardrail rejected the value.
    #[error("{message}")]
    OutputBlocked {
        /// Name of the guardrail that blocked.
        name: String,
        /// The rule's rejection message.
        message: String,
    },

    /// A middleware aborted the operation.
    #[error("{0}")]
    MiddlewareAborted(MiddlewareAbort),

    /// A rule was registered without a handler.
    ///
    /// This is a startup-time configuration error raised by normalization,
    /// not a runtime pipeline error.
    #[error("invalid {direction} {kind} configuration at index {index}")]
    InvalidRule {
        /// Whether the offending entry is a guardrail or a middleware.
        kind: RuleKind,
        /// The direction the entry was registered for.
        direction: Direction,
        /// Position of the offending entry in its registration list.
        index: usize,
    },

    /// A rule handler failed with its own error.
    #[error("{0}")]
    Handler(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a handler error with a message.
    #[must_use]
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Returns `true` if this error is a guardrail rejection.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::InputBlocked { .. } | Self::OutputBlocked { .. })
    }

    /// The retry hint carried by a middleware abort, if any.
    ///
    /// Callers can branch on this to offer a "try again" affordance.
    #[must_use]
    pub fn retry_hint(&self) -> Option<bool> {
        match self {
            Self::MiddlewareAborted(abort) => abort.retry,
            _ => None,
        }
    }
}

/// The payload of an explicit middleware abort.
///
/// Distinguishable from a plain handler fault by type so callers can decide
/// whether to retry the whole operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareAbort {
    /// Why the middleware aborted.
    pub reason: String,
    /// Hint that the operation is worth retrying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    /// Arbitrary metadata attached by the middleware.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Id of the middleware that aborted, filled in by the runner when the
    /// middleware did not set it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middleware_id: Option<String>,
}

impl MiddlewareAbort {
    /// Create an abort with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retry: None,
            metadata: None,
            middleware_id: None,
        }
    }

    /// Set the retry hint.
    #[must_use]
    pub const fn with_retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Display for MiddlewareAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl From<MiddlewareAbort> for Error {
    fn from(abort: MiddlewareAbort) -> Self {
        Self::MiddlewareAborted(abort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_error_displays_rule_message() {
        let err = Error::InputBlocked {
            name: "pii".into(),
            message: "Input blocked by guardrail".into(),
        };
        assert_eq!(err.to_string(), "Input blocked by guardrail");
        assert!(err.is_blocked());
    }

    #[test]
    fn invalid_rule_names_index_and_direction() {
        let err = Error::InvalidRule {
            kind: RuleKind::Guardrail,
            direction: Direction::Output,
            index: 2,
        };
        assert_eq!(
            err.to_string(),
            "invalid output guardrail configuration at index 2"
        );
    }

    #[test]
    fn abort_retry_hint_round_trips() {
        let err: Error = MiddlewareAbort::new("rate limited").with_retry(true).into();
        assert_eq!(err.retry_hint(), Some(true));
        assert_eq!(err.to_string(), "rate limited");

        let plain = Error::handler("boom");
        assert_eq!(plain.retry_hint(), None);
    }
}

//! Per-operation execution context shared with rule handlers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::trace::{TraceAdapter, TracingAdapter};

/// The agent operation a pipeline run is attached to.
///
/// Recorded on every rule span; handlers may branch on it (for example, a
/// rule that only applies to object generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Buffered text generation.
    GenerateText,
    /// Streaming text generation.
    StreamText,
    /// Buffered object generation.
    GenerateObject,
    /// Streaming object generation.
    StreamObject,
}

impl Operation {
    /// The operation's wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenerateText => "generateText",
            Self::StreamText => "streamText",
            Self::GenerateObject => "generateObject",
            Self::StreamObject => "streamObject",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage reported by the model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced by the model.
    pub output_tokens: u64,
    /// Total tokens for the call.
    pub total_tokens: u64,
}

/// Cooperative cancellation flag consulted by rule handlers.
///
/// The pipelines never forcibly interrupt a running handler; handlers are
/// expected to check this flag across their own suspension points.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Create a new, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Externally owned mutable state threaded through one agent invocation.
///
/// Created at the start of one generate/stream call and discarded at its
/// end; never shared between invocations. The pipelines flip
/// [`is_active`](Self::is_active) to `false` when a guardrail rejects.
pub struct OperationContext {
    /// Unique id for this operation.
    pub operation_id: String,
    active: AtomicBool,
    abort: AbortFlag,
    trace: Arc<dyn TraceAdapter>,
}

impl OperationContext {
    /// Create a context with the default tracing-backed adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_trace(Arc::new(TracingAdapter))
    }

    /// Create a context with an explicit trace adapter.
    #[must_use]
    pub fn with_trace(trace: Arc<dyn TraceAdapter>) -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            active: AtomicBool::new(true),
            abort: AbortFlag::new(),
            trace,
        }
    }

    /// Whether the operation is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_inactive(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// The cancellation flag for this operation.
    #[must_use]
    pub fn abort_flag(&self) -> &AbortFlag {
        &self.abort
    }

    /// The trace adapter for this operation.
    #[must_use]
    pub fn trace(&self) -> &Arc<dyn TraceAdapter> {
        &self.trace
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("operation_id", &self.operation_id)
            .field("active", &self.is_active())
            .field("aborted", &self.abort.is_aborted())
            .finish_non_exhaustive()
    }
}

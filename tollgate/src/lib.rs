#![allow(tail_expr_drop_order)]
//! Tollgate intercepts the values flowing into and out of an LLM-agent
//! invocation and runs independently-authored rules over them — guardrails
//! with a pass/modify/block decision contract, and lighter-weight
//! middlewares with transform-or-abort semantics — without the agent core
//! knowing how many rules exist or what they do.
//!
//! The same semantic guarantees hold in both execution shapes the crate
//! supports: a simple buffered call, and a live token-by-token stream that
//! is being consumed by a remote client while the rules are still running.
//! Rules always run in registration order, a later rule sees the previous
//! rule's modifications, and at most one block stops the pipeline.
//!
//! # Pieces
//!
//! - [`guardrail`] — rule normalization, the blocking input/output
//!   pipelines, and the streaming pipeline with its trailing buffered pass.
//! - [`middleware`] — the transform-or-abort pipelines.
//! - [`payload`] — the value under inspection and its pure text projection.
//! - [`trace`] — the adapter seam to whatever span storage the application
//!   uses; defaults to the `tracing` ecosystem.
//! - [`context`] — the per-operation state bag (activity flag, abort flag,
//!   trace handle) threaded through one agent invocation.
//!
//! Nothing here decides *what* a rule checks, retries failed model calls,
//! or talks to a transport; those belong to the surrounding system.

pub mod context;
pub mod error;
pub mod guardrail;
pub mod message;
pub mod middleware;
pub mod payload;
pub mod trace;

pub use context::{AbortFlag, Operation, OperationContext, Usage};
pub use error::{Direction, Error, MiddlewareAbort, Result, RuleKind};
pub use guardrail::{
    Action, ChunkStream, Decision, GuardrailStreamPipeline, InputCheck, InputGuardrail,
    InputGuardrailArgs, NormalizedInputGuardrail, NormalizedOutputGuardrail, OutputCheck,
    OutputGuardrail, OutputGuardrailArgs, OutputGuardrailRun, OutputInfo, Severity, StreamChunk,
    StreamState, StreamTransform, normalize_input_guardrails, normalize_output_guardrails,
    run_input_guardrails, run_output_guardrails,
};
pub use message::{ContentPart, Message, Role};
pub use middleware::{
    InputMiddleware, InputMiddlewareArgs, InputMiddlewareHandler, NormalizedInputMiddleware,
    NormalizedOutputMiddleware, OutputMiddleware, OutputMiddlewareArgs, OutputMiddlewareHandler,
    normalize_input_middlewares, normalize_output_middlewares, run_input_middlewares,
    run_output_middlewares,
};
pub use payload::Payload;

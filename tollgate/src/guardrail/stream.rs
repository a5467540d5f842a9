//! Streaming pipeline runner: per-chunk guardrail transforms over a live
//! chunk sequence, paired with one trailing buffered pass.
//!
//! A single pump drives one pass over the raw chunk sequence. Both derived
//! sequences — the sanitized chunk stream and the sanitized text stream —
//! are views over that pass, never independent re-reads, so a rule's
//! scratch state is mutated exactly once per chunk. Consumers and
//! [`GuardrailStreamPipeline::finalize`] all drive the same pump and only
//! ever read from its queued outputs, which prevents double-consumption of
//! the upstream.
//!
//! Per-chunk transform failures are fail-soft: a live stream cannot be
//! unsent, so the failure is logged and the chunk forwarded unmodified for
//! that rule's stage. The trailing buffered pass keeps the fail-hard
//! contract of the blocking runner but is advisory with respect to chunks
//! already delivered to a consumer.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::context::{Operation, OperationContext, Usage};
use crate::error::{Direction, Result, RuleKind};
use crate::payload::Payload;
use crate::trace::{RuleSpanInfo, StreamSpanMap, open_rule_span};

use super::output::{
    NormalizedOutputGuardrail, OutputGuardrailRun, OutputInfo, run_output_guardrails,
};
use super::Severity;

/// One event in a model's output stream.
///
/// Only [`StreamChunk::TextDelta`] is eligible for per-rule streaming
/// transforms; every other variant passes through unexamined, exactly once,
/// in original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamChunk {
    /// The stream opened.
    Start,
    /// A text segment opened.
    TextStart {
        /// Segment id.
        id: String,
    },
    /// A piece of generated text.
    TextDelta {
        /// Segment id.
        id: String,
        /// The text fragment.
        delta: String,
    },
    /// A text segment closed.
    TextEnd {
        /// Segment id.
        id: String,
    },
    /// Tool input started streaming.
    ToolInputStart {
        /// Call id.
        id: String,
        /// Name of the tool.
        tool_name: String,
    },
    /// A piece of streamed tool input.
    ToolInputDelta {
        /// Call id.
        id: String,
        /// The input fragment.
        delta: String,
    },
    /// Tool input finished streaming.
    ToolInputEnd {
        /// Call id.
        id: String,
    },
    /// A complete tool invocation.
    ToolCall {
        /// Call id.
        tool_call_id: String,
        /// Name of the tool.
        tool_name: String,
        /// Arguments as a JSON value.
        input: Value,
    },
    /// The result of a tool invocation.
    ToolResult {
        /// Call id.
        tool_call_id: String,
        /// Result content as a JSON value.
        output: Value,
    },
    /// The stream completed.
    Finish {
        /// Why the model stopped generating.
        finish_reason: Option<String>,
        /// Token usage for the call.
        usage: Option<Usage>,
    },
    /// The upstream reported an error.
    Error {
        /// Rendered error message.
        message: String,
    },
}

/// The raw chunk sequence produced by the model-call layer.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Per-rule mutable scratch for one streaming invocation.
///
/// Scoped to the pipeline run and discarded when it ends; never shared
/// across concurrent invocations.
#[derive(Debug, Default)]
pub struct StreamState {
    values: Map<String, Value>,
}

impl StreamState {
    /// Read a stored value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store a value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Increment a counter stored under `key`, returning the new count.
    pub fn increment(&mut self, key: &str) -> u64 {
        let next = self
            .values
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(0)
            .saturating_add(1);
        self.values.insert(key.to_string(), Value::from(next));
        next
    }
}

/// A guardrail's incremental transform, applied to each text delta as it
/// arrives.
///
/// Transforms are chained in registration order — each sees the previous
/// rule's output — and receive a private [`StreamState`]. A failing
/// transform does not abort the stream; the delta is forwarded unmodified
/// for that rule's stage.
pub trait StreamTransform: Send + Sync {
    /// Rewrite one text delta.
    ///
    /// # Errors
    ///
    /// A returned error is logged and the delta forwarded unchanged.
    fn transform(&self, delta: &str, state: &mut StreamState) -> Result<String>;
}

impl<F> StreamTransform for F
where
    F: Fn(&str, &mut StreamState) -> Result<String> + Send + Sync,
{
    fn transform(&self, delta: &str, state: &mut StreamState) -> Result<String> {
        self(delta, state)
    }
}

struct PumpState {
    upstream: Option<ChunkStream>,
    scratch: Vec<StreamState>,
    spans: StreamSpanMap,
    original_text: String,
    sanitized_text: String,
    chunk_buf: VecDeque<StreamChunk>,
    text_buf: VecDeque<String>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    wakers: Vec<Waker>,
}

impl PumpState {
    fn register_waker(&mut self, cx: &Context<'_>) {
        if !self.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            self.wakers.push(cx.waker().clone());
        }
    }

    fn wake_all(&mut self) {
        for waker in self.wakers.drain(..) {
            waker.wake();
        }
    }
}

struct PipelineShared {
    state: Mutex<PumpState>,
    final_text: Mutex<Option<String>>,
    oc: Arc<OperationContext>,
    operation: Operation,
    rules: Vec<NormalizedOutputGuardrail>,
}

impl PipelineShared {
    fn lock_state(&self) -> MutexGuard<'_, PumpState> {
        self.state.lock().expect("stream pump state poisoned")
    }

    /// Pull one chunk from the upstream into the queues.
    ///
    /// `Ready` means progress was made (or the upstream just finished);
    /// `Pending` means the upstream registered `cx` and parked.
    fn pump(&self, st: &mut PumpState, cx: &mut Context<'_>) -> Poll<()> {
        let Some(upstream) = st.upstream.as_mut() else {
            return Poll::Ready(());
        };
        match upstream.as_mut().poll_next(cx) {
            Poll::Ready(Some(chunk)) => {
                self.ingest(st, chunk);
                st.wake_all();
                Poll::Ready(())
            }
            Poll::Ready(None) => {
                st.upstream = None;
                st.wake_all();
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn ingest(&self, st: &mut PumpState, chunk: StreamChunk) {
        match chunk {
            StreamChunk::TextDelta { id, delta } => {
                st.original_text.push_str(&delta);
                let mut text = delta;
                for (index, rule) in self.rules.iter().enumerate() {
                    let Some(transform) = rule.stream.as_ref() else {
                        continue;
                    };
                    self.ensure_stream_span(st, index, rule);
                    match transform.transform(&text, &mut st.scratch[index]) {
                        Ok(next) => text = next,
                        Err(error) => {
                            warn!(
                                guardrail = %rule.name,
                                %error,
                                "stream transform failed; delta forwarded unmodified"
                            );
                        }
                    }
                }
                st.sanitized_text.push_str(&text);
                st.text_buf.push_back(text.clone());
                st.chunk_buf.push_back(StreamChunk::TextDelta { id, delta: text });
            }
            StreamChunk::Finish {
                finish_reason,
                usage,
            } => {
                st.finish_reason.clone_from(&finish_reason);
                st.usage = usage;
                st.chunk_buf.push_back(StreamChunk::Finish {
                    finish_reason,
                    usage,
                });
            }
            other => st.chunk_buf.push_back(other),
        }
    }

    /// Open the rule's streaming span on its first transformed delta, so
    /// the trailing buffered pass adopts it instead of opening a twin.
    fn ensure_stream_span(&self, st: &mut PumpState, index: usize, rule: &NormalizedOutputGuardrail) {
        let key = rule.span_key(index);
        if st.spans.contains_key(&key) {
            return;
        }
        let span = open_rule_span(
            self.oc.trace().as_ref(),
            &RuleSpanInfo {
                kind: RuleKind::Guardrail,
                direction: Direction::Output,
                operation: self.operation,
                index,
                id: rule.id.as_deref(),
                name: &rule.name,
                description: rule.description.as_deref(),
                tags: &rule.tags,
                severity: rule.severity.map(Severity::as_str),
                metadata: rule.metadata.as_ref(),
                retry_count: None,
            },
        );
        st.spans.insert(key, span);
    }
}

/// The streaming pipeline runner.
///
/// Built from the model's raw chunk sequence and the normalized output
/// guardrails; hands back sanitized views plus a finalize handle. Each
/// derived stream is single-consumer: taking two handles to the same view
/// splits items between them.
pub struct GuardrailStreamPipeline {
    shared: Arc<PipelineShared>,
}

impl GuardrailStreamPipeline {
    /// Wrap a raw chunk stream in the guardrail pipeline.
    #[must_use]
    pub fn new(
        upstream: ChunkStream,
        context: Arc<OperationContext>,
        guardrails: Vec<NormalizedOutputGuardrail>,
        operation: Operation,
    ) -> Self {
        let scratch = guardrails.iter().map(|_| StreamState::default()).collect();
        Self {
            shared: Arc::new(PipelineShared {
                state: Mutex::new(PumpState {
                    upstream: Some(upstream),
                    scratch,
                    spans: StreamSpanMap::new(),
                    original_text: String::new(),
                    sanitized_text: String::new(),
                    chunk_buf: VecDeque::new(),
                    text_buf: VecDeque::new(),
                    finish_reason: None,
                    usage: None,
                    wakers: Vec::new(),
                }),
                final_text: Mutex::new(None),
                oc: context,
                operation,
                rules: guardrails,
            }),
        }
    }

    /// The sanitized chunk sequence.
    #[must_use]
    pub fn full_stream(&self) -> SanitizedChunkStream {
        SanitizedChunkStream {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The sanitized text-delta sequence.
    #[must_use]
    pub fn text_stream(&self) -> SanitizedTextStream {
        SanitizedTextStream {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Drain the upstream, then run the buffered output pass once over the
    /// accumulated original text.
    ///
    /// Resolves when that trailing pass completes, successfully or not,
    /// yielding the canonical sanitized text for telemetry and persistence.
    /// The pass adopts the spans opened while streaming. It is advisory
    /// with respect to content already delivered to a live consumer: a late
    /// block decision surfaces here as an error but does not retract
    /// delivered chunks.
    ///
    /// # Errors
    ///
    /// Returns the buffered pass's rejection or handler error unchanged.
    pub async fn finalize(&self) -> Result<String> {
        if let Some(text) = self
            .final_text_slot()
            .clone()
        {
            return Ok(text);
        }

        // Drive the pump until the upstream is exhausted. Chunks land in
        // the queues for any consumer still reading.
        futures::future::poll_fn(|cx| {
            let mut st = self.shared.lock_state();
            loop {
                if st.upstream.is_none() {
                    return Poll::Ready(());
                }
                match self.shared.pump(&mut st, cx) {
                    Poll::Ready(()) => {}
                    Poll::Pending => {
                        st.register_waker(cx);
                        return Poll::Pending;
                    }
                }
            }
        })
        .await;

        let (original, mut span_map, info) = {
            let mut st = self.shared.lock_state();
            (
                st.original_text.clone(),
                std::mem::take(&mut st.spans),
                OutputInfo {
                    usage: st.usage,
                    finish_reason: st.finish_reason.clone(),
                    warnings: Vec::new(),
                },
            )
        };

        let result = run_output_guardrails(OutputGuardrailRun {
            output: Payload::Text(original.clone()),
            context: &self.shared.oc,
            guardrails: &self.shared.rules,
            operation: self.shared.operation,
            info,
            original_override: Some(Payload::Text(original)),
            span_map: Some(&mut span_map),
        })
        .await?;

        let text = result.project_text().unwrap_or_default();
        *self
            .shared
            .final_text
            .lock()
            .expect("final text slot poisoned") = Some(text.clone());
        Ok(text)
    }

    /// The fully sanitized text: the buffered pass's result once
    /// [`finalize`](Self::finalize) has completed, otherwise the live
    /// streaming accumulator so far.
    #[must_use]
    pub fn sanitized_text(&self) -> String {
        if let Some(text) = self.final_text_slot().clone() {
            return text;
        }
        self.shared.lock_state().sanitized_text.clone()
    }

    fn final_text_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.shared
            .final_text
            .lock()
            .expect("final text slot poisoned")
    }
}

impl fmt::Debug for GuardrailStreamPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardrailStreamPipeline")
            .field("operation", &self.shared.operation)
            .field("guardrails", &self.shared.rules.len())
            .finish_non_exhaustive()
    }
}

/// Sanitized view over the full chunk sequence.
pub struct SanitizedChunkStream {
    shared: Arc<PipelineShared>,
}

impl Stream for SanitizedChunkStream {
    type Item = StreamChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let shared = &self.shared;
        let mut st = shared.lock_state();
        loop {
            if let Some(chunk) = st.chunk_buf.pop_front() {
                return Poll::Ready(Some(chunk));
            }
            if st.upstream.is_none() {
                return Poll::Ready(None);
            }
            match shared.pump(&mut st, cx) {
                Poll::Ready(()) => {}
                Poll::Pending => {
                    st.register_waker(cx);
                    return Poll::Pending;
                }
            }
        }
    }
}

impl fmt::Debug for SanitizedChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizedChunkStream").finish_non_exhaustive()
    }
}

/// Sanitized view over the text deltas only.
pub struct SanitizedTextStream {
    shared: Arc<PipelineShared>,
}

impl Stream for SanitizedTextStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let shared = &self.shared;
        let mut st = shared.lock_state();
        loop {
            if let Some(text) = st.text_buf.pop_front() {
                return Poll::Ready(Some(text));
            }
            if st.upstream.is_none() {
                return Poll::Ready(None);
            }
            match shared.pump(&mut st, cx) {
                Poll::Ready(()) => {}
                Poll::Pending => {
                    st.register_waker(cx);
                    return Poll::Pending;
                }
            }
        }
    }
}

impl fmt::Debug for SanitizedTextStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizedTextStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;

    use crate::error::Error;
    use crate::guardrail::output::{OutputCheck, OutputGuardrail, OutputGuardrailArgs, normalize_output_guardrails};
    use crate::guardrail::Decision;
    use crate::trace::RecordingAdapter;

    use super::*;

    fn chunks(parts: Vec<StreamChunk>) -> ChunkStream {
        Box::pin(futures::stream::iter(parts))
    }

    fn delta(id: &str, text: &str) -> StreamChunk {
        StreamChunk::TextDelta {
            id: id.into(),
            delta: text.into(),
        }
    }

    fn redact(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_digits = false;
        for c in text.chars() {
            if c.is_ascii_digit() {
                if !in_digits {
                    out.push_str("[redacted]");
                    in_digits = true;
                }
            } else {
                in_digits = false;
                out.push(c);
            }
        }
        out
    }

    struct RedactDigits;

    #[async_trait]
    impl OutputCheck for RedactDigits {
        async fn check(&self, args: OutputGuardrailArgs<'_>) -> Result<Decision> {
            let text = args.output_text.unwrap_or_default();
            Ok(Decision::modify(redact(text)))
        }
    }

    fn redact_guardrail() -> OutputGuardrail {
        OutputGuardrail::named("Redact Digits", RedactDigits)
            .with_id("redact-digits")
            .with_stream(|delta: &str, _state: &mut StreamState| Ok(redact(delta)))
    }

    fn recording_context() -> (Arc<OperationContext>, RecordingAdapter) {
        let adapter = RecordingAdapter::new();
        let oc = Arc::new(OperationContext::with_trace(Arc::new(adapter.clone())));
        (oc, adapter)
    }

    #[tokio::test]
    async fn streams_sanitized_text_deltas_incrementally() {
        let (oc, _adapter) = recording_context();
        let rules = normalize_output_guardrails(&[redact_guardrail()], 0).unwrap();
        let pipeline = GuardrailStreamPipeline::new(
            chunks(vec![
                StreamChunk::TextStart { id: "text-1".into() },
                delta("text-1", "id 1234567890 "),
                delta("text-1", "is secret."),
                StreamChunk::TextEnd { id: "text-1".into() },
                StreamChunk::Finish {
                    finish_reason: Some("stop".into()),
                    usage: None,
                },
            ]),
            oc,
            rules,
            Operation::StreamText,
        );

        let streamed: String = pipeline.text_stream().collect::<Vec<_>>().await.join("");
        let final_text = pipeline.finalize().await.unwrap();

        assert_eq!(streamed, "id [redacted] is secret.");
        assert_eq!(final_text, streamed);
        assert!(!streamed.chars().any(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn forwards_non_text_chunks_exactly_once() {
        let (oc, _adapter) = recording_context();

        struct Emphasize;

        #[async_trait]
        impl OutputCheck for Emphasize {
            async fn check(&self, args: OutputGuardrailArgs<'_>) -> Result<Decision> {
                let text = args.output_text.unwrap_or_default();
                Ok(Decision::modify(format!("{text} [checked]")))
            }
        }

        let emphasize = OutputGuardrail::named("Emphasize Invalid", Emphasize)
            .with_id("emphasize")
            .with_stream(|delta: &str, state: &mut StreamState| {
                state.increment("count");
                Ok(delta.replace("invalid", "INVALID"))
            });

        let rules =
            normalize_output_guardrails(&[redact_guardrail(), emphasize], 0).unwrap();
        let pipeline = GuardrailStreamPipeline::new(
            chunks(vec![
                StreamChunk::Start,
                StreamChunk::ToolInputStart {
                    id: "tool-1".into(),
                    tool_name: "lookup".into(),
                },
                StreamChunk::ToolInputDelta {
                    id: "tool-1".into(),
                    delta: "lookup account".into(),
                },
                StreamChunk::ToolInputEnd { id: "tool-1".into() },
                StreamChunk::ToolCall {
                    tool_call_id: "tool-1".into(),
                    tool_name: "lookup".into(),
                    input: json!({"query": "account status"}),
                },
                StreamChunk::ToolResult {
                    tool_call_id: "tool-1".into(),
                    output: json!("ok"),
                },
                StreamChunk::TextStart { id: "text-7".into() },
                delta("text-7", "Card number 4242424242424242 "),
                delta("text-7", "is invalid."),
                StreamChunk::TextEnd { id: "text-7".into() },
                StreamChunk::Finish {
                    finish_reason: Some("stop".into()),
                    usage: Some(Usage {
                        input_tokens: 2,
                        output_tokens: 4,
                        total_tokens: 6,
                    }),
                },
            ]),
            oc,
            rules,
            Operation::StreamText,
        );

        let emitted: Vec<StreamChunk> = pipeline.full_stream().collect().await;
        let final_text = pipeline.finalize().await.unwrap();

        let tool_calls = emitted
            .iter()
            .filter(|c| matches!(c, StreamChunk::ToolCall { .. }))
            .count();
        let tool_results = emitted
            .iter()
            .filter(|c| matches!(c, StreamChunk::ToolResult { .. }))
            .count();
        let finishes = emitted
            .iter()
            .filter(|c| matches!(c, StreamChunk::Finish { .. }))
            .count();
        assert_eq!(tool_calls, 1);
        assert_eq!(tool_results, 1);
        assert_eq!(finishes, 1);
        // Non-text chunks are forwarded untouched.
        assert!(emitted.contains(&StreamChunk::ToolResult {
            tool_call_id: "tool-1".into(),
            output: json!("ok"),
        }));

        // Live deltas carry both stream transforms, chained in order.
        let live: String = emitted
            .iter()
            .filter_map(|c| match c {
                StreamChunk::TextDelta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(live, "Card number [redacted] is INVALID.");

        // The trailing pass runs the buffered handlers over the accumulated
        // original text, so its canonical output is independently sanitized.
        assert!(final_text.contains("Card number [redacted] is invalid."));
        assert!(final_text.trim_end().ends_with("[checked]"));
        assert_eq!(pipeline.sanitized_text(), final_text);
    }

    #[tokio::test]
    async fn chunk_and_text_views_share_one_pass() {
        let (oc, _adapter) = recording_context();
        let counted = OutputGuardrail::named("count", RedactDigits)
            .with_stream(|delta: &str, state: &mut StreamState| {
                let n = state.increment("count");
                Ok(format!("{delta}<{n}>"))
            });
        let rules = normalize_output_guardrails(&[counted], 0).unwrap();
        let pipeline = GuardrailStreamPipeline::new(
            chunks(vec![
                delta("t", "a"),
                delta("t", "b"),
                StreamChunk::Finish {
                    finish_reason: None,
                    usage: None,
                },
            ]),
            oc,
            rules,
            Operation::StreamText,
        );

        // Consume both views; the counter must advance once per delta, not
        // once per view.
        let text: String = pipeline.text_stream().collect::<Vec<_>>().await.join("");
        let chunks_seen: Vec<StreamChunk> = pipeline.full_stream().collect().await;

        assert_eq!(text, "a<1>b<2>");
        assert!(chunks_seen.contains(&delta("t", "a<1>")));
        assert!(chunks_seen.contains(&delta("t", "b<2>")));
    }

    #[tokio::test]
    async fn failing_transform_is_fail_soft() {
        let (oc, _adapter) = recording_context();
        let flaky = OutputGuardrail::named("flaky", RedactDigits).with_stream(
            |delta: &str, state: &mut StreamState| {
                if state.increment("seen") == 1 {
                    Err(Error::handler("transform exploded"))
                } else {
                    Ok(redact(delta))
                }
            },
        );
        let rules = normalize_output_guardrails(&[flaky], 0).unwrap();
        let pipeline = GuardrailStreamPipeline::new(
            chunks(vec![
                delta("t", "pin 1234 "),
                delta("t", "code 5678"),
                StreamChunk::Finish {
                    finish_reason: None,
                    usage: None,
                },
            ]),
            oc,
            rules,
            Operation::StreamText,
        );

        let streamed: String = pipeline.text_stream().collect::<Vec<_>>().await.join("");
        // First delta forwarded unmodified, second transformed, stream alive.
        assert_eq!(streamed, "pin 1234 code [redacted]");
        // The buffered pass still produces fully sanitized canonical text.
        let final_text = pipeline.finalize().await.unwrap();
        assert_eq!(final_text, "pin [redacted] code [redacted]");
    }

    #[tokio::test]
    async fn buffered_pass_adopts_streaming_spans() {
        let (oc, adapter) = recording_context();
        let rules = normalize_output_guardrails(&[redact_guardrail()], 0).unwrap();
        let pipeline = GuardrailStreamPipeline::new(
            chunks(vec![
                delta("t", "acct 99"),
                StreamChunk::Finish {
                    finish_reason: Some("stop".into()),
                    usage: None,
                },
            ]),
            oc,
            rules,
            Operation::StreamText,
        );

        pipeline.full_stream().collect::<Vec<_>>().await;
        pipeline.finalize().await.unwrap();

        // One rule, one span: the streaming span was adopted, not duplicated.
        let spans = adapter.spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].ended);
        assert!(spans[0].attribute("guardrail.action").is_some());
    }

    #[tokio::test]
    async fn late_block_surfaces_in_finalize_only() {
        let (oc, _adapter) = recording_context();

        struct BlockAfterTheFact;

        #[async_trait]
        impl OutputCheck for BlockAfterTheFact {
            async fn check(&self, _args: OutputGuardrailArgs<'_>) -> Result<Decision> {
                Ok(Decision::block("contains account data"))
            }
        }

        let rules = normalize_output_guardrails(
            &[OutputGuardrail::named("late-block", BlockAfterTheFact)
                .with_stream(|delta: &str, _state: &mut StreamState| Ok(delta.to_string()))],
            0,
        )
        .unwrap();
        let pipeline = GuardrailStreamPipeline::new(
            chunks(vec![
                delta("t", "already delivered"),
                StreamChunk::Finish {
                    finish_reason: None,
                    usage: None,
                },
            ]),
            oc.clone(),
            rules,
            Operation::StreamText,
        );

        // The live stream delivers normally.
        let streamed: String = pipeline.text_stream().collect::<Vec<_>>().await.join("");
        assert_eq!(streamed, "already delivered");

        // The trailing pass rejects; delivered content stays delivered.
        let error = pipeline.finalize().await.unwrap_err();
        assert!(matches!(error, Error::OutputBlocked { .. }));
        assert!(!oc.is_active());
        assert_eq!(pipeline.sanitized_text(), "already delivered");
    }

    #[test]
    fn finalize_drives_the_pump_without_consumers() {
        // The pump is runtime-agnostic; any executor can drive it.
        tokio_test::block_on(async {
            let (oc, _adapter) = recording_context();
            let rules = normalize_output_guardrails(&[redact_guardrail()], 0).unwrap();
            let pipeline = GuardrailStreamPipeline::new(
                chunks(vec![
                    delta("t", "pin 0000"),
                    StreamChunk::Finish {
                        finish_reason: None,
                        usage: None,
                    },
                ]),
                oc,
                rules,
                Operation::StreamText,
            );

            // Nobody read the streams; finalize still completes the pass.
            let final_text = pipeline.finalize().await.unwrap();
            assert_eq!(final_text, "pin [redacted]");
            // The queued chunks remain readable afterwards.
            let emitted: Vec<StreamChunk> = pipeline.full_stream().collect().await;
            assert_eq!(emitted.len(), 2);
        });
    }

    #[test]
    fn chunk_serialization_uses_wire_labels() {
        let chunk = StreamChunk::ToolCall {
            tool_call_id: "tool-1".into(),
            tool_name: "lookup".into(),
            input: json!({"q": 1}),
        };
        let encoded = serde_json::to_value(&chunk).unwrap();
        assert_eq!(encoded["type"], "tool-call");
        assert_eq!(encoded["toolCallId"], "tool-1");

        let text = serde_json::to_value(delta("t", "x")).unwrap();
        assert_eq!(text["type"], "text-delta");
    }
}

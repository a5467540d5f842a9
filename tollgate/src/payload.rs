//! The value flowing through a pipeline, and its plain-text projection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;

/// A value entering or leaving an agent invocation.
///
/// Pipelines never mutate a payload in place; a guardrail's modify decision
/// replaces the current payload wholesale, which keeps the original
/// available for diffing and for handlers that want to compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Plain text.
    Text(String),
    /// A structured conversation.
    Messages(Vec<Message>),
    /// Any other JSON-shaped value.
    Json(Value),
}

impl Payload {
    /// Derive a plain-text view of this payload for decision-making.
    ///
    /// - Text is returned as-is (projection of a string is the identity).
    /// - Messages are reduced to their extractable text fragments,
    ///   newline-joined and trimmed; non-text parts are skipped.
    /// - JSON null projects to `None`, strings to themselves, numbers and
    ///   booleans to their display form, and anything else to its stable
    ///   serialization.
    ///
    /// Pure and side-effect-free, so runners may call it speculatively.
    #[must_use]
    pub fn project_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Messages(messages) => {
                let joined = messages
                    .iter()
                    .filter_map(Message::text)
                    .filter(|text| !text.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(joined.trim().to_string())
            }
            Self::Json(value) => match value {
                Value::Null => None,
                Value::String(text) => Some(text.clone()),
                Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
                other => serde_json::to_string(other).ok(),
            },
        }
    }

    /// Serialize this payload for span attributes: text stays text, other
    /// shapes get their JSON form.
    #[must_use]
    pub fn to_trace_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Message>> for Payload {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

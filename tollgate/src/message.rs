//! Chat message types threaded through the pipelines.
//!
//! Pipelines do not interpret messages beyond extracting their text; the
//! shapes here exist so rule handlers can reason about structured
//! conversations without depending on any provider's wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool execution result.
    Tool,
}

/// One part of a message's content.
///
/// Only [`ContentPart::Text`] contributes to text projection; other parts
/// are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// An image reference.
    Image {
        /// Location of the image.
        url: String,
    },
    /// A tool invocation requested by the model.
    ToolCall {
        /// Provider-assigned call id.
        id: String,
        /// Name of the tool.
        name: String,
        /// Arguments as a JSON value.
        arguments: Value,
    },
    /// The result of a tool invocation.
    ToolResult {
        /// Id of the call this result answers.
        id: String,
        /// Result content as a JSON value.
        content: Value,
    },
}

/// A chat message: a role plus an ordered list of content parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// The message content.
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Create a system message with text content.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::text_message(Role::System, text)
    }

    /// Create a user message with text content.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::text_message(Role::User, text)
    }

    /// Create an assistant message with text content.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text_message(Role::Assistant, text)
    }

    /// Create a tool-result message.
    #[must_use]
    pub fn tool(id: impl Into<String>, content: Value) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult {
                id: id.into(),
                content,
            }],
        }
    }

    fn text_message(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Extract the text parts of this message, newline-joined.
    ///
    /// Returns `None` when the message has no text parts; images and tool
    /// parts are skipped, not stringified.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let fragments: Vec<&str> = self
            .content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if fragments.is_empty() {
            None
        } else {
            Some(fragments.join("\n"))
        }
    }
}

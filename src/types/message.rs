//! Message types for sending text to a Letta agent and reading its reply.
//!
//! The bridge only ever sends plain user text and reads back the agent's
//! assistant-role reply (§4.3); reasoning/tool-call/tool-return messages are
//! parsed so the envelope deserializes cleanly but are otherwise skipped.

use crate::types::common::{LettaId, Timestamp};
use serde::{Deserialize, Serialize};

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message.
    User,
    /// Assistant message.
    Assistant,
    /// System message.
    System,
    /// Tool call result.
    Tool,
}

/// A message to create, sent to `POST /v1/agents/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreate {
    /// The role of the message sender.
    pub role: MessageRole,
    /// Plain-text message content.
    pub content: String,
    /// Optional sender display name (used for inter-agent contextualized messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MessageCreate {
    /// Build a plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            name: None,
        }
    }

    /// Attach a sender name, surfaced to the agent as message metadata.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Request body for `POST /v1/agents/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateMessagesRequest {
    /// The messages to send.
    pub messages: Vec<MessageCreate>,
}

/// One message in an agent's reply, tagged by `message_type`.
///
/// Letta emits several message kinds per turn (reasoning steps, tool calls,
/// tool returns) in addition to the final assistant reply; the bridge only
/// relays [`LettaMessageUnion::AssistantMessage`] content back to Matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum LettaMessageUnion {
    /// The agent's final textual reply — this is what gets relayed to Matrix.
    AssistantMessage {
        /// Message ID, if present.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<LettaId>,
        /// The reply text.
        content: String,
        /// Send timestamp, if present.
        #[serde(skip_serializing_if = "Option::is_none")]
        date: Option<Timestamp>,
    },
    /// An intermediate reasoning step. Not relayed.
    ReasoningMessage {
        /// Reasoning text.
        reasoning: String,
    },
    /// A tool invocation. Not relayed.
    ToolCallMessage {
        /// Raw tool call payload.
        #[serde(flatten)]
        tool_call: serde_json::Value,
    },
    /// A tool's return value. Not relayed.
    ToolReturnMessage {
        /// Raw tool return payload.
        tool_return: serde_json::Value,
    },
    /// Any message kind not otherwise recognized. Not relayed.
    #[serde(other)]
    Other,
}

/// `POST /v1/agents/{id}/messages` has returned both of these response
/// shapes across server versions: a bare array, and `{"messages": [...]}`.
/// Deserializing through this untagged envelope tolerates either.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LettaMessagesEnvelope {
    /// `{"messages": [...]}`
    Wrapped {
        /// The reply messages.
        messages: Vec<LettaMessageUnion>,
    },
    /// A bare JSON array of messages.
    Bare(Vec<LettaMessageUnion>),
}

impl LettaMessagesEnvelope {
    /// Extract the messages regardless of which shape the server sent.
    pub fn into_messages(self) -> Vec<LettaMessageUnion> {
        match self {
            Self::Wrapped { messages } => messages,
            Self::Bare(messages) => messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_create_user() {
        let msg = MessageCreate::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_envelope_wrapped_shape() {
        let json = serde_json::json!({
            "messages": [
                {"message_type": "assistant_message", "content": "hi there"}
            ]
        });
        let envelope: LettaMessagesEnvelope = serde_json::from_value(json).unwrap();
        let messages = envelope.into_messages();
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            LettaMessageUnion::AssistantMessage { content, .. } if content == "hi there"
        ));
    }

    #[test]
    fn test_envelope_bare_shape() {
        let json = serde_json::json!([
            {"message_type": "reasoning_message", "reasoning": "thinking..."},
            {"message_type": "assistant_message", "content": "done"}
        ]);
        let envelope: LettaMessagesEnvelope = serde_json::from_value(json).unwrap();
        let messages = envelope.into_messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], LettaMessageUnion::ReasoningMessage { .. }));
        assert!(matches!(
            &messages[1],
            LettaMessageUnion::AssistantMessage { content, .. } if content == "done"
        ));
    }

    #[test]
    fn test_unrecognized_message_type_falls_back_to_other() {
        let json = serde_json::json!({"message_type": "system_message", "content": "x"});
        let msg: LettaMessageUnion = serde_json::from_value(json).unwrap();
        assert!(matches!(msg, LettaMessageUnion::Other));
    }
}

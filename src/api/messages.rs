//! Message sending, grounded in §4.3 of the bridge design.

use crate::client::LettaClient;
use crate::error::LettaResult;
use crate::types::{CreateMessagesRequest, LettaId, LettaMessageUnion, LettaMessagesEnvelope, MessageCreate};

/// Message API operations.
#[derive(Debug)]
pub struct MessageApi<'a> {
    client: &'a LettaClient,
}

impl<'a> MessageApi<'a> {
    /// Create a new message API instance.
    pub fn new(client: &'a LettaClient) -> Self {
        Self { client }
    }

    /// Send a plain-text message to an agent and return its assistant reply.
    ///
    /// Returns `None` if the agent's turn produced no assistant-role message
    /// (e.g. a pure tool-call turn) — callers should treat that as "no reply
    /// to relay" rather than an error.
    ///
    /// # Errors
    ///
    /// Returns a [`LettaError`](crate::error::LettaError) if the request
    /// fails or the response cannot be parsed.
    pub async fn send(&self, agent_id: &LettaId, content: &str) -> LettaResult<Option<String>> {
        let request = CreateMessagesRequest {
            messages: vec![MessageCreate::user(content)],
        };

        let envelope: LettaMessagesEnvelope = self
            .client
            .post(&format!("v1/agents/{}/messages", agent_id), &request)
            .await?;

        let reply = envelope
            .into_messages()
            .into_iter()
            .rev()
            .find_map(|m| match m {
                LettaMessageUnion::AssistantMessage { content, .. } => Some(content),
                _ => None,
            });

        Ok(reply)
    }

    /// Send a message attributed to another agent, for inter-agent
    /// contextualization (§4.8). The sender name is carried as message
    /// metadata so the receiving agent can distinguish it from a human.
    ///
    /// # Errors
    ///
    /// Returns a [`LettaError`](crate::error::LettaError) if the request
    /// fails or the response cannot be parsed.
    pub async fn send_from(
        &self,
        agent_id: &LettaId,
        content: &str,
        sender_name: &str,
    ) -> LettaResult<Option<String>> {
        let request = CreateMessagesRequest {
            messages: vec![MessageCreate::user(content).with_name(sender_name)],
        };

        let envelope: LettaMessagesEnvelope = self
            .client
            .post(&format!("v1/agents/{}/messages", agent_id), &request)
            .await?;

        let reply = envelope
            .into_messages()
            .into_iter()
            .rev()
            .find_map(|m| match m {
                LettaMessageUnion::AssistantMessage { content, .. } => Some(content),
                _ => None,
            });

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;

    #[test]
    fn test_message_api_creation() {
        let config = ClientConfig::new("http://localhost:8283").unwrap();
        let client = LettaClient::new(config).unwrap();
        let _api = MessageApi::new(&client);
    }
}

//! Inter-Agent Contextualizer (§4.8): rewrites a message's prompt when it
//! carries `m.letta.*` metadata marking it as a message from another Letta
//! agent rather than a human, so the receiving agent knows to address its
//! reply back through the bridge's own tool instead of treating the sender
//! as a person in the room.

use crate::ingress::InboundMessage;

/// Rewrite `message.body` into the inter-agent context block when the
/// event carries `m.letta.from_agent_id`/`m.letta.from_agent_name`;
/// otherwise return the body verbatim.
pub fn rewrite_if_inter_agent(message: &InboundMessage) -> String {
    let from_agent_id = message.content.get("m.letta.from_agent_id").and_then(|v| v.as_str());
    let from_agent_name = message.content.get("m.letta.from_agent_name").and_then(|v| v.as_str());

    match (from_agent_id, from_agent_name) {
        (Some(from_agent_id), Some(from_agent_name)) => format!(
            "[INTER-AGENT MESSAGE from {from_agent_name}]\n\n\
             {body}\n\n\
             ---\n\
             IMPORTANT: This is a message from another Letta agent ({from_agent_name}, ID: {from_agent_id}).\n\
             To respond to {from_agent_name}, use the 'matrix_agent_message_async' tool with:\n\
             - to_agent_id: \"{from_agent_id}\"\n\
             - message: your response",
            body = message.body,
        ),
        _ => message.body.clone(),
    }
}

//! Agent types as seen from the bridge's perspective.
//!
//! The bridge never creates, updates, or deletes Letta agents — it only lists
//! them and sends messages to them — so this is a deliberately thin slice of
//! the full Letta agent model.

use super::common::LettaId;
use serde::{Deserialize, Serialize};

/// An agent as returned by `GET /v1/agents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Unique agent identifier.
    pub id: LettaId,
    /// Human-readable agent name. Used as the Matrix room/display name.
    pub name: String,
    /// Creation timestamp, if the server reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<super::common::Timestamp>,
    /// Last update timestamp, if the server reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<super::common::Timestamp>,
}

/// Query parameters for `GET /v1/agents`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListAgentsParams {
    /// Cursor for pagination (before this ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Cursor for pagination (after this ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Maximum number of items to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_agent_state_roundtrip() {
        let json = serde_json::json!({
            "id": "agent-00000000-0000-0000-0000-000000000001",
            "name": "Scout",
        });
        let agent: AgentState = serde_json::from_value(json).unwrap();
        assert_eq!(agent.name, "Scout");
        assert_eq!(
            agent.id,
            LettaId::from_str("agent-00000000-0000-0000-0000-000000000001").unwrap()
        );
    }

    #[test]
    fn test_list_agents_params_defaults() {
        let params = ListAgentsParams::default();
        assert!(params.before.is_none());
        assert!(params.after.is_none());
        assert!(params.limit.is_none());
    }
}

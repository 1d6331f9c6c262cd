//! Common types shared across the Letta client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Letta resource identifier that can be either a bare UUID or a prefixed UUID.
///
/// # Examples
///
/// ```
/// use letta_matrix_bridge::types::LettaId;
/// use std::str::FromStr;
///
/// // Bare UUID
/// let id1 = LettaId::from_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
///
/// // Prefixed UUID
/// let id2 = LettaId::from_str("agent-550e8400-e29b-41d4-a716-446655440000").unwrap();
///
/// // Get the UUID part
/// assert_eq!(id1.uuid(), id2.uuid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LettaId {
    /// Optional prefix (e.g., "agent", "run", "tool")
    prefix: Option<String>,
    /// The UUID part
    uuid: Uuid,
}

impl LettaId {
    /// Create a new ID with a prefix.
    pub fn new_prefixed(prefix: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            prefix: Some(prefix.into()),
            uuid,
        }
    }

    /// Create a new ID without a prefix (bare UUID).
    pub fn new_bare(uuid: Uuid) -> Self {
        Self { prefix: None, uuid }
    }

    /// Get the prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Get the UUID part.
    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    /// Check if this is a bare UUID (no prefix).
    pub fn is_bare(&self) -> bool {
        self.prefix.is_none()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}-{}", prefix, self.uuid),
            None => self.uuid.to_string(),
        }
    }
}

impl fmt::Display for LettaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LettaId {
    type Err = LettaIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Try to parse as bare UUID first
        if let Ok(uuid) = Uuid::from_str(s) {
            return Ok(Self::new_bare(uuid));
        }

        // UUIDs have a specific format with dashes at positions 8, 13, 18, 23,
        // so a prefixed id is `prefix-uuid` where `uuid` is 36 characters long.
        if s.len() > 36 {
            let uuid_start = s.len() - 36;
            if uuid_start > 0 && s.chars().nth(uuid_start - 1) == Some('-') {
                let potential_uuid = &s[uuid_start..];
                if let Ok(uuid) = Uuid::from_str(potential_uuid) {
                    let prefix = &s[..uuid_start - 1];
                    if !prefix.is_empty()
                        && !prefix.starts_with('-')
                        && !prefix.ends_with('-')
                        && prefix.chars().any(|c| c.is_alphanumeric())
                        && prefix
                            .chars()
                            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
                    {
                        return Ok(Self::new_prefixed(prefix, uuid));
                    }
                }
            }
        }

        Err(LettaIdError::InvalidFormat(s.to_string()))
    }
}

impl Serialize for LettaId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for LettaId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Error type for LettaId parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LettaIdError {
    /// Invalid ID format.
    InvalidFormat(String),
}

impl fmt::Display for LettaIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(s) => write!(f, "Invalid LettaId format: {}", s),
        }
    }
}

impl std::error::Error for LettaIdError {}

impl From<LettaId> for String {
    fn from(id: LettaId) -> Self {
        id.as_str()
    }
}

impl<'a> From<&'a LettaId> for String {
    fn from(id: &'a LettaId) -> Self {
        id.as_str()
    }
}

impl<'a> TryFrom<&'a str> for LettaId {
    type Error = LettaIdError;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

/// Timestamp type used throughout the bridge.
pub type Timestamp = DateTime<Utc>;

/// Generic cursor-based pagination parameters for list operations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaginationParams {
    /// Cursor for pagination (before this ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Cursor for pagination (after this ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Maximum number of items to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Whether to return results in ascending order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascending: Option<bool>,
}

impl PaginationParams {
    /// Create new pagination parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the before cursor.
    pub fn before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }

    /// Set the after cursor.
    pub fn after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }

    /// Set the limit.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set ascending order.
    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = Some(ascending);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params() {
        let params = PaginationParams::new()
            .limit(10)
            .after("cursor123")
            .ascending(true);

        assert_eq!(params.limit, Some(10));
        assert_eq!(params.after.as_deref(), Some("cursor123"));
        assert_eq!(params.ascending, Some(true));
    }

    #[test]
    fn test_letta_id_bare_uuid() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = LettaId::from_str(uuid_str).unwrap();

        assert!(id.is_bare());
        assert_eq!(id.prefix(), None);
        assert_eq!(id.as_str(), uuid_str);
    }

    #[test]
    fn test_letta_id_prefixed() {
        let prefixed_str = "agent-550e8400-e29b-41d4-a716-446655440000";
        let id = LettaId::from_str(prefixed_str).unwrap();

        assert!(!id.is_bare());
        assert_eq!(id.prefix(), Some("agent"));
        assert_eq!(id.as_str(), prefixed_str);
    }

    #[test]
    fn test_letta_id_various_prefixes() {
        let test_cases = vec![
            "run-550e8400-e29b-41d4-a716-446655440000",
            "tool-550e8400-e29b-41d4-a716-446655440000",
            "source-550e8400-e29b-41d4-a716-446655440000",
            "block-550e8400-e29b-41d4-a716-446655440000",
            "memory_block-550e8400-e29b-41d4-a716-446655440000",
        ];

        for case in test_cases {
            let id = LettaId::from_str(case).unwrap();
            assert_eq!(id.as_str(), case);
        }
    }

    #[test]
    fn test_letta_id_invalid() {
        let invalid_cases = vec![
            "not-a-uuid",
            "agent-not-a-uuid",
            "-550e8400-e29b-41d4-a716-446655440000", // Empty prefix
            "agent--550e8400-e29b-41d4-a716-446655440000", // Double dash
        ];

        for case in invalid_cases {
            assert!(LettaId::from_str(case).is_err());
        }
    }

    #[test]
    fn test_letta_id_serialization() {
        let id = LettaId::from_str("agent-550e8400-e29b-41d4-a716-446655440000").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"agent-550e8400-e29b-41d4-a716-446655440000\"");

        let deserialized: LettaId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}

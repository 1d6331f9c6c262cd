//! Matrix Client-Server API request/response types.
//!
//! Deliberately thin: only the fields the bridge actually reads or writes
//! are modeled, following the same tolerant-deserialization posture as
//! [`crate::types::message`] (unknown JSON fields are ignored by default).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `POST /_matrix/client/v3/login` request, password flow.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub login_type: &'static str,
    pub identifier: UserIdentifier,
    pub password: String,
    pub initial_device_display_name: String,
}

impl LoginRequest {
    pub fn password(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_type: "m.login.password",
            identifier: UserIdentifier {
                id_type: "m.id.user",
                user: user_id.into(),
            },
            password: password.into(),
            initial_device_display_name: "letta-matrix-bridge".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserIdentifier {
    #[serde(rename = "type")]
    pub id_type: &'static str,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// `POST /_matrix/client/v3/register` request, shared-secret or dummy flow.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub auth: RegisterAuth,
    pub initial_device_display_name: String,
    pub inhibit_login: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterAuth {
    #[serde(rename = "type")]
    pub auth_type: &'static str,
}

impl RegisterAuth {
    pub fn dummy() -> Self {
        Self {
            auth_type: "m.login.dummy",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// `POST /_matrix/client/v3/createRoom` request.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateRoomRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_content: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_direct: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub initial_state: Vec<StateEventInput>,
}

/// A state event to set at room-creation time, or via `send_state_event`.
#[derive(Debug, Clone, Serialize)]
pub struct StateEventInput {
    #[serde(rename = "type")]
    pub event_type: String,
    pub state_key: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendEventResponse {
    pub event_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhoamiResponse {
    pub user_id: String,
}

/// `PUT /_synapse/admin/v2/users/{user_id}` request — provisioning a ghost
/// user as the admin account, rather than the client-server `/register`
/// endpoint, which self-service bridges generally can't rely on being open.
#[derive(Debug, Clone, Serialize)]
pub struct AdminPutUserRequest {
    pub password: String,
    pub displayname: String,
    pub admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminPutUserResponse {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JoinedRoomsResponse {
    #[serde(default)]
    pub joined_rooms: Vec<String>,
}

/// `m.space.child` state event content, set on the space room pointing at a
/// member room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceChildContent {
    pub via: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

/// `m.space.parent` state event content, set on a member room pointing back
/// at its space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceParentContent {
    pub via: Vec<String>,
    pub canonical: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomNameContent {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceCreationContent {
    #[serde(rename = "type")]
    pub room_type: &'static str,
}

impl Default for SpaceCreationContent {
    fn default() -> Self {
        Self { room_type: "m.space" }
    }
}

/// Filter definition used to scope `/sync` to joined/invited room timelines.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SyncFilter {
    pub room: RoomFilter,
    pub presence: EventFilter,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RoomFilter {
    pub timeline: EventFilter,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct EventFilter {
    pub limit: u32,
    pub types: Vec<String>,
}

impl SyncFilter {
    /// A filter that only asks for message/membership events, and disables
    /// presence — the bridge has no use for either typing notifications or
    /// presence updates.
    pub fn messages_only() -> Self {
        Self {
            room: RoomFilter {
                timeline: EventFilter {
                    limit: 50,
                    types: vec!["m.room.message".to_string(), "m.room.member".to_string()],
                },
            },
            presence: EventFilter {
                limit: 0,
                types: vec![],
            },
        }
    }
}

/// `GET /_matrix/client/v3/sync` response, trimmed to what the bridge reads.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: SyncRooms,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncRooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,
    #[serde(default)]
    pub invite: HashMap<String, InvitedRoom>,
    #[serde(default)]
    pub leave: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
    #[serde(default)]
    pub limited: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct InvitedRoom {
    #[serde(default)]
    pub invite_state: InviteState,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct InviteState {
    #[serde(default)]
    pub events: Vec<StrippedStateEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrippedStateEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: String,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// A single timeline event. `content` is kept as raw JSON and interpreted
/// by the caller based on `event_type` — mirrors the untagged envelope
/// pattern used for Letta message replies.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: String,
    pub event_id: String,
    pub origin_server_ts: i64,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub unsigned: Option<UnsignedData>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UnsignedData {
    /// Set by the server on `/sync` responses that replay history on first
    /// join; distinguishes backlog from live traffic (§4.6 edge cases).
    #[serde(default)]
    pub redacted_because: Option<serde_json::Value>,
}

/// `m.room.message` content, `msgtype: m.text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMessageContent {
    pub msgtype: &'static str,
    pub body: String,
}

impl TextMessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.text",
            body: body.into(),
        }
    }
}

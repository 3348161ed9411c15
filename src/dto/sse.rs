use serde::Serialize;
use utoipa::ToSchema;

/// Event name carrying a fresh [`crate::dto::view::RoomView`].
pub const ROOM_VIEW_EVENT: &str = "room.view";
/// Sent once when the room document no longer exists; the stream ends afterwards.
pub const ROOM_MISSING_EVENT: &str = "room.missing";
/// Event name of the first message on every stream.
pub const HANDSHAKE_EVENT: &str = "handshake";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` name; unnamed events reach `onmessage`.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Normalized room code.
    pub room: String,
    /// Player the projections are computed for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Payload of `room.missing`.
pub struct RoomMissing {
    /// Room that no longer exists.
    pub room: String,
}

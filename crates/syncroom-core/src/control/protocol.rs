//! Control channel frames
//!
//! JSON text frames tagged by `type`, e.g.
//! `{"type": "join_room", "roomId": "ABC123"}`.

use serde::{Deserialize, Serialize};

use crate::room::RoomId;
use crate::session::SessionState;

/// Requests from UI clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Host a room; a random id is generated when none is given
    CreateRoom {
        #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    LeaveRoom,
    GetStatus,
    /// Announce the host's current media URL to the room
    BroadcastUrl { url: String },
    /// Ask whether broadcasting the current URL should be offered
    CheckBroadcast,
}

/// Replies and notifications sent to UI clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    RoomCreated {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    JoinedRoom {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    LeftRoom,
    StatusUpdate { state: SessionState },
    UrlBroadcast { url: String },
    BroadcastCheck {
        #[serde(rename = "shouldBroadcast")]
        should_broadcast: bool,
        #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    Error { message: String },
}

impl ControlResponse {
    pub fn error(message: impl std::fmt::Display) -> Self {
        ControlResponse::Error {
            message: message.to_string(),
        }
    }
}

//! Relay protocol message types
//!
//! Frames are JSON text of the form `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::event::{PlaybackEvent, UrlChangeEvent};
use crate::room::{Role, RoomId};

/// Messages sent to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Claim ownership of a room
    CreateRoom(RoomId),
    /// Join a room as a viewer
    JoinRoom(RoomId),
    /// Leave the current room; the relay may not support it
    LeaveRoom,
    /// Host playback transition
    SendAction(PlaybackEvent),
    /// Host switched media
    UrlChanged(UrlChangeEvent),
}

/// Messages received from the relay, scoped to the joined room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundMessage {
    ReceiveAction(PlaybackEvent),
    UrlChanged(String),
}

impl OutboundMessage {
    /// Membership announcement for a role, if the role is in a room
    pub fn announce(role: Role, room_id: RoomId) -> Option<Self> {
        match role {
            Role::Host => Some(OutboundMessage::CreateRoom(room_id)),
            Role::Viewer => Some(OutboundMessage::JoinRoom(room_id)),
            Role::None => None,
        }
    }

    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            OutboundMessage::CreateRoom(_) => "create_room",
            OutboundMessage::JoinRoom(_) => "join_room",
            OutboundMessage::LeaveRoom => "leave_room",
            OutboundMessage::SendAction(_) => "send_action",
            OutboundMessage::UrlChanged(_) => "url_changed",
        }
    }

    /// Encode message to a JSON text frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl InboundMessage {
    /// Decode message from a JSON text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PlaybackAction;

    fn room() -> RoomId {
        RoomId::parse("ABC123").unwrap()
    }

    #[test]
    fn test_announce_by_role() {
        assert_eq!(
            OutboundMessage::announce(Role::Host, room()),
            Some(OutboundMessage::CreateRoom(room()))
        );
        assert_eq!(
            OutboundMessage::announce(Role::Viewer, room()),
            Some(OutboundMessage::JoinRoom(room()))
        );
        assert_eq!(OutboundMessage::announce(Role::None, room()), None);
    }

    #[test]
    fn test_join_room_encoding() {
        let text = OutboundMessage::JoinRoom(room()).encode().unwrap();
        assert_eq!(text, r#"{"event":"join_room","data":"ABC123"}"#);
    }

    #[test]
    fn test_leave_room_has_no_payload() {
        let text = OutboundMessage::LeaveRoom.encode().unwrap();
        assert_eq!(text, r#"{"event":"leave_room"}"#);
        assert_eq!(OutboundMessage::LeaveRoom.name(), "leave_room");
    }

    #[test]
    fn test_send_action_encoding() {
        let event = PlaybackEvent::new(PlaybackAction::Play, 12.0, room()).with_rate(1.0);
        let text = OutboundMessage::SendAction(event).encode().unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["event"], "send_action");
        assert_eq!(json["data"]["action"], "play");
        assert_eq!(json["data"]["roomId"], "ABC123");
    }

    #[test]
    fn test_inbound_decoding() {
        let decoded = InboundMessage::decode(
            r#"{"event":"receive_action","data":{"action":"pause","timestamp":5.0,"roomId":"abc123"}}"#,
        )
        .unwrap();

        match decoded {
            InboundMessage::ReceiveAction(event) => {
                assert_eq!(event.action, PlaybackAction::Pause);
                assert_eq!(event.room_id, room());
            }
            _ => panic!("Expected ReceiveAction"),
        }

        let url = InboundMessage::decode(r#"{"event":"url_changed","data":"https://example.com"}"#)
            .unwrap();
        assert_eq!(
            url,
            InboundMessage::UrlChanged("https://example.com".to_string())
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(InboundMessage::decode(r#"{"event":"chat","data":"hi"}"#).is_err());
    }
}

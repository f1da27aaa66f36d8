//! Synchronization events exchanged through the relay

use serde::{Deserialize, Serialize};

use crate::room::RoomId;

/// Playback transition performed by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Play,
    Pause,
    Seek,
}

/// A host playback transition, relayed to every viewer in the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackEvent {
    pub action: PlaybackAction,
    /// Media position in seconds at emission
    pub timestamp: f64,
    /// Absent means the rate is unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f64>,
    pub room_id: RoomId,
}

impl PlaybackEvent {
    pub fn new(action: PlaybackAction, timestamp: f64, room_id: RoomId) -> Self {
        Self {
            action,
            timestamp,
            playback_rate: None,
            room_id,
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.playback_rate = Some(rate);
        self
    }

    /// Rate to apply, if the event carries a usable one
    pub fn effective_rate(&self) -> Option<f64> {
        self.playback_rate
            .filter(|rate| rate.is_finite() && *rate != 0.0)
    }
}

/// Announces the media resource the host is currently playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlChangeEvent {
    pub room_id: RoomId,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::parse("ABC123").unwrap()
    }

    #[test]
    fn test_playback_event_wire_shape() {
        let event = PlaybackEvent::new(PlaybackAction::Seek, 42.5, room()).with_rate(1.5);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["action"], "seek");
        assert_eq!(json["timestamp"], 42.5);
        assert_eq!(json["playbackRate"], 1.5);
        assert_eq!(json["roomId"], "ABC123");
    }

    #[test]
    fn test_missing_rate_is_omitted() {
        let event = PlaybackEvent::new(PlaybackAction::Pause, 3.0, room());
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("playbackRate"));

        let decoded: PlaybackEvent =
            serde_json::from_str(r#"{"action":"play","timestamp":1.0,"roomId":"abc123"}"#)
                .unwrap();
        assert_eq!(decoded.playback_rate, None);
        assert_eq!(decoded.room_id, room());
    }

    #[test]
    fn test_effective_rate() {
        let base = PlaybackEvent::new(PlaybackAction::Play, 0.0, room());
        assert_eq!(base.effective_rate(), None);
        assert_eq!(base.clone().with_rate(0.0).effective_rate(), None);
        assert_eq!(base.clone().with_rate(f64::NAN).effective_rate(), None);
        assert_eq!(base.with_rate(2.0).effective_rate(), Some(2.0));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = serde_json::from_str::<PlaybackEvent>(
            r#"{"action":"rewind","timestamp":1.0,"roomId":"A"}"#,
        );
        assert!(result.is_err());
    }
}

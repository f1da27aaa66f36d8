//! Media surface boundary
//!
//! The page integration observes the media element and applies commands to
//! it. The core only sees this trait.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::PlaybackAction;

/// Command applied to the local media element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum MediaCommand {
    SetPosition(f64),
    SetRate(f64),
    Play,
    Pause,
}

/// Transition observed on the local media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservedKind {
    Play,
    Pause,
    Seeked,
}

impl From<ObservedKind> for PlaybackAction {
    fn from(kind: ObservedKind) -> Self {
        match kind {
            ObservedKind::Play => PlaybackAction::Play,
            ObservedKind::Pause => PlaybackAction::Pause,
            ObservedKind::Seeked => PlaybackAction::Seek,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedTransition {
    pub kind: ObservedKind,
    /// Position in seconds when the transition happened
    pub position: f64,
    pub rate: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// No media element is attached
    #[error("No media element available")]
    Unavailable,

    /// The page refused to start playback, e.g. an autoplay policy
    #[error("Playback blocked: {0}")]
    Blocked(String),
}

/// A local media element the coordinator can read and drive
pub trait MediaSurface {
    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Whether sponsored content is currently showing
    fn ad_showing(&self) -> bool;

    fn apply(&mut self, command: MediaCommand) -> Result<(), MediaError>;

    /// Resolve once a media element is available, or `false` if it never
    /// appeared within the surface's own bound
    fn ready(&self) -> impl Future<Output = bool> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_shape() {
        let json = serde_json::to_value(MediaCommand::SetPosition(12.5)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "setPosition", "value": 12.5}));

        let json = serde_json::to_value(MediaCommand::Play).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "play"}));
    }

    #[test]
    fn test_observed_kind_maps_to_action() {
        assert_eq!(PlaybackAction::from(ObservedKind::Seeked), PlaybackAction::Seek);
        assert_eq!(PlaybackAction::from(ObservedKind::Pause), PlaybackAction::Pause);
    }
}

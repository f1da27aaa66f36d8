//! Drift correction and echo suppression
//!
//! Two independently playing clocks never agree exactly, so a viewer only
//! repositions when the drift exceeds a tolerance that depends on the action.

use std::time::{Duration, Instant};

use crate::event::{PlaybackAction, PlaybackEvent};
use crate::media::MediaCommand;

/// Drift tolerated before a `play` repositions
pub const PLAY_DRIFT_TOLERANCE: f64 = 0.5;

/// Drift tolerated before a `seek` repositions
pub const SEEK_DRIFT_TOLERANCE: f64 = 2.0;

/// How long local transitions are treated as echoes after a remote apply
pub const ECHO_WINDOW: Duration = Duration::from_millis(500);

/// Commands that bring the local element in line with a host event
///
/// `pause` always lands on the host's position: a paused host is
/// authoritative. A usable rate is applied last.
pub fn plan_apply(event: &PlaybackEvent, local_position: f64) -> Vec<MediaCommand> {
    let drift = (local_position - event.timestamp).abs();
    let mut commands = Vec::with_capacity(3);

    match event.action {
        PlaybackAction::Play => {
            if drift > PLAY_DRIFT_TOLERANCE {
                commands.push(MediaCommand::SetPosition(event.timestamp));
            }
            commands.push(MediaCommand::Play);
        }
        PlaybackAction::Pause => {
            commands.push(MediaCommand::Pause);
            commands.push(MediaCommand::SetPosition(event.timestamp));
        }
        PlaybackAction::Seek => {
            if drift > SEEK_DRIFT_TOLERANCE {
                commands.push(MediaCommand::SetPosition(event.timestamp));
            }
        }
    }

    if let Some(rate) = event.effective_rate() {
        commands.push(MediaCommand::SetRate(rate));
    }

    commands
}

/// Window during which local transitions are echoes of a remote apply
///
/// Re-arming replaces the previous deadline.
#[derive(Debug, Clone, Default)]
pub struct EchoGuard {
    until: Option<Instant>,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant) {
        self.until = Some(now + ECHO_WINDOW);
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomId;

    fn event(action: PlaybackAction, timestamp: f64) -> PlaybackEvent {
        PlaybackEvent::new(action, timestamp, RoomId::parse("ABC123").unwrap())
    }

    #[test]
    fn test_play_within_tolerance_does_not_seek() {
        let commands = plan_apply(&event(PlaybackAction::Play, 10.3), 10.0);
        assert_eq!(commands, vec![MediaCommand::Play]);
    }

    #[test]
    fn test_play_beyond_tolerance_seeks_first() {
        let commands = plan_apply(&event(PlaybackAction::Play, 12.0), 10.0);
        assert_eq!(
            commands,
            vec![MediaCommand::SetPosition(12.0), MediaCommand::Play]
        );
    }

    #[test]
    fn test_pause_sets_exact_position() {
        let commands = plan_apply(&event(PlaybackAction::Pause, 5.0), 5.1);
        assert_eq!(
            commands,
            vec![MediaCommand::Pause, MediaCommand::SetPosition(5.0)]
        );
    }

    #[test]
    fn test_seek_within_tolerance_is_ignored() {
        let commands = plan_apply(&event(PlaybackAction::Seek, 51.5), 50.0);
        assert!(commands.is_empty());
    }

    #[test]
    fn test_seek_beyond_tolerance_repositions() {
        let commands = plan_apply(&event(PlaybackAction::Seek, 53.0), 50.0);
        assert_eq!(commands, vec![MediaCommand::SetPosition(53.0)]);
    }

    #[test]
    fn test_seek_backwards_uses_absolute_drift() {
        let commands = plan_apply(&event(PlaybackAction::Seek, 10.0), 50.0);
        assert_eq!(commands, vec![MediaCommand::SetPosition(10.0)]);
    }

    #[test]
    fn test_rate_applied_last() {
        let commands = plan_apply(&event(PlaybackAction::Seek, 50.0).with_rate(1.25), 50.0);
        assert_eq!(commands, vec![MediaCommand::SetRate(1.25)]);

        let commands = plan_apply(&event(PlaybackAction::Play, 0.0).with_rate(2.0), 9.0);
        assert_eq!(
            commands,
            vec![
                MediaCommand::SetPosition(0.0),
                MediaCommand::Play,
                MediaCommand::SetRate(2.0)
            ]
        );
    }

    #[test]
    fn test_zero_rate_ignored() {
        let commands = plan_apply(&event(PlaybackAction::Play, 1.0).with_rate(0.0), 1.0);
        assert_eq!(commands, vec![MediaCommand::Play]);
    }

    #[test]
    fn test_echo_window_expires() {
        let start = Instant::now();
        let mut guard = EchoGuard::new();
        assert!(!guard.is_active(start));

        guard.arm(start);
        assert!(guard.is_active(start));
        assert!(guard.is_active(start + Duration::from_millis(499)));
        assert!(!guard.is_active(start + Duration::from_millis(500)));
    }

    #[test]
    fn test_echo_window_rearm_extends() {
        let start = Instant::now();
        let mut guard = EchoGuard::new();

        guard.arm(start);
        guard.arm(start + Duration::from_millis(300));
        assert!(guard.is_active(start + Duration::from_millis(700)));
        assert!(!guard.is_active(start + Duration::from_millis(800)));
    }
}

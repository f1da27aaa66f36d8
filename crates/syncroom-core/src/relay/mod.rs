//! Relay client
//!
//! The relay is a generic room-scoped pub/sub server reached over
//! WebSocket. Hosts publish playback transitions into a room; the relay
//! fans them out to the room's viewers.
//!
//! ## Protocol
//!
//! 1. Connect via WebSocket
//! 2. Announce membership (`create_room` for hosts, `join_room` for viewers)
//! 3. Publish `send_action` / `url_changed`, receive `receive_action` /
//!    `url_changed`
//!
//! Delivery is best effort. Nothing is queued across a disconnection; the
//! next event after reconnecting reconciles the room.

mod connection;
mod message;

use std::sync::Arc;

pub use connection::{RelayConnection, RelayEvent, RelayOptions, RelayStatus};
pub use message::{InboundMessage, OutboundMessage};

use crate::room::{Role, RoomId};

/// Outbound side of the relay, as seen by the coordinator
pub trait RelaySink {
    /// Send without waiting for delivery; failures are logged, not returned
    fn publish(&self, message: OutboundMessage);

    /// Send the create-or-join announcement for `role`
    fn announce_room(&self, role: Role, room_id: &RoomId) {
        if let Some(message) = OutboundMessage::announce(role, room_id.clone()) {
            self.publish(message);
        }
    }
}

impl<T: RelaySink + ?Sized> RelaySink for Arc<T> {
    fn publish(&self, message: OutboundMessage) {
        (**self).publish(message);
    }
}

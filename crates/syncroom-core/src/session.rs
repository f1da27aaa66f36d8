//! Process-wide session state
//!
//! `SessionState` is owned by the coordinator. Everything else sees
//! snapshots obtained through [`crate::storage::SessionStore`].

use serde::{Deserialize, Serialize};

use crate::presentation::SurfaceHandle;
use crate::room::{Role, RoomId};

/// Snapshot of this process's room membership
///
/// The room id is present exactly when the role is not `None`, and a viewer
/// surface is only tracked while the role is `Viewer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionState {
    role: Role,
    room_id: Option<RoomId>,
    viewer_surface: Option<SurfaceHandle>,
    last_broadcast_url: Option<String>,
}

impl SessionState {
    /// State with no room
    pub fn idle() -> Self {
        Self::default()
    }

    /// State for an active membership
    ///
    /// Returns idle state when `role` is `None`.
    pub fn member(role: Role, room_id: RoomId) -> Self {
        if !role.is_member() {
            return Self::idle();
        }
        Self {
            role,
            room_id: Some(room_id),
            viewer_surface: None,
            last_broadcast_url: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn viewer_surface(&self) -> Option<&SurfaceHandle> {
        self.viewer_surface.as_ref()
    }

    pub fn last_broadcast_url(&self) -> Option<&str> {
        self.last_broadcast_url.as_deref()
    }

    pub fn is_idle(&self) -> bool {
        !self.role.is_member()
    }

    /// Whether `room_id` is the room this process is currently in
    pub fn is_active_room(&self, room_id: &RoomId) -> bool {
        self.room_id.as_ref() == Some(room_id)
    }

    /// Track the viewer's display surface; ignored unless viewing
    pub(crate) fn set_viewer_surface(&mut self, handle: Option<SurfaceHandle>) {
        if self.role == Role::Viewer {
            self.viewer_surface = handle;
        } else {
            self.viewer_surface = None;
        }
    }

    pub(crate) fn set_last_broadcast_url(&mut self, url: String) {
        if self.role.is_member() {
            self.last_broadcast_url = Some(url);
        }
    }
}

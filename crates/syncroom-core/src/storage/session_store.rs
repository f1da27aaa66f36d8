//! Durable session store
//!
//! Keeps the in-memory [`SessionState`] and mirrors its `{role, roomId}`
//! pair to `{data_dir}/session.json`. Writes are atomic (write to temp file,
//! then rename), so a restart never observes half a session.
//!
//! Reads never fail: a missing file means idle, and an unreadable or
//! corrupt file is logged and treated as idle.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use crate::room::{Role, RoomId};
use crate::session::SessionState;

/// On-disk layout of the session file
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room_id: Option<String>,
}

/// Owner of the process-wide session state
pub struct SessionStore {
    /// Where `{role, roomId}` is persisted; `None` keeps state in memory only
    path: Option<PathBuf>,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    /// Create a store that never touches disk
    pub fn in_memory() -> Self {
        let (state, _) = watch::channel(SessionState::idle());
        Self { path: None, state }
    }

    /// Load the persisted session, falling back to idle
    pub fn load(path: PathBuf) -> Self {
        let initial = match read_session(&path) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Ignoring persisted session state");
                SessionState::idle()
            }
        };

        debug!(role = %initial.role(), path = ?path, "Session state loaded");
        let (state, _) = watch::channel(initial);
        Self {
            path: Some(path),
            state,
        }
    }

    /// Current state snapshot
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch the state without being able to change it
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Enter a room
    ///
    /// The in-memory state changes even when persisting fails; the returned
    /// error only reports that a restart would not remember the room.
    pub fn set_role(&mut self, role: Role, room_id: RoomId) -> StorageResult<()> {
        if !role.is_member() {
            return Err(StorageError::UnpersistableRole(role));
        }

        let record = SessionRecord {
            role: Some(role),
            room_id: Some(room_id.to_string()),
        };
        self.state.send_replace(SessionState::member(role, room_id));
        self.persist(&record)
    }

    /// Leave any room and forget it on disk
    pub fn clear(&mut self) -> StorageResult<()> {
        self.state.send_replace(SessionState::idle());

        let Some(ref path) = self.path else {
            return Ok(());
        };

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, path.clone())),
        }
    }

    /// Change transient fields; never persisted
    pub(crate) fn update(&mut self, modify: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(modify);
    }

    fn persist(&self, record: &SessionRecord) -> StorageResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec(record)?;
        atomic_write(path, &json)
    }
}

/// Read and validate the session file
fn read_session(path: &Path) -> StorageResult<SessionState> {
    if !path.exists() {
        return Ok(SessionState::idle());
    }

    let content = fs::read_to_string(path).map_err(|source| StorageError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let corrupt = |details: String| StorageError::CorruptSession {
        path: path.to_path_buf(),
        details,
    };

    let record: SessionRecord =
        serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

    match (record.role, record.room_id) {
        (None, None) => Ok(SessionState::idle()),
        (Some(role @ (Role::Host | Role::Viewer)), Some(raw)) => {
            let room_id = RoomId::parse(&raw).map_err(|e| corrupt(e.to_string()))?;
            Ok(SessionState::member(role, room_id))
        }
        (role, room_id) => Err(corrupt(format!(
            "role {:?} does not match room id {:?}",
            role, room_id
        ))),
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

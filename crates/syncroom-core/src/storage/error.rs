//! Session persistence errors

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::room::Role;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied writing '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left to write '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read session file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write session file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The temp file was written but could not replace the session file
    #[error("Could not move '{from}' into place at '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Session file exists but cannot be used
    #[error("Session file '{path}' is corrupted: {details}")]
    CorruptSession { path: PathBuf, details: String },

    /// Only host and viewer memberships are persisted
    #[error("Cannot persist role '{0}'")]
    UnpersistableRole(Role),

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    /// Classify a failed write to `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied {
                path,
                source: error,
            }
        } else if is_out_of_space(&error) {
            StorageError::DiskFull {
                path,
                source: error,
            }
        } else {
            StorageError::WriteError {
                path,
                source: error,
            }
        }
    }

    /// What the user can do about it, when there is something
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space, then rejoin the room."),
            StorageError::PermissionDenied { .. } | StorageError::CreateDirectory { .. } => {
                Some("Check permissions on the syncroom data directory (syncroom config show).")
            }
            StorageError::CorruptSession { .. } => {
                Some("The session was reset. Create or join the room again.")
            }
            _ => None,
        }
    }
}

fn is_out_of_space(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from_io(io_err, PathBuf::from("/data/session.json"));

        assert!(matches!(err, StorageError::PermissionDenied { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_disk_full_detection() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = StorageError::from_io(io_err, PathBuf::from("/data/session.json.tmp"));

        assert!(matches!(err, StorageError::DiskFull { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_other_failures_are_write_errors() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = StorageError::from_io(io_err, PathBuf::from("/data/session.json"));

        assert!(matches!(err, StorageError::WriteError { .. }));
        assert!(err.recovery_suggestion().is_none());
    }

    #[test]
    fn test_corrupt_session_display() {
        let err = StorageError::CorruptSession {
            path: PathBuf::from("/data/session.json"),
            details: "expected value at line 1".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("corrupted"));
        assert!(msg.contains("session.json"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_unpersistable_role_display() {
        let err = StorageError::UnpersistableRole(Role::None);
        assert_eq!(err.to_string(), "Cannot persist role 'none'");
    }
}

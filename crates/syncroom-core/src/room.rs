//! Room identity and participant roles

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of generated room ids
pub const GENERATED_ROOM_ID_LEN: usize = 6;

const ROOM_ID_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomIdError {
    #[error("Room id is empty")]
    Empty,

    #[error("Room id '{0}' contains whitespace or control characters")]
    InvalidCharacter(String),
}

/// Opaque room token, normalized to uppercase
///
/// Used verbatim as the relay room key, so `abc123` and `ABC123` name the
/// same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Parse and normalize a user-supplied room id
    ///
    /// Surrounding whitespace is trimmed; inner whitespace is rejected.
    pub fn parse(raw: &str) -> Result<Self, RoomIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RoomIdError::Empty);
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(RoomIdError::InvalidCharacter(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Generate a random uppercase alphanumeric room id
    pub fn generate() -> Self {
        let bytes = uuid::Uuid::new_v4().into_bytes();
        let id = bytes
            .iter()
            .take(GENERATED_ROOM_ID_LEN)
            .map(|b| ROOM_ID_ALPHABET[(*b as usize) % ROOM_ID_ALPHABET.len()] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomId::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomId::parse(s)
    }
}

/// Role of this process within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not in a room
    #[default]
    None,
    /// Observes local playback and publishes it
    Host,
    /// Applies the host's playback locally
    Viewer,
}

impl Role {
    pub fn is_member(self) -> bool {
        !matches!(self, Role::None)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::None => f.write_str("none"),
            Role::Host => f.write_str("host"),
            Role::Viewer => f.write_str("viewer"),
        }
    }
}

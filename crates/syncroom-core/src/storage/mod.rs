//! Storage layer
//!
//! Persists the `{role, roomId}` pair of the session so a restarted daemon
//! rejoins its room without user interaction.

pub mod error;
pub mod session_store;

pub use error::{StorageError, StorageResult};
pub use session_store::SessionStore;

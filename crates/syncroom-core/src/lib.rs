//! syncroom Core Library
//!
//! This crate provides the synchronization core for syncroom: one host
//! drives media playback and every viewer in the same room follows it,
//! through a central pub/sub relay.
//!
//! # Architecture
//!
//! - **Coordinator**: single-task state machine owning the session state
//! - **Session store**: `{role, roomId}` survives restarts; everything else
//!   is rebuilt at runtime
//! - **Relay connection**: one WebSocket, reconnects with backoff and
//!   re-announces membership on every connect
//!
//! # Quick Start
//!
//! ```text
//! let store = SessionStore::load(config.session_path());
//! let relay = Arc::new(RelayConnection::new(RelayOptions::from_config(&config), store.subscribe()));
//! relay.connect();
//!
//! let mut coordinator = Coordinator::new(store, relay, media, surfaces);
//! coordinator.join_room(RoomId::parse("abc123")?);
//! ```
//!
//! # Modules
//!
//! - `coordinator`: Room state machine (main entry point)
//! - `policy`: Drift correction and echo suppression
//! - `relay`: Relay client and wire protocol
//! - `storage`: Session persistence
//! - `presentation`: Viewer display surface management
//! - `control`: Local control channel for UI clients and the page agent
//! - `agent`: Page agent bridge implementing the media/display boundaries
//! - `config`: Application configuration

pub mod agent;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod event;
pub mod media;
pub mod poll;
pub mod policy;
pub mod presentation;
pub mod relay;
pub mod room;
pub mod session;
pub mod storage;

pub use agent::AgentBridge;
pub use config::Config;
pub use control::{ControlRequest, ControlResponse, ControlRouter, ControlServer};
pub use coordinator::{Coordinator, CoordinatorInput, RequestError};
pub use event::{PlaybackAction, PlaybackEvent, UrlChangeEvent};
pub use media::{MediaCommand, MediaError, MediaSurface, ObservedKind, ObservedTransition};
pub use poll::{poll_until, PollTimeout};
pub use presentation::{DisplaySurfaces, SurfaceError, SurfaceHandle, ViewerPresentation};
pub use relay::{RelayConnection, RelayEvent, RelayOptions, RelaySink, RelayStatus};
pub use room::{Role, RoomId, RoomIdError};
pub use session::SessionState;
pub use storage::{SessionStore, StorageError};

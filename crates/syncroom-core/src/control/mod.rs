//! Local control channel
//!
//! UI clients connect to a loopback WebSocket and exchange JSON frames
//! tagged by `type`. Every connection is greeted with a `status_update`.
//! The page agent shares the listener and identifies itself with an
//! `agent_hello` frame.

mod protocol;
mod router;
mod server;

pub use protocol::{ControlRequest, ControlResponse};
pub use router::ControlRouter;
pub use server::ControlServer;

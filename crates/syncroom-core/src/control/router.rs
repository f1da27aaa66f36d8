//! Routes control requests into the coordinator

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use super::protocol::{ControlRequest, ControlResponse};
use crate::coordinator::CoordinatorInput;
use crate::session::SessionState;

const SHUTTING_DOWN: &str = "Daemon is shutting down";

/// Cheap handle shared by every control connection
#[derive(Clone)]
pub struct ControlRouter {
    inbox: mpsc::UnboundedSender<CoordinatorInput>,
    session: watch::Receiver<SessionState>,
}

impl ControlRouter {
    pub fn new(
        inbox: mpsc::UnboundedSender<CoordinatorInput>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        Self { inbox, session }
    }

    /// Current state, without going through the coordinator
    pub fn status(&self) -> ControlResponse {
        ControlResponse::StatusUpdate {
            state: self.session.borrow().clone(),
        }
    }

    /// Answer one request
    ///
    /// Status queries are served from the session snapshot; everything else
    /// waits for the coordinator to finish its current input.
    pub async fn route(&self, request: ControlRequest) -> ControlResponse {
        if request == ControlRequest::GetStatus {
            return self.status();
        }

        let (reply, response) = oneshot::channel();
        if self
            .inbox
            .send(CoordinatorInput::Control { request, reply })
            .is_err()
        {
            debug!("Coordinator stopped, rejecting control request");
            return ControlResponse::error(SHUTTING_DOWN);
        }

        response
            .await
            .unwrap_or_else(|_| ControlResponse::error(SHUTTING_DOWN))
    }
}

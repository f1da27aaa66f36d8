//! Sync coordinator
//!
//! The room state machine. A single task consumes [`CoordinatorInput`]s one
//! at a time, so the session state it owns needs no locking:
//!
//! ```text
//! Idle --create_room--> Hosting
//! Idle --join_room----> Watching
//! Hosting | Watching --leave_room--> Idle
//! ```
//!
//! Creating or joining while already in a room leaves that room first. After
//! a restart the state is loaded straight into `Hosting`/`Watching` and the
//! relay connection re-announces it.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::control::{ControlRequest, ControlResponse};
use crate::event::{PlaybackEvent, UrlChangeEvent};
use crate::media::{MediaCommand, MediaSurface, ObservedTransition};
use crate::policy::{plan_apply, EchoGuard};
use crate::presentation::{DisplaySurfaces, SurfaceHandle, ViewerPresentation};
use crate::relay::{InboundMessage, OutboundMessage, RelayEvent, RelaySink};
use crate::room::{Role, RoomId, RoomIdError};
use crate::session::SessionState;
use crate::storage::SessionStore;

/// Everything the coordinator reacts to
#[derive(Debug)]
pub enum CoordinatorInput {
    Control {
        request: ControlRequest,
        reply: oneshot::Sender<ControlResponse>,
    },
    Relay(RelayEvent),
    /// Transition observed on the local media element
    Media(ObservedTransition),
    /// The user closed a display surface
    SurfaceClosed(SurfaceHandle),
    Shutdown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    InvalidRoomId(#[from] RoomIdError),

    #[error("Not hosting a room")]
    NotHosting,

    #[error("URL is empty")]
    EmptyUrl,
}

pub struct Coordinator<M, D, R> {
    store: SessionStore,
    relay: R,
    media: M,
    presentation: ViewerPresentation<D>,
    echo: EchoGuard,
}

impl<M, D, R> Coordinator<M, D, R>
where
    M: MediaSurface,
    D: DisplaySurfaces,
    R: RelaySink,
{
    pub fn new(store: SessionStore, relay: R, media: M, surfaces: D) -> Self {
        Self {
            store,
            relay,
            media,
            presentation: ViewerPresentation::new(surfaces),
            echo: EchoGuard::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.store.current()
    }

    /// Host `room_id`
    pub fn create_room(&mut self, room_id: RoomId) {
        self.enter(Role::Host, room_id);
    }

    /// Watch `room_id`
    pub fn join_room(&mut self, room_id: RoomId) {
        self.enter(Role::Viewer, room_id);
    }

    fn enter(&mut self, role: Role, room_id: RoomId) {
        if !self.store.current().is_idle() {
            self.leave_room();
        }

        if let Err(e) = self.store.set_role(role, room_id.clone()) {
            warn!(
                error = %e,
                suggestion = e.recovery_suggestion(),
                "Failed to persist session; the room will be forgotten on restart"
            );
        }
        self.echo = EchoGuard::new();
        self.relay.announce_room(role, &room_id);

        info!(role = %role, room = %room_id, "Entered room");
    }

    /// Leave the current room
    ///
    /// Local state is cleared whether or not the relay hears about it.
    pub fn leave_room(&mut self) {
        let previous = self.store.current();
        if let Some(room_id) = previous.room_id() {
            self.relay.publish(OutboundMessage::LeaveRoom);
            info!(role = %previous.role(), room = %room_id, "Left room");
        }

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove persisted session");
        }
        self.echo = EchoGuard::new();
    }

    /// Announce the host's current media URL
    pub fn broadcast_url(&mut self, url: String) -> Result<(), RequestError> {
        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(RequestError::EmptyUrl);
        }

        let state = self.store.current();
        let (Role::Host, Some(room_id)) = (state.role(), state.room_id()) else {
            return Err(RequestError::NotHosting);
        };

        self.relay.publish(OutboundMessage::UrlChanged(UrlChangeEvent {
            room_id: room_id.clone(),
            url: url.clone(),
        }));
        info!(room = %room_id, url = %url, "Broadcast URL");
        self.store.update(|state| state.set_last_broadcast_url(url));
        Ok(())
    }

    /// Room to offer broadcasting into, if hosting
    pub fn check_broadcast(&self) -> Option<RoomId> {
        let state = self.store.current();
        match state.role() {
            Role::Host => state.room_id().cloned(),
            _ => None,
        }
    }

    pub async fn handle(&mut self, input: CoordinatorInput) {
        match input {
            CoordinatorInput::Control { request, reply } => {
                let response = self.handle_control(request);
                if reply.send(response).is_err() {
                    debug!("Control client went away before the reply");
                }
            }
            CoordinatorInput::Relay(event) => self.handle_relay(event).await,
            CoordinatorInput::Media(transition) => self.handle_media(transition),
            CoordinatorInput::SurfaceClosed(handle) => self.handle_surface_closed(&handle),
            CoordinatorInput::Shutdown => {}
        }
    }

    pub fn handle_control(&mut self, request: ControlRequest) -> ControlResponse {
        match self.try_control(request) {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Rejected control request");
                ControlResponse::error(e)
            }
        }
    }

    fn try_control(&mut self, request: ControlRequest) -> Result<ControlResponse, RequestError> {
        let response = match request {
            ControlRequest::CreateRoom { room_id } => {
                let room_id = match room_id {
                    Some(raw) => RoomId::parse(&raw)?,
                    None => RoomId::generate(),
                };
                self.create_room(room_id.clone());
                ControlResponse::RoomCreated { room_id }
            }
            ControlRequest::JoinRoom { room_id } => {
                let room_id = RoomId::parse(&room_id)?;
                self.join_room(room_id.clone());
                ControlResponse::JoinedRoom { room_id }
            }
            ControlRequest::LeaveRoom => {
                self.leave_room();
                ControlResponse::LeftRoom
            }
            ControlRequest::GetStatus => ControlResponse::StatusUpdate {
                state: self.state(),
            },
            ControlRequest::BroadcastUrl { url } => {
                self.broadcast_url(url.clone())?;
                ControlResponse::UrlBroadcast { url }
            }
            ControlRequest::CheckBroadcast => {
                let room_id = self.check_broadcast();
                ControlResponse::BroadcastCheck {
                    should_broadcast: room_id.is_some(),
                    room_id,
                }
            }
        };
        Ok(response)
    }

    pub async fn handle_relay(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected => info!("Relay connected"),
            RelayEvent::Disconnected => info!("Relay disconnected"),
            RelayEvent::Message(InboundMessage::ReceiveAction(event)) => {
                self.apply_remote(event).await
            }
            RelayEvent::Message(InboundMessage::UrlChanged(url)) => self.url_changed(url).await,
        }
    }

    /// Apply a host transition to the local media element
    async fn apply_remote(&mut self, event: PlaybackEvent) {
        let state = self.store.current();
        if state.role() != Role::Viewer {
            debug!(action = ?event.action, "Not watching, ignoring playback event");
            return;
        }
        if !state.is_active_room(&event.room_id) {
            debug!(room = %event.room_id, "Playback event for another room, ignoring");
            return;
        }
        if self.media.ad_showing() {
            debug!(action = ?event.action, "Ad showing, ignoring playback event");
            return;
        }
        if !self.media.ready().await {
            warn!(action = ?event.action, "No media element, dropping playback event");
            return;
        }

        self.echo.arm(Instant::now());
        for command in plan_apply(&event, self.media.position()) {
            if let Err(e) = self.media.apply(command) {
                match command {
                    MediaCommand::Play => warn!(error = %e, "Play was not allowed"),
                    _ => warn!(error = %e, command = ?command, "Failed to apply media command"),
                }
            }
        }
        self.echo.arm(Instant::now());

        debug!(
            action = ?event.action,
            timestamp = event.timestamp,
            "Applied playback event"
        );
    }

    async fn url_changed(&mut self, url: String) {
        let state = self.store.current();
        if state.role() != Role::Viewer {
            debug!(url = %url, "Not watching, ignoring URL change");
            return;
        }

        self.store
            .update(|state| state.set_last_broadcast_url(url.clone()));

        let tracked = state.viewer_surface().cloned();
        let handle = self.presentation.show(tracked, &url).await;
        self.store.update(|state| state.set_viewer_surface(handle));
    }

    /// React to a transition of the local media element
    pub fn handle_media(&mut self, transition: ObservedTransition) {
        let state = self.store.current();
        match (state.role(), state.room_id()) {
            (Role::Host, Some(room_id)) => {
                if self.media.ad_showing() {
                    debug!(kind = ?transition.kind, "Ad showing, not publishing");
                    return;
                }

                let event =
                    PlaybackEvent::new(transition.kind.into(), transition.position, room_id.clone())
                        .with_rate(transition.rate);
                debug!(action = ?event.action, timestamp = event.timestamp, "Publishing playback event");
                self.relay.publish(OutboundMessage::SendAction(event));
            }
            (Role::Viewer, _) => {
                if self.echo.is_active(Instant::now()) {
                    debug!(kind = ?transition.kind, "Echo of applied playback event");
                } else {
                    debug!(kind = ?transition.kind, "Viewers do not publish playback");
                }
            }
            _ => {}
        }
    }

    pub fn handle_surface_closed(&mut self, closed: &SurfaceHandle) {
        self.store.update(|state| {
            let tracked = state.viewer_surface().cloned();
            state.set_viewer_surface(ViewerPresentation::<D>::surface_closed(tracked, closed));
        });
    }

    /// Consume inputs until shutdown or until every sender is gone
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<CoordinatorInput>, keepalive: Duration) {
        let state = self.state();
        info!(
            role = %state.role(),
            room = ?state.room_id().map(RoomId::as_str),
            "Coordinator started"
        );

        let mut ticker = tokio::time::interval(keepalive);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                input = inbox.recv() => match input {
                    None | Some(CoordinatorInput::Shutdown) => break,
                    Some(input) => self.handle(input).await,
                },
                _ = ticker.tick() => {
                    debug!(role = %self.store.current().role(), "Keep-alive");
                }
            }
        }

        info!("Coordinator stopped");
    }
}

//! Page agent bridge
//!
//! The page agent runs next to the media page and connects to the control
//! channel. It reports what the media element does and opens display
//! surfaces on request. This module is the daemon-side end of that
//! connection: [`RemoteMedia`] and [`RemoteSurfaces`] implement the
//! coordinator's media and display boundaries on top of it.
//!
//! At most one agent is attached. A newer agent replaces the older one.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorInput;
use crate::media::{MediaCommand, MediaError, MediaSurface, ObservedKind, ObservedTransition};
use crate::poll::poll_until;
use crate::presentation::{DisplaySurfaces, SurfaceError, SurfaceHandle};

/// How long an open request waits for `surface_opened`
pub const SURFACE_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for a media element before giving up on an event
pub const MEDIA_READY_TIMEOUT: Duration = Duration::from_secs(3);

pub const MEDIA_READY_INTERVAL: Duration = Duration::from_millis(250);

/// Frames sent by the page agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentFrame {
    AgentHello,
    /// Periodic snapshot of the media element
    MediaState {
        position: f64,
        rate: f64,
        paused: bool,
        #[serde(rename = "adShowing")]
        ad_showing: bool,
        #[serde(rename = "hasMedia")]
        has_media: bool,
    },
    /// A user-visible transition of the media element
    Observed {
        event: ObservedKind,
        position: f64,
        rate: f64,
        #[serde(rename = "adShowing", default)]
        ad_showing: bool,
    },
    SurfaceOpened {
        #[serde(rename = "requestId")]
        request_id: u64,
        surface: SurfaceHandle,
    },
    SurfaceClosed { surface: SurfaceHandle },
    ApplyFailed { message: String },
}

/// Frames sent to the page agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentCommand {
    Apply { command: MediaCommand },
    OpenSurface {
        #[serde(rename = "requestId")]
        request_id: u64,
        url: String,
    },
    NavigateSurface { surface: SurfaceHandle, url: String },
    MuteSurface { surface: SurfaceHandle },
}

/// Last known state of the agent's media element
#[derive(Debug, Clone, Copy)]
struct MediaSnapshot {
    position: f64,
    rate: f64,
    paused: bool,
    ad_showing: bool,
    has_media: bool,
    at: Instant,
}

impl Default for MediaSnapshot {
    fn default() -> Self {
        Self {
            position: 0.0,
            rate: 1.0,
            paused: true,
            ad_showing: false,
            has_media: false,
            at: Instant::now(),
        }
    }
}

impl MediaSnapshot {
    /// Position now, extrapolated while playing
    fn position_at(&self, now: Instant) -> f64 {
        if self.paused {
            return self.position;
        }
        let elapsed = now.saturating_duration_since(self.at).as_secs_f64();
        self.position + elapsed * self.rate
    }

    fn settle(&mut self, now: Instant) {
        self.position = self.position_at(now);
        self.at = now;
    }

    fn apply(&mut self, command: MediaCommand, now: Instant) {
        self.settle(now);
        match command {
            MediaCommand::SetPosition(position) => self.position = position,
            MediaCommand::SetRate(rate) => self.rate = rate,
            MediaCommand::Play => self.paused = false,
            MediaCommand::Pause => self.paused = true,
        }
    }
}

#[derive(Default)]
struct Shared {
    /// Attached agent and its session id
    agent: Option<(u64, mpsc::UnboundedSender<AgentCommand>)>,
    next_session: u64,
    media: MediaSnapshot,
    surfaces: HashSet<SurfaceHandle>,
    pending: HashMap<u64, oneshot::Sender<SurfaceHandle>>,
    next_request: u64,
}

impl Shared {
    /// Forget everything the previous agent reported
    ///
    /// Surfaces belong to the agent that opened them. Dropping the pending
    /// senders fails every open still waiting on that agent.
    fn reset(&mut self) {
        self.media = MediaSnapshot::default();
        self.surfaces.clear();
        self.pending.clear();
    }

    fn send(&self, command: AgentCommand) -> bool {
        match &self.agent {
            Some((_, outbox)) => outbox.send(command).is_ok(),
            None => false,
        }
    }
}

/// An attached agent connection
pub struct AgentSession {
    pub id: u64,
    /// Commands to write to the agent's socket
    pub commands: mpsc::UnboundedReceiver<AgentCommand>,
}

#[derive(Clone)]
pub struct AgentBridge {
    shared: Arc<Mutex<Shared>>,
    inbox: mpsc::UnboundedSender<CoordinatorInput>,
}

impl AgentBridge {
    pub fn new(inbox: mpsc::UnboundedSender<CoordinatorInput>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            inbox,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Attach a new agent, detaching any previous one
    pub fn attach(&self) -> AgentSession {
        let (tx, commands) = mpsc::unbounded_channel();
        let mut shared = self.lock();

        shared.next_session += 1;
        let id = shared.next_session;
        if let Some((previous, _)) = shared.agent.replace((id, tx)) {
            info!(previous, session = id, "Page agent replaced");
        } else {
            info!(session = id, "Page agent attached");
        }
        shared.reset();

        AgentSession { id, commands }
    }

    /// Forget the agent if `id` is still the attached one
    pub fn detach(&self, id: u64) {
        let mut shared = self.lock();
        if !matches!(shared.agent, Some((current, _)) if current == id) {
            return;
        }

        shared.agent = None;
        shared.reset();
        info!(session = id, "Page agent detached");
    }

    pub fn is_attached(&self) -> bool {
        self.lock().agent.is_some()
    }

    /// Whether `id` is the attached agent
    pub fn is_current(&self, id: u64) -> bool {
        matches!(self.lock().agent, Some((current, _)) if current == id)
    }

    pub fn handle_frame(&self, frame: AgentFrame) {
        let now = Instant::now();
        match frame {
            AgentFrame::AgentHello => debug!("Duplicate agent hello ignored"),
            AgentFrame::MediaState {
                position,
                rate,
                paused,
                ad_showing,
                has_media,
            } => {
                self.lock().media = MediaSnapshot {
                    position,
                    rate,
                    paused,
                    ad_showing,
                    has_media,
                    at: now,
                };
            }
            AgentFrame::Observed {
                event,
                position,
                rate,
                ad_showing,
            } => {
                {
                    let mut shared = self.lock();
                    let paused = match event {
                        ObservedKind::Play => false,
                        ObservedKind::Pause => true,
                        ObservedKind::Seeked => shared.media.paused,
                    };
                    shared.media = MediaSnapshot {
                        position,
                        rate,
                        paused,
                        ad_showing,
                        has_media: true,
                        at: now,
                    };
                }
                self.forward(CoordinatorInput::Media(ObservedTransition {
                    kind: event,
                    position,
                    rate,
                }));
            }
            AgentFrame::SurfaceOpened {
                request_id,
                surface,
            } => {
                let mut shared = self.lock();
                shared.surfaces.insert(surface.clone());
                match shared.pending.remove(&request_id) {
                    Some(waiter) => {
                        if waiter.send(surface.clone()).is_err() {
                            debug!(request_id, "Open request gave up before the surface opened");
                        }
                    }
                    None => debug!(request_id, surface = %surface, "Unrequested surface opened"),
                }
            }
            AgentFrame::SurfaceClosed { surface } => {
                self.lock().surfaces.remove(&surface);
                self.forward(CoordinatorInput::SurfaceClosed(surface));
            }
            AgentFrame::ApplyFailed { message } => {
                warn!(message = %message, "Page agent failed to apply media command");
            }
        }
    }

    fn forward(&self, input: CoordinatorInput) {
        if self.inbox.send(input).is_err() {
            debug!("Coordinator stopped, dropping agent input");
        }
    }

    pub fn media(&self) -> RemoteMedia {
        RemoteMedia {
            shared: self.shared.clone(),
        }
    }

    pub fn surfaces(&self) -> RemoteSurfaces {
        RemoteSurfaces {
            shared: self.shared.clone(),
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The attached agent's media element
pub struct RemoteMedia {
    shared: Arc<Mutex<Shared>>,
}

impl MediaSurface for RemoteMedia {
    fn position(&self) -> f64 {
        lock(&self.shared).media.position_at(Instant::now())
    }

    fn ad_showing(&self) -> bool {
        lock(&self.shared).media.ad_showing
    }

    fn apply(&mut self, command: MediaCommand) -> Result<(), MediaError> {
        let mut shared = lock(&self.shared);
        if !shared.media.has_media || !shared.send(AgentCommand::Apply { command }) {
            return Err(MediaError::Unavailable);
        }
        shared.media.apply(command, Instant::now());
        Ok(())
    }

    fn ready(&self) -> impl Future<Output = bool> + Send {
        let shared = self.shared.clone();
        async move {
            poll_until(MEDIA_READY_INTERVAL, MEDIA_READY_TIMEOUT, || {
                let shared = lock(&shared);
                shared.agent.is_some() && shared.media.has_media
            })
            .await
            .is_ok()
        }
    }
}

/// Display surfaces opened through the attached agent
pub struct RemoteSurfaces {
    shared: Arc<Mutex<Shared>>,
}

impl RemoteSurfaces {
    fn send(&self, command: AgentCommand) -> Result<(), SurfaceError> {
        if lock(&self.shared).send(command) {
            Ok(())
        } else {
            Err(SurfaceError::NoAgent)
        }
    }

    fn request_open(&self, url: &str) -> Result<(u64, oneshot::Receiver<SurfaceHandle>), SurfaceError> {
        let mut shared = lock(&self.shared);
        shared.next_request += 1;
        let request_id = shared.next_request;

        let (tx, rx) = oneshot::channel();
        shared.pending.insert(request_id, tx);
        if !shared.send(AgentCommand::OpenSurface {
            request_id,
            url: url.to_string(),
        }) {
            shared.pending.remove(&request_id);
            return Err(SurfaceError::NoAgent);
        }
        Ok((request_id, rx))
    }
}

impl DisplaySurfaces for RemoteSurfaces {
    fn exists(&self, handle: &SurfaceHandle) -> impl Future<Output = bool> + Send {
        let exists = lock(&self.shared).surfaces.contains(handle);
        std::future::ready(exists)
    }

    fn open(&self, url: &str) -> impl Future<Output = Result<SurfaceHandle, SurfaceError>> + Send {
        let requested = self.request_open(url);
        let shared = self.shared.clone();
        async move {
            let (request_id, opened) = requested?;
            match tokio::time::timeout(SURFACE_OPEN_TIMEOUT, opened).await {
                Ok(Ok(handle)) => Ok(handle),
                Ok(Err(_)) => Err(SurfaceError::NoAgent),
                Err(_) => {
                    lock(&shared).pending.remove(&request_id);
                    Err(SurfaceError::Timeout)
                }
            }
        }
    }

    fn navigate(
        &self,
        handle: &SurfaceHandle,
        url: &str,
    ) -> impl Future<Output = Result<(), SurfaceError>> + Send {
        let result = if lock(&self.shared).surfaces.contains(handle) {
            self.send(AgentCommand::NavigateSurface {
                surface: handle.clone(),
                url: url.to_string(),
            })
        } else {
            Err(SurfaceError::Gone(handle.clone()))
        };
        std::future::ready(result)
    }

    fn mute(&self, handle: &SurfaceHandle) -> impl Future<Output = Result<(), SurfaceError>> + Send {
        std::future::ready(self.send(AgentCommand::MuteSurface {
            surface: handle.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::ViewerPresentation;
    use serde_json::json;

    fn bridge() -> (AgentBridge, mpsc::UnboundedReceiver<CoordinatorInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (AgentBridge::new(tx), rx)
    }

    fn media_state(position: f64, paused: bool) -> AgentFrame {
        AgentFrame::MediaState {
            position,
            rate: 1.0,
            paused,
            ad_showing: false,
            has_media: true,
        }
    }

    #[test]
    fn test_frame_wire_shape() {
        let frame: AgentFrame = serde_json::from_value(json!({
            "type": "observed",
            "event": "seeked",
            "position": 12.0,
            "rate": 1.0,
            "adShowing": false
        }))
        .unwrap();
        assert!(matches!(
            frame,
            AgentFrame::Observed {
                event: ObservedKind::Seeked,
                ..
            }
        ));

        let json = serde_json::to_value(AgentCommand::Apply {
            command: MediaCommand::SetPosition(3.0),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"type": "apply", "command": {"kind": "setPosition", "value": 3.0}})
        );
    }

    #[test]
    fn test_observed_is_forwarded() {
        let (bridge, mut inbox) = bridge();
        let _session = bridge.attach();

        bridge.handle_frame(AgentFrame::Observed {
            event: ObservedKind::Play,
            position: 4.0,
            rate: 1.0,
            ad_showing: true,
        });

        let Ok(CoordinatorInput::Media(transition)) = inbox.try_recv() else {
            panic!("expected media input");
        };
        assert_eq!(transition.kind, ObservedKind::Play);
        assert_eq!(transition.position, 4.0);
        assert!(bridge.media().ad_showing());
    }

    #[test]
    fn test_position_extrapolates_while_playing() {
        let start = Instant::now();
        let mut snapshot = MediaSnapshot {
            position: 10.0,
            rate: 2.0,
            paused: false,
            ad_showing: false,
            has_media: true,
            at: start,
        };
        assert_eq!(snapshot.position_at(start + Duration::from_secs(1)), 12.0);

        snapshot.apply(MediaCommand::Pause, start + Duration::from_secs(1));
        assert_eq!(snapshot.position_at(start + Duration::from_secs(5)), 12.0);
    }

    #[test]
    fn test_apply_sends_command_to_agent() {
        let (bridge, _inbox) = bridge();
        let mut session = bridge.attach();
        bridge.handle_frame(media_state(5.0, true));

        let mut media = bridge.media();
        media.apply(MediaCommand::SetPosition(8.0)).unwrap();

        assert_eq!(
            session.commands.try_recv().unwrap(),
            AgentCommand::Apply {
                command: MediaCommand::SetPosition(8.0)
            }
        );
        assert_eq!(media.position(), 8.0);
    }

    #[test]
    fn test_apply_without_agent_fails() {
        let (bridge, _inbox) = bridge();
        let mut media = bridge.media();
        assert_eq!(media.apply(MediaCommand::Play), Err(MediaError::Unavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_waits_for_media_element() {
        let (bridge, _inbox) = bridge();
        let _session = bridge.attach();
        let media = bridge.media();

        let attach_media = async {
            tokio::time::sleep(Duration::from_millis(600)).await;
            bridge.handle_frame(media_state(0.0, true));
        };
        let (ready, ()) = tokio::join!(media.ready(), attach_media);

        assert!(ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_gives_up() {
        let (bridge, _inbox) = bridge();
        let _session = bridge.attach();
        assert!(!bridge.media().ready().await);
    }

    #[tokio::test]
    async fn test_open_resolves_on_surface_opened() {
        let (bridge, _inbox) = bridge();
        let mut session = bridge.attach();
        let surfaces = bridge.surfaces();

        let responder = bridge.clone();
        let agent = tokio::spawn(async move {
            let Some(AgentCommand::OpenSurface { request_id, url }) = session.commands.recv().await
            else {
                panic!("expected open request");
            };
            assert_eq!(url, "https://a.example");
            responder.handle_frame(AgentFrame::SurfaceOpened {
                request_id,
                surface: SurfaceHandle::new("w7"),
            });
            session
        });

        let handle = surfaces.open("https://a.example").await.unwrap();
        assert_eq!(handle.as_str(), "w7");
        assert!(surfaces.exists(&handle).await);
        agent.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_times_out() {
        let (bridge, _inbox) = bridge();
        let _session = bridge.attach();

        let result = bridge.surfaces().open("https://a.example").await;
        assert_eq!(result, Err(SurfaceError::Timeout));
    }

    #[tokio::test]
    async fn test_open_without_agent_fails() {
        let (bridge, _inbox) = bridge();
        let result = bridge.surfaces().open("https://a.example").await;
        assert_eq!(result, Err(SurfaceError::NoAgent));
    }

    #[tokio::test]
    async fn test_closed_surface_is_forwarded() {
        let (bridge, mut inbox) = bridge();
        let _session = bridge.attach();
        let handle = SurfaceHandle::new("w1");

        bridge.handle_frame(AgentFrame::SurfaceOpened {
            request_id: 99,
            surface: handle.clone(),
        });
        assert!(bridge.surfaces().exists(&handle).await);

        bridge.handle_frame(AgentFrame::SurfaceClosed {
            surface: handle.clone(),
        });
        assert!(!bridge.surfaces().exists(&handle).await);
        assert!(matches!(
            inbox.try_recv(),
            Ok(CoordinatorInput::SurfaceClosed(closed)) if closed == handle
        ));
    }

    #[tokio::test]
    async fn test_surfaces_do_not_outlive_their_agent() {
        let (bridge, _inbox) = bridge();
        let first = bridge.attach();
        let handle = SurfaceHandle::new("w1");
        bridge.handle_frame(AgentFrame::SurfaceOpened {
            request_id: 1,
            surface: handle.clone(),
        });
        bridge.detach(first.id);

        let mut second = bridge.attach();
        let surfaces = bridge.surfaces();
        assert!(!surfaces.exists(&handle).await);
        assert_eq!(
            surfaces.navigate(&handle, "https://b.example").await,
            Err(SurfaceError::Gone(handle.clone()))
        );
        assert!(second.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replacing_agent_forgets_its_surfaces() {
        let (bridge, _inbox) = bridge();
        let _first = bridge.attach();
        let handle = SurfaceHandle::new("w1");
        bridge.handle_frame(AgentFrame::SurfaceOpened {
            request_id: 1,
            surface: handle.clone(),
        });

        let _second = bridge.attach();
        assert!(!bridge.surfaces().exists(&handle).await);
    }

    #[tokio::test]
    async fn test_presentation_reopens_after_agent_change() {
        let (bridge, _inbox) = bridge();
        let first = bridge.attach();
        let handle = SurfaceHandle::new("w1");
        bridge.handle_frame(AgentFrame::SurfaceOpened {
            request_id: 1,
            surface: handle.clone(),
        });
        bridge.detach(first.id);
        let mut second = bridge.attach();

        let presentation = ViewerPresentation::new(bridge.surfaces());
        let responder = bridge.clone();
        let agent = tokio::spawn(async move {
            let Some(AgentCommand::OpenSurface { request_id, url }) = second.commands.recv().await
            else {
                panic!("expected a fresh open request");
            };
            assert_eq!(url, "https://b.example");
            responder.handle_frame(AgentFrame::SurfaceOpened {
                request_id,
                surface: SurfaceHandle::new("w2"),
            });
            second
        });

        let shown = presentation
            .show(Some(handle), "https://b.example")
            .await;
        assert_eq!(shown, Some(SurfaceHandle::new("w2")));
        agent.await.unwrap();
    }

    #[tokio::test]
    async fn test_newer_agent_replaces_older() {
        let (bridge, _inbox) = bridge();
        let first = bridge.attach();
        let mut second = bridge.attach();

        assert!(!bridge.is_current(first.id));
        bridge.detach(first.id);
        assert!(bridge.is_attached());

        // The older connection closing leaves the newer outbox in place
        let handle = SurfaceHandle::new("w1");
        bridge.surfaces().mute(&handle).await.unwrap();
        assert_eq!(
            second.commands.try_recv().unwrap(),
            AgentCommand::MuteSurface { surface: handle }
        );

        bridge.detach(second.id);
        assert!(!bridge.is_attached());
    }
}

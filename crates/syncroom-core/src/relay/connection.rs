//! Persistent relay connection
//!
//! Maintains a long-lived WebSocket connection to the relay server.
//! Handles reconnection automatically with exponential backoff and
//! re-announces room membership after every successful connect.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::message::{InboundMessage, OutboundMessage};
use super::RelaySink;
use crate::config::Config;
use crate::session::SessionState;

/// Outbound messages waiting for the socket; overflow is dropped
const OUTBOUND_QUEUE: usize = 64;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    /// Not connected, waiting to retry or shut down
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and membership announced
    Connected,
}

/// Events delivered to the registered handler
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Connected,
    Disconnected,
    Message(InboundMessage),
}

/// Commands sent to the connection task
#[derive(Debug)]
enum RelayCommand {
    Send(OutboundMessage),
    Shutdown,
}

/// Configuration for the relay connection
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// WebSocket URL
    pub url: String,
    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,
    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl RelayOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.relay_url.clone(),
            initial_reconnect_delay: config.reconnect_initial_delay(),
            max_reconnect_delay: config.reconnect_max_delay(),
        }
    }
}

type EventHandler = Arc<dyn Fn(RelayEvent) + Send + Sync>;

/// Task state handed over on the first `connect()`
struct Unstarted {
    command_rx: mpsc::Receiver<RelayCommand>,
    status_tx: watch::Sender<RelayStatus>,
}

/// The single logical connection to the relay server
pub struct RelayConnection {
    options: RelayOptions,
    /// Latest session snapshot, read on every (re)connect
    session: watch::Receiver<SessionState>,
    command_tx: mpsc::Sender<RelayCommand>,
    status_rx: watch::Receiver<RelayStatus>,
    handler: Arc<RwLock<Option<EventHandler>>>,
    unstarted: Mutex<Option<Unstarted>>,
}

impl RelayConnection {
    pub fn new(options: RelayOptions, session: watch::Receiver<SessionState>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (status_tx, status_rx) = watch::channel(RelayStatus::Disconnected);

        Self {
            options,
            session,
            command_tx,
            status_rx,
            handler: Arc::new(RwLock::new(None)),
            unstarted: Mutex::new(Some(Unstarted {
                command_rx,
                status_tx,
            })),
        }
    }

    /// Start the connection task
    ///
    /// Idempotent: only the first call spawns a task. Must be called from
    /// within a Tokio runtime.
    pub fn connect(&self) {
        let unstarted = self
            .unstarted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(Unstarted {
            command_rx,
            status_tx,
        }) = unstarted
        else {
            debug!("Relay connection already started");
            return;
        };

        tokio::spawn(relay_task_loop(
            self.options.clone(),
            self.session.clone(),
            command_rx,
            status_tx,
            self.handler.clone(),
        ));
    }

    /// Register the handler for inbound events, replacing any previous one
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(RelayEvent) + Send + Sync + 'static,
    {
        let mut slot = self.handler.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler));
    }

    /// Get the current status
    pub fn status(&self) -> RelayStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<RelayStatus> {
        self.status_rx.clone()
    }

    /// Stop the connection task and close the socket
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(RelayCommand::Shutdown).await;
    }
}

impl RelaySink for RelayConnection {
    /// Fire-and-forget; dropped unless connected
    fn publish(&self, message: OutboundMessage) {
        if self.status() != RelayStatus::Connected {
            debug!(event = message.name(), "Relay not connected, dropping message");
            return;
        }

        match self.command_tx.try_send(RelayCommand::Send(message)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(RelayCommand::Send(message))) => {
                warn!(event = message.name(), "Relay queue full, dropping message");
            }
            Err(_) => debug!("Relay task stopped, dropping message"),
        }
    }
}

fn dispatch(handler: &RwLock<Option<EventHandler>>, event: RelayEvent) {
    let current = handler
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(handler) = current {
        handler(event);
    }
}

/// Main connection loop with reconnection
async fn relay_task_loop(
    options: RelayOptions,
    session: watch::Receiver<SessionState>,
    mut command_rx: mpsc::Receiver<RelayCommand>,
    status_tx: watch::Sender<RelayStatus>,
    handler: Arc<RwLock<Option<EventHandler>>>,
) {
    let mut reconnect_delay = options.initial_reconnect_delay;

    loop {
        let _ = status_tx.send(RelayStatus::Connecting);

        match connect_and_run(&options, &session, &mut command_rx, &status_tx, &handler).await {
            Ok(true) => {
                let _ = status_tx.send(RelayStatus::Disconnected);
                info!("Relay connection shut down");
                break;
            }
            Ok(false) => {
                // Connection closed normally, reset backoff
                reconnect_delay = options.initial_reconnect_delay;
            }
            Err(e) => {
                warn!(url = %options.url, error = %e, "Relay connection error");
            }
        }

        let was_connected = *status_tx.borrow() == RelayStatus::Connected;
        let _ = status_tx.send(RelayStatus::Disconnected);
        if was_connected {
            info!("Disconnected from relay");
            dispatch(&handler, RelayEvent::Disconnected);
        }

        // Wait before reconnecting; anything published meanwhile is dropped
        let sleep = tokio::time::sleep(reconnect_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = command_rx.recv() => match cmd {
                    Some(RelayCommand::Send(message)) => {
                        debug!(event = message.name(), "Relay disconnected, dropping message");
                    }
                    Some(RelayCommand::Shutdown) | None => return,
                },
            }
        }
        reconnect_delay = (reconnect_delay * 2).min(options.max_reconnect_delay);
    }
}

/// Connect and run until disconnection or shutdown
///
/// Returns `Ok(true)` when shutdown was requested.
async fn connect_and_run(
    options: &RelayOptions,
    session: &watch::Receiver<SessionState>,
    command_rx: &mut mpsc::Receiver<RelayCommand>,
    status_tx: &watch::Sender<RelayStatus>,
    handler: &RwLock<Option<EventHandler>>,
) -> Result<bool> {
    let (ws_stream, _) = connect_async(options.url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    // Recover membership lost with the previous connection or process
    let mut session = session.clone();
    let announced = session.borrow_and_update().clone();
    for message in membership_changes(&SessionState::idle(), &announced) {
        info!(role = %announced.role(), event = message.name(), "Announcing room membership");
        write.send(Message::Text(message.encode()?)).await?;
    }

    let _ = status_tx.send(RelayStatus::Connected);
    info!(url = %options.url, "Connected to relay");

    // Publishes made before Connected was visible were dropped
    if session.has_changed().unwrap_or(false) {
        let current = session.borrow_and_update().clone();
        for message in membership_changes(&announced, &current) {
            info!(role = %current.role(), event = message.name(), "Catching up room membership");
            write.send(Message::Text(message.encode()?)).await?;
        }
    }

    dispatch(handler, RelayEvent::Connected);

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(RelayCommand::Send(message)) => {
                        let text = match message.encode() {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(event = message.name(), error = %e, "Failed to encode relay message");
                                continue;
                            }
                        };
                        write.send(Message::Text(text)).await?;
                    }
                    Some(RelayCommand::Shutdown) | None => {
                        write.close().await.ok();
                        return Ok(true);
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match InboundMessage::decode(&text) {
                        Ok(inbound) => dispatch(handler, RelayEvent::Message(inbound)),
                        Err(e) => debug!(error = %e, "Ignoring unrecognized relay frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(false),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

/// Messages that move the relay's view of this client from `announced` to
/// `current` membership
fn membership_changes(announced: &SessionState, current: &SessionState) -> Vec<OutboundMessage> {
    if announced.role() == current.role() && announced.room_id() == current.room_id() {
        return Vec::new();
    }

    let mut messages = Vec::new();
    if announced.room_id().is_some() {
        messages.push(OutboundMessage::LeaveRoom);
    }
    if let Some(room_id) = current.room_id() {
        messages.extend(OutboundMessage::announce(current.role(), room_id.clone()));
    }
    messages
}

//! Daemon command handler
//!
//! Runs the coordinator on the current task until Ctrl-C. The relay
//! connection and the control channel run on their own tasks and reach the
//! coordinator through its inbox.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use syncroom_core::{
    AgentBridge, Config, ControlRouter, ControlServer, Coordinator, CoordinatorInput,
    RelayConnection, RelayOptions, SessionStore,
};

pub async fn run(config: &Config) -> Result<()> {
    let store = SessionStore::load(config.session_path());
    let session = store.subscribe();
    let (inbox, inbox_rx) = mpsc::unbounded_channel();

    let relay = Arc::new(RelayConnection::new(
        RelayOptions::from_config(config),
        session.clone(),
    ));
    let relay_inbox = inbox.clone();
    relay.on_event(move |event| {
        // Only fails once the coordinator has stopped
        let _ = relay_inbox.send(CoordinatorInput::Relay(event));
    });
    relay.connect();

    let agents = AgentBridge::new(inbox.clone());
    let router = ControlRouter::new(inbox.clone(), session);
    let server = ControlServer::bind(&config.control_addr, router, agents.clone()).await?;
    let server_task = tokio::spawn(server.run());

    let shutdown = inbox;
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down");
                let _ = shutdown.send(CoordinatorInput::Shutdown);
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    info!(
        relay = %config.relay_url,
        control = %config.control_addr,
        "syncroom daemon started"
    );

    let coordinator = Coordinator::new(store, relay.clone(), agents.media(), agents.surfaces());
    coordinator.run(inbox_rx, config.keepalive_interval()).await;

    server_task.abort();
    relay.shutdown().await;
    Ok(())
}

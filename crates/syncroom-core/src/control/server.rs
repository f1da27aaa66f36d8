//! Loopback WebSocket listener for UI clients and the page agent

use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, warn};

use super::protocol::{ControlRequest, ControlResponse};
use super::router::ControlRouter;
use crate::agent::{AgentBridge, AgentCommand, AgentFrame, AgentSession};

/// Any frame a client may send
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClientFrame {
    Control(ControlRequest),
    Agent(AgentFrame),
}

type Writer = SplitSink<WebSocketStream<TcpStream>, Message>;

enum Step {
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Command(AgentCommand),
    Reply(ControlResponse),
}

pub struct ControlServer {
    listener: TcpListener,
    router: ControlRouter,
    agents: AgentBridge,
}

impl ControlServer {
    pub async fn bind(addr: &str, router: ControlRouter, agents: AgentBridge) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind control channel on {}", addr))?;
        Ok(Self {
            listener,
            router,
            agents,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(addr = %addr, "Control channel listening");
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept control connection");
                    continue;
                }
            };

            let router = self.router.clone();
            let agents = self.agents.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, router, agents).await {
                    debug!(peer = %peer, error = %e, "Control connection ended with error");
                }
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    router: ControlRouter,
    agents: AgentBridge,
) -> Result<()> {
    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();
    let mut agent: Option<AgentSession> = None;

    send(&mut write, &router.status()).await?;

    // Control requests are routed in order on a worker task. Agent frames
    // never wait behind a coordinator reply.
    let (requests, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, mut replies) = mpsc::unbounded_channel();
    let worker = tokio::spawn(answer_requests(router, request_rx, reply_tx));

    let result = loop {
        let step = tokio::select! {
            msg = read.next() => Step::Frame(msg),
            Some(command) = next_command(&mut agent) => Step::Command(command),
            Some(response) = replies.recv() => Step::Reply(response),
        };

        match step {
            Step::Command(command) => {
                if let Err(e) = send(&mut write, &command).await {
                    break Err(e);
                }
            }
            Step::Reply(response) => {
                if let Err(e) = send(&mut write, &response).await {
                    break Err(e);
                }
            }
            Step::Frame(Some(Ok(Message::Text(text)))) => {
                if let Err(e) = handle_text(&text, &mut write, &requests, &agents, &mut agent).await {
                    break Err(e);
                }
            }
            Step::Frame(Some(Ok(Message::Close(_)))) | Step::Frame(None) => break Ok(()),
            Step::Frame(Some(Err(e))) => break Err(e.into()),
            Step::Frame(Some(Ok(_))) => {}
        }
    };

    worker.abort();
    if let Some(session) = agent {
        agents.detach(session.id);
    }
    result
}

async fn answer_requests(
    router: ControlRouter,
    mut requests: mpsc::UnboundedReceiver<ControlRequest>,
    replies: mpsc::UnboundedSender<ControlResponse>,
) {
    while let Some(request) = requests.recv().await {
        let response = router.route(request).await;
        if replies.send(response).is_err() {
            break;
        }
    }
}

async fn handle_text(
    text: &str,
    write: &mut Writer,
    requests: &mpsc::UnboundedSender<ControlRequest>,
    agents: &AgentBridge,
    agent: &mut Option<AgentSession>,
) -> Result<()> {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Control(request)) => {
            requests
                .send(request)
                .context("Control request worker stopped")?;
            Ok(())
        }
        Ok(ClientFrame::Agent(AgentFrame::AgentHello)) if agent.is_none() => {
            *agent = Some(agents.attach());
            Ok(())
        }
        Ok(ClientFrame::Agent(frame)) => {
            match agent {
                Some(session) if agents.is_current(session.id) => agents.handle_frame(frame),
                Some(_) => debug!("Frame from a replaced page agent ignored"),
                None => debug!("Agent frame before agent_hello ignored"),
            }
            Ok(())
        }
        Err(e) => {
            debug!(error = %e, "Ignoring unrecognized control frame");
            send(write, &ControlResponse::error("Unrecognized frame")).await
        }
    }
}

async fn next_command(agent: &mut Option<AgentSession>) -> Option<AgentCommand> {
    match agent {
        Some(session) => session.commands.recv().await,
        None => std::future::pending().await,
    }
}

async fn send<T: Serialize>(write: &mut Writer, frame: &T) -> Result<()> {
    let text = serde_json::to_string(frame)?;
    write.send(Message::Text(text)).await?;
    Ok(())
}

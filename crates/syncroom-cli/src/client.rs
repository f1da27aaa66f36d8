//! Control channel client
//!
//! Short-lived connection to a running daemon: connect, send one request,
//! read its reply.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use syncroom_core::{Config, ControlRequest, ControlResponse};

/// Upper bound on waiting for the daemon's reply
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ControlClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ControlClient {
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = config.control_url();
        let (ws, _) = connect_async(url.as_str()).await.with_context(|| {
            format!(
                "Could not reach the syncroom daemon at {}\n  \
                 Start it with: syncroom daemon",
                url
            )
        })?;

        // Every connection is greeted with the current status
        let mut client = Self { ws };
        client.next_response().await?;
        Ok(client)
    }

    /// Send a request and wait for its reply
    ///
    /// An `error` reply is turned into an `Err`.
    pub async fn request(&mut self, request: ControlRequest) -> Result<ControlResponse> {
        let text = serde_json::to_string(&request)?;
        self.ws
            .send(Message::Text(text))
            .await
            .context("Failed to send request to daemon")?;

        match self.next_response().await? {
            ControlResponse::Error { message } => bail!("{}", message),
            response => Ok(response),
        }
    }

    async fn next_response(&mut self) -> Result<ControlResponse> {
        loop {
            let frame = timeout(REPLY_TIMEOUT, self.ws.next())
                .await
                .context("Timed out waiting for the daemon")?;

            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .with_context(|| format!("Unexpected reply from daemon: {}", text));
                }
                Some(Ok(Message::Close(_))) | None => bail!("Daemon closed the connection"),
                Some(Ok(other)) => debug!(?other, "Skipping non-text frame"),
                Some(Err(e)) => return Err(e).context("Control connection failed"),
            }
        }
    }

    pub async fn close(mut self) {
        self.ws.close(None).await.ok();
    }
}

//! Room command handlers

use anyhow::{bail, Result};

use syncroom_core::{Config, ControlRequest, ControlResponse, Role};

use crate::client::ControlClient;
use crate::output::Output;

async fn send(config: &Config, request: ControlRequest) -> Result<ControlResponse> {
    let mut client = ControlClient::connect(config).await?;
    let response = client.request(request).await;
    client.close().await;
    response
}

/// Host a room, generating an id when none is given
pub async fn create(config: &Config, room_id: Option<String>, output: &Output) -> Result<()> {
    match send(config, ControlRequest::CreateRoom { room_id }).await? {
        ControlResponse::RoomCreated { room_id } => {
            output.print_room(Role::Host, &room_id);
            Ok(())
        }
        other => bail!("Unexpected reply from daemon: {:?}", other),
    }
}

/// Watch a room
pub async fn join(config: &Config, room_id: String, output: &Output) -> Result<()> {
    match send(config, ControlRequest::JoinRoom { room_id }).await? {
        ControlResponse::JoinedRoom { room_id } => {
            output.print_room(Role::Viewer, &room_id);
            Ok(())
        }
        other => bail!("Unexpected reply from daemon: {:?}", other),
    }
}

pub async fn leave(config: &Config, output: &Output) -> Result<()> {
    match send(config, ControlRequest::LeaveRoom).await? {
        ControlResponse::LeftRoom => {
            output.success("Left room");
            Ok(())
        }
        other => bail!("Unexpected reply from daemon: {:?}", other),
    }
}

/// Send the host's current URL to every viewer
pub async fn broadcast(config: &Config, url: String, output: &Output) -> Result<()> {
    let mut client = ControlClient::connect(config).await?;

    let check = client.request(ControlRequest::CheckBroadcast).await?;
    if !matches!(
        check,
        ControlResponse::BroadcastCheck {
            should_broadcast: true,
            ..
        }
    ) {
        client.close().await;
        bail!(
            "Not hosting a room. Create one first:\n  \
             syncroom create"
        );
    }

    let response = client.request(ControlRequest::BroadcastUrl { url }).await;
    client.close().await;

    match response? {
        ControlResponse::UrlBroadcast { url } => {
            output.success(&format!("Broadcast {}", url));
            Ok(())
        }
        other => bail!("Unexpected reply from daemon: {:?}", other),
    }
}

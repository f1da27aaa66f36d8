//! Status command handler

use anyhow::{bail, Result};

use syncroom_core::{Config, ControlRequest, ControlResponse};

use crate::client::ControlClient;
use crate::output::Output;

/// Show the daemon's session state
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let mut client = ControlClient::connect(config).await?;
    let response = client.request(ControlRequest::GetStatus).await?;
    client.close().await;

    match response {
        ControlResponse::StatusUpdate { state } => {
            output.print_status(&state);
            Ok(())
        }
        other => bail!("Unexpected reply from daemon: {:?}", other),
    }
}

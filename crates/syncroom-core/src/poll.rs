//! Bounded polling

use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Condition not met within {0:?}")]
pub struct PollTimeout(pub Duration);

/// Check `predicate` now and then every `interval` until it holds
///
/// Gives up with [`PollTimeout`] once `timeout` has elapsed. Dropping the
/// returned future stops polling.
pub async fn poll_until<F>(
    interval: Duration,
    timeout: Duration,
    mut predicate: F,
) -> Result<(), PollTimeout>
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;

    loop {
        if predicate() {
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollTimeout(timeout));
        }
        sleep(interval.min(deadline - now)).await;
    }
}

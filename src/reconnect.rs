//! Reconnect loop with exponential backoff.
//!
//! The client itself never reconnects. Callers that want a long-lived
//! connection drive it with `run_with_reconnect`, which re-dials after every
//! close or failed attempt and doubles the delay up to a cap.

use std::time::Duration;

use tracing::{info, warn};

use crate::socket::{SocketError, WebSocketClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self { min, max, current: min }
    }

    /// Delay to wait now; the following call returns double, capped at `max`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Keep `client` connected until `max_attempts` dials have been made (at
/// least one), or forever when `None`. Returns the first non-retryable error.
pub async fn run_with_reconnect(
    client: &WebSocketClient,
    mut backoff: Backoff,
    max_attempts: Option<usize>,
) -> Result<(), SocketError> {
    let mut attempts = 0_usize;

    loop {
        attempts += 1;

        match client.connect().await {
            Ok(()) => {
                backoff.reset();
                let state = client.closed().await;
                info!(%state, "reconnect: connection ended");
            }
            Err(e) if e.retryable() => {
                warn!(attempt = attempts, error = %e, "reconnect: connect failed");
            }
            Err(e) => return Err(e),
        }

        if max_attempts.is_some_and(|max| attempts >= max) {
            info!(attempts, "reconnect: attempt limit reached");
            return Ok(());
        }

        let delay = backoff.next_delay();
        info!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "reconnect: waiting");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod tests;

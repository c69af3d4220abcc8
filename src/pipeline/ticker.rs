//! Cancellable pause between pipeline rounds.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleeps for a fixed period unless cancelled first.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    cancel: CancellationToken,
}

impl Ticker {
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        Self { period, cancel }
    }

    /// Wait one period. Returns `false` if cancellation arrived instead.
    pub async fn wait(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.period) => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

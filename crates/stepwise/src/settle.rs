//! Best-effort quiescence after browser actions.
//!
//! Some pages never reach network idle (long polling, analytics beacons), so
//! the watcher only ever reports; exhausting the budget is logged and
//! returned as [`SettleOutcome::BudgetExhausted`]. Settling says nothing
//! about correctness. Callers re-verify through the state verifier.

use crate::driver::{BrowserDriver, TabId};
use std::time::Duration;
use tokio::time::Instant;

/// Network idle threshold (500ms without new resources)
pub const NETWORK_IDLE_QUIET_MS: u64 = 500;

/// Default activity probe interval
pub const SETTLE_POLL_INTERVAL_MS: u64 = 50;

/// Result of waiting for quiescence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Idle for the full quiet window
    Settled {
        /// Time until quiescence was confirmed
        elapsed: Duration,
    },
    /// Still busy when the budget ran out
    BudgetExhausted {
        /// Time spent
        elapsed: Duration,
    },
}

impl SettleOutcome {
    /// Whether quiescence was observed
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }

    /// Time spent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Settled { elapsed } | Self::BudgetExhausted { elapsed } => *elapsed,
        }
    }
}

/// Watches tab activity until it goes quiet
#[derive(Debug, Clone, Copy)]
pub struct SettleWatcher {
    poll_interval: Duration,
    quiet_window: Duration,
}

impl Default for SettleWatcher {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(SETTLE_POLL_INTERVAL_MS),
            quiet_window: Duration::from_millis(NETWORK_IDLE_QUIET_MS),
        }
    }
}

impl SettleWatcher {
    /// Watcher with the default quiet window
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the quiet window
    #[must_use]
    pub const fn with_quiet_window(mut self, window: Duration) -> Self {
        self.quiet_window = window;
        self
    }

    /// Override the probe interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Block up to `budget` for the tab to stop navigating and loading
    pub async fn await_settled(
        &self,
        driver: &dyn BrowserDriver,
        tab: &TabId,
        budget: Duration,
    ) -> SettleOutcome {
        let start = Instant::now();
        let mut quiet_since: Option<(Instant, u64)> = None;

        loop {
            let now = Instant::now();
            match driver.activity(tab).await {
                Ok(snapshot) if snapshot.is_idle() => match quiet_since {
                    Some((since, count)) if count == snapshot.resource_count => {
                        if now.duration_since(since) >= self.quiet_window {
                            let elapsed = start.elapsed();
                            let elapsed_ms = elapsed.as_millis() as u64;
                            tracing::trace!(tab = %tab, elapsed_ms, "settled");
                            return SettleOutcome::Settled { elapsed };
                        }
                    }
                    _ => quiet_since = Some((now, snapshot.resource_count)),
                },
                Ok(_) => quiet_since = None,
                Err(err) => {
                    tracing::debug!(tab = %tab, error = %err, "activity probe failed");
                    quiet_since = None;
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= budget {
                tracing::warn!(
                    tab = %tab,
                    budget_ms = budget.as_millis() as u64,
                    "page did not settle within budget; continuing"
                );
                return SettleOutcome::BudgetExhausted { elapsed };
            }
            tokio::time::sleep(self.poll_interval.min(budget - elapsed)).await;
        }
    }
}

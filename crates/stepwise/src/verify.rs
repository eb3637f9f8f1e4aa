//! State verification with primary and fallback signals.
//!
//! [`StateVerifier::verify`] always yields a [`Verification`]; a failed
//! verification is an ordinary value the caller inspects, never an error.
//! The diagnostic records which signal decided the outcome so a fallback
//! pass is never mistaken for a primary pass.

use crate::driver::{BrowserDriver, TabId};
use crate::state::JourneyState;
use crate::wait::{WaitCondition, WaitOutcome, Waiter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Context attached to every verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// State being verified
    pub state: JourneyState,
    /// URL when the verification finished
    pub url: String,
    /// Primary predicate
    pub primary: String,
    /// Fallback predicate, if one was supplied
    pub fallback: Option<String>,
    /// How the condition resolved
    pub outcome: WaitOutcome,
    /// Total time spent
    pub elapsed_ms: u64,
}

/// Boolean verdict plus diagnostic context
#[must_use = "a verification must be inspected or recorded"]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Whether the state was reached
    pub passed: bool,
    /// Diagnostic bundle
    pub diagnostic: Diagnostic,
}

impl Verification {
    /// Build from a resolved outcome
    pub fn new(diagnostic: Diagnostic) -> Self {
        Self {
            passed: diagnostic.outcome.is_success(),
            diagnostic,
        }
    }

    /// Whether the state was reached
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// How the condition resolved
    #[must_use]
    pub const fn outcome(&self) -> WaitOutcome {
        self.diagnostic.outcome
    }

    /// Passed only through the fallback
    #[must_use]
    pub const fn fell_back(&self) -> bool {
        matches!(self.diagnostic.outcome, WaitOutcome::FellBack)
    }

    /// Diagnostic bundle
    #[must_use]
    pub const fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.diagnostic;
        write!(
            f,
            "{} {} after {}ms at {} (primary: {}",
            d.state, d.outcome, d.elapsed_ms, d.url, d.primary
        )?;
        match &d.fallback {
            Some(fallback) => write!(f, "; fallback: {fallback})"),
            None => f.write_str(")"),
        }
    }
}

/// Evaluates wait conditions into verifications
#[derive(Debug, Clone, Copy, Default)]
pub struct StateVerifier {
    waiter: Waiter,
}

impl StateVerifier {
    /// Verifier polling every `poll_interval`
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            waiter: Waiter::new(poll_interval),
        }
    }

    /// Poll the primary check, then the fallback if the primary fails
    pub async fn verify(
        &self,
        driver: &dyn BrowserDriver,
        tab: &TabId,
        state: JourneyState,
        condition: &WaitCondition,
    ) -> Verification {
        let start = Instant::now();
        let primary = self.waiter.poll(driver, tab, condition.primary()).await;

        let outcome = if primary.success {
            WaitOutcome::Matched
        } else if let Some(fallback) = condition.fallback() {
            tracing::debug!(
                state = %state,
                primary = %primary.waited_for,
                "primary signal absent; trying fallback"
            );
            if self.waiter.poll(driver, tab, fallback).await.success {
                WaitOutcome::FellBack
            } else {
                WaitOutcome::TimedOut
            }
        } else {
            WaitOutcome::TimedOut
        };

        let url = match driver.current_url(tab).await {
            Ok(url) => url,
            Err(err) => format!("<unavailable: {err}>"),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            WaitOutcome::Matched => {
                tracing::debug!(state = %state, url = %url, elapsed_ms, "state verified");
            }
            WaitOutcome::FellBack => {
                tracing::info!(
                    state = %state,
                    url = %url,
                    elapsed_ms,
                    "state verified by fallback"
                );
            }
            WaitOutcome::TimedOut => {
                tracing::warn!(state = %state, url = %url, elapsed_ms, "state not reached");
            }
        }

        Verification::new(Diagnostic {
            state,
            url,
            primary: condition.primary().description(),
            fallback: condition.fallback().map(|c| c.description()),
            outcome,
            elapsed_ms,
        })
    }
}

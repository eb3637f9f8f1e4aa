//! Result and error types for Stepwise.
//!
//! Two layers: [`DriverError`] for failures of the browser capability itself,
//! and [`JourneyError`] for the outcomes a journey is allowed to raise.
//! Convergence timeouts are not errors at either layer; they surface as a
//! [`Verification`] and only become a [`JourneyError::Unconverged`] when a
//! transition cannot produce its next page without them.

use crate::state::JourneyState;
use crate::verify::Verification;
use thiserror::Error;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for journey operations
pub type JourneyResult<T> = Result<T, JourneyError>;

/// Errors raised by a [`BrowserDriver`](crate::driver::BrowserDriver)
#[derive(Debug, Error)]
pub enum DriverError {
    /// Browser executable not found
    #[error("Browser not found. Install Chromium or pass --chromium-path")]
    BrowserNotFound,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Element could not be resolved for an action
    #[error("Element not found: {locator}")]
    ElementNotFound {
        /// Locator description
        locator: String,
    },

    /// A DOM action was rejected by the browser
    #[error("{action} on {locator} failed: {message}")]
    ActionFailed {
        /// Action name (click, fill, press)
        action: &'static str,
        /// Locator description
        locator: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    EvaluationError {
        /// Error message
        message: String,
    },

    /// Tab does not exist (closed or never opened)
    #[error("Tab not found: {tab}")]
    TabNotFound {
        /// Tab identifier
        tab: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// The browser context has already been closed
    #[error("Browser session is closed")]
    Closed,
}

/// Errors a journey transition may raise
#[derive(Debug, Error)]
pub enum JourneyError {
    /// Required content never existed (zero matches), as opposed to slowness
    #[error("Structural absence: {what} (url: {url})")]
    StructuralAbsence {
        /// What was missing
        what: String,
        /// URL at the time of the check
        url: String,
    },

    /// A wait the transition depends on did not converge
    #[error("{0}")]
    Unconverged(Box<Verification>),

    /// The stale auth-intent parameter survived the single corrective retry
    #[error("Login recovery exhausted: auth-intent parameter still present at {url}")]
    RecoveryExhausted {
        /// URL after the retry
        url: String,
    },

    /// Journey state graph violated
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// State before
        from: JourneyState,
        /// Requested state
        to: JourneyState,
    },

    /// Caller supplied input that can never succeed
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message
        message: String,
    },

    /// Configuration error (missing credentials etc.)
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Driver failure
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JourneyError {
    /// Create a structural absence error
    #[must_use]
    pub fn absent(what: impl Into<String>, url: impl Into<String>) -> Self {
        Self::StructuralAbsence {
            what: what.into(),
            url: url.into(),
        }
    }

    /// Wrap a failed verification
    #[must_use]
    pub fn unconverged(verification: Verification) -> Self {
        Self::Unconverged(Box::new(verification))
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// True for content-absence failures
    #[must_use]
    pub const fn is_structural_absence(&self) -> bool {
        matches!(self, Self::StructuralAbsence { .. })
    }

    /// True for convergence failures (slow, not missing)
    #[must_use]
    pub const fn is_unconverged(&self) -> bool {
        matches!(self, Self::Unconverged(_))
    }

    /// Diagnostic bundle, when the error carries one
    #[must_use]
    pub fn verification(&self) -> Option<&Verification> {
        match self {
            Self::Unconverged(v) => Some(v),
            _ => None,
        }
    }
}

//! BrowserDriver - the capability set the journey engine consumes.
//!
//! The engine never talks to a browser directly. Everything it needs (tab
//! enumeration, navigation, element actions, snapshot queries, activity
//! probes, cookie reset) goes through [`BrowserDriver`], so the same page
//! objects run against [`MockDriver`] in tests and against
//! `ChromiumDriver` (feature `browser`) for real runs.
//!
//! Drivers do not wait for page state. `wait_for_url` and
//! `wait_for_selector` style behavior is built on top as polled predicates
//! in [`crate::wait`]; the only waiting a driver does is the actionability
//! wait inside `click`, `fill` and `press`.

mod mock;
mod simulation;

#[cfg(feature = "browser")]
mod chromium;

pub use mock::{MockDriver, MockElement, MockWorld};
pub use simulation::{StaleAuth, StepikSimulation};

#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;

use crate::locator::Locator;
use crate::result::DriverResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque identifier of one browsing context (tab)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(String);

impl TabId {
    /// Wrap a driver-specific identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResponse {
    /// URL the tab landed on (after redirects)
    pub url: String,
    /// HTTP status of the main document, when the driver can observe it
    pub status: Option<u16>,
}

impl NavigationResponse {
    /// Response for `url` with an optional status
    #[must_use]
    pub fn new(url: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            url: url.into(),
            status,
        }
    }

    /// True for 2xx/3xx or unknown status
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.map_or(true, |s| s < 400)
    }
}

/// Point-in-time view of a tab's loading activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    /// `document.readyState == "complete"`
    pub document_ready: bool,
    /// A navigation is in flight
    pub navigating: bool,
    /// Resources observed so far; growth means network activity
    pub resource_count: u64,
}

impl ActivitySnapshot {
    /// Nothing is navigating and the document finished loading
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.document_ready && !self.navigating
    }
}

/// Screenshot data with metadata
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Timestamp when screenshot was taken
    pub timestamp: std::time::SystemTime,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: std::time::SystemTime::now(),
        }
    }

    /// Get the size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if screenshot is valid (has data)
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Browser launch configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// User agent string
    pub user_agent: Option<String>,
    /// Executable path override
    pub executable_path: Option<String>,
    /// Launch timeout
    pub launch_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: None,
            executable_path: None,
            launch_timeout: Duration::from_secs(30),
        }
    }
}

impl DriverConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set browser executable
    #[must_use]
    pub fn executable_path(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Set launch timeout
    #[must_use]
    pub const fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }
}

/// Browser capability consumed by the journey engine.
///
/// Implementations must be safe to call from a single task repeatedly;
/// snapshot queries (`current_url`, `count`, `is_visible`, `text`,
/// `activity`) must be side-effect free because predicates poll them.
///
/// # Implementations
///
/// - `ChromiumDriver` - CDP via chromiumoxide (feature `browser`)
/// - [`MockDriver`] - scripted in-memory browser for tests
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open tabs, oldest first
    async fn tabs(&self) -> DriverResult<Vec<TabId>>;

    /// Navigate `tab` to `url`, waiting at most `timeout` for the document
    async fn navigate(
        &self,
        tab: &TabId,
        url: &str,
        timeout: Duration,
    ) -> DriverResult<NavigationResponse>;

    /// Current URL of `tab`
    async fn current_url(&self, tab: &TabId) -> DriverResult<String>;

    /// Click the first element matching `locator` once it is actionable
    async fn click(&self, tab: &TabId, locator: &Locator, timeout: Duration) -> DriverResult<()>;

    /// Replace the value of the first matching input
    async fn fill(
        &self,
        tab: &TabId,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> DriverResult<()>;

    /// Press a key (e.g. "Enter") with the first match focused
    async fn press(
        &self,
        tab: &TabId,
        locator: &Locator,
        key: &str,
        timeout: Duration,
    ) -> DriverResult<()>;

    /// Number of elements currently matching `locator`
    async fn count(&self, tab: &TabId, locator: &Locator) -> DriverResult<usize>;

    /// Whether the first match is rendered and visible right now
    async fn is_visible(&self, tab: &TabId, locator: &Locator) -> DriverResult<bool>;

    /// Trimmed text content of the first match
    async fn text(&self, tab: &TabId, locator: &Locator) -> DriverResult<Option<String>>;

    /// Loading activity of `tab`
    async fn activity(&self, tab: &TabId) -> DriverResult<ActivitySnapshot>;

    /// Drop every cookie in the browser context
    async fn clear_cookies(&self) -> DriverResult<()>;

    /// Full-page screenshot of `tab`
    async fn screenshot(&self, tab: &TabId) -> DriverResult<Screenshot>;

    /// Close the browser context; later calls fail with `DriverError::Closed`
    async fn close(&self) -> DriverResult<()>;
}

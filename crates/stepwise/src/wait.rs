//! Bounded, polled wait conditions.
//!
//! A [`Predicate`] is a side-effect free question about one tab (URL shape,
//! element state, tab set). A [`Check`] pairs it with a budget, and a
//! [`WaitCondition`] is a primary check plus an optional coarser fallback.
//! The [`Waiter`] evaluates a check by polling until it holds or the budget
//! runs out; it never returns an error. Driver failures while polling count
//! as "not yet".

use crate::driver::{BrowserDriver, TabId};
use crate::locator::Locator;
use crate::result::DriverResult;
use crate::url_pattern::{query_param, UrlPattern};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

// =============================================================================
// WAIT OUTCOME
// =============================================================================

/// How a wait condition resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitOutcome {
    /// The primary signal appeared in budget
    Matched,
    /// The primary signal did not appear; the fallback held
    FellBack,
    /// Nothing held in budget
    TimedOut,
}

impl WaitOutcome {
    /// Matched or fell back
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::TimedOut)
    }

    /// Stable identifier for logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::FellBack => "fell-back",
            Self::TimedOut => "timed-out",
        }
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PREDICATES
// =============================================================================

/// A re-evaluable question about one tab
#[async_trait]
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Evaluate once against the current snapshot
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool>;

    /// Human-readable description for diagnostics
    fn description(&self) -> String;
}

/// Current URL matches a pattern
#[derive(Debug, Clone)]
pub struct UrlMatches(pub UrlPattern);

impl UrlMatches {
    /// Glob shorthand
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self(UrlPattern::glob(pattern))
    }
}

#[async_trait]
impl Predicate for UrlMatches {
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool> {
        Ok(self.0.matches(&driver.current_url(tab).await?))
    }

    fn description(&self) -> String {
        self.0.to_string()
    }
}

/// Current URL contains a fragment
#[derive(Debug, Clone)]
pub struct UrlContains(pub String);

impl UrlContains {
    /// Create the predicate
    #[must_use]
    pub fn new(fragment: impl Into<String>) -> Self {
        Self(fragment.into())
    }
}

#[async_trait]
impl Predicate for UrlContains {
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool> {
        Ok(driver.current_url(tab).await?.contains(&self.0))
    }

    fn description(&self) -> String {
        format!("url contains {}", self.0)
    }
}

/// Current URL does not contain a fragment
#[derive(Debug, Clone)]
pub struct UrlExcludes(pub String);

impl UrlExcludes {
    /// Create the predicate
    #[must_use]
    pub fn new(fragment: impl Into<String>) -> Self {
        Self(fragment.into())
    }
}

#[async_trait]
impl Predicate for UrlExcludes {
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool> {
        Ok(!driver.current_url(tab).await?.contains(&self.0))
    }

    fn description(&self) -> String {
        format!("url lacks {}", self.0)
    }
}

/// A decoded query parameter equals an expected value exactly
#[derive(Debug, Clone)]
pub struct QueryParamEquals {
    key: String,
    value: String,
}

impl QueryParamEquals {
    /// Create the predicate
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Predicate for QueryParamEquals {
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool> {
        let url = driver.current_url(tab).await?;
        Ok(query_param(&url, &self.key).as_deref() == Some(self.value.as_str()))
    }

    fn description(&self) -> String {
        format!("query {}={:?}", self.key, self.value)
    }
}

/// Required element state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementState {
    /// At least one match in the DOM
    Attached,
    /// First match rendered and visible
    Visible,
}

/// An element reaches a state
#[derive(Debug, Clone)]
pub struct ElementIs {
    locator: Locator,
    state: ElementState,
}

impl ElementIs {
    /// Element attached
    #[must_use]
    pub fn attached(locator: Locator) -> Self {
        Self {
            locator,
            state: ElementState::Attached,
        }
    }

    /// Element visible
    #[must_use]
    pub fn visible(locator: Locator) -> Self {
        Self {
            locator,
            state: ElementState::Visible,
        }
    }
}

#[async_trait]
impl Predicate for ElementIs {
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool> {
        match self.state {
            ElementState::Attached => Ok(driver.count(tab, &self.locator).await? > 0),
            ElementState::Visible => driver.is_visible(tab, &self.locator).await,
        }
    }

    fn description(&self) -> String {
        let state = match self.state {
            ElementState::Attached => "attached",
            ElementState::Visible => "visible",
        };
        format!("{} {state}", self.locator)
    }
}

/// A tab not in `known` has opened
#[derive(Debug, Clone)]
pub struct NewTabOpened {
    known: Vec<TabId>,
}

impl NewTabOpened {
    /// Snapshot of tabs open before the action
    #[must_use]
    pub fn since(known: Vec<TabId>) -> Self {
        Self { known }
    }
}

#[async_trait]
impl Predicate for NewTabOpened {
    async fn check(&self, driver: &dyn BrowserDriver, _tab: &TabId) -> DriverResult<bool> {
        Ok(driver
            .tabs()
            .await?
            .iter()
            .any(|t| !self.known.contains(t)))
    }

    fn description(&self) -> String {
        format!("a tab beyond the {} already open", self.known.len())
    }
}

/// Every inner predicate holds
#[derive(Debug)]
pub struct AllOf(Vec<Box<dyn Predicate>>);

impl AllOf {
    /// Combine predicates
    #[must_use]
    pub fn new(predicates: Vec<Box<dyn Predicate>>) -> Self {
        Self(predicates)
    }
}

#[async_trait]
impl Predicate for AllOf {
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool> {
        for predicate in &self.0 {
            if !predicate.check(driver, tab).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn description(&self) -> String {
        join_descriptions(&self.0, " and ")
    }
}

/// At least one inner predicate holds
#[derive(Debug)]
pub struct AnyOf(Vec<Box<dyn Predicate>>);

impl AnyOf {
    /// Combine predicates
    #[must_use]
    pub fn new(predicates: Vec<Box<dyn Predicate>>) -> Self {
        Self(predicates)
    }
}

#[async_trait]
impl Predicate for AnyOf {
    async fn check(&self, driver: &dyn BrowserDriver, tab: &TabId) -> DriverResult<bool> {
        for predicate in &self.0 {
            if predicate.check(driver, tab).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn description(&self) -> String {
        join_descriptions(&self.0, " or ")
    }
}

fn join_descriptions(predicates: &[Box<dyn Predicate>], separator: &str) -> String {
    predicates
        .iter()
        .map(|p| p.description())
        .collect::<Vec<_>>()
        .join(separator)
}

// =============================================================================
// WAIT CONDITION
// =============================================================================

/// A predicate with its budget
#[derive(Debug)]
pub struct Check {
    predicate: Box<dyn Predicate>,
    timeout: Duration,
}

impl Check {
    /// Create a check
    #[must_use]
    pub fn new(predicate: impl Predicate + 'static, timeout: Duration) -> Self {
        Self {
            predicate: Box::new(predicate),
            timeout,
        }
    }

    /// Budget
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Description of the predicate
    #[must_use]
    pub fn description(&self) -> String {
        self.predicate.description()
    }
}

/// Primary check plus optional fallback
#[derive(Debug)]
pub struct WaitCondition {
    primary: Check,
    fallback: Option<Check>,
}

impl WaitCondition {
    /// Condition with only a primary check
    #[must_use]
    pub fn new(primary: Check) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Add the coarser fallback check
    #[must_use]
    pub fn with_fallback(mut self, fallback: Check) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Primary check
    #[must_use]
    pub const fn primary(&self) -> &Check {
        &self.primary
    }

    /// Fallback check
    #[must_use]
    pub const fn fallback(&self) -> Option<&Check> {
        self.fallback.as_ref()
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of polling one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Whether the predicate held in budget
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// Create a successful wait result
    #[must_use]
    pub fn success(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            waited_for: waited_for.into(),
        }
    }

    /// Create a timeout wait result
    #[must_use]
    pub fn timeout(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            waited_for: waited_for.into(),
        }
    }
}

// =============================================================================
// WAITER
// =============================================================================

/// Polls checks at a fixed interval
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    poll_interval: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

impl Waiter {
    /// Waiter polling every `poll_interval`
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Poll `check` until it holds or its budget is spent
    pub async fn poll(&self, driver: &dyn BrowserDriver, tab: &TabId, check: &Check) -> WaitResult {
        self.wait_for(driver, tab, check.predicate.as_ref(), check.timeout)
            .await
    }

    /// Poll `predicate` for at most `timeout`; evaluates at least once
    pub async fn wait_for(
        &self,
        driver: &dyn BrowserDriver,
        tab: &TabId,
        predicate: &dyn Predicate,
        timeout: Duration,
    ) -> WaitResult {
        let start = Instant::now();
        loop {
            match predicate.check(driver, tab).await {
                Ok(true) => return WaitResult::success(start.elapsed(), predicate.description()),
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!(
                        predicate = %predicate.description(),
                        error = %err,
                        "predicate probe failed; treating as unmet"
                    );
                }
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return WaitResult::timeout(elapsed, predicate.description());
            }
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

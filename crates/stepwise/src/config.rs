//! Journey configuration and credentials.

use crate::result::{JourneyError, JourneyResult};
use crate::url_pattern::with_query_param;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the account login
pub const LOGIN_ENV: &str = "STEPIK_LOGIN";
/// Environment variable holding the account password
pub const PASSWORD_ENV: &str = "STEPIK_PASSWORD";

/// Default site root
pub const DEFAULT_BASE_URL: &str = "https://stepik.org";

/// Budgets of the individual waits inside each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimeouts {
    /// Login form must become visible
    pub login_form: Duration,
    /// Automatic redirect after submit (soft)
    pub login_redirect: Duration,
    /// Post-login marker must attach
    pub marker_attached: Duration,
    /// Post-login marker must become visible once attached
    pub marker_visible: Duration,
    /// Search route must appear
    pub search_route: Duration,
    /// Search term must land in the query string
    pub search_query: Duration,
    /// Filter flag must land in the query string
    pub filter_flag: Duration,
    /// A result card must attach and become visible
    pub result_cards: Duration,
    /// A course page must open
    pub course_open: Duration,
    /// Budget of coarse fallback checks
    pub fallback: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            login_form: Duration::from_secs(15),
            login_redirect: Duration::from_secs(15),
            marker_attached: Duration::from_secs(10),
            marker_visible: Duration::from_secs(5),
            search_route: Duration::from_secs(30),
            search_query: Duration::from_secs(15),
            filter_flag: Duration::from_secs(15),
            result_cards: Duration::from_secs(15),
            course_open: Duration::from_secs(10),
            fallback: Duration::from_secs(5),
        }
    }
}

/// Configuration shared by every page object of a journey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyConfig {
    /// Site root without trailing slash
    pub base_url: String,
    /// Actionability budget for click/fill/press
    pub default_timeout: Duration,
    /// Budget for a navigation to commit
    pub navigation_timeout: Duration,
    /// Budget of the settle watcher after each action
    pub settle_budget: Duration,
    /// Predicate polling interval
    pub poll_interval: Duration,
    /// Fixed pause after the filter flag appears
    pub filter_settle_delay: Duration,
    /// Per-wait budgets
    pub timeouts: StepTimeouts,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(30),
            settle_budget: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            filter_settle_delay: Duration::from_secs(1),
            timeouts: StepTimeouts::default(),
        }
    }
}

impl JourneyConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the site root
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the actionability budget
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the navigation budget
    #[must_use]
    pub const fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set the settle budget
    #[must_use]
    pub const fn settle_budget(mut self, budget: Duration) -> Self {
        self.settle_budget = budget;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the post-filter pause
    #[must_use]
    pub const fn filter_settle_delay(mut self, delay: Duration) -> Self {
        self.filter_settle_delay = delay;
        self
    }

    /// Replace the per-wait budgets
    #[must_use]
    pub const fn timeouts(mut self, timeouts: StepTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Login entry URL carrying the auth-intent parameter
    #[must_use]
    pub fn login_url(&self) -> String {
        format!("{}/catalog?auth=login", self.base_url)
    }

    /// Canonical catalog URL
    #[must_use]
    pub fn catalog_url(&self) -> String {
        format!("{}/catalog", self.base_url)
    }

    /// Search results route without a query
    #[must_use]
    pub fn search_url(&self) -> String {
        format!("{}/catalog/search", self.base_url)
    }

    /// Search results URL for `term`
    #[must_use]
    pub fn search_url_for(&self, term: &str) -> Option<String> {
        with_query_param(&self.search_url(), "q", term)
    }
}

/// Account credentials; `Debug` never prints the password
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Read `STEPIK_LOGIN` / `STEPIK_PASSWORD`
    pub fn from_env() -> JourneyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> JourneyResult<Self> {
        let login = lookup(LOGIN_ENV).filter(|v| !v.is_empty());
        let password = lookup(PASSWORD_ENV).filter(|v| !v.is_empty());
        match (login, password) {
            (Some(login), Some(password)) => Ok(Self::new(login, password)),
            (login, password) => {
                let missing: Vec<&str> = [
                    login.is_none().then_some(LOGIN_ENV),
                    password.is_none().then_some(PASSWORD_ENV),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(JourneyError::config(format!(
                    "missing credentials: set {}",
                    missing.join(" and ")
                )))
            }
        }
    }

    /// Account login
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Account password
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// First three characters of the login followed by `***`
    #[must_use]
    pub fn masked_login(&self) -> String {
        let head: String = self.login.chars().take(3).collect();
        format!("{head}***")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.masked_login())
            .field("password", &"***")
            .finish()
    }
}

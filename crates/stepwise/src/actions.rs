//! Action primitives and snapshot queries on a [`Tab`].
//!
//! Every action performs exactly one browser operation and then runs the
//! settle watcher before returning. Settling is best effort; callers
//! re-verify state themselves.

use crate::driver::{BrowserDriver, NavigationResponse, Screenshot};
use crate::locator::Locator;
use crate::result::JourneyResult;
use crate::session::Tab;
use crate::settle::SettleOutcome;
use crate::state::JourneyState;
use crate::verify::Verification;
use crate::wait::{Check, WaitCondition, WaitResult, Waiter};

/// Characters of typed text shown in logs
pub const LOG_PREVIEW_CHARS: usize = 10;

/// Truncated preview of `text` for logging
#[must_use]
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(LOG_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl<D: BrowserDriver> Tab<'_, D> {
    // =========================================================================
    // Actions
    // =========================================================================

    /// Navigate and settle
    pub async fn navigate(&self, url: &str) -> JourneyResult<NavigationResponse> {
        let timeout = self.config().navigation_timeout;
        tracing::debug!(tab = %self.id, url, "navigate");
        let response = self.driver().navigate(&self.id, url, timeout).await?;
        if !response.is_ok() {
            tracing::warn!(
                url = %response.url,
                status = ?response.status,
                "navigation returned an error status"
            );
        }
        self.settle().await;
        Ok(response)
    }

    /// Click and settle
    pub async fn click(&self, locator: &Locator) -> JourneyResult<()> {
        tracing::debug!(tab = %self.id, locator = %locator, "click");
        self.driver()
            .click(&self.id, locator, self.config().default_timeout)
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Fill and settle; the log shows only a short preview of `text`
    pub async fn fill(&self, locator: &Locator, text: &str) -> JourneyResult<()> {
        tracing::debug!(tab = %self.id, locator = %locator, text = %preview(text), "fill");
        self.fill_quietly(locator, text).await
    }

    /// Fill a secret and settle; the value never reaches the log
    pub async fn fill_secret(&self, locator: &Locator, secret: &str) -> JourneyResult<()> {
        tracing::debug!(tab = %self.id, locator = %locator, text = "***", "fill");
        self.fill_quietly(locator, secret).await
    }

    /// Press a key on an element and settle
    pub async fn press(&self, locator: &Locator, key: &str) -> JourneyResult<()> {
        tracing::debug!(tab = %self.id, locator = %locator, key, "press");
        self.driver()
            .press(&self.id, locator, key, self.config().default_timeout)
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Drop every cookie of the browser context
    pub async fn clear_cookies(&self) -> JourneyResult<()> {
        tracing::debug!("clear cookies");
        self.driver().clear_cookies().await?;
        Ok(())
    }

    async fn fill_quietly(&self, locator: &Locator, text: &str) -> JourneyResult<()> {
        self.driver()
            .fill(&self.id, locator, text, self.config().default_timeout)
            .await?;
        self.settle().await;
        Ok(())
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Run the settle watcher with the configured budget
    pub async fn settle(&self) -> SettleOutcome {
        self.session
            .settle_watcher()
            .await_settled(self.driver(), &self.id, self.config().settle_budget)
            .await
    }

    /// Fixed pause; a smoothing device, never a substitute for a wait
    pub async fn pause(&self, duration: std::time::Duration) {
        if !duration.is_zero() {
            tracing::trace!(ms = duration.as_millis() as u64, "fixed pause");
            tokio::time::sleep(duration).await;
        }
    }

    /// Poll a single check
    pub async fn wait(&self, check: &Check) -> WaitResult {
        Waiter::new(self.config().poll_interval)
            .poll(self.driver(), &self.id, check)
            .await
    }

    /// Verify `state` against `condition`
    pub async fn verify(&self, state: JourneyState, condition: &WaitCondition) -> Verification {
        self.session
            .verifier()
            .verify(self.driver(), &self.id, state, condition)
            .await
    }

    // =========================================================================
    // Snapshot queries
    // =========================================================================

    /// Current URL
    pub async fn url(&self) -> JourneyResult<String> {
        Ok(self.driver().current_url(&self.id).await?)
    }

    /// Current URL, or a placeholder when the driver cannot report it
    pub async fn url_or_unknown(&self) -> String {
        self.url()
            .await
            .unwrap_or_else(|err| format!("<unavailable: {err}>"))
    }

    /// Number of matches
    pub async fn count(&self, locator: &Locator) -> JourneyResult<usize> {
        Ok(self.driver().count(&self.id, locator).await?)
    }

    /// Visibility of the first match
    pub async fn is_visible(&self, locator: &Locator) -> JourneyResult<bool> {
        Ok(self.driver().is_visible(&self.id, locator).await?)
    }

    /// Text of the first match
    pub async fn text(&self, locator: &Locator) -> JourneyResult<Option<String>> {
        Ok(self.driver().text(&self.id, locator).await?)
    }

    /// Full-page screenshot
    pub async fn screenshot(&self) -> JourneyResult<Screenshot> {
        Ok(self.driver().screenshot(&self.id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::JourneyConfig;
    use crate::driver::{MockDriver, MockElement};
    use crate::session::Session;
    use crate::wait::UrlContains;
    use std::time::Duration;

    mod preview_tests {
        use super::*;

        #[test]
        fn test_short_text_unchanged() {
            assert_eq!(preview("python"), "python");
            assert_eq!(preview("0123456789"), "0123456789");
        }

        #[test]
        fn test_long_text_truncated() {
            assert_eq!(preview("machine learning"), "machine le...");
        }

        #[test]
        fn test_multibyte_truncation() {
            assert_eq!(preview("Название курса"), "Название к...");
        }
    }

    mod primitive_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_actions_settle_before_returning() {
            let driver = MockDriver::new();
            let observer = driver.clone();
            let session = Session::open(driver, JourneyConfig::default()).await.unwrap();
            observer
                .world()
                .set_navigation_latency(Duration::from_millis(800));

            let tab = session.origin_tab();
            let start = tokio::time::Instant::now();
            tab.navigate("https://stepik.org/catalog").await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(1300));
            let activity = BrowserDriver::activity(&observer, tab.id()).await.unwrap();
            assert!(activity.is_idle());
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_and_snapshot_queries() {
            let driver = MockDriver::new();
            let observer = driver.clone();
            let session = Session::open(driver, JourneyConfig::default()).await.unwrap();
            let tab = session.origin_tab();
            let input = Locator::placeholder("query", "search input");
            observer.world().set_element(
                tab.id(),
                input.selector().clone(),
                MockElement::visible().with_text("hint"),
            );

            tab.fill(&input, "python").await.unwrap();
            assert_eq!(tab.count(&input).await.unwrap(), 1);
            assert!(tab.is_visible(&input).await.unwrap());
            assert_eq!(tab.text(&input).await.unwrap().as_deref(), Some("hint"));
            assert!(observer.was_called("fill:placeholder"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_uses_config_poll_interval() {
            let driver = MockDriver::new();
            let session = Session::open(driver, JourneyConfig::default()).await.unwrap();
            let tab = session.origin_tab();
            let result = tab
                .wait(&Check::new(UrlContains::new("/never"), Duration::from_secs(2)))
                .await;
            assert!(!result.success);
            assert_eq!(tab.url_or_unknown().await, "about:blank");
            session.close().await.unwrap();
        }
    }
}

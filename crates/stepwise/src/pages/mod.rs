//! Typestate page objects.
//!
//! One concrete type per journey state. Transitions consume nothing and
//! return the page object of the next state, so the journey graph is
//! checked by the compiler:
//!
//! ```text
//! LoginPage --login--> CatalogPage --search--> SearchResultsPage
//!     --apply_free_filter--> FilteredResultsPage --open_first_course--> CoursePage
//! ```
//!
//! Constructors never verify. Verification is the explicit, idempotent
//! [`PageObject::is_loaded`] step, so a page object is cheap to build
//! speculatively and tests can assert on loading independently.

pub mod locators;

mod catalog;
mod course;
mod login;
mod search;

pub use catalog::CatalogPage;
pub use course::CoursePage;
pub use login::{LoginOutcome, LoginPage, LoginRecovery};
pub use search::{FilteredResultsPage, SearchResultsPage};

use crate::driver::BrowserDriver;
use crate::result::{JourneyError, JourneyResult};
use crate::session::Tab;
use crate::state::JourneyState;
use crate::verify::Verification;
use crate::wait::WaitCondition;
use tracing::Instrument;

/// A page of the journey bound to one tab.
///
/// Implementors describe what "loaded" means; verification itself is
/// shared.
#[allow(async_fn_in_trait)]
pub trait PageObject {
    /// Driver behind the tab
    type Driver: BrowserDriver;

    /// Tab this page lives in
    fn tab(&self) -> &Tab<'_, Self::Driver>;

    /// Name used in logs and spans
    fn page_name(&self) -> &'static str;

    /// Journey state this page represents
    fn state(&self) -> JourneyState;

    /// Primary/fallback readiness condition
    fn loaded_condition(&self) -> WaitCondition;

    /// Verify the readiness condition; never raises
    async fn verify_loaded(&self) -> Verification {
        let span = tracing::info_span!("page", name = self.page_name());
        self.tab()
            .verify(self.state(), &self.loaded_condition())
            .instrument(span)
            .await
    }

    /// Boolean view of [`PageObject::verify_loaded`]
    async fn is_loaded(&self) -> bool {
        self.verify_loaded().await.passed()
    }
}

/// Turn a failed verification into [`JourneyError::Unconverged`]
pub(crate) fn require(verification: Verification) -> JourneyResult<Verification> {
    if verification.passed() {
        Ok(verification)
    } else {
        Err(JourneyError::unconverged(verification))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{Credentials, JourneyConfig};
    use crate::driver::{MockDriver, StaleAuth, StepikSimulation};
    use crate::session::Session;
    use crate::wait::WaitOutcome;
    use std::time::Duration;

    async fn session_for(site: &StepikSimulation) -> (Session<MockDriver>, MockDriver) {
        let driver = site.build();
        let observer = driver.clone();
        let session = Session::open(driver, JourneyConfig::default()).await.unwrap();
        (session, observer)
    }

    fn learner() -> Credentials {
        Credentials::new("learner@example.com", "correct horse")
    }

    mod login_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_login_lands_on_clean_catalog() {
            let (session, observer) = session_for(&StepikSimulation::new()).await;
            let login = LoginPage::new(session.origin_tab());
            let catalog = login.login(&learner()).await.unwrap();

            let outcome = catalog.login_outcome().unwrap();
            assert!(outcome.redirect.passed());
            assert_eq!(outcome.recovery, LoginRecovery::NotNeeded);
            assert_eq!(outcome.marker.outcome(), WaitOutcome::Matched);
            assert!(!session.origin_tab().url().await.unwrap().contains("auth=login"));
            assert!(login.is_login_successful().await);
            assert_eq!(observer.cookies_cleared(), 0);
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_redirect_is_soft() {
            let site = StepikSimulation::new().redirect_after_login(None);
            let (session, _observer) = session_for(&site).await;
            let catalog = LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap();

            let outcome = catalog.login_outcome().unwrap();
            assert_eq!(outcome.redirect.outcome(), WaitOutcome::TimedOut);
            assert!(outcome.marker.passed());
            assert!(catalog.is_loaded().await);
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_form_fails_without_typing() {
            let site = StepikSimulation::new().without_login_form();
            let (session, observer) = session_for(&site).await;
            let err = LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap_err();
            assert!(err.is_structural_absence());
            assert!(!observer.was_called("fill"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_stale_auth_recovered_once() {
            let site = StepikSimulation::new().stale_auth(StaleAuth::UntilCookiesCleared);
            let (session, observer) = session_for(&site).await;
            let catalog = LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap();

            assert_eq!(
                catalog.login_outcome().unwrap().recovery,
                LoginRecovery::CookiesCleared
            );
            assert_eq!(observer.cookies_cleared(), 1);
            assert!(!session.origin_tab().url().await.unwrap().contains("auth=login"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_persistent_stale_auth_exhausts_recovery() {
            let site = StepikSimulation::new().stale_auth(StaleAuth::Always);
            let (session, observer) = session_for(&site).await;
            let err = LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap_err();

            match err {
                JourneyError::RecoveryExhausted { url } => assert!(url.contains("auth=login")),
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(observer.cookies_cleared(), 1);
            session.close().await.unwrap();
        }
    }

    mod search_tests {
        use super::*;

        async fn signed_in(
            session: &Session<MockDriver>,
        ) -> CatalogPage<'_, MockDriver> {
            LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap()
        }

        #[tokio::test(start_paused = true)]
        async fn test_search_reaches_results_route() {
            let (session, observer) = session_for(&StepikSimulation::new()).await;
            let results = signed_in(&session).await.search("python").await.unwrap();

            assert_eq!(results.term(), "python");
            assert!(session.origin_tab().url().await.unwrap().contains("q=python"));
            assert!(results.is_loaded().await);
            assert_eq!(results.result_count().await.unwrap(), 10);
            assert!(observer.was_called("press:Enter"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_term_submitted_verbatim() {
            let (session, observer) = session_for(&StepikSimulation::new()).await;
            let results = signed_in(&session).await.search(" python ").await.unwrap();

            assert_eq!(results.term(), " python ");
            let url = session.origin_tab().url().await.unwrap();
            assert_eq!(
                crate::url_pattern::query_param(&url, "q").as_deref(),
                Some(" python ")
            );
            assert!(observer.was_called("press:Enter"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_blank_term_rejected_before_acting() {
            let (session, observer) = session_for(&StepikSimulation::new()).await;
            let catalog = signed_in(&session).await;
            let err = catalog.search("   ").await.unwrap_err();
            assert!(matches!(err, JourneyError::InvalidInput { .. }));
            assert!(!observer.was_called("press"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_dropped_term_is_unconverged() {
            let site = StepikSimulation::new().echo_query(false);
            let (session, _observer) = session_for(&site).await;
            let err = signed_in(&session)
                .await
                .search("python")
                .await
                .unwrap_err();

            assert!(err.is_unconverged());
            let verification = err.verification().unwrap();
            assert_eq!(verification.diagnostic().state, JourneyState::SearchResults);
            assert!(verification.diagnostic().primary.contains("q"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_search_button_is_diagnostic_only() {
            let (session, _observer) = session_for(&StepikSimulation::new()).await;
            let catalog = signed_in(&session).await;
            assert!(catalog.search_button_available().await);
            session.close().await.unwrap();
        }
    }

    mod filter_tests {
        use super::*;

        async fn results_for<'s>(
            session: &'s Session<MockDriver>,
            term: &str,
        ) -> SearchResultsPage<'s, MockDriver> {
            LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap()
                .search(term)
                .await
                .unwrap()
        }

        #[tokio::test(start_paused = true)]
        async fn test_filter_adds_flag_and_renders_cards() {
            let (session, _observer) = session_for(&StepikSimulation::new()).await;
            let filtered = results_for(&session, "python")
                .await
                .apply_free_filter()
                .await
                .unwrap();

            assert!(filtered.render_check().passed());
            assert!(session.origin_tab().url().await.unwrap().contains("free=true"));
            assert!(filtered.is_filter_successful().await);
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_empty_results_fail_fast() {
            let site = StepikSimulation::new().results(0);
            let (session, observer) = session_for(&site).await;
            let results = results_for(&session, "zzzzqqq").await;

            let start = tokio::time::Instant::now();
            let err = results.apply_free_filter().await.unwrap_err();
            assert!(start.elapsed() < Duration::from_secs(1));
            assert!(err.is_structural_absence());
            assert!(err.to_string().contains(search::NO_RESULT_CARDS));
            assert!(!observer.was_called(&format!("click:{}", locators::free_filter().selector())));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_flag_is_unconverged() {
            let site = StepikSimulation::new().filter_url_delay(None);
            let (session, _observer) = session_for(&site).await;
            let err = results_for(&session, "python")
                .await
                .apply_free_filter()
                .await
                .unwrap_err();
            assert!(err.is_unconverged());
            assert_eq!(
                err.verification().unwrap().diagnostic().state,
                JourneyState::FilterApplied
            );
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_hidden_cards_recorded_not_raised() {
            let site = StepikSimulation::new().free_cards_visible(false);
            let (session, _observer) = session_for(&site).await;
            let filtered = results_for(&session, "python")
                .await
                .apply_free_filter()
                .await
                .unwrap();

            assert!(!filtered.render_check().passed());
            let verdict = filtered.verify_filter().await;
            assert!(verdict.fell_back());
            session.close().await.unwrap();
        }
    }

    mod course_tests {
        use super::*;

        async fn filtered<'s>(
            session: &'s Session<MockDriver>,
        ) -> FilteredResultsPage<'s, MockDriver> {
            LoginPage::new(session.origin_tab())
                .login(&learner())
                .await
                .unwrap()
                .search("python")
                .await
                .unwrap()
                .apply_free_filter()
                .await
                .unwrap()
        }

        #[tokio::test(start_paused = true)]
        async fn test_course_in_new_tab_becomes_active() {
            let (session, _observer) = session_for(&StepikSimulation::new()).await;
            let course = filtered(&session).await.open_first_course().await.unwrap();

            assert_ne!(course.tab().id(), session.origin_tab().id());
            assert_eq!(session.active_tab().id(), course.tab().id());
            assert!(course.is_loaded().await);
            assert!(session
                .origin_tab()
                .url()
                .await
                .unwrap()
                .contains("/catalog/search"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_course_in_place() {
            let site = StepikSimulation::new().course_in_new_tab(false);
            let (session, _observer) = session_for(&site).await;
            let course = filtered(&session).await.open_first_course().await.unwrap();

            assert_eq!(course.tab().id(), session.origin_tab().id());
            assert!(course.is_loaded().await);
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_cards_after_filter_is_structural() {
            let site = StepikSimulation::new().free_results(0);
            let (session, _observer) = session_for(&site).await;
            let page = filtered(&session).await;
            assert!(!page.render_check().passed());

            let err = page.open_first_course().await.unwrap_err();
            assert!(err.is_structural_absence());
            assert!(!err.is_unconverged());
            assert!(err.to_string().contains("no result cards"));
            session.close().await.unwrap();
        }
    }
}

//! The free-course journey and its run report.
//!
//! # Flow
//!
//! ```text
//! LoginPage ──login──► CatalogPage ──search──► SearchResultsPage
//!                                                    │
//!                                            apply_free_filter
//!                                                    ▼
//!                 CoursePage ◄──open_first_course── FilteredResultsPage
//! ```
//!
//! Every reached state is recorded in a [`JourneyReport`] together with the
//! verification that established it. A failed run still yields a complete
//! report: the error, the diagnostic bundle it carried and the final URL.

use crate::config::{Credentials, JourneyConfig};
use crate::driver::BrowserDriver;
use crate::pages::{require, LoginPage, LoginRecovery, PageObject};
use crate::result::{JourneyError, JourneyResult};
use crate::session::Session;
use crate::state::JourneyState;
use crate::verify::Verification;
use crate::wait::{Check, UrlContains, WaitCondition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Instrument;
use uuid::Uuid;

// ============================================================================
// Report
// ============================================================================

/// One reached (or failed) state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// State entered
    pub state: JourneyState,
    /// Verification that established it, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    /// Free-form note (recovery, failure message)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the step was recorded
    pub at: DateTime<Utc>,
}

/// Structured record of one journey run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: Option<DateTime<Utc>>,
    /// Search term
    pub query: String,
    /// Last state reached
    pub final_state: JourneyState,
    /// Reached states in order
    pub steps: Vec<StepRecord>,
    /// URL of the active tab when the run ended
    pub final_url: Option<String>,
    /// Error message of a failed run
    pub error: Option<String>,
    /// Failure screenshot, when one was saved
    pub screenshot: Option<String>,
}

impl JourneyReport {
    /// Empty report for a run searching `query`
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            query: query.into(),
            final_state: JourneyState::Unauthenticated,
            steps: Vec::new(),
            final_url: None,
            error: None,
            screenshot: None,
        }
    }

    /// Append a step; rejects edges the journey graph does not have
    pub fn record(
        &mut self,
        state: JourneyState,
        verification: Option<Verification>,
        note: Option<String>,
    ) -> JourneyResult<()> {
        if !self.final_state.can_advance_to(state) {
            return Err(JourneyError::InvalidTransition {
                from: self.final_state,
                to: state,
            });
        }
        tracing::info!(from = %self.final_state, to = %state, "state reached");
        self.final_state = state;
        self.steps.push(StepRecord {
            state,
            verification,
            note,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Mark the run failed with `error`
    pub fn fail(&mut self, error: &JourneyError) {
        if self.final_state == JourneyState::Failed {
            return;
        }
        tracing::error!(state = %self.final_state, error = %error, "journey failed");
        self.final_state = JourneyState::Failed;
        self.error = Some(error.to_string());
        self.steps.push(StepRecord {
            state: JourneyState::Failed,
            verification: error.verification().cloned(),
            note: Some(error.to_string()),
            at: Utc::now(),
        });
    }

    /// Close the report
    pub fn finish(&mut self, final_url: impl Into<String>) {
        self.final_url = Some(final_url.into());
        self.finished_at = Some(Utc::now());
    }

    /// Remember where the failure screenshot went
    pub fn attach_screenshot(&mut self, path: &Path) {
        self.screenshot = Some(path.display().to_string());
    }

    /// Whether the journey reached a course page
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.final_state == JourneyState::CourseOpened
    }

    /// Wall-clock duration, once finished
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> JourneyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Journey
// ============================================================================

/// Report plus the result that ended the run
#[derive(Debug)]
pub struct JourneyOutcome {
    /// Run report
    pub report: JourneyReport,
    /// `Ok` when a course page was reached
    pub result: JourneyResult<()>,
}

impl JourneyOutcome {
    /// Whether the journey succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Sign in, search, filter for free courses and open the first one
#[derive(Debug, Clone)]
pub struct FreeCourseJourney {
    query: String,
    credentials: Credentials,
}

impl FreeCourseJourney {
    /// Journey searching for `query`, kept verbatim. Whitespace-only
    /// queries are rejected.
    pub fn new(query: impl Into<String>, credentials: Credentials) -> JourneyResult<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(JourneyError::invalid_input("search term must not be blank"));
        }
        Ok(Self { query, credentials })
    }

    /// Search term
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Run against an open session. The session stays open.
    pub async fn run<D: BrowserDriver>(&self, session: &Session<D>) -> JourneyOutcome {
        let mut report = JourneyReport::new(&self.query);
        let span = tracing::info_span!("journey", run_id = %report.run_id, query = %self.query);
        let result = self.drive(session, &mut report).instrument(span).await;
        if let Err(err) = &result {
            report.fail(err);
        }
        report.finish(session.active_tab().url_or_unknown().await);
        JourneyOutcome { report, result }
    }

    /// Run inside [`Session::scope`], so the driver is closed on every path
    pub async fn run_scoped<D: BrowserDriver>(
        &self,
        driver: D,
        config: JourneyConfig,
    ) -> JourneyResult<JourneyOutcome> {
        Session::scope(driver, config, |session| async move { Ok(self.run(&session).await) })
            .await
    }

    async fn drive<D: BrowserDriver>(
        &self,
        session: &Session<D>,
        report: &mut JourneyReport,
    ) -> JourneyResult<()> {
        let login = LoginPage::new(session.origin_tab());
        let catalog = login.login(&self.credentials).await?;

        if let Some(outcome) = catalog.login_outcome() {
            if outcome.redirect.passed() {
                report.record(JourneyState::Authenticated, Some(outcome.redirect.clone()), None)?;
            }
            if outcome.recovery == LoginRecovery::CookiesCleared {
                report.record(
                    JourneyState::CatalogReady,
                    None,
                    Some("auth-intent parameter survived; cookies cleared and catalog revisited".into()),
                )?;
            }
        }
        let signed_in = require(login.verify_login().await)?;
        report.record(JourneyState::CatalogReady, Some(signed_in), None)?;
        let catalog_loaded = require(catalog.verify_loaded().await)?;
        tracing::debug!(verification = %catalog_loaded, "catalog page loaded");

        let results = catalog.search(&self.query).await?;
        let listed = require(results.verify_loaded().await)?;
        report.record(JourneyState::SearchResults, Some(listed), None)?;

        let filtered = results.apply_free_filter().await?;
        let render = filtered.render_check().clone();
        let note = (!render.passed()).then(|| "no visible result card after filtering".to_string());
        report.record(JourneyState::FilterApplied, Some(render), note)?;

        let course = filtered.open_first_course().await?;
        let opened = require(course.verify_loaded().await)?;
        let new_tab = course.tab().id() != session.origin_tab().id();
        report.record(
            JourneyState::CourseOpened,
            Some(opened),
            new_tab.then(|| format!("opened in {}", course.tab().id())),
        )?;

        if new_tab {
            let origin = session.origin_tab();
            let kept = require(
                origin
                    .verify(
                        JourneyState::SearchResults,
                        &WaitCondition::new(Check::new(
                            UrlContains::new("/catalog/search"),
                            session.config().timeouts.fallback,
                        )),
                    )
                    .await,
            )?;
            tracing::info!(verification = %kept, "origin tab still on search results");
        }
        Ok(())
    }
}

//! Search results, before and after the free filter.

use super::course::CoursePage;
use super::{locators, require, PageObject};
use crate::driver::BrowserDriver;
use crate::result::{JourneyError, JourneyResult};
use crate::session::Tab;
use crate::state::JourneyState;
use crate::verify::Verification;
use crate::wait::{
    AllOf, AnyOf, Check, ElementIs, NewTabOpened, UrlContains, UrlMatches, WaitCondition,
};
use tracing::Instrument;

/// What the transitions say when the result list is empty
pub const NO_RESULT_CARDS: &str = "no result cards";

// Zero cards means filtering or opening can never converge, so both
// transitions bail out before acting.
async fn require_cards<D: BrowserDriver>(tab: &Tab<'_, D>) -> JourneyResult<usize> {
    let cards = tab.count(&locators::result_card()).await?;
    if cards == 0 {
        let url = tab.url_or_unknown().await;
        tracing::error!(url = %url, "no result cards to act on");
        return Err(JourneyError::absent(NO_RESULT_CARDS, url));
    }
    Ok(cards)
}

// ============================================================================
// Search results
// ============================================================================

/// Results of a catalog search
pub struct SearchResultsPage<'s, D: BrowserDriver> {
    tab: Tab<'s, D>,
    term: String,
}

impl<D: BrowserDriver> std::fmt::Debug for SearchResultsPage<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchResultsPage")
            .field("tab", &self.tab)
            .field("term", &self.term)
            .finish()
    }
}

impl<'s, D: BrowserDriver> SearchResultsPage<'s, D> {
    /// Bind to `tab` for `term` without verifying
    #[must_use]
    pub fn new(tab: Tab<'s, D>, term: impl Into<String>) -> Self {
        Self {
            tab,
            term: term.into(),
        }
    }

    /// The submitted search term
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Number of result cards currently attached
    pub async fn result_count(&self) -> JourneyResult<usize> {
        self.tab.count(&locators::result_card()).await
    }

    /// Restrict the results to free courses.
    ///
    /// Fails fast with [`JourneyError::StructuralAbsence`] on an empty result
    /// set and with [`JourneyError::Unconverged`] when `free=true` never
    /// reaches the URL. The post-filter card check is recorded on the
    /// returned page, not raised.
    pub async fn apply_free_filter(&self) -> JourneyResult<FilteredResultsPage<'s, D>> {
        let span = tracing::info_span!("page", name = self.page_name());
        self.filter().instrument(span).await
    }

    async fn filter(&self) -> JourneyResult<FilteredResultsPage<'s, D>> {
        let config = self.tab.config();
        let timeouts = config.timeouts;

        let before = require_cards(&self.tab).await?;
        tracing::info!(cards = before, "applying free filter");
        self.tab.click(&locators::free_filter()).await?;

        let flagged = require(
            self.tab
                .verify(
                    JourneyState::FilterApplied,
                    &WaitCondition::new(Check::new(
                        UrlContains::new("free=true"),
                        timeouts.filter_flag,
                    )),
                )
                .await,
        )?;
        tracing::debug!(verification = %flagged, "free filter flag present");

        self.tab.pause(config.filter_settle_delay).await;
        self.tab.settle().await;

        let card = locators::result_card();
        let render_check = self
            .tab
            .verify(
                JourneyState::FilterApplied,
                &WaitCondition::new(Check::new(
                    AllOf::new(vec![
                        Box::new(ElementIs::attached(card.clone())),
                        Box::new(ElementIs::visible(card)),
                    ]),
                    timeouts.result_cards,
                )),
            )
            .await;
        if render_check.passed() {
            let elapsed_ms = render_check.diagnostic().elapsed_ms;
            tracing::info!(elapsed_ms, "filtered results rendered");
        } else {
            let url = &render_check.diagnostic().url;
            tracing::warn!(url = %url, "no visible result card after filtering");
        }

        Ok(FilteredResultsPage {
            tab: self.tab.clone(),
            render_check,
        })
    }
}

impl<D: BrowserDriver> PageObject for SearchResultsPage<'_, D> {
    type Driver = D;

    fn tab(&self) -> &Tab<'_, D> {
        &self.tab
    }

    fn page_name(&self) -> &'static str {
        "search-results"
    }

    fn state(&self) -> JourneyState {
        JourneyState::SearchResults
    }

    fn loaded_condition(&self) -> WaitCondition {
        WaitCondition::new(Check::new(
            AllOf::new(vec![
                Box::new(UrlContains::new("/catalog/search")),
                Box::new(ElementIs::visible(locators::free_filter())),
            ]),
            self.tab.config().timeouts.fallback,
        ))
    }
}

// ============================================================================
// Filtered results
// ============================================================================

/// Results with the free filter applied
pub struct FilteredResultsPage<'s, D: BrowserDriver> {
    tab: Tab<'s, D>,
    render_check: Verification,
}

impl<D: BrowserDriver> std::fmt::Debug for FilteredResultsPage<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredResultsPage")
            .field("tab", &self.tab)
            .field("render_check", &self.render_check.outcome())
            .finish()
    }
}

impl<'s, D: BrowserDriver> FilteredResultsPage<'s, D> {
    /// The post-filter card check
    #[must_use]
    pub const fn render_check(&self) -> &Verification {
        &self.render_check
    }

    /// Cards visible, else `free=true` in the URL
    pub async fn verify_filter(&self) -> Verification {
        self.tab
            .verify(JourneyState::FilterApplied, &self.loaded_condition())
            .await
    }

    /// Boolean view of [`FilteredResultsPage::verify_filter`]
    pub async fn is_filter_successful(&self) -> bool {
        self.verify_filter().await.passed()
    }

    /// Open the first result card.
    ///
    /// The course may open in a new tab or replace the current page; the
    /// returned page is bound to whichever tab holds it, and that tab becomes
    /// the session's active tab.
    pub async fn open_first_course(&self) -> JourneyResult<CoursePage<'s, D>> {
        let span = tracing::info_span!("page", name = self.page_name());
        self.open().instrument(span).await
    }

    async fn open(&self) -> JourneyResult<CoursePage<'s, D>> {
        require_cards(&self.tab).await?;

        let session = self.tab.session();
        let known = session.driver().tabs().await?;
        self.tab.click(&locators::result_card()).await?;

        let opened = require(
            self.tab
                .verify(
                    JourneyState::CourseOpened,
                    &WaitCondition::new(Check::new(
                        AnyOf::new(vec![
                            Box::new(NewTabOpened::since(known.clone())),
                            Box::new(UrlMatches::glob("**/course/**")),
                        ]),
                        self.tab.config().timeouts.course_open,
                    )),
                )
                .await,
        )?;

        let tabs = session.driver().tabs().await?;
        let course_tab = match tabs.into_iter().find(|t| !known.contains(t)) {
            Some(new_tab) => {
                tracing::info!(tab = %new_tab, "course opened in a new tab");
                session.tab(new_tab)
            }
            None => {
                tracing::info!(url = %opened.diagnostic().url, "course opened in place");
                self.tab.clone()
            }
        };
        session.set_active(course_tab.id().clone());
        course_tab.settle().await;

        Ok(CoursePage::new(course_tab))
    }
}

impl<D: BrowserDriver> PageObject for FilteredResultsPage<'_, D> {
    type Driver = D;

    fn tab(&self) -> &Tab<'_, D> {
        &self.tab
    }

    fn page_name(&self) -> &'static str {
        "filtered-results"
    }

    fn state(&self) -> JourneyState {
        JourneyState::FilterApplied
    }

    fn loaded_condition(&self) -> WaitCondition {
        let timeouts = self.tab.config().timeouts;
        WaitCondition::new(Check::new(
            ElementIs::visible(locators::result_card()),
            timeouts.result_cards,
        ))
        .with_fallback(Check::new(UrlContains::new("free=true"), timeouts.fallback))
    }
}

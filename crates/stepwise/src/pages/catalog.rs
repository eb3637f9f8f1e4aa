//! Signed-in catalog page.

use super::login::LoginOutcome;
use super::search::SearchResultsPage;
use super::{locators, require, PageObject};
use crate::driver::BrowserDriver;
use crate::result::{JourneyError, JourneyResult};
use crate::session::Tab;
use crate::state::JourneyState;
use crate::wait::{
    AllOf, Check, ElementIs, QueryParamEquals, UrlContains, UrlMatches, WaitCondition,
};
use tracing::Instrument;

/// The catalog, reached after sign-in
pub struct CatalogPage<'s, D: BrowserDriver> {
    tab: Tab<'s, D>,
    login: Option<LoginOutcome>,
}

impl<D: BrowserDriver> std::fmt::Debug for CatalogPage<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogPage")
            .field("tab", &self.tab)
            .field("login", &self.login)
            .finish()
    }
}

impl<'s, D: BrowserDriver> CatalogPage<'s, D> {
    /// Bind to `tab` without navigating or verifying
    #[must_use]
    pub const fn new(tab: Tab<'s, D>) -> Self {
        Self { tab, login: None }
    }

    pub(crate) const fn signed_in(tab: Tab<'s, D>, login: LoginOutcome) -> Self {
        Self {
            tab,
            login: Some(login),
        }
    }

    /// What the sign-in transition observed, when this page came from one
    #[must_use]
    pub const fn login_outcome(&self) -> Option<&LoginOutcome> {
        self.login.as_ref()
    }

    /// Whether the search button is attached
    pub async fn search_button_available(&self) -> bool {
        self.tab
            .count(&locators::search_button())
            .await
            .is_ok_and(|n| n > 0)
    }

    /// Submit `term` through the search field.
    ///
    /// The term is submitted verbatim, surrounding whitespace included. An
    /// empty or whitespace-only term is [`JourneyError::InvalidInput`].
    /// The results route and the echoed term are both required; either one
    /// failing to converge is [`JourneyError::Unconverged`].
    pub async fn search(&self, term: &str) -> JourneyResult<SearchResultsPage<'s, D>> {
        if term.trim().is_empty() {
            return Err(JourneyError::invalid_input("search term must not be blank"));
        }
        let span = tracing::info_span!("page", name = self.page_name());
        self.submit(term).instrument(span).await
    }

    async fn submit(&self, term: &str) -> JourneyResult<SearchResultsPage<'s, D>> {
        let timeouts = self.tab.config().timeouts;
        let input = locators::search_input();

        let ready = self
            .tab
            .wait(&Check::new(ElementIs::visible(input.clone()), timeouts.fallback))
            .await;
        if !ready.success {
            let url = self.tab.url_or_unknown().await;
            return Err(JourneyError::absent("catalog search field", url));
        }

        tracing::info!(term, "searching");
        self.tab.fill(&input, term).await?;
        self.tab.press(&input, "Enter").await?;

        let routed = require(
            self.tab
                .verify(
                    JourneyState::SearchResults,
                    &WaitCondition::new(Check::new(
                        UrlMatches::glob("**/catalog/search*"),
                        timeouts.search_route,
                    )),
                )
                .await,
        )?;
        tracing::debug!(verification = %routed, "search route reached");
        let echoed = require(
            self.tab
                .verify(
                    JourneyState::SearchResults,
                    &WaitCondition::new(Check::new(
                        QueryParamEquals::new("q", term),
                        timeouts.search_query,
                    )),
                )
                .await,
        )?;
        tracing::info!(url = %echoed.diagnostic().url, "search results route reached");

        Ok(SearchResultsPage::new(self.tab.clone(), term))
    }
}

impl<D: BrowserDriver> PageObject for CatalogPage<'_, D> {
    type Driver = D;

    fn tab(&self) -> &Tab<'_, D> {
        &self.tab
    }

    fn page_name(&self) -> &'static str {
        "catalog"
    }

    fn state(&self) -> JourneyState {
        JourneyState::CatalogReady
    }

    fn loaded_condition(&self) -> WaitCondition {
        WaitCondition::new(Check::new(
            AllOf::new(vec![
                Box::new(ElementIs::visible(locators::search_input())),
                Box::new(UrlContains::new("/catalog")),
            ]),
            self.tab.config().timeouts.fallback,
        ))
    }
}

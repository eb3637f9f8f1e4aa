//! Login page and the sign-in transition.

use super::catalog::CatalogPage;
use super::{locators, PageObject};
use crate::config::Credentials;
use crate::driver::BrowserDriver;
use crate::result::{JourneyError, JourneyResult};
use crate::session::Tab;
use crate::state::JourneyState;
use crate::verify::Verification;
use crate::wait::{AllOf, Check, ElementIs, UrlContains, UrlExcludes, UrlMatches, WaitCondition};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Query fragment the site leaves behind when the redirect misbehaves
pub const AUTH_INTENT: &str = "auth=login";

/// Whether the stale auth-intent correction had to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoginRecovery {
    /// The forced catalog navigation came back clean
    NotNeeded,
    /// Cookies were cleared and the navigation repeated once
    CookiesCleared,
}

/// What the sign-in transition observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    /// The soft post-submit redirect wait; a timeout here is expected
    pub redirect: Verification,
    /// Whether the correction ran
    pub recovery: LoginRecovery,
    /// The post-login marker wait on the clean catalog URL
    pub marker: Verification,
}

/// The login entry page
pub struct LoginPage<'s, D: BrowserDriver> {
    tab: Tab<'s, D>,
}

impl<D: BrowserDriver> std::fmt::Debug for LoginPage<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginPage").field("tab", &self.tab).finish()
    }
}

impl<'s, D: BrowserDriver> LoginPage<'s, D> {
    /// Bind to `tab` without navigating or verifying
    #[must_use]
    pub const fn new(tab: Tab<'s, D>) -> Self {
        Self { tab }
    }

    /// Sign in and land on the clean catalog.
    ///
    /// Fails immediately with [`JourneyError::StructuralAbsence`] when the
    /// login form never appears, and with
    /// [`JourneyError::RecoveryExhausted`] when the auth-intent parameter
    /// survives the single cookie-clearing retry.
    pub async fn login(&self, credentials: &Credentials) -> JourneyResult<CatalogPage<'s, D>> {
        let span = tracing::info_span!("page", name = self.page_name());
        self.sign_in(credentials).instrument(span).await
    }

    /// Post-login check: avatar visible, else a clean catalog URL
    pub async fn verify_login(&self) -> Verification {
        self.tab
            .verify(JourneyState::CatalogReady, &self.login_condition())
            .await
    }

    /// Boolean view of [`LoginPage::verify_login`]
    pub async fn is_login_successful(&self) -> bool {
        self.verify_login().await.passed()
    }

    async fn sign_in(&self, credentials: &Credentials) -> JourneyResult<CatalogPage<'s, D>> {
        let config = self.tab.config();
        let timeouts = config.timeouts;
        tracing::info!(login = %credentials.masked_login(), "signing in");

        self.tab.navigate(&config.login_url()).await?;
        let form = self
            .tab
            .wait(&Check::new(
                ElementIs::visible(locators::email_field()),
                timeouts.login_form,
            ))
            .await;
        if !form.success {
            let url = self.tab.url_or_unknown().await;
            tracing::error!(url = %url, "login form never became visible");
            return Err(JourneyError::absent("login form e-mail field", url));
        }

        self.tab
            .fill(&locators::email_field(), credentials.login())
            .await?;
        self.tab
            .fill_secret(&locators::password_field(), credentials.password())
            .await?;
        self.tab.click(&locators::submit_button()).await?;

        let redirect = self
            .tab
            .verify(
                JourneyState::Authenticated,
                &WaitCondition::new(Check::new(
                    UrlMatches::glob("**/catalog"),
                    timeouts.login_redirect,
                )),
            )
            .await;
        if redirect.passed() {
            tracing::info!(url = %redirect.diagnostic().url, "redirected after submit");
        } else {
            tracing::info!(
                url = %redirect.diagnostic().url,
                "no redirect after submit; forcing catalog navigation"
            );
        }

        let mut url = self.force_catalog().await?;
        let recovery = if url.contains(AUTH_INTENT) {
            url = self.recover_stale_auth(&url).await?;
            LoginRecovery::CookiesCleared
        } else {
            LoginRecovery::NotNeeded
        };

        let marker = self.await_marker().await;
        tracing::info!(url = %url, recovery = ?recovery, marker = %marker.outcome(), "signed in");

        Ok(CatalogPage::signed_in(
            self.tab.clone(),
            LoginOutcome {
                redirect,
                recovery,
                marker,
            },
        ))
    }

    async fn force_catalog(&self) -> JourneyResult<String> {
        let response = self.tab.navigate(&self.tab.config().catalog_url()).await?;
        tracing::debug!(url = %response.url, "forced catalog navigation");
        self.tab.url().await
    }

    // Single bounded correction: one cookie reset, one repeat, never more.
    async fn recover_stale_auth(&self, stale_url: &str) -> JourneyResult<String> {
        tracing::warn!(
            url = %stale_url,
            "auth-intent parameter survived; clearing cookies and retrying once"
        );
        self.tab.clear_cookies().await?;
        let url = self.force_catalog().await?;
        if url.contains(AUTH_INTENT) {
            tracing::error!(url = %url, "auth-intent parameter persists after recovery");
            return Err(JourneyError::RecoveryExhausted { url });
        }
        Ok(url)
    }

    async fn await_marker(&self) -> Verification {
        let timeouts = self.tab.config().timeouts;
        self.tab
            .verify(
                JourneyState::CatalogReady,
                &WaitCondition::new(Check::new(
                    ElementIs::visible(locators::profile_avatar()),
                    timeouts.marker_attached + timeouts.marker_visible,
                )),
            )
            .await
    }

    fn login_condition(&self) -> WaitCondition {
        let timeouts = self.tab.config().timeouts;
        WaitCondition::new(Check::new(
            AllOf::new(vec![
                Box::new(ElementIs::attached(locators::profile_avatar())),
                Box::new(ElementIs::visible(locators::profile_avatar())),
            ]),
            timeouts.marker_attached,
        ))
        .with_fallback(Check::new(
            AllOf::new(vec![
                Box::new(UrlContains::new("/catalog")),
                Box::new(UrlExcludes::new(AUTH_INTENT)),
            ]),
            timeouts.fallback,
        ))
    }
}

impl<D: BrowserDriver> PageObject for LoginPage<'_, D> {
    type Driver = D;

    fn tab(&self) -> &Tab<'_, D> {
        &self.tab
    }

    fn page_name(&self) -> &'static str {
        "login"
    }

    fn state(&self) -> JourneyState {
        JourneyState::Unauthenticated
    }

    fn loaded_condition(&self) -> WaitCondition {
        WaitCondition::new(Check::new(
            ElementIs::visible(locators::email_field()),
            self.tab.config().timeouts.fallback,
        ))
    }
}

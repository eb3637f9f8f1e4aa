//! Scripted replica of the catalog site on top of [`MockDriver`].
//!
//! Models the behaviors the journey has to cope with: a login redirect that
//! may or may not happen, a stale `auth=login` parameter that survives the
//! redirect until cookies are cleared, client-side search and filter routes
//! whose URL and content update independently, and a result card that opens
//! the course in a new tab.

use super::mock::{MockDriver, MockElement, MockWorld};
use super::TabId;
use crate::config::JourneyConfig;
use crate::locator::Locator;
use crate::pages::locators;
use crate::url_pattern::{with_query_param, UrlPattern};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How the forced catalog navigation treats the auth-intent parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleAuth {
    /// The clean catalog URL always sticks
    Never,
    /// `auth=login` comes back until cookies have been cleared once
    UntilCookiesCleared,
    /// `auth=login` never goes away
    Always,
}

/// Builder for a scripted catalog site
#[derive(Debug, Clone)]
pub struct StepikSimulation {
    config: JourneyConfig,
    login_form: bool,
    redirect_after_login: Option<Duration>,
    stale_auth: StaleAuth,
    avatar_delay: Duration,
    search_delay: Duration,
    echo_query: bool,
    results: usize,
    filter_url_delay: Option<Duration>,
    filter_render_delay: Duration,
    free_results: usize,
    free_cards_visible: bool,
    course_in_new_tab: bool,
    course_delay: Duration,
    page_latency: Duration,
}

impl Default for StepikSimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl StepikSimulation {
    /// A well-behaved site with ten results, six of them free
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: JourneyConfig::default(),
            login_form: true,
            redirect_after_login: Some(Duration::from_millis(800)),
            stale_auth: StaleAuth::Never,
            avatar_delay: Duration::from_millis(300),
            search_delay: Duration::from_millis(500),
            echo_query: true,
            results: 10,
            filter_url_delay: Some(Duration::from_millis(300)),
            filter_render_delay: Duration::from_millis(1500),
            free_results: 6,
            free_cards_visible: true,
            course_in_new_tab: true,
            course_delay: Duration::from_millis(400),
            page_latency: Duration::from_millis(200),
        }
    }

    /// Serve URLs under the given config's base
    #[must_use]
    pub fn config(mut self, config: &JourneyConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Login form missing (markup regression)
    #[must_use]
    pub const fn without_login_form(mut self) -> Self {
        self.login_form = false;
        self
    }

    /// Automatic post-login redirect delay; `None` disables the redirect
    #[must_use]
    pub const fn redirect_after_login(mut self, delay: Option<Duration>) -> Self {
        self.redirect_after_login = delay;
        self
    }

    /// Stale auth-intent behavior
    #[must_use]
    pub const fn stale_auth(mut self, stale_auth: StaleAuth) -> Self {
        self.stale_auth = stale_auth;
        self
    }

    /// Delay before the search route appears
    #[must_use]
    pub const fn search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    /// When false, the search route drops the submitted term
    #[must_use]
    pub const fn echo_query(mut self, echo: bool) -> Self {
        self.echo_query = echo;
        self
    }

    /// Number of result cards for the search
    #[must_use]
    pub const fn results(mut self, count: usize) -> Self {
        self.results = count;
        self
    }

    /// Delay before `free=true` lands in the URL; `None` never updates it
    #[must_use]
    pub const fn filter_url_delay(mut self, delay: Option<Duration>) -> Self {
        self.filter_url_delay = delay;
        self
    }

    /// Delay between the filter click and the re-rendered cards
    #[must_use]
    pub const fn filter_render_delay(mut self, delay: Duration) -> Self {
        self.filter_render_delay = delay;
        self
    }

    /// Number of cards after the free filter
    #[must_use]
    pub const fn free_results(mut self, count: usize) -> Self {
        self.free_results = count;
        self
    }

    /// When false, filtered cards attach but never become visible
    #[must_use]
    pub const fn free_cards_visible(mut self, visible: bool) -> Self {
        self.free_cards_visible = visible;
        self
    }

    /// Whether the course opens in a new tab or in place
    #[must_use]
    pub const fn course_in_new_tab(mut self, new_tab: bool) -> Self {
        self.course_in_new_tab = new_tab;
        self
    }

    /// Build a fresh driver scripted with this site
    #[must_use]
    pub fn build(&self) -> MockDriver {
        let driver = MockDriver::new();
        self.install(&driver);
        driver
    }

    /// Register the site's reactions on `driver`
    pub fn install(&self, driver: &MockDriver) {
        driver.world().set_navigation_latency(self.page_latency);
        let signed_in = Arc::new(AtomicBool::new(false));
        self.install_login(driver, &signed_in);
        self.install_catalog(driver, &signed_in);
        self.install_search(driver);
        self.install_filter(driver);
        self.install_course(driver);
    }

    fn install_login(&self, driver: &MockDriver, signed_in: &Arc<AtomicBool>) {
        let login_form = self.login_form;
        driver.on_navigate(UrlPattern::Exact(self.config.login_url()), move |w, tab| {
            if login_form {
                place(w, tab, &locators::email_field(), MockElement::visible());
                place(w, tab, &locators::password_field(), MockElement::visible());
                place(w, tab, &locators::submit_button(), MockElement::visible());
            }
        });

        let flag = Arc::clone(signed_in);
        let redirect = self.redirect_after_login;
        let catalog = self.config.catalog_url();
        driver.on_click(locators::submit_button().selector().clone(), move |w, tab| {
            flag.store(true, Ordering::SeqCst);
            w.busy_for(tab, Duration::from_millis(300));
            if let Some(delay) = redirect {
                let tab = tab.clone();
                let catalog = catalog.clone();
                w.schedule(delay, move |w| {
                    w.set_url(&tab, catalog);
                    w.remove_element(&tab, locators::email_field().selector());
                    w.remove_element(&tab, locators::password_field().selector());
                    w.remove_element(&tab, locators::submit_button().selector());
                });
            }
        });
    }

    fn install_catalog(&self, driver: &MockDriver, signed_in: &Arc<AtomicBool>) {
        let flag = Arc::clone(signed_in);
        let stale = self.stale_auth;
        let avatar_delay = self.avatar_delay;
        let stale_url = self.config.login_url();
        driver.on_navigate(UrlPattern::Exact(self.config.catalog_url()), move |w, tab| {
            let keeps_auth = match stale {
                StaleAuth::Never => false,
                StaleAuth::UntilCookiesCleared => w.cookies_cleared() == 0,
                StaleAuth::Always => true,
            };
            if keeps_auth {
                w.set_url(tab, stale_url.clone());
            }
            render_catalog(w, tab);
            if flag.load(Ordering::SeqCst) && !keeps_auth {
                let tab = tab.clone();
                w.schedule(avatar_delay, move |w| {
                    place(w, &tab, &locators::profile_avatar(), MockElement::hidden());
                    w.schedule(Duration::from_millis(100), move |w| {
                        place(w, &tab, &locators::profile_avatar(), MockElement::visible());
                    });
                });
            }
        });
    }

    fn install_search(&self, driver: &MockDriver) {
        let delay = self.search_delay;
        let echo = self.echo_query;
        let results = self.results;
        let route = self.config.search_url();
        driver.on_press(locators::search_input().selector().clone(), "Enter", move |w, tab| {
            let term = w
                .element(tab, locators::search_input().selector())
                .and_then(|e| e.value.clone())
                .unwrap_or_default();
            let target = if echo {
                with_query_param(&route, "q", &term).unwrap_or_else(|| route.clone())
            } else {
                route.clone()
            };
            w.busy_for(tab, delay);
            let tab = tab.clone();
            w.schedule(delay, move |w| {
                w.set_url(&tab, target);
                place(w, &tab, &locators::free_filter(), MockElement::visible());
                place(w, &tab, &locators::result_card(), MockElement::many(results));
            });
        });
    }

    fn install_filter(&self, driver: &MockDriver) {
        let url_delay = self.filter_url_delay;
        let render_delay = self.filter_render_delay;
        let free_results = self.free_results;
        let visible = self.free_cards_visible;
        driver.on_click(locators::free_filter().selector().clone(), move |w, tab| {
            w.remove_element(tab, locators::result_card().selector());
            w.busy_for(tab, Duration::from_millis(400));
            if let Some(delay) = url_delay {
                let tab = tab.clone();
                w.schedule(delay, move |w| {
                    let current = w.url(&tab).unwrap_or_default().to_string();
                    let filtered = with_query_param(&current, "free", "true").unwrap_or(current);
                    w.set_url(&tab, filtered);
                });
            }
            let tab = tab.clone();
            w.schedule(render_delay, move |w| {
                if free_results > 0 {
                    let cards = MockElement {
                        visible,
                        ..MockElement::many(free_results)
                    };
                    place(w, &tab, &locators::result_card(), cards);
                }
            });
        });
    }

    fn install_course(&self, driver: &MockDriver) {
        let new_tab = self.course_in_new_tab;
        let delay = self.course_delay;
        let course = format!("{}/course/58852/promo", self.config.base_url);
        driver.on_click(locators::result_card().selector().clone(), move |w, tab| {
            let course = course.clone();
            let tab = tab.clone();
            w.schedule(delay, move |w| {
                if new_tab {
                    w.open_tab(course);
                } else {
                    w.set_url(&tab, course);
                }
            });
        });
    }
}

fn place(w: &mut MockWorld, tab: &TabId, locator: &Locator, element: MockElement) {
    w.set_element(tab, locator.selector().clone(), element);
}

fn render_catalog(w: &mut MockWorld, tab: &TabId) {
    place(w, tab, &locators::search_input(), MockElement::visible());
    let button = MockElement::visible().with_text("Искать");
    place(w, tab, &locators::search_button(), button);
}

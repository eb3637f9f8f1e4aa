//! Scripted in-memory browser.
//!
//! A [`MockDriver`] holds a [`MockWorld`] (tabs, URLs, elements per tab)
//! plus reactions that fire on navigation, clicks and key presses. Reactions
//! mutate the world immediately or schedule effects for later; scheduled
//! effects are applied lazily, on the next driver call whose tokio clock is
//! past their due time. Under `#[tokio::test(start_paused = true)]` this
//! gives deterministic latency without real sleeping.
//!
//! The driver is a cheap `Clone` over shared state, so a test can hand one
//! copy to a `Session` and keep another to inspect history afterwards.

use super::{ActivitySnapshot, BrowserDriver, NavigationResponse, Screenshot, TabId};
use crate::locator::{Locator, Selector};
use crate::result::{DriverError, DriverResult};
use crate::url_pattern::UrlPattern;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const ACTION_POLL: Duration = Duration::from_millis(10);
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Element state inside the mock DOM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    /// Number of matching nodes; zero means detached
    pub count: usize,
    /// Whether the first match is visible
    pub visible: bool,
    /// Text content of the first match
    pub text: Option<String>,
    /// Last value written by `fill`
    pub value: Option<String>,
}

impl MockElement {
    /// One attached, visible node
    #[must_use]
    pub fn visible() -> Self {
        Self::many(1)
    }

    /// One attached node that is not visible yet
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            count: 1,
            ..Self::default()
        }
    }

    /// `count` attached, visible nodes
    #[must_use]
    pub fn many(count: usize) -> Self {
        Self {
            count,
            visible: count > 0,
            ..Self::default()
        }
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

type Effect = Box<dyn FnOnce(&mut MockWorld) + Send>;
type ReactionFn = Arc<dyn Fn(&mut MockWorld, &TabId) + Send + Sync>;

struct Scheduled {
    due: Instant,
    seq: u64,
    effect: Effect,
}

enum Trigger {
    Navigate(UrlPattern),
    Click(Selector),
    Press { selector: Selector, key: String },
}

struct Reaction {
    trigger: Trigger,
    run: ReactionFn,
}

/// Mutable state of the simulated browser
pub struct MockWorld {
    tabs: Vec<TabId>,
    next_tab: usize,
    urls: HashMap<TabId, String>,
    elements: HashMap<TabId, HashMap<Selector, MockElement>>,
    busy_until: HashMap<TabId, Instant>,
    resources: HashMap<TabId, u64>,
    navigation_latency: Duration,
    cookies_cleared: usize,
    history: Vec<String>,
    scheduled: Vec<Scheduled>,
    seq: u64,
    closed: bool,
}

impl fmt::Debug for MockWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockWorld")
            .field("tabs", &self.tabs)
            .field("urls", &self.urls)
            .field("cookies_cleared", &self.cookies_cleared)
            .field("scheduled", &self.scheduled.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Default for MockWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorld {
    /// A world with one blank tab
    #[must_use]
    pub fn new() -> Self {
        let mut world = Self {
            tabs: Vec::new(),
            next_tab: 0,
            urls: HashMap::new(),
            elements: HashMap::new(),
            busy_until: HashMap::new(),
            resources: HashMap::new(),
            navigation_latency: Duration::ZERO,
            cookies_cleared: 0,
            history: Vec::new(),
            scheduled: Vec::new(),
            seq: 0,
            closed: false,
        };
        world.open_tab("about:blank");
        world
    }

    /// Open a new tab at `url` and return its id
    pub fn open_tab(&mut self, url: impl Into<String>) -> TabId {
        let tab = TabId::new(format!("tab-{}", self.next_tab));
        self.next_tab += 1;
        self.tabs.push(tab.clone());
        self.urls.insert(tab.clone(), url.into());
        tab
    }

    /// Open tabs, oldest first
    #[must_use]
    pub fn tabs(&self) -> &[TabId] {
        &self.tabs
    }

    /// URL of `tab`
    #[must_use]
    pub fn url(&self, tab: &TabId) -> Option<&str> {
        self.urls.get(tab).map(String::as_str)
    }

    /// Change the URL without a navigation (history.pushState)
    pub fn set_url(&mut self, tab: &TabId, url: impl Into<String>) {
        self.urls.insert(tab.clone(), url.into());
    }

    /// Insert or replace an element
    pub fn set_element(&mut self, tab: &TabId, selector: Selector, element: MockElement) {
        self.elements
            .entry(tab.clone())
            .or_default()
            .insert(selector, element);
    }

    /// Element state, if present
    #[must_use]
    pub fn element(&self, tab: &TabId, selector: &Selector) -> Option<&MockElement> {
        self.elements.get(tab).and_then(|els| els.get(selector))
    }

    /// Detach an element
    pub fn remove_element(&mut self, tab: &TabId, selector: &Selector) {
        if let Some(els) = self.elements.get_mut(tab) {
            els.remove(selector);
        }
    }

    /// Run `effect` once the tokio clock passes `now + delay`
    pub fn schedule(&mut self, delay: Duration, effect: impl FnOnce(&mut Self) + Send + 'static) {
        self.seq += 1;
        self.scheduled.push(Scheduled {
            due: Instant::now() + delay,
            seq: self.seq,
            effect: Box::new(effect),
        });
    }

    /// Mark `tab` as loading for `duration` and bump its resource counter
    pub fn busy_for(&mut self, tab: &TabId, duration: Duration) {
        let until = Instant::now() + duration;
        let entry = self.busy_until.entry(tab.clone()).or_insert(until);
        if *entry < until {
            *entry = until;
        }
        *self.resources.entry(tab.clone()).or_default() += 1;
    }

    /// Latency applied to every navigation
    pub fn set_navigation_latency(&mut self, latency: Duration) {
        self.navigation_latency = latency;
    }

    /// How many times cookies were cleared
    #[must_use]
    pub const fn cookies_cleared(&self) -> usize {
        self.cookies_cleared
    }

    /// Recorded driver calls
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Effects still waiting for their due time
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        self.scheduled.len()
    }

    fn run_due(&mut self) {
        loop {
            let now = Instant::now();
            let next = self
                .scheduled
                .iter()
                .enumerate()
                .filter(|(_, s)| s.due <= now)
                .min_by_key(|(_, s)| (s.due, s.seq))
                .map(|(i, _)| i);
            let Some(index) = next else { break };
            let item = self.scheduled.swap_remove(index);
            (item.effect)(self);
        }
    }

    fn check(&self, tab: &TabId) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        if !self.urls.contains_key(tab) {
            return Err(DriverError::TabNotFound {
                tab: tab.to_string(),
            });
        }
        Ok(())
    }

    fn actionable(&self, tab: &TabId, selector: &Selector) -> (usize, bool) {
        self.element(tab, selector)
            .map_or((0, false), |e| (e.count, e.count > 0 && e.visible))
    }
}

struct Inner {
    world: Mutex<MockWorld>,
    reactions: Mutex<Vec<Reaction>>,
}

/// Mock driver for unit and journey tests
#[derive(Clone)]
pub struct MockDriver {
    inner: Arc<Inner>,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("world", &*self.world())
            .finish_non_exhaustive()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create new mock driver with one blank tab
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                world: Mutex::new(MockWorld::new()),
                reactions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Lock the world for setup or inspection
    pub fn world(&self) -> MutexGuard<'_, MockWorld> {
        self.inner
            .world
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The tab the browser started with
    #[must_use]
    pub fn first_tab(&self) -> TabId {
        self.world()
            .tabs
            .first()
            .cloned()
            .unwrap_or_else(|| TabId::new("tab-0"))
    }

    /// React to navigations whose URL matches `pattern`
    pub fn on_navigate(
        &self,
        pattern: UrlPattern,
        reaction: impl Fn(&mut MockWorld, &TabId) + Send + Sync + 'static,
    ) {
        self.add_reaction(Trigger::Navigate(pattern), reaction);
    }

    /// React to clicks on `selector`
    pub fn on_click(
        &self,
        selector: Selector,
        reaction: impl Fn(&mut MockWorld, &TabId) + Send + Sync + 'static,
    ) {
        self.add_reaction(Trigger::Click(selector), reaction);
    }

    /// React to `key` pressed on `selector`
    pub fn on_press(
        &self,
        selector: Selector,
        key: impl Into<String>,
        reaction: impl Fn(&mut MockWorld, &TabId) + Send + Sync + 'static,
    ) {
        self.add_reaction(
            Trigger::Press {
                selector,
                key: key.into(),
            },
            reaction,
        );
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.world().history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.world().history.iter().any(|c| c.starts_with(method))
    }

    /// Number of recorded calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.world()
            .history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    /// How many times cookies were cleared
    #[must_use]
    pub fn cookies_cleared(&self) -> usize {
        self.world().cookies_cleared
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.world().closed
    }

    fn add_reaction(
        &self,
        trigger: Trigger,
        reaction: impl Fn(&mut MockWorld, &TabId) + Send + Sync + 'static,
    ) {
        self.inner
            .reactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Reaction {
                trigger,
                run: Arc::new(reaction),
            });
    }

    fn fire(&self, tab: &TabId, matches: impl Fn(&Trigger) -> bool) {
        let runs: Vec<ReactionFn> = self
            .inner
            .reactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| matches(&r.trigger))
            .map(|r| Arc::clone(&r.run))
            .collect();
        let mut world = self.world();
        for run in runs {
            run(&mut world, tab);
        }
    }

    fn read<R>(&self, tab: &TabId, f: impl FnOnce(&MockWorld) -> R) -> DriverResult<R> {
        let mut world = self.world();
        world.run_due();
        world.check(tab)?;
        Ok(f(&world))
    }

    async fn wait_actionable(
        &self,
        tab: &TabId,
        locator: &Locator,
        timeout: Duration,
    ) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let (count, ready) = self.read(tab, |w| w.actionable(tab, locator.selector()))?;
            if ready {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(if count == 0 {
                    DriverError::ElementNotFound {
                        locator: locator.to_string(),
                    }
                } else {
                    DriverError::Timeout {
                        ms: timeout.as_millis() as u64,
                    }
                });
            }
            tokio::time::sleep(ACTION_POLL).await;
        }
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn tabs(&self) -> DriverResult<Vec<TabId>> {
        let mut world = self.world();
        world.run_due();
        if world.closed {
            return Err(DriverError::Closed);
        }
        Ok(world.tabs.clone())
    }

    async fn navigate(
        &self,
        tab: &TabId,
        url: &str,
        timeout: Duration,
    ) -> DriverResult<NavigationResponse> {
        {
            let mut world = self.world();
            world.run_due();
            world.check(tab)?;
            world.history.push(format!("navigate:{url}"));
            let latency = world.navigation_latency;
            if latency > timeout {
                return Err(DriverError::NavigationError {
                    url: url.to_string(),
                    message: format!("timed out after {}ms", timeout.as_millis()),
                });
            }
            world.elements.remove(tab);
            world.urls.insert(tab.clone(), url.to_string());
            world.busy_for(tab, latency);
        }
        self.fire(tab, |t| matches!(t, Trigger::Navigate(p) if p.matches(url)));
        let landed = self.read(tab, |w| w.url(tab).unwrap_or_default().to_string())?;
        Ok(NavigationResponse::new(landed, Some(200)))
    }

    async fn current_url(&self, tab: &TabId) -> DriverResult<String> {
        self.read(tab, |w| w.url(tab).unwrap_or_default().to_string())
    }

    async fn click(&self, tab: &TabId, locator: &Locator, timeout: Duration) -> DriverResult<()> {
        self.wait_actionable(tab, locator, timeout).await?;
        let selector = locator.selector();
        self.world().history.push(format!("click:{selector}"));
        self.fire(tab, |t| matches!(t, Trigger::Click(s) if s == selector));
        Ok(())
    }

    async fn fill(
        &self,
        tab: &TabId,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.wait_actionable(tab, locator, timeout).await?;
        let selector = locator.selector();
        let mut world = self.world();
        world.history.push(format!("fill:{selector}"));
        if let Some(el) = world
            .elements
            .get_mut(tab)
            .and_then(|els| els.get_mut(selector))
        {
            el.value = Some(text.to_string());
        }
        Ok(())
    }

    async fn press(
        &self,
        tab: &TabId,
        locator: &Locator,
        key: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        self.wait_actionable(tab, locator, timeout).await?;
        let selector = locator.selector();
        self.world().history.push(format!("press:{key}:{selector}"));
        self.fire(tab, |t| {
            matches!(t, Trigger::Press { selector: s, key: k } if s == selector && k == key)
        });
        Ok(())
    }

    async fn count(&self, tab: &TabId, locator: &Locator) -> DriverResult<usize> {
        self.read(tab, |w| {
            w.element(tab, locator.selector()).map_or(0, |e| e.count)
        })
    }

    async fn is_visible(&self, tab: &TabId, locator: &Locator) -> DriverResult<bool> {
        self.read(tab, |w| w.actionable(tab, locator.selector()).1)
    }

    async fn text(&self, tab: &TabId, locator: &Locator) -> DriverResult<Option<String>> {
        self.read(tab, |w| {
            w.element(tab, locator.selector())
                .filter(|e| e.count > 0)
                .and_then(|e| e.text.clone())
        })
    }

    async fn activity(&self, tab: &TabId) -> DriverResult<ActivitySnapshot> {
        self.read(tab, |w| {
            let navigating = w
                .busy_until
                .get(tab)
                .is_some_and(|until| *until > Instant::now());
            ActivitySnapshot {
                document_ready: !navigating,
                navigating,
                resource_count: w.resources.get(tab).copied().unwrap_or(0),
            }
        })
    }

    async fn clear_cookies(&self) -> DriverResult<()> {
        let mut world = self.world();
        world.run_due();
        if world.closed {
            return Err(DriverError::Closed);
        }
        world.cookies_cleared += 1;
        world.history.push("clear_cookies".to_string());
        Ok(())
    }

    async fn screenshot(&self, tab: &TabId) -> DriverResult<Screenshot> {
        self.read(tab, |_| ())?;
        self.world().history.push(format!("screenshot:{tab}"));
        Ok(Screenshot::new(PNG_SIGNATURE.to_vec()))
    }

    async fn close(&self) -> DriverResult<()> {
        let mut world = self.world();
        world.history.push("close".to_string());
        world.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn button() -> Locator {
        Locator::role("button", "Искать", "search button")
    }

    mod world_tests {
        use super::*;

        #[test]
        fn test_new_world_has_blank_tab() {
            let world = MockWorld::new();
            assert_eq!(world.tabs().len(), 1);
            assert_eq!(world.url(&world.tabs()[0]), Some("about:blank"));
        }

        #[test]
        fn test_open_tab_ids_are_unique() {
            let mut world = MockWorld::new();
            let a = world.open_tab("https://a");
            let b = world.open_tab("https://b");
            assert_ne!(a, b);
            assert_eq!(world.tabs().len(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scheduled_effects_apply_in_order() {
            let mut world = MockWorld::new();
            let tab = world.tabs()[0].clone();
            let t1 = tab.clone();
            let t2 = tab.clone();
            world.schedule(Duration::from_millis(200), move |w| w.set_url(&t2, "second"));
            world.schedule(Duration::from_millis(100), move |w| w.set_url(&t1, "first"));
            world.run_due();
            assert_eq!(world.url(&tab), Some("about:blank"));

            tokio::time::advance(Duration::from_millis(150)).await;
            world.run_due();
            assert_eq!(world.url(&tab), Some("first"));

            tokio::time::advance(Duration::from_millis(100)).await;
            world.run_due();
            assert_eq!(world.url(&tab), Some("second"));
            assert_eq!(world.pending_effects(), 0);
        }
    }

    mod driver_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_navigate_clears_elements_and_runs_reactions() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            driver
                .world()
                .set_element(&tab, button().selector().clone(), MockElement::visible());
            driver.on_navigate(UrlPattern::glob("**/catalog"), |w, tab| {
                w.set_url(tab, "https://stepik.org/catalog?auth=login");
            });

            let response = driver
                .navigate(&tab, "https://stepik.org/catalog", Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(response.url, "https://stepik.org/catalog?auth=login");
            assert_eq!(driver.count(&tab, &button()).await.unwrap(), 0);
            assert!(driver.was_called("navigate:https://stepik.org/catalog"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_click_waits_for_visibility() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            {
                let mut world = driver.world();
                world.set_element(&tab, button().selector().clone(), MockElement::hidden());
                let t = tab.clone();
                world.schedule(Duration::from_millis(300), move |w| {
                    w.set_element(&t, button().selector().clone(), MockElement::visible());
                });
            }
            driver
                .click(&tab, &button(), Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(driver.call_count("click:"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_click_missing_element_is_not_found() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            let err = driver
                .click(&tab, &button(), Duration::from_millis(100))
                .await
                .unwrap_err();
            assert!(matches!(err, DriverError::ElementNotFound { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_click_hidden_element_times_out() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            driver
                .world()
                .set_element(&tab, button().selector().clone(), MockElement::hidden());
            let err = driver
                .click(&tab, &button(), Duration::from_millis(100))
                .await
                .unwrap_err();
            assert!(matches!(err, DriverError::Timeout { ms: 100 }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_records_value_and_press_fires() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            let input = Locator::placeholder("query", "search input");
            driver
                .world()
                .set_element(&tab, input.selector().clone(), MockElement::visible());
            driver.on_press(input.selector().clone(), "Enter", |w, tab| {
                w.set_url(tab, "https://stepik.org/catalog/search?q=rust");
            });

            driver
                .fill(&tab, &input, "rust", Duration::from_secs(1))
                .await
                .unwrap();
            driver
                .press(&tab, &input, "Enter", Duration::from_secs(1))
                .await
                .unwrap();

            let value = driver
                .world()
                .element(&tab, input.selector())
                .and_then(|e| e.value.clone());
            assert_eq!(value.as_deref(), Some("rust"));
            assert_eq!(
                driver.current_url(&tab).await.unwrap(),
                "https://stepik.org/catalog/search?q=rust"
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_activity_reflects_navigation_latency() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            driver
                .world()
                .set_navigation_latency(Duration::from_millis(400));
            driver
                .navigate(&tab, "https://stepik.org", Duration::from_secs(1))
                .await
                .unwrap();
            assert!(driver.activity(&tab).await.unwrap().navigating);
            tokio::time::advance(Duration::from_millis(500)).await;
            let snapshot = driver.activity(&tab).await.unwrap();
            assert!(snapshot.is_idle());
            assert_eq!(snapshot.resource_count, 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_navigation_slower_than_timeout_fails() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            driver.world().set_navigation_latency(Duration::from_secs(5));
            let err = driver
                .navigate(&tab, "https://stepik.org", Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, DriverError::NavigationError { .. }));
        }

        #[tokio::test]
        async fn test_closed_driver_rejects_calls() {
            let driver = MockDriver::new();
            let tab = driver.first_tab();
            driver.close().await.unwrap();
            assert!(driver.is_closed());
            assert!(matches!(
                driver.current_url(&tab).await,
                Err(DriverError::Closed)
            ));
            assert!(matches!(driver.tabs().await, Err(DriverError::Closed)));
        }

        #[tokio::test]
        async fn test_unknown_tab() {
            let driver = MockDriver::new();
            let err = driver
                .current_url(&TabId::new("nope"))
                .await
                .unwrap_err();
            assert!(matches!(err, DriverError::TabNotFound { .. }));
        }

        #[tokio::test]
        async fn test_clones_share_state() {
            let driver = MockDriver::new();
            let observer = driver.clone();
            driver.clear_cookies().await.unwrap();
            assert_eq!(observer.cookies_cleared(), 1);
            let shot = observer.screenshot(&observer.first_tab()).await.unwrap();
            assert!(shot.is_valid());
        }
    }
}

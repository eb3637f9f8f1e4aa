//! Chromium over CDP.
//!
//! Role and placeholder selectors have no CSS equivalent, so every action
//! first resolves its [`Locator`] in page JavaScript, stamps the match with
//! [`TARGET_ATTRIBUTE`] and then acts on `[data-stepwise-target="..."]`
//! through chromiumoxide's element API.

use super::{ActivitySnapshot, BrowserDriver, DriverConfig, NavigationResponse, Screenshot, TabId};
use crate::locator::{Locator, TARGET_ATTRIBUTE};
use crate::result::{DriverError, DriverResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const RESOLVE_POLL: Duration = Duration::from_millis(100);

const ACTIVITY_QUERY: &str = "(() => ({ \
    ready: document.readyState === 'complete', \
    resources: performance.getEntriesByType('resource').length \
}))()";

#[derive(Debug, Deserialize)]
struct RawActivity {
    ready: bool,
    resources: u64,
}

/// [`BrowserDriver`] backed by a launched Chromium
pub struct ChromiumDriver {
    browser: Mutex<Browser>,
    pages: Mutex<Vec<(TabId, Page)>>,
    handler: tokio::task::JoinHandle<()>,
    tokens: AtomicU64,
    closed: AtomicBool,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn cdp_error(err: impl std::fmt::Display) -> DriverError {
    DriverError::EvaluationError {
        message: err.to_string(),
    }
}

impl ChromiumDriver {
    /// Launch Chromium and open one blank tab
    pub async fn launch(config: DriverConfig) -> DriverResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .launch_timeout(config.launch_timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = config.executable_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(ref agent) = config.user_agent {
            builder = builder.arg(format!("--user-agent={agent}"));
        }
        let cdp_config = builder
            .build()
            .map_err(|message| DriverError::BrowserLaunchError { message })?;

        let (browser, mut handler) =
            Browser::launch(cdp_config)
                .await
                .map_err(|e| DriverError::BrowserLaunchError {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "CDP handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::BrowserLaunchError {
                message: e.to_string(),
            })?;
        let id = TabId::new(page.target_id().inner().clone());
        tracing::info!(tab = %id, headless = config.headless, "chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            pages: Mutex::new(vec![(id, page)]),
            handler,
            tokens: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    // Known tabs keep their position; newly discovered targets are appended.
    async fn refresh(&self) -> DriverResult<Vec<TabId>> {
        self.ensure_open()?;
        let discovered = self
            .browser
            .lock()
            .await
            .pages()
            .await
            .map_err(cdp_error)?;
        let mut pages = self.pages.lock().await;
        pages.retain(|(id, _)| {
            discovered
                .iter()
                .any(|p| p.target_id().inner() == id.as_str())
        });
        for page in discovered {
            let id = TabId::new(page.target_id().inner().clone());
            if !pages.iter().any(|(known, _)| *known == id) {
                tracing::debug!(tab = %id, "new tab discovered");
                pages.push((id, page));
            }
        }
        Ok(pages.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn page(&self, tab: &TabId) -> DriverResult<Page> {
        self.ensure_open()?;
        let known = {
            let pages = self.pages.lock().await;
            pages
                .iter()
                .find(|(id, _)| id == tab)
                .map(|(_, page)| page.clone())
        };
        if let Some(page) = known {
            return Ok(page);
        }
        self.refresh().await?;
        self.pages
            .lock()
            .await
            .iter()
            .find(|(id, _)| id == tab)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| DriverError::TabNotFound {
                tab: tab.to_string(),
            })
    }

    async fn eval<T: serde::de::DeserializeOwned>(page: &Page, expr: String) -> DriverResult<T> {
        page.evaluate(expr)
            .await
            .map_err(cdp_error)?
            .into_value()
            .map_err(cdp_error)
    }

    /// Poll until the locator's first match is visible, then stamp and fetch it
    async fn resolve(
        &self,
        tab: &TabId,
        locator: &Locator,
        action: &'static str,
        timeout: Duration,
    ) -> DriverResult<(Page, Element)> {
        let page = self.page(tab).await?;
        let selector = locator.selector();
        let deadline = Instant::now() + timeout;
        loop {
            let visible: bool = Self::eval(&page, selector.to_visible_query()).await?;
            if visible {
                break;
            }
            if Instant::now() >= deadline {
                let count: usize = Self::eval(&page, selector.to_count_query()).await?;
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
            tokio::time::sleep(RESOLVE_POLL).await;
        }

        let token = format!("t{}", self.tokens.fetch_add(1, Ordering::SeqCst));
        let marked: bool = Self::eval(&page, selector.to_mark_query(&token)).await?;
        if !marked {
            return Err(DriverError::ElementNotFound {
                locator: locator.to_string(),
            });
        }
        let element = page
            .find_element(format!("[{TARGET_ATTRIBUTE}=\"{token}\"]"))
            .await
            .map_err(|e| DriverError::ActionFailed {
                action,
                locator: locator.to_string(),
                message: e.to_string(),
            })?;
        Ok((page, element))
    }
}

fn action_error(
    action: &'static str,
    locator: &Locator,
    err: impl std::fmt::Display,
) -> DriverError {
    DriverError::ActionFailed {
        action,
        locator: locator.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn tabs(&self) -> DriverResult<Vec<TabId>> {
        self.refresh().await
    }

    async fn navigate(
        &self,
        tab: &TabId,
        url: &str,
        timeout: Duration,
    ) -> DriverResult<NavigationResponse> {
        let page = self.page(tab).await?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(DriverError::NavigationError {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(DriverError::NavigationError {
                    url: url.to_string(),
                    message: format!("no response within {}ms", timeout.as_millis()),
                })
            }
        }
        let landed = page
            .url()
            .await
            .map_err(cdp_error)?
            .unwrap_or_else(|| url.to_string());
        Ok(NavigationResponse::new(landed, None))
    }

    async fn current_url(&self, tab: &TabId) -> DriverResult<String> {
        let page = self.page(tab).await?;
        Ok(page
            .url()
            .await
            .map_err(cdp_error)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn click(&self, tab: &TabId, locator: &Locator, timeout: Duration) -> DriverResult<()> {
        let (_, element) = self.resolve(tab, locator, "click", timeout).await?;
        element
            .click()
            .await
            .map_err(|e| action_error("click", locator, e))?;
        Ok(())
    }

    async fn fill(
        &self,
        tab: &TabId,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        let (page, element) = self.resolve(tab, locator, "fill", timeout).await?;
        element
            .click()
            .await
            .map_err(|e| action_error("fill", locator, e))?;
        let clear = format!(
            "(() => {{ const el = document.querySelector('[{TARGET_ATTRIBUTE}]'); if (el) el.value = ''; return true; }})()"
        );
        let _: bool = Self::eval(&page, clear).await?;
        element
            .type_str(text)
            .await
            .map_err(|e| action_error("fill", locator, e))?;
        Ok(())
    }

    async fn press(
        &self,
        tab: &TabId,
        locator: &Locator,
        key: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        let (_, element) = self.resolve(tab, locator, "press", timeout).await?;
        element
            .focus()
            .await
            .map_err(|e| action_error("press", locator, e))?;
        element
            .press_key(key)
            .await
            .map_err(|e| action_error("press", locator, e))?;
        Ok(())
    }

    async fn count(&self, tab: &TabId, locator: &Locator) -> DriverResult<usize> {
        let page = self.page(tab).await?;
        Self::eval(&page, locator.selector().to_count_query()).await
    }

    async fn is_visible(&self, tab: &TabId, locator: &Locator) -> DriverResult<bool> {
        let page = self.page(tab).await?;
        Self::eval(&page, locator.selector().to_visible_query()).await
    }

    async fn text(&self, tab: &TabId, locator: &Locator) -> DriverResult<Option<String>> {
        let page = self.page(tab).await?;
        Self::eval(&page, locator.selector().to_text_query()).await
    }

    async fn activity(&self, tab: &TabId) -> DriverResult<ActivitySnapshot> {
        let page = self.page(tab).await?;
        let raw: RawActivity = Self::eval(&page, ACTIVITY_QUERY.to_string()).await?;
        Ok(ActivitySnapshot {
            document_ready: raw.ready,
            navigating: !raw.ready,
            resource_count: raw.resources,
        })
    }

    async fn clear_cookies(&self) -> DriverResult<()> {
        let tabs = self.refresh().await?;
        let Some(first) = tabs.first() else {
            return Err(DriverError::TabNotFound {
                tab: "<no open tab>".to_string(),
            });
        };
        let page = self.page(first).await?;
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn screenshot(&self, tab: &TabId) -> DriverResult<Screenshot> {
        let page = self.page(tab).await?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(true)
            .build();
        let shot = page
            .execute(params)
            .await
            .map_err(|e| DriverError::ScreenshotError {
                message: e.to_string(),
            })?;

        use base64::Engine;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| DriverError::ScreenshotError {
                message: e.to_string(),
            })?;
        Ok(Screenshot::new(data))
    }

    async fn close(&self) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        if let Err(err) = browser.wait().await {
            tracing::debug!(error = %err, "waiting for chromium to exit failed");
        }
        self.handler.abort();
        closed.map_err(|e| DriverError::BrowserLaunchError {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

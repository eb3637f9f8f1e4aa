//! Session ownership and tab handles.
//!
//! A [`Session`] exclusively owns one browser context for the duration of a
//! journey. [`Session::scope`] is the only sanctioned way to run a journey:
//! it closes the driver on success, on error and on panic, then re-raises
//! the panic. Page objects never hold the session, only a [`Tab`] borrowed
//! from it.

use crate::config::JourneyConfig;
use crate::driver::{BrowserDriver, TabId};
use crate::result::{DriverError, JourneyResult};
use crate::settle::SettleWatcher;
use crate::verify::StateVerifier;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Exclusive owner of one browser context
pub struct Session<D: BrowserDriver> {
    driver: D,
    config: JourneyConfig,
    origin: TabId,
    active: Mutex<TabId>,
    closed: AtomicBool,
    verifier: StateVerifier,
    settle: SettleWatcher,
}

impl<D: BrowserDriver> std::fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("origin", &self.origin)
            .field("active", &self.active_id())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<D: BrowserDriver> Session<D> {
    /// Take ownership of `driver`; the first open tab becomes the origin tab.
    ///
    /// The driver is closed before returning an error.
    pub async fn open(driver: D, config: JourneyConfig) -> JourneyResult<Self> {
        let first = match driver.tabs().await {
            Ok(tabs) => tabs.into_iter().next(),
            Err(err) => {
                close_quietly(&driver).await;
                return Err(err.into());
            }
        };
        let Some(origin) = first else {
            close_quietly(&driver).await;
            return Err(DriverError::TabNotFound {
                tab: "<no open tab>".to_string(),
            }
            .into());
        };

        tracing::debug!(tab = %origin, base_url = %config.base_url, "session opened");
        Ok(Self {
            verifier: StateVerifier::new(config.poll_interval),
            settle: SettleWatcher::new(),
            active: Mutex::new(origin.clone()),
            origin,
            driver,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Run `body` with a fresh session and close it on every exit path.
    ///
    /// A panic inside `body` is caught, the driver closed, and the panic
    /// resumed. When `body` succeeds but closing fails, the close error is
    /// returned.
    pub async fn scope<T, F, Fut>(driver: D, config: JourneyConfig, body: F) -> JourneyResult<T>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = JourneyResult<T>>,
    {
        let session = Arc::new(Self::open(driver, config).await?);
        let handle = Arc::clone(&session);
        let outcome = AssertUnwindSafe(async move { body(handle).await })
            .catch_unwind()
            .await;
        let closed = session.close().await;

        match outcome {
            Ok(Ok(value)) => closed.map(|()| value),
            Ok(Err(err)) => {
                if let Err(close_err) = closed {
                    tracing::warn!(error = %close_err, "session close failed after journey error");
                }
                Err(err)
            }
            Err(panic) => {
                tracing::error!("journey panicked; session closed before unwinding");
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Close the browser context; idempotent
    pub async fn close(&self) -> JourneyResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("closing session");
        self.driver.close().await?;
        Ok(())
    }

    /// Whether [`Session::close`] has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Journey configuration
    #[must_use]
    pub const fn config(&self) -> &JourneyConfig {
        &self.config
    }

    /// Shared state verifier
    #[must_use]
    pub const fn verifier(&self) -> &StateVerifier {
        &self.verifier
    }

    /// Shared settle watcher
    #[must_use]
    pub const fn settle_watcher(&self) -> &SettleWatcher {
        &self.settle
    }

    /// The tab the journey started in
    #[must_use]
    pub fn origin_tab(&self) -> Tab<'_, D> {
        self.tab(self.origin.clone())
    }

    /// The tab currently representing the journey
    #[must_use]
    pub fn active_tab(&self) -> Tab<'_, D> {
        self.tab(self.active_id())
    }

    /// Handle for an arbitrary tab id
    #[must_use]
    pub fn tab(&self, id: TabId) -> Tab<'_, D> {
        Tab { session: self, id }
    }

    /// Make `id` the active tab
    pub fn set_active(&self, id: TabId) {
        tracing::debug!(tab = %id, "active tab changed");
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }

    fn active_id(&self) -> TabId {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<D: BrowserDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if !self.is_closed() {
            tracing::warn!(
                tab = %self.origin,
                "session dropped without close; browser context may leak"
            );
        }
    }
}

async fn close_quietly<D: BrowserDriver>(driver: &D) {
    if let Err(err) = driver.close().await {
        tracing::warn!(error = %err, "failed to close driver");
    }
}

/// Borrowed handle to one tab of a session
pub struct Tab<'s, D: BrowserDriver> {
    pub(crate) session: &'s Session<D>,
    pub(crate) id: TabId,
}

impl<D: BrowserDriver> Clone for Tab<'_, D> {
    fn clone(&self) -> Self {
        Self {
            session: self.session,
            id: self.id.clone(),
        }
    }
}

impl<D: BrowserDriver> std::fmt::Debug for Tab<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Tab").field(&self.id).finish()
    }
}

impl<'s, D: BrowserDriver> Tab<'s, D> {
    /// Tab identifier
    #[must_use]
    pub const fn id(&self) -> &TabId {
        &self.id
    }

    /// Owning session
    #[must_use]
    pub const fn session(&self) -> &'s Session<D> {
        self.session
    }

    /// Journey configuration
    #[must_use]
    pub const fn config(&self) -> &'s JourneyConfig {
        &self.session.config
    }

    pub(crate) fn driver(&self) -> &'s dyn BrowserDriver {
        &self.session.driver
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use crate::result::JourneyError;

    #[tokio::test]
    async fn test_scope_closes_on_success() {
        let driver = MockDriver::new();
        let observer = driver.clone();
        let value = Session::scope(driver, JourneyConfig::default(), |session| async move {
            assert!(!session.is_closed());
            Ok(42)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert!(observer.is_closed());
        assert_eq!(observer.call_count("close"), 1);
    }

    #[tokio::test]
    async fn test_scope_closes_on_error() {
        let driver = MockDriver::new();
        let observer = driver.clone();
        let result: JourneyResult<()> =
            Session::scope(driver, JourneyConfig::default(), |_session| async move {
                Err(JourneyError::absent("no result cards", "about:blank"))
            })
            .await;
        assert!(result.unwrap_err().is_structural_absence());
        assert!(observer.is_closed());
    }

    #[tokio::test]
    async fn test_scope_closes_on_panic() {
        let driver = MockDriver::new();
        let observer = driver.clone();
        let caught = AssertUnwindSafe(Session::scope(
            driver,
            JourneyConfig::default(),
            |session| async move {
                if !session.is_closed() {
                    panic!("assertion inside journey");
                }
                Ok::<(), JourneyError>(())
            },
        ))
        .catch_unwind()
        .await;
        assert!(caught.is_err());
        assert!(observer.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let driver = MockDriver::new();
        let observer = driver.clone();
        let session = Session::open(driver, JourneyConfig::default()).await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(observer.call_count("close"), 1);
    }

    #[tokio::test]
    async fn test_active_tab_tracking() {
        let driver = MockDriver::new();
        let observer = driver.clone();
        let session = Session::open(driver, JourneyConfig::default()).await.unwrap();
        let origin = session.origin_tab().id().clone();
        assert_eq!(session.active_tab().id(), &origin);

        let second = observer.world().open_tab("https://stepik.org/course/1");
        session.set_active(second.clone());
        assert_eq!(session.active_tab().id(), &second);
        assert_eq!(session.origin_tab().id(), &origin);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_on_closed_driver_fails() {
        let driver = MockDriver::new();
        crate::driver::BrowserDriver::close(&driver).await.unwrap();
        let err = Session::open(driver, JourneyConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Driver(DriverError::Closed)));
    }
}

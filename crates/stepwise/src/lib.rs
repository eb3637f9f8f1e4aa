//! Stepwise: page-object journey engine for the Stepik catalog
//!
//! Drives a browser through sign-in, catalog search, the "free" filter and
//! opening the first course. Every transition is synchronized by bounded,
//! polled waits and verified with a primary signal plus a coarser fallback.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     STEPWISE Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Journey    │    │ Page       │    │ Browser    │            │
//! │   │ (report)   │───►│ Objects    │───►│ Driver     │            │
//! │   │            │    │ (typestate)│    │ (mock/CDP) │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │                                      │
//! │            ┌──────────────┼──────────────┐                       │
//! │            ▼              ▼              ▼                       │
//! │     ┌────────────┐ ┌────────────┐ ┌────────────┐                 │
//! │     │ Settle     │ │ State      │ │ Wait       │                 │
//! │     │ Watcher    │ │ Verifier   │ │ Conditions │                 │
//! │     └────────────┘ └────────────┘ └────────────┘                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stepwise::prelude::*;
//!
//! # async fn demo() -> JourneyResult<()> {
//! let config = JourneyConfig::default();
//! let journey = FreeCourseJourney::new("python", Credentials::from_env()?)?;
//! let driver = StepikSimulation::new().config(&config).build();
//! let outcome = journey.run_scoped(driver, config).await?;
//! println!("{}", outcome.report.to_json()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod actions;
pub mod config;
pub mod driver;
pub mod journey;
pub mod locator;
pub mod pages;
mod result;
pub mod session;
pub mod settle;
pub mod state;
pub mod url_pattern;
pub mod verify;
pub mod wait;

pub use actions::{preview, LOG_PREVIEW_CHARS};
pub use config::{Credentials, JourneyConfig, StepTimeouts, LOGIN_ENV, PASSWORD_ENV};
#[cfg(feature = "browser")]
pub use driver::ChromiumDriver;
pub use driver::{
    ActivitySnapshot, BrowserDriver, DriverConfig, MockDriver, MockElement, MockWorld,
    NavigationResponse, Screenshot, StaleAuth, StepikSimulation, TabId,
};
pub use journey::{FreeCourseJourney, JourneyOutcome, JourneyReport, StepRecord};
pub use locator::{Locator, Selector};
pub use pages::{
    CatalogPage, CoursePage, FilteredResultsPage, LoginOutcome, LoginPage, LoginRecovery,
    PageObject, SearchResultsPage,
};
pub use result::{DriverError, DriverResult, JourneyError, JourneyResult};
pub use session::{Session, Tab};
pub use settle::{SettleOutcome, SettleWatcher};
pub use state::JourneyState;
pub use url_pattern::UrlPattern;
pub use verify::{Diagnostic, StateVerifier, Verification};
pub use wait::{
    AllOf, AnyOf, Check, ElementIs, ElementState, NewTabOpened, Predicate, QueryParamEquals,
    UrlContains, UrlExcludes, UrlMatches, WaitCondition, WaitOutcome, WaitResult, Waiter,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::journey::*;
    pub use super::locator::*;
    pub use super::pages::*;
    pub use super::result::*;
    pub use super::session::*;
    pub use super::settle::*;
    pub use super::state::*;
    pub use super::url_pattern::*;
    pub use super::verify::*;
    pub use super::wait::*;
}

//! Journey states and the edges between them.
//!
//! Page objects enforce the happy path at compile time; this enum exists so
//! diagnostics and reports can name where a run was, and so a report can
//! reject an out-of-order record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named point in the sign-in -> search -> filter -> open journey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JourneyState {
    /// Nothing has happened yet
    Unauthenticated,
    /// Credentials submitted and the redirect was observed
    Authenticated,
    /// Clean catalog URL with the search field available
    CatalogReady,
    /// Search results route with the submitted term
    SearchResults,
    /// Free filter applied and results re-rendered
    FilterApplied,
    /// A course page is open (possibly in a new tab)
    CourseOpened,
    /// The run stopped; terminal
    Failed,
}

impl JourneyState {
    /// Stable identifier used in logs and reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::CatalogReady => "catalog-ready",
            Self::SearchResults => "search-results",
            Self::FilterApplied => "filter-applied",
            Self::CourseOpened => "course-opened",
            Self::Failed => "failed",
        }
    }

    /// Whether `next` may follow `self` within a single run.
    ///
    /// `CatalogReady -> CatalogReady` is the login correction revisit; it is
    /// the only self-edge.
    #[must_use]
    pub const fn can_advance_to(&self, next: Self) -> bool {
        if matches!(next, Self::Failed) {
            return !matches!(self, Self::Failed);
        }
        matches!(
            (self, next),
            (
                Self::Unauthenticated,
                Self::Authenticated | Self::CatalogReady
            ) | (Self::Authenticated, Self::CatalogReady)
                | (Self::CatalogReady, Self::CatalogReady | Self::SearchResults)
                | (Self::SearchResults, Self::FilterApplied)
                | (Self::FilterApplied, Self::CourseOpened)
        )
    }

    /// Terminal states accept no further transitions except into `Failed`
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::CourseOpened | Self::Failed)
    }
}

impl Default for JourneyState {
    fn default() -> Self {
        Self::Unauthenticated
    }
}

impl fmt::Display for JourneyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

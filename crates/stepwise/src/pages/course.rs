//! Course page reached from the filtered results.

use super::PageObject;
use crate::driver::BrowserDriver;
use crate::session::Tab;
use crate::state::JourneyState;
use crate::wait::{Check, UrlContains, UrlMatches, WaitCondition};

/// A course page; the end of the journey
pub struct CoursePage<'s, D: BrowserDriver> {
    tab: Tab<'s, D>,
}

impl<D: BrowserDriver> std::fmt::Debug for CoursePage<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoursePage").field("tab", &self.tab).finish()
    }
}

impl<'s, D: BrowserDriver> CoursePage<'s, D> {
    /// Bind to `tab` without verifying
    #[must_use]
    pub const fn new(tab: Tab<'s, D>) -> Self {
        Self { tab }
    }
}

impl<D: BrowserDriver> PageObject for CoursePage<'_, D> {
    type Driver = D;

    fn tab(&self) -> &Tab<'_, D> {
        &self.tab
    }

    fn page_name(&self) -> &'static str {
        "course"
    }

    fn state(&self) -> JourneyState {
        JourneyState::CourseOpened
    }

    fn loaded_condition(&self) -> WaitCondition {
        let timeouts = self.tab.config().timeouts;
        WaitCondition::new(Check::new(UrlMatches::glob("**/course/**"), timeouts.course_open))
            .with_fallback(Check::new(UrlContains::new("/course/"), timeouts.fallback))
    }
}

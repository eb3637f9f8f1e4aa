//! Locators for the catalog site.
//!
//! Plain constructors: each call builds a fresh value, nothing is cached, so
//! a locator can never go stale across navigations.

use crate::locator::Locator;

/// E-mail field of the login form
#[must_use]
pub fn email_field() -> Locator {
    Locator::role("textbox", "E-mail", "e-mail field")
}

/// Password field of the login form
#[must_use]
pub fn password_field() -> Locator {
    Locator::role("textbox", "Пароль", "password field")
}

/// Login form submit button
#[must_use]
pub fn submit_button() -> Locator {
    Locator::role("button", "Войти", "sign-in button")
}

/// Avatar in the navbar; present only for a signed-in user
#[must_use]
pub fn profile_avatar() -> Locator {
    Locator::css(
        r#"img.navbar__profile-img[alt="User avatar"]"#,
        "profile avatar",
    )
}

/// Catalog search field
#[must_use]
pub fn search_input() -> Locator {
    Locator::placeholder("Название курса, автор или предмет", "catalog search field")
}

/// Search submit button; absent in some layouts
#[must_use]
pub fn search_button() -> Locator {
    Locator::role("button", "Искать", "search button")
}

/// "Free" filter toggle on the results page
#[must_use]
pub fn free_filter() -> Locator {
    Locator::role("button", "Бесплатно", "free filter")
}

/// Result card link
#[must_use]
pub fn result_card() -> Locator {
    Locator::css("a.catalog-rich-card__link-wrapper", "result card")
}

//! Locator abstraction for element selection.
//!
//! Locators are plain values: a [`Selector`] plus a human description used
//! in logs and diagnostics. They hold no element handle, so a locator built
//! before a navigation is still valid after it. Every query is re-resolved
//! by the driver at the moment it runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute the browser driver stamps on the element it is about to act on
pub const TARGET_ATTRIBUTE: &str = "data-stepwise-target";

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., "a.catalog-rich-card__link-wrapper")
    Css(String),
    /// ARIA role with accessible name (substring, case-insensitive)
    Role {
        /// ARIA role, e.g. "button" or "textbox"
        role: String,
        /// Accessible name to match
        name: String,
    },
    /// Input placeholder text (exact)
    Placeholder(String),
    /// Visible text content (substring)
    Text(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    /// Create a placeholder selector
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder(text.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// JavaScript expression evaluating to an array of matching elements
    #[must_use]
    pub fn to_elements_query(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::Role { role, name } => {
                format!("({ROLE_MATCHER_JS})({role:?}, {name:?})")
            }
            Self::Placeholder(p) => format!(
                "Array.from(document.querySelectorAll('input, textarea')).filter(el => el.getAttribute('placeholder') === {p:?})"
            ),
            Self::Text(t) => format!(
                "Array.from(document.querySelectorAll('body *')).filter(el => el.children.length === 0 && (el.textContent || '').includes({t:?}))"
            ),
        }
    }

    /// Query for counting matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("({}).length", self.to_elements_query())
    }

    /// Query returning whether the first match is rendered and visible
    #[must_use]
    pub fn to_visible_query(&self) -> String {
        format!(
            "(() => {{ const el = ({})[0]; if (!el) return false; \
             const r = el.getBoundingClientRect(); const s = window.getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
            self.to_elements_query()
        )
    }

    /// Query returning the trimmed text content of the first match, or null
    #[must_use]
    pub fn to_text_query(&self) -> String {
        format!(
            "(() => {{ const el = ({})[0]; return el ? (el.textContent || '').trim() : null; }})()",
            self.to_elements_query()
        )
    }

    /// Query that stamps [`TARGET_ATTRIBUTE`] on the first match and reports success
    #[must_use]
    pub fn to_mark_query(&self, token: &str) -> String {
        format!(
            "(() => {{ document.querySelectorAll('[{TARGET_ATTRIBUTE}]').forEach(el => el.removeAttribute('{TARGET_ATTRIBUTE}')); \
             const el = ({})[0]; if (!el) return false; el.setAttribute('{TARGET_ATTRIBUTE}', {token:?}); return true; }})()",
            self.to_elements_query()
        )
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::Role { role, name } => write!(f, "role={role}[name={name:?}]"),
            Self::Placeholder(p) => write!(f, "placeholder={p:?}"),
            Self::Text(t) => write!(f, "text={t:?}"),
        }
    }
}

// Accessible-name matching for the handful of roles the journey uses.
const ROLE_MATCHER_JS: &str = r"(role, name) => {
  const want = name.trim().toLowerCase();
  const implicit = {
    button: 'button, input[type=submit], input[type=button], [role=button]',
    textbox: 'input:not([type]), input[type=text], input[type=email], input[type=password], input[type=search], input[type=tel], textarea, [role=textbox]',
    link: 'a[href], [role=link]',
    checkbox: 'input[type=checkbox], [role=checkbox]'
  };
  const css = implicit[role] || `[role=${role}]`;
  const label = el => {
    const aria = el.getAttribute('aria-label');
    if (aria) return aria;
    const by = el.getAttribute('aria-labelledby');
    if (by) { const l = document.getElementById(by); if (l) return l.textContent || ''; }
    if (el.id) { const l = document.querySelector(`label[for='${el.id}']`); if (l) return l.textContent || ''; }
    const wrap = el.closest('label');
    if (wrap) return wrap.textContent || '';
    if (el.tagName === 'INPUT' && (el.type === 'submit' || el.type === 'button')) return el.value || '';
    return el.getAttribute('placeholder') || el.textContent || '';
  };
  return Array.from(document.querySelectorAll(css)).filter(el => label(el).trim().toLowerCase().includes(want));
}";

/// A named, semantically described element query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    selector: Selector,
    description: String,
}

impl Locator {
    /// Create a locator from a selector and a description for logs
    #[must_use]
    pub fn new(selector: Selector, description: impl Into<String>) -> Self {
        Self {
            selector,
            description: description.into(),
        }
    }

    /// CSS shorthand
    #[must_use]
    pub fn css(selector: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Selector::css(selector), description)
    }

    /// Role shorthand
    #[must_use]
    pub fn role(
        role: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(Selector::role(role, name), description)
    }

    /// Placeholder shorthand
    #[must_use]
    pub fn placeholder(text: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Selector::placeholder(text), description)
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.selector)
    }
}

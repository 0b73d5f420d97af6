//! Browser automation backend interface
//!
//! The journey engine only talks to the browser through [`BrowserSession`];
//! [`SessionFactory`] allocates one session per run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// A CSS selector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    /// Element with the given `id`
    pub fn id(id: &str) -> Self {
        Self(format!("#{}", id))
    }

    /// Element with the given `name` attribute
    pub fn name(name: &str) -> Self {
        Self(format!("[name='{}']", name))
    }

    /// Element carrying the given class
    pub fn class(class: &str) -> Self {
        Self(format!(".{}", class))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Self::css(value)
    }
}

/// One live browser tab
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Opaque handle to a DOM element
    type Element: Clone + Send + Sync + 'static;

    async fn navigate(&self, url: &str) -> E2eResult<()>;

    /// All elements matching `selector`, in document order. No match is an
    /// empty list, not an error.
    async fn find_all(&self, selector: &Selector) -> E2eResult<Vec<Self::Element>>;

    /// Like [`find_all`](Self::find_all), restricted to descendants of `scope`
    async fn find_all_within(
        &self,
        scope: &Self::Element,
        selector: &Selector,
    ) -> E2eResult<Vec<Self::Element>>;

    async fn click(&self, element: &Self::Element) -> E2eResult<()>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> E2eResult<()>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> E2eResult<Option<String>>;

    async fn is_enabled(&self, element: &Self::Element) -> E2eResult<bool>;

    async fn is_displayed(&self, element: &Self::Element) -> E2eResult<bool>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> E2eResult<Vec<u8>>;

    /// End the session and release the browser
    async fn close(&self) -> E2eResult<()>;
}

/// Allocates a fresh [`BrowserSession`] for each run
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: BrowserSession + 'static;

    async fn open(&self) -> E2eResult<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_constructors() {
        assert_eq!(Selector::id("joinBTn").as_str(), "#joinBTn");
        assert_eq!(Selector::name("email-pass").as_str(), "[name='email-pass']");
        assert_eq!(Selector::class("btn-plus").as_str(), ".btn-plus");
        assert_eq!(Selector::from("li[data-index]").to_string(), "li[data-index]");
    }
}

//! Page capability
//!
//! The booking pipeline only talks to the browser through these traits, so the
//! engine can be swapped (or scripted in tests) without touching the scraping
//! and form-filling logic. [`chrome`] provides the chromiumoxide implementation.

pub mod chrome;
pub mod wait;

pub use chrome::{ChromeLauncher, ChromePage, ChromeSession};

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One browser tab
///
/// Selectors are CSS selectors. Headings, links, buttons and labels are
/// matched by their visible text: headings and non-exact lookups match on a
/// substring, `exact` lookups on the whole trimmed text.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the document to load
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Element is present in the DOM
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Element is present and rendered with a non-empty box
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn heading_visible(&self, name: &str) -> Result<bool>;

    async fn wait_for_heading(&self, name: &str, timeout: Duration) -> Result<()>;

    /// `href` of every element matching `selector`, empty ones skipped
    async fn hrefs(&self, selector: &str) -> Result<Vec<String>>;

    async fn link_href(&self, text: &str, exact: bool) -> Result<Option<String>>;

    async fn link_visible(&self, text: &str) -> Result<bool>;

    /// Click the link with this text and wait for the resulting navigation
    async fn click_link(&self, text: &str) -> Result<()>;

    /// Click the button with this text and wait for the resulting navigation
    async fn click_button(&self, text: &str) -> Result<()>;

    /// Click the element matching `selector` and wait for the resulting navigation
    async fn click_and_wait(&self, selector: &str) -> Result<()>;

    async fn set_value(&self, selector: &str, value: &str) -> Result<()>;

    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    async fn check(&self, selector: &str) -> Result<()>;

    /// Check every checkbox on the page, returning how many there were
    async fn check_all_checkboxes(&self) -> Result<usize>;

    /// Check the checkbox whose label text is exactly `label`
    async fn check_labelled_checkbox(&self, label: &str) -> Result<()>;

    async fn screenshot_full_page(&self) -> Result<Vec<u8>>;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// A running browser; pages opened from it are independent tabs
#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Page: PageDriver;

    async fn new_page(&self) -> Result<Self::Page>;

    /// Shut the browser down. Consumes the session so it happens once.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Starts a fresh browser session for every polling cycle
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self) -> Result<Self::Session>;
}

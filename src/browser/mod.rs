//! Browser Driver - one page, one interaction at a time
//!
//! `ChromeDriver` drives Chrome over the DevTools Protocol (chromiumoxide);
//! `ScriptedBrowser` replays canned results for tests. Callers go through
//! the `BrowserDriver` trait and usually through [`perform`], which routes
//! the navigate verb to `navigate` and everything else to `interact`.

mod chrome;
mod mock;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use chrome::ChromeDriver;
pub use mock::ScriptedBrowser;

/// Operations the driver knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserVerb {
    Navigate,
    Click,
    Type,
    Press,
    Extract,
    Links,
    Screenshot,
    Wait,
    Scroll,
}

impl BrowserVerb {
    pub const ALL: [BrowserVerb; 9] = [
        BrowserVerb::Navigate,
        BrowserVerb::Click,
        BrowserVerb::Type,
        BrowserVerb::Press,
        BrowserVerb::Extract,
        BrowserVerb::Links,
        BrowserVerb::Screenshot,
        BrowserVerb::Wait,
        BrowserVerb::Scroll,
    ];

    /// Parse a verb name, case-insensitive, accepting a few common synonyms
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "navigate" | "open" | "goto" | "visit" => Some(Self::Navigate),
            "click" => Some(Self::Click),
            "type" | "input" | "fill" => Some(Self::Type),
            "press" | "key" => Some(Self::Press),
            "extract" | "text" | "read" => Some(Self::Extract),
            "links" => Some(Self::Links),
            "screenshot" | "capture" => Some(Self::Screenshot),
            "wait" => Some(Self::Wait),
            "scroll" => Some(Self::Scroll),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Type => "type",
            Self::Press => "press",
            Self::Extract => "extract",
            Self::Links => "links",
            Self::Screenshot => "screenshot",
            Self::Wait => "wait",
            Self::Scroll => "scroll",
        }
    }

    /// Verbs whose target may be left empty
    pub fn target_optional(&self) -> bool {
        matches!(self, Self::Extract | Self::Links | Self::Screenshot | Self::Scroll)
    }
}

impl fmt::Display for BrowserVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the current page looks like after an operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub text_preview: String,
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.title.is_empty() { "(no title)" } else { self.title.as_str() };
        write!(f, "URL: {}\nTitle: {}", self.url, title)?;
        if !self.text_preview.is_empty() {
            write!(f, "\nContent preview:\n{}", self.text_preview)?;
        }
        Ok(())
    }
}

/// Errors raised by a browser driver
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Failed to start browser: {0}")]
    Launch(String),

    #[error("Browser session lost: {0}")]
    SessionLost(String),

    #[error("Element '{selector}' not found")]
    ElementNotFound { selector: String },

    #[error("Navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {timeout_ms}ms waiting for '{selector}'")]
    Timeout { selector: String, timeout_ms: u64 },

    #[error("Browser interaction failed: {0}")]
    Interaction(String),
}

impl DriverError {
    /// A lost or unlaunchable browser cannot serve further steps
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Launch(_) | DriverError::SessionLost(_))
    }
}

/// A single controllable browser page
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load `url` in the current page, launching the browser on first use
    async fn navigate(&self, url: &str) -> Result<PageState, DriverError>;

    /// Perform one non-navigation interaction and describe what happened
    async fn interact(&self, verb: BrowserVerb, selector: &str, value: Option<&str>) -> Result<String, DriverError>;

    /// State of the open page, or `None` when no browser has been started
    async fn current_state(&self) -> Result<Option<PageState>, DriverError>;

    /// Release the browser; later calls may start a fresh one
    async fn close(&self) -> Result<(), DriverError>;
}

/// Dispatch one browser step and return its result text
pub async fn perform(
    driver: &dyn BrowserDriver,
    verb: BrowserVerb,
    target: &str,
    value: Option<&str>,
) -> Result<String, DriverError> {
    match verb {
        BrowserVerb::Navigate => {
            let state = driver.navigate(&normalize_url(target)).await?;
            Ok(format!("Navigated to {}", state))
        }
        _ => driver.interact(verb, target, value).await,
    }
}

/// Add `https://` to bare hosts so `example.com` navigates somewhere useful
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") || url.starts_with("file:") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

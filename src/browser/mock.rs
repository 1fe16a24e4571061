//! ScriptedBrowser - replays canned driver results

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BrowserDriver, BrowserVerb, DriverError, PageState};

/// Browser double: each `navigate` or `interact` call takes the next queued
/// result. A navigation's `Ok` text becomes the page's preview text.
pub struct ScriptedBrowser {
    results: Mutex<VecDeque<Result<String, DriverError>>>,
    calls: Mutex<Vec<String>>,
    state: Mutex<Option<PageState>>,
    closed: Mutex<bool>,
}

impl ScriptedBrowser {
    pub fn new(results: impl IntoIterator<Item = Result<String, DriverError>>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }

    /// Calls seen so far, as `"<verb> <target>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.lock().map(|c| *c).unwrap_or(false)
    }

    fn next(&self, call: String) -> Result<String, DriverError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        self.results
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    async fn navigate(&self, url: &str) -> Result<PageState, DriverError> {
        let text = self.next(format!("navigate {}", url))?;
        let state = PageState {
            url: url.to_string(),
            title: String::new(),
            text_preview: text,
        };
        if let Ok(mut current) = self.state.lock() {
            *current = Some(state.clone());
        }
        Ok(state)
    }

    async fn interact(&self, verb: BrowserVerb, selector: &str, value: Option<&str>) -> Result<String, DriverError> {
        let call = match value {
            Some(v) => format!("{} {} | {}", verb, selector, v),
            None => format!("{} {}", verb, selector),
        };
        self.next(call)
    }

    async fn current_state(&self) -> Result<Option<PageState>, DriverError> {
        Ok(self.state.lock().ok().and_then(|s| s.clone()))
    }

    async fn close(&self) -> Result<(), DriverError> {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
        if let Ok(mut state) = self.state.lock() {
            *state = None;
        }
        Ok(())
    }
}

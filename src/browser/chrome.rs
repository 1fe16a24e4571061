//! ChromeDriver - Chrome over the DevTools Protocol via chromiumoxide
//!
//! The browser is started lazily on the first call (or attached to an
//! existing instance when `cdp_url` is set). The CDP handler runs in a
//! spawned task; when its event stream ends the session is flagged as lost
//! and the next call reports `DriverError::SessionLost`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BrowserDriver, BrowserVerb, DriverError, PageState};
use crate::config::BrowserConfig;
use crate::text::truncate;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const SETTLE_DELAY: Duration = Duration::from_millis(300);

const MAX_LINKS: usize = 50;

const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

struct ChromeSession {
    browser: Browser,
    page: Page,
    alive: Arc<AtomicBool>,
    /// false when attached over `cdp_url`; closing must not kill someone else's Chrome
    owned: bool,
    handler: JoinHandle<()>,
}

pub struct ChromeDriver {
    config: BrowserConfig,
    session: Mutex<Option<ChromeSession>>,
}

impl ChromeDriver {
    /// Create a driver; no browser process is started until first use
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.config.element_timeout_ms)
    }

    async fn start(&self) -> Result<ChromeSession, DriverError> {
        let (browser, mut handler, owned) = match &self.config.cdp_url {
            Some(url) => {
                log::info!("Connecting to Chrome at {}", url);
                let (browser, handler) = Browser::connect(url.clone())
                    .await
                    .map_err(|e| DriverError::Launch(format!("connect to {}: {}", url, e)))?;
                (browser, handler, false)
            }
            None => {
                log::info!("Launching Chrome (headless: {})", self.config.headless);
                let mut builder = LaunchConfig::builder()
                    .window_size(self.config.window_width, self.config.window_height)
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg("--disable-extensions");
                if self.config.no_sandbox {
                    builder = builder.no_sandbox();
                }
                if !self.config.headless {
                    builder = builder.with_head();
                }
                let launch = builder.build().map_err(DriverError::Launch)?;
                let (browser, handler) = Browser::launch(launch)
                    .await
                    .map_err(|e| DriverError::Launch(e.to_string()))?;
                (browser, handler, true)
            }
        };

        let alive = Arc::new(AtomicBool::new(true));
        let flag = alive.clone();
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
            flag.store(false, Ordering::SeqCst);
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("open page: {}", e)))?;

        log::info!("Browser ready");
        Ok(ChromeSession {
            browser,
            page,
            alive,
            owned,
            handler,
        })
    }

    /// The open page, starting the browser if needed
    async fn page(&self) -> Result<Page, DriverError> {
        let mut guard = self.session.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.alive.load(Ordering::SeqCst) {
                return Ok(session.page.clone());
            }
            if let Some(lost) = guard.take() {
                lost.handler.abort();
            }
            log::warn!("Browser session lost");
            return Err(DriverError::SessionLost("CDP connection closed".to_string()));
        }

        let session = self.start().await?;
        let page = session.page.clone();
        *guard = Some(session);
        Ok(page)
    }

    async fn state_of(&self, page: &Page) -> Result<PageState, DriverError> {
        let url = page.url().await.map_err(interaction)?.unwrap_or_default();
        let title = page.get_title().await.map_err(interaction)?.unwrap_or_default();
        let text = eval_string(page, BODY_TEXT_JS).await?;
        Ok(PageState {
            url,
            title,
            text_preview: truncate(text.trim(), self.config.max_text_chars),
        })
    }

    /// Poll for `selector` until the element timeout runs out
    async fn find(&self, page: &Page, selector: &str, timeout: Duration) -> Result<Element, DriverError> {
        let start = Instant::now();
        loop {
            match page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if is_session_loss(&e) => return Err(DriverError::SessionLost(e.to_string())),
                Err(_) if start.elapsed() >= timeout => {
                    return Err(DriverError::ElementNotFound {
                        selector: selector.to_string(),
                    });
                }
                Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    async fn click(&self, page: &Page, selector: &str) -> Result<String, DriverError> {
        let element = self.find(page, selector, self.element_timeout()).await?;
        element.click().await.map_err(interaction)?;
        tokio::time::sleep(SETTLE_DELAY).await;

        let url = page.url().await.map_err(interaction)?.unwrap_or_default();
        Ok(format!("Clicked '{}'. Current URL: {}", selector, url))
    }

    async fn type_into(&self, page: &Page, selector: &str, text: &str) -> Result<String, DriverError> {
        let element = self.find(page, selector, self.element_timeout()).await?;
        element.click().await.map_err(interaction)?;
        element.type_str(text).await.map_err(interaction)?;
        Ok(format!("Typed {} characters into '{}'", text.chars().count(), selector))
    }

    async fn press(&self, page: &Page, selector: &str, key: Option<&str>) -> Result<String, DriverError> {
        // `press Enter` targets the focused page; `press #q | Enter` targets an element
        let (selector, key) = match key {
            Some(key) => (selector, key),
            None => ("body", selector),
        };
        let element = self.find(page, selector, self.element_timeout()).await?;
        element.press_key(key).await.map_err(interaction)?;
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(format!("Pressed {} on '{}'", key, selector))
    }

    async fn extract(&self, page: &Page, selector: &str) -> Result<String, DriverError> {
        if selector.is_empty() || selector == "body" || selector == "page" {
            let text = eval_string(page, BODY_TEXT_JS).await?;
            return Ok(text.trim().to_string());
        }

        self.find(page, selector, self.element_timeout()).await?;
        let elements = page.find_elements(selector).await.map_err(interaction)?;

        let mut texts = Vec::with_capacity(elements.len());
        for element in &elements {
            if let Some(text) = element.inner_text().await.map_err(interaction)? {
                let text = text.trim();
                if !text.is_empty() {
                    texts.push(text.to_string());
                }
            }
        }

        Ok(format!(
            "Extracted text from {} element(s) matching '{}':\n{}",
            elements.len(),
            selector,
            texts.join("\n---\n")
        ))
    }

    async fn links(&self, page: &Page, scope: &str) -> Result<String, DriverError> {
        let query = if scope.is_empty() {
            "a[href]".to_string()
        } else {
            format!("{} a[href]", scope)
        };
        let literal = serde_json::to_string(&query).map_err(|e| DriverError::Interaction(e.to_string()))?;
        let js = format!(
            "Array.from(document.querySelectorAll({})).slice(0, {}).map(a => ((a.innerText || '').trim() || '(no text)') + ' -> ' + a.href).join('\\n')",
            literal, MAX_LINKS
        );

        let links = eval_string(page, &js).await?;
        if links.is_empty() {
            return Ok("No links found".to_string());
        }
        Ok(links)
    }

    async fn screenshot(&self, page: &Page, name: &str) -> Result<String, DriverError> {
        let bytes = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(false)
                    .build(),
            )
            .await
            .map_err(interaction)?;

        let name = if name.is_empty() {
            format!("screenshot_{}.png", chrono::Utc::now().format("%Y%m%d_%H%M%S"))
        } else {
            name.to_string()
        };
        let path = PathBuf::from(&name);
        let path = if path.is_absolute() {
            path
        } else {
            self.config.screenshot_dir.join(path)
        };

        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| DriverError::Interaction(format!("write {}: {}", path.display(), e)))?;
        log::info!("Saved screenshot ({} bytes) to {}", bytes.len(), path.display());
        Ok(format!("Screenshot saved to {}", path.display()))
    }

    async fn wait(&self, page: &Page, selector: &str, timeout_ms: Option<&str>) -> Result<String, DriverError> {
        let timeout_ms = timeout_ms
            .and_then(|t| t.trim().parse::<u64>().ok())
            .unwrap_or(self.config.element_timeout_ms);
        let start = Instant::now();

        match self.find(page, selector, Duration::from_millis(timeout_ms)).await {
            Ok(_) => Ok(format!(
                "Element '{}' found after {}ms",
                selector,
                start.elapsed().as_millis()
            )),
            Err(DriverError::ElementNotFound { selector }) => Err(DriverError::Timeout { selector, timeout_ms }),
            Err(e) => Err(e),
        }
    }

    async fn scroll(&self, page: &Page, target: &str) -> Result<String, DriverError> {
        let js = match target.to_lowercase().as_str() {
            "" | "down" => "window.scrollBy(0, window.innerHeight)",
            "up" => "window.scrollBy(0, -window.innerHeight)",
            "top" => "window.scrollTo(0, 0)",
            "bottom" => "window.scrollTo(0, document.body ? document.body.scrollHeight : 0)",
            _ => {
                let element = self.find(page, target, self.element_timeout()).await?;
                element.scroll_into_view().await.map_err(interaction)?;
                return Ok(format!("Scrolled '{}' into view", target));
            }
        };
        page.evaluate(js).await.map_err(interaction)?;
        Ok(format!("Scrolled {}", if target.is_empty() { "down" } else { target }))
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<PageState, DriverError> {
        let page = self.page().await?;
        log::info!("Navigating to {}", url);

        page.goto(url).await.map_err(|e| {
            if is_session_loss(&e) {
                DriverError::SessionLost(e.to_string())
            } else {
                DriverError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        self.state_of(&page).await
    }

    async fn interact(&self, verb: BrowserVerb, selector: &str, value: Option<&str>) -> Result<String, DriverError> {
        let page = self.page().await?;
        log::info!("Browser {} '{}'", verb, selector);

        match verb {
            BrowserVerb::Navigate => {
                page.goto(selector).await.map_err(interaction)?;
                Ok(self.state_of(&page).await?.to_string())
            }
            BrowserVerb::Click => self.click(&page, selector).await,
            BrowserVerb::Type => {
                let text = value.ok_or_else(|| {
                    DriverError::Interaction("type needs text: BROWSE: type <selector> | <text>".to_string())
                })?;
                self.type_into(&page, selector, text).await
            }
            BrowserVerb::Press => self.press(&page, selector, value).await,
            BrowserVerb::Extract => self.extract(&page, selector).await,
            BrowserVerb::Links => self.links(&page, selector).await,
            BrowserVerb::Screenshot => self.screenshot(&page, selector).await,
            BrowserVerb::Wait => self.wait(&page, selector, value).await,
            BrowserVerb::Scroll => self.scroll(&page, selector).await,
        }
    }

    async fn current_state(&self) -> Result<Option<PageState>, DriverError> {
        let page = {
            let guard = self.session.lock().await;
            match guard.as_ref() {
                None => return Ok(None),
                Some(session) if !session.alive.load(Ordering::SeqCst) => {
                    return Err(DriverError::SessionLost("CDP connection closed".to_string()));
                }
                Some(session) => session.page.clone(),
            }
        };
        self.state_of(&page).await.map(Some)
    }

    async fn close(&self) -> Result<(), DriverError> {
        let session = self.session.lock().await.take();
        let Some(mut session) = session else {
            return Ok(());
        };

        if session.owned {
            log::info!("Shutting down browser");
            if let Err(e) = session.browser.close().await {
                log::warn!("Error closing browser: {}", e);
            }
        } else if let Err(e) = session.page.close().await {
            log::warn!("Error closing page: {}", e);
        }
        session.handler.abort();
        Ok(())
    }
}

fn is_session_loss(err: &CdpError) -> bool {
    matches!(err, CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse)
}

/// Map a CDP error, promoting transport failures to a lost session
fn interaction(err: CdpError) -> DriverError {
    if is_session_loss(&err) {
        DriverError::SessionLost(err.to_string())
    } else {
        DriverError::Interaction(err.to_string())
    }
}

async fn eval_string(page: &Page, js: &str) -> Result<String, DriverError> {
    page.evaluate(js)
        .await
        .map_err(interaction)?
        .into_value::<String>()
        .map_err(|e| DriverError::Interaction(e.to_string()))
}

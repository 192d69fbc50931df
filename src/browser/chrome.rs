// spider_chrome re-exports chromiumoxide API
use super::wait::poll_until;
use super::{BrowserLauncher, BrowserSession, PageDriver};
use crate::config::{BrowserOptions, Timeouts};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared helpers prepended to every DOM query
const JS_PRELUDE: &str = r#"
    const visible = (el) => {
        if (!el) return false;
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
    };
    const text = (el) => (el.innerText || el.textContent || el.value || '')
        .replace(/\s+/g, ' ').trim();
    const matches = (el, name, exact) => exact
        ? text(el) === name
        : text(el).toLowerCase().includes(name.toLowerCase());
    const fire = (el) => {
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
    };
"#;

const HEADINGS: &str = r#"h1, h2, h3, h4, h5, h6, [role="heading"]"#;
const BUTTONS: &str =
    r#"button, input[type="submit"], input[type="button"], [role="button"]"#;

/// Quote a Rust string as a JavaScript string literal
fn js(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn script(body: &str) -> String {
    format!("(() => {{ {} {} }})()", JS_PRELUDE, body)
}

/// Launches a sandboxed Chrome per polling cycle
pub struct ChromeLauncher {
    options: BrowserOptions,
    timeouts: Timeouts,
}

impl ChromeLauncher {
    pub fn new(options: BrowserOptions, timeouts: Timeouts) -> Self {
        Self { options, timeouts }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession> {
        ChromeSession::launch(&self.options, self.timeouts).await
    }
}

pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    temp_dir: PathBuf,
    stealth_script: Option<String>,
    timeouts: Timeouts,
}

impl ChromeSession {
    pub async fn launch(options: &BrowserOptions, timeouts: Timeouts) -> Result<Self> {
        // Unique profile directory per session so cycles never share state
        let unique_id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let temp_dir = std::env::temp_dir().join(format!("termin-webdriver-{}", unique_id));
        std::fs::create_dir_all(&temp_dir).map_err(|e| {
            BookingError::LaunchFailed(format!("Failed to create temp directory: {}", e))
        })?;

        let mut config = if options.headless {
            BrowserConfig::builder()
        } else {
            BrowserConfig::builder().with_head()
        };

        config = config
            .user_data_dir(&temp_dir)
            .request_timeout(timeouts.navigation());

        if options.no_sandbox {
            config = config.arg("--no-sandbox").arg("--disable-setuid-sandbox");
        }

        if let Some(proxy) = &options.proxy_url {
            config = config.arg(format!("--proxy-server={}", proxy));
        }

        if let Some(path) = &options.chrome_path {
            config = config.chrome_executable(path);
        }

        let stealth_script = match &options.stealth_script {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(source) => Some(source),
                Err(e) => {
                    log::warn!(
                        "Reading stealth script {} failed, continuing without it: {}",
                        path.display(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let config = config.build().map_err(|e| {
            BookingError::LaunchFailed(format!(
                "{}. Install Chrome/Chromium or set browser.chrome_path in the config",
                e
            ))
        })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BookingError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while (handler.next().await).is_some() {
                // Drive browser events
            }
        });

        log::debug!("Chrome launched with profile {}", temp_dir.display());

        Ok(Self {
            browser,
            handler,
            temp_dir,
            stealth_script,
            timeouts,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    type Page = ChromePage;

    async fn new_page(&self) -> Result<ChromePage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BookingError::Other(format!("Failed to create page: {}", e)))?;

        if let Some(source) = &self.stealth_script {
            if let Err(e) = page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(source.clone()))
                .await
            {
                log::warn!("Applying stealth script failed, continuing without it: {}", e);
            }
        }

        Ok(ChromePage {
            page,
            timeouts: self.timeouts,
        })
    }

    async fn close(mut self) -> Result<()> {
        let result = self.browser.close().await;
        self.handler.abort();
        result.map_err(|e| BookingError::Other(format!("Failed to close browser: {}", e)))?;
        log::debug!("Chrome closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
        if self.temp_dir.exists() {
            let _ = std::fs::remove_dir_all(&self.temp_dir);
        }
    }
}

/// A Chrome tab
pub struct ChromePage {
    page: Page,
    timeouts: Timeouts,
}

impl ChromePage {
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(script(body).as_str())
            .await
            .map_err(|e| BookingError::Other(format!("Script execution failed: {}", e)))?;

        result
            .into_value()
            .map_err(|e| BookingError::Other(format!("Failed to deserialize result: {}", e)))
    }

    async fn wait_for_navigation(&self, what: &str) -> Result<()> {
        let timeout = self.timeouts.navigation();
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BookingError::NavigationFailed(format!("{}: {}", what, e))),
            Err(_) => Err(BookingError::Timeout {
                what: format!("navigation after {}", what),
                secs: timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        log::debug!("Navigating to {}", url);
        let timeout = self.timeouts.navigation();

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                // "oneshot canceled" means the browser connection is gone
                if e.to_string().contains("oneshot canceled") {
                    Err(BookingError::NavigationFailed(
                        "Browser connection lost".to_string(),
                    ))
                } else {
                    Err(BookingError::NavigationFailed(format!(
                        "Failed to navigate to {}: {}",
                        url, e
                    )))
                }
            }
            Err(_) => Err(BookingError::Timeout {
                what: format!("navigation to {}", url),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await?
            .ok_or_else(|| BookingError::NavigationFailed("Page has no URL".to_string()))
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        self.eval(&format!(
            "return document.querySelector({}) !== null;",
            js(selector)
        ))
        .await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.eval(&format!(
            "return visible(document.querySelector({}));",
            js(selector)
        ))
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        poll_until(selector, timeout, || self.is_visible(selector)).await
    }

    async fn heading_visible(&self, name: &str) -> Result<bool> {
        self.eval(&format!(
            "return Array.from(document.querySelectorAll({})).some(el => visible(el) && matches(el, {}, false));",
            js(HEADINGS),
            js(name)
        ))
        .await
    }

    async fn wait_for_heading(&self, name: &str, timeout: Duration) -> Result<()> {
        poll_until(&format!("heading '{}'", name), timeout, || {
            self.heading_visible(name)
        })
        .await
    }

    async fn hrefs(&self, selector: &str) -> Result<Vec<String>> {
        self.eval(&format!(
            "return Array.from(document.querySelectorAll({})).map(el => el.href).filter(href => !!href);",
            js(selector)
        ))
        .await
    }

    async fn link_href(&self, text: &str, exact: bool) -> Result<Option<String>> {
        self.eval(&format!(
            "const el = Array.from(document.querySelectorAll('a[href]')).find(el => matches(el, {}, {}));
             return el ? el.href : null;",
            js(text),
            exact
        ))
        .await
    }

    async fn link_visible(&self, text: &str) -> Result<bool> {
        self.eval(&format!(
            "return Array.from(document.querySelectorAll('a')).some(el => visible(el) && matches(el, {}, false));",
            js(text)
        ))
        .await
    }

    async fn click_link(&self, text: &str) -> Result<()> {
        let clicked: bool = self
            .eval(&format!(
                "const el = Array.from(document.querySelectorAll('a')).find(el => visible(el) && matches(el, {}, false));
                 if (!el) return false;
                 el.click();
                 return true;",
                js(text)
            ))
            .await?;
        if !clicked {
            return Err(BookingError::ElementNotFound(format!("link '{}'", text)));
        }
        self.wait_for_navigation(&format!("link '{}'", text)).await
    }

    async fn click_button(&self, text: &str) -> Result<()> {
        let clicked: bool = self
            .eval(&format!(
                "const el = Array.from(document.querySelectorAll({})).find(el => visible(el) && matches(el, {}, false));
                 if (!el) return false;
                 el.click();
                 return true;",
                js(BUTTONS),
                js(text)
            ))
            .await?;
        if !clicked {
            return Err(BookingError::ElementNotFound(format!("button '{}'", text)));
        }
        self.wait_for_navigation(&format!("button '{}'", text)).await
    }

    async fn click_and_wait(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_e| BookingError::ElementNotFound(selector.to_string()))?
            .click()
            .await
            .map_err(|e| BookingError::Other(format!("Click on {} failed: {}", selector, e)))?;
        self.wait_for_navigation(selector).await
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<()> {
        let found: bool = self
            .eval(&format!(
                "const el = document.querySelector({});
                 if (!el) return false;
                 el.value = {};
                 fire(el);
                 return true;",
                js(selector),
                js(value)
            ))
            .await?;
        if !found {
            return Err(BookingError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let found: bool = self
            .eval(&format!(
                "const el = document.querySelector({sel});
                 if (!el || !Array.from(el.options || []).some(o => o.value === {val})) return false;
                 el.value = {val};
                 fire(el);
                 return true;",
                sel = js(selector),
                val = js(value)
            ))
            .await?;
        if !found {
            return Err(BookingError::ElementNotFound(format!(
                "{} with option '{}'",
                selector, value
            )));
        }
        Ok(())
    }

    async fn check(&self, selector: &str) -> Result<()> {
        let found: bool = self
            .eval(&format!(
                "const el = document.querySelector({});
                 if (!el) return false;
                 if (!el.checked) el.click();
                 if (!el.checked) {{ el.checked = true; fire(el); }}
                 return true;",
                js(selector)
            ))
            .await?;
        if !found {
            return Err(BookingError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn check_all_checkboxes(&self) -> Result<usize> {
        // Click the first one for real so the form registers the selection
        self.eval(
            "const boxes = Array.from(document.querySelectorAll('input[type=\"checkbox\"]'));
             if (boxes.length > 0 && !boxes[0].checked) boxes[0].click();
             boxes.forEach(el => { el.checked = true; });
             return boxes.length;",
        )
        .await
    }

    async fn check_labelled_checkbox(&self, label: &str) -> Result<()> {
        let found: bool = self
            .eval(&format!(
                "const name = {};
                 const byLabel = Array.from(document.querySelectorAll('label'))
                     .filter(l => text(l) === name)
                     .map(l => l.control || l.querySelector('input[type=\"checkbox\"]'))
                     .find(el => el && el.type === 'checkbox');
                 const byAria = Array.from(document.querySelectorAll('input[type=\"checkbox\"]'))
                     .find(el => el.getAttribute('aria-label') === name);
                 const el = byLabel || byAria;
                 if (!el) return false;
                 if (!el.checked) el.click();
                 return true;",
                js(label)
            ))
            .await?;
        if !found {
            return Err(BookingError::ElementNotFound(format!(
                "checkbox '{}'",
                label
            )));
        }
        Ok(())
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(|e| BookingError::Other(format!("Failed to take screenshot: {}", e)))
    }

    async fn close(self) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| BookingError::Other(format!("Failed to close page: {}", e)))
    }
}

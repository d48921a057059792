//! Headless-browser session management for JS-rendered pages.
//!
//! Uses chromiumoxide (CDP). A [`BrowserSession`] owns one browser process
//! and one page for the duration of a crawl or batch; whoever opens it must
//! close it on every exit path. [`BrowserSlot`] defers the launch until a
//! fetch actually escalates, so static-only runs never pay for a browser.

use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
use anyhow::Result;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use super::http_client::USER_AGENT;

/// Session configuration, derived from [`crate::config::FetchSettings`].
#[derive(Debug, Clone)]
pub struct BrowserSessionConfig {
    /// Run without a visible window. Disable for debugging.
    pub headless: bool,
    /// Page navigation timeout.
    pub timeout: Duration,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A browser session lazily opened on first use. Callers own the slot and
/// must call [`BrowserSlot::close`] when done, success or failure.
pub struct BrowserSlot {
    config: BrowserSessionConfig,
    session: Option<BrowserSession>,
}

impl BrowserSlot {
    pub fn new(config: BrowserSessionConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// The live session, launching the browser on first call.
    pub async fn ensure(&mut self) -> Result<&BrowserSession> {
        if self.session.is_none() {
            self.session = Some(BrowserSession::open(&self.config).await?);
        }
        Ok(self.session.as_ref().expect("session just set"))
    }

    /// Tear the session down if one was opened. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

/// One owned browser process plus a single page used for navigation.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    timeout: Duration,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Find a Chrome/Chromium executable.
    fn find_chrome() -> Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set PATH accordingly."
        ))
    }

    /// Launch the browser and open a blank page.
    pub async fn open(config: &BrowserSessionConfig) -> Result<Self> {
        info!("Launching browser (headless={})", config.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-web-security")
            .arg("--blink-settings=imagesEnabled=false")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={USER_AGENT}"));

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        Ok(Self {
            browser,
            page,
            handler_task,
            timeout: config.timeout,
        })
    }

    /// Navigate the session page to a URL, bounded by the page timeout.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        tokio::time::timeout(self.timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow::anyhow!("Timeout navigating to {url}"))?
            .with_context(|| format!("Navigate to {url}"))?;
        Ok(())
    }

    /// Current rendered HTML of the session page.
    pub async fn current_html(&self) -> Result<String> {
        self.page.content().await.context("Read page content")
    }

    /// Focus an element and type text into it.
    pub async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("Find element {selector}"))?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    /// Click the first element matching a selector.
    pub async fn click(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("Find element {selector}"))?
            .click()
            .await?;
        Ok(())
    }

    /// Resolve a redirect link by opening it in a throwaway tab and reading
    /// the URL it lands on. The tab is closed on every path.
    pub async fn resolve_redirect(&self, url: &str) -> Result<String> {
        let tab = self
            .browser
            .new_page(url)
            .await
            .with_context(|| format!("Open tab for {url}"))?;

        let final_url = tokio::time::timeout(self.timeout, async {
            tab.wait_for_navigation().await?;
            tab.url().await
        })
        .await
        .map_err(|_| anyhow::anyhow!("Timeout resolving redirect for {url}"))
        .and_then(|r| r.context("Read tab url"));

        let _ = tab.close().await;

        match final_url? {
            Some(resolved) => Ok(resolved.to_string()),
            None => Ok(url.to_string()),
        }
    }

    /// Quit the browser. Errors during shutdown are logged, not propagated.
    pub async fn close(mut self) {
        if let Err(e) = self.page.close().await {
            debug!("Page close failed: {}", e);
        }
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        info!("Browser session closed");
    }
}

// Stub for when the browser feature is disabled: escalation is reported as
// a session error, which the fetch pipeline degrades to empty content.
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    _config: BrowserSessionConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub async fn open(_config: &BrowserSessionConfig) -> Result<Self> {
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }

    pub async fn navigate(&self, _url: &str) -> Result<()> {
        unreachable!("stub session cannot be opened")
    }

    pub async fn current_html(&self) -> Result<String> {
        unreachable!("stub session cannot be opened")
    }

    pub async fn type_into(&self, _selector: &str, _text: &str) -> Result<()> {
        unreachable!("stub session cannot be opened")
    }

    pub async fn click(&self, _selector: &str) -> Result<()> {
        unreachable!("stub session cannot be opened")
    }

    pub async fn resolve_redirect(&self, url: &str) -> Result<String> {
        Ok(url.to_string())
    }

    pub async fn close(self) {}
}

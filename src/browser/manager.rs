//! Browser session management with context rotation
//!
//! Owns a single Chromium process and hands out pages from a rotating
//! browsing context. A context is an isolated cookie/storage/fingerprint
//! sandbox: after a configurable number of requests the current context is
//! disposed and a fresh one is created under a newly randomized user
//! agent, resetting whatever tracking state the site accumulated.

use crate::browser::fingerprint::Fingerprint;
use crate::browser::{BrowserError, PageFetcher};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

/// Script applied to every new document to mask the automation flag
const WEBDRIVER_MASK: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Manages one Chromium process and a rotating browsing context
pub struct SessionManager {
    config: BrowserConfig,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    context: Option<BrowserContextId>,
    fingerprint: Option<Fingerprint>,
    request_count: u32,
}

impl SessionManager {
    /// Creates a new session manager; no browser is launched yet
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: None,
            handler_task: None,
            context: None,
            fingerprint: None,
            request_count: 0,
        }
    }

    /// Launches the browser process
    ///
    /// Applies the configured viewport and locale and disables the blink
    /// automation marker. Calling `start` on an already started manager is
    /// a no-op.
    pub async fn start(&mut self) -> Result<(), BrowserError> {
        if self.browser.is_some() {
            return Ok(());
        }

        let mut builder = ChromeConfig::builder()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .arg(format!("--lang={}", self.config.locale))
            .arg("--disable-blink-features=AutomationControlled");

        if !self.config.headless {
            builder = builder.with_head();
        }

        let chrome_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Drain CDP events for the lifetime of the browser
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(
            "Browser started (viewport {}x{}, locale {})",
            self.config.viewport_width,
            self.config.viewport_height,
            self.config.locale
        );

        self.browser = Some(browser);
        self.handler_task = Some(handler_task);
        Ok(())
    }

    /// Returns true once `start` has completed
    pub fn is_started(&self) -> bool {
        self.browser.is_some()
    }

    /// Number of requests served by the current context
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Records one outbound request against the rotation budget
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    /// Returns the current browsing context, creating or rotating as needed
    ///
    /// Rotation triggers once the request count reaches the configured
    /// threshold: the old context is disposed (cookies and storage go with
    /// it) and a fresh one is created with a freshly randomized user agent.
    /// Callers cannot observe whether rotation happened.
    pub async fn acquire_context(&mut self) -> Result<BrowserContextId, BrowserError> {
        let browser = self.browser.as_mut().ok_or(BrowserError::NotStarted)?;

        if self.context.is_some() && self.request_count >= self.config.rotation_threshold {
            if let Some(old) = self.context.take() {
                tracing::debug!(
                    "Rotating browsing context after {} requests",
                    self.request_count
                );
                if let Err(e) = browser.dispose_browser_context(old).await {
                    tracing::warn!("Failed to dispose browsing context: {}", e);
                }
            }
            self.fingerprint = None;
            self.request_count = 0;
        }

        if self.context.is_none() {
            let context = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await?;
            self.fingerprint = Some(Fingerprint::randomized(&self.config));
            self.request_count = 0;
            self.context = Some(context);
        }

        self.context.clone().ok_or(BrowserError::NotStarted)
    }

    /// Opens a new page inside the current browsing context
    ///
    /// The page carries the context's randomized user agent, the configured
    /// timezone, and the webdriver masking script.
    pub async fn new_page(&mut self) -> Result<Page, BrowserError> {
        let context = self.acquire_context().await?;
        let fingerprint = self
            .fingerprint
            .clone()
            .ok_or(BrowserError::NotStarted)?;
        let browser = self.browser.as_mut().ok_or(BrowserError::NotStarted)?;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context)
            .build()
            .map_err(BrowserError::Protocol)?;

        let page = browser.new_page(params).await?;

        page.set_user_agent(fingerprint.user_agent.as_str()).await?;

        let timezone = SetTimezoneOverrideParams::builder()
            .timezone_id(fingerprint.timezone.clone())
            .build()
            .map_err(BrowserError::Protocol)?;
        page.execute(timezone).await?;

        let mask = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(WEBDRIVER_MASK)
            .build()
            .map_err(BrowserError::Protocol)?;
        page.execute(mask).await?;

        Ok(page)
    }

    /// Tears down the context and the browser process
    ///
    /// Safe to call whether or not the manager was started, and always
    /// leaves the manager in the not-started state.
    pub async fn stop(&mut self) -> Result<(), BrowserError> {
        if let Some(browser) = self.browser.as_mut() {
            if let Some(context) = self.context.take() {
                if let Err(e) = browser.dispose_browser_context(context).await {
                    tracing::warn!("Failed to dispose browsing context on stop: {}", e);
                }
            }
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser cleanly: {}", e);
            }
        }
        self.browser = None;
        self.fingerprint = None;
        self.request_count = 0;

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        tracing::info!("Browser stopped");
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for SessionManager {
    /// Navigates to a URL in a fresh page and returns the rendered HTML
    async fn fetch_page(&mut self, url: &str) -> Result<String, BrowserError> {
        if !self.is_started() {
            return Err(BrowserError::NotStarted);
        }

        let page = self.new_page().await?;
        self.record_request();
        let result = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            page.content().await
        }
        .await;

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close page for {}: {}", url, e);
        }

        Ok(result?)
    }
}

// src/browser/chromium.rs

//! Chromium-backed browser session via `chromiumoxide`.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser::{PageFactory, PageHandle};
use crate::error::{AppError, Result};
use crate::models::ScraperConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A launched browser and its single shared context.
struct Session {
    browser: Browser,
    context: Option<BrowserContextId>,
    handler: JoinHandle<()>,
}

/// Owns the browser process, one browsing context, and page creation.
pub struct BrowserManager {
    config: ScraperConfig,
    session: Mutex<Option<Session>>,
}

impl BrowserManager {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Launch the browser and create the shared context. Idempotent.
    pub async fn start(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.config.user_agent))
            .request_timeout(self.config.navigation_timeout());
        if !self.config.headless {
            builder = builder.with_head();
        }

        let browser_cfg = builder
            .build()
            .map_err(|e| AppError::browser(format!("Browser config error: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(browser_cfg)
            .await
            .map_err(|e| AppError::browser(format!("Browser launch failed: {e}")))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let context = match browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("Could not create isolated browser context, using default: {e}");
                None
            }
        };

        log::info!(
            "Browser started (headless: {}, isolated context: {})",
            self.config.headless,
            context.is_some()
        );

        *guard = Some(Session {
            browser,
            context,
            handler,
        });
        Ok(())
    }

    /// Release context, browser and process in that order. Each step is
    /// best-effort; failures are logged and the next step still runs.
    pub async fn stop(&self) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };

        if let Some(context) = session.context.take() {
            if let Err(e) = session.browser.dispose_browser_context(context).await {
                log::warn!("Browser context close error: {e}");
            }
        }

        if let Err(e) = session.browser.close().await {
            log::warn!("Browser close error: {e}");
        }

        if let Err(e) = session.browser.wait().await {
            log::warn!("Browser process wait error: {e}");
        }
        session.handler.abort();

        log::info!("Browser stopped");
    }

    /// Whether `start` has run and `stop` has not.
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

#[async_trait]
impl PageFactory for BrowserManager {
    async fn create_page(&self) -> Result<Box<dyn PageHandle>> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(AppError::NotInitialized)?;

        let mut params = CreateTargetParams::builder().url("about:blank");
        if let Some(context) = &session.context {
            params = params.browser_context_id(context.clone());
        }
        let params = params.build().map_err(AppError::browser)?;

        let page = session
            .browser
            .new_page(params)
            .await
            .map_err(|e| AppError::browser(format!("Failed to open page: {e}")))?;

        Ok(Box::new(ChromiumPage { page }))
    }
}

/// A `chromiumoxide` tab.
struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn ready_state(&self) -> Result<String> {
        self.page
            .evaluate("document.readyState")
            .await
            .map_err(AppError::browser)?
            .into_value::<String>()
            .map_err(AppError::browser)
    }

    /// Poll until the current document has left the `loading` state,
    /// i.e. DOMContentLoaded has fired.
    async fn wait_dom_ready(&self) -> Result<()> {
        loop {
            match self.ready_state().await {
                Ok(state) if state != "loading" => return Ok(()),
                // Evaluation fails transiently while a navigation swaps documents.
                Ok(_) | Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let navigate = async {
            let response = self
                .page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| AppError::navigation(url, e))?;
            if let Some(error_text) = &response.result.error_text {
                return Err(AppError::navigation(url, error_text));
            }
            self.wait_dom_ready().await
        };

        tokio::time::timeout(timeout, navigate)
            .await
            .map_err(|_| AppError::navigation(url, format!("timed out after {timeout:?}")))?
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| AppError::browser(format!("Failed to get content: {e}")))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let poll = async {
            while self.page.find_element(selector).await.is_err() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        Ok(tokio::time::timeout(timeout, poll).await.is_ok())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map_err(|e| AppError::browser(format!("Click on '{selector}' failed: {e}")))?;

        // Let the click start its navigation before polling readiness.
        tokio::time::sleep(POLL_INTERVAL).await;
        tokio::time::timeout(timeout, self.wait_dom_ready())
            .await
            .map_err(|_| AppError::browser(format!("Page did not settle after clicking '{selector}'")))??;
        Ok(true)
    }

    async fn close(&self) {
        if let Err(e) = self.page.clone().close().await {
            log::debug!("Page close error (tab leak): {e}");
        }
    }
}

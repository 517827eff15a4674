// src/browser/mod.rs

//! Headless-browser session handling.
//!
//! The extractors never see the browser directly. They drive a
//! [`PageHandle`] obtained from a [`PageFactory`]; [`BrowserManager`] is the
//! Chromium-backed factory used in production.

mod chromium;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub use chromium::BrowserManager;

/// One open tab.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate and wait until the DOM content is loaded.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String>;

    /// Wait until `selector` matches. `Ok(false)` on timeout.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Click the first match of `selector` and wait for the resulting
    /// document. `Ok(false)` when nothing matches.
    async fn click(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Close the tab. Best-effort.
    async fn close(&self);
}

/// Source of pages sharing one browsing context.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn create_page(&self) -> Result<Box<dyn PageHandle>>;
}

/// Navigation retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_millis(30_000),
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &crate::models::ScraperConfig) -> Self {
        Self {
            attempts: config.navigation_retries.max(1),
            timeout: config.navigation_timeout(),
            backoff: config.retry_backoff(),
        }
    }
}

/// Navigate with a fixed backoff between attempts. The last attempt's error
/// is returned as `AppError::Navigation`.
pub async fn goto_with_retry(page: &dyn PageHandle, url: &str, policy: RetryPolicy) -> Result<()> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match page.goto(url, policy.timeout).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= attempts => {
                log::error!("Navigation to {url} failed after {attempts} attempts: {e}");
                return Err(match e {
                    AppError::Navigation { .. } => e,
                    other => AppError::navigation(url, other),
                });
            }
            Err(e) => {
                log::warn!("Attempt {attempt}/{attempts} to load {url} failed: {e}");
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::FakePage;
    use super::*;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            timeout: Duration::from_millis(10),
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let page = FakePage::default();
        page.failures_before_success.store(2, Ordering::SeqCst);

        goto_with_retry(&page, "https://example.com", fast_policy(3))
            .await
            .unwrap();
        assert_eq!(page.goto_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_navigation_error() {
        let page = FakePage::default();
        page.failures_before_success.store(5, Ordering::SeqCst);

        let err = goto_with_retry(&page, "https://example.com", fast_policy(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Navigation { ref url, .. } if url == "https://example.com"));
        assert_eq!(page.goto_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(policy.backoff, Duration::from_secs(2));
    }
}

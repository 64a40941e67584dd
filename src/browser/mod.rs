use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub mod chrome;

pub use chrome::{ChromeConfig, ChromeSession};

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("navigate to {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("element not visible: {selector}: {message}")]
    NotVisible { selector: String, message: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("decode script result: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("browser transport: {0}")]
    Transport(String),
}

/// The page-level capabilities the crawler needs from a rendering engine.
///
/// Every call blocks the caller until the page settles or the call fails.
/// `sleep` lives here so fakes can record waits instead of performing them.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    async fn sleep(&self, duration: Duration);
}

pub async fn evaluate_as<T: DeserializeOwned>(
    browser: &dyn Browser,
    script: &str,
) -> Result<T, BrowserError> {
    let value = browser.evaluate(script).await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn wait_visible_within(
    browser: &dyn Browser,
    selector: &str,
    limit: Duration,
) -> Result<(), BrowserError> {
    match tokio::time::timeout(limit, browser.wait_visible(selector)).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout {
            operation: "wait for visible element",
            elapsed: limit,
        }),
    }
}

/// Evaluates `probe` every `interval` until it returns `true`. Script errors
/// are retried since the page may still be swapping documents; the caller
/// bounds the wait.
pub async fn poll_until_true(
    browser: &dyn Browser,
    probe: &str,
    interval: Duration,
) -> Result<(), BrowserError> {
    loop {
        match browser.evaluate(probe).await {
            Ok(serde_json::Value::Bool(true)) => return Ok(()),
            Ok(_) => {}
            Err(BrowserError::Script(message)) => {
                tracing::debug!(%message, "readiness probe failed; polling again");
            }
            Err(err) => return Err(err),
        }
        tokio::time::sleep(interval).await;
    }
}

pub async fn page_title(browser: &dyn Browser) -> Result<String, BrowserError> {
    let title: Option<String> = evaluate_as(browser, "document.title").await?;
    Ok(title.unwrap_or_default().trim().to_owned())
}

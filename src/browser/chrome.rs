use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt as _;

use super::{Browser, BrowserError, poll_until_true};

const VISIBLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ChromeConfig {
    pub executable: Option<String>,
    pub headless: bool,
}

impl ChromeConfig {
    pub fn from_env() -> Self {
        let executable = std::env::var("CHAPTERWALK_CHROME_BIN").ok();
        let headless = !std::env::var("CHAPTERWALK_HEADFUL")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self {
            executable,
            headless,
        }
    }
}

/// One isolated Chrome process with a single tab. Each operation owns its
/// own session and closes it when done.
pub struct ChromeSession {
    browser: CdpBrowser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(config: &ChromeConfig) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = config.executable.as_deref() {
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder
            .build()
            .map_err(|err| anyhow::anyhow!("build chrome config: {err}"))?;

        tracing::debug!(
            executable = ?config.executable,
            headless = config.headless,
            "launch chrome"
        );
        let (browser, mut handler) = CdpBrowser::launch(browser_config)
            .await
            .context("launch chrome")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "chrome handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("open chrome tab")?;

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            tracing::debug!(?err, "close chrome");
        }
        if let Err(err) = self.browser.wait().await {
            tracing::debug!(?err, "wait for chrome exit");
        }
        self.handler_task.abort();
    }
}

#[async_trait]
impl Browser for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|err| BrowserError::Navigation {
                url: url.to_owned(),
                message: err.to_string(),
            })
    }

    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError> {
        let selector_json = serde_json::to_string(selector)?;
        let probe = format!(
            "(() => {{ const el = document.querySelector({selector_json}); \
             if (!el) return false; \
             const style = window.getComputedStyle(el); \
             return style.display !== 'none' && style.visibility !== 'hidden' \
               && el.getClientRects().length > 0; }})()"
        );
        poll_until_true(self, &probe, VISIBLE_POLL_INTERVAL)
            .await
            .map_err(|err| BrowserError::NotVisible {
                selector: selector.to_owned(),
                message: err.to_string(),
            })
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

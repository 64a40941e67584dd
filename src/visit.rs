use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::browser::{Browser, ChromeConfig, ChromeSession, evaluate_as, wait_visible_within};
use crate::cli::VisitArgs;
use crate::scripts;

const RENDER_SETTLE: Duration = Duration::from_secs(15);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);
const JAVASCRIPT_BANNER: &str = "You need to enable JavaScript to run this app.";

pub async fn run(args: VisitArgs) -> anyhow::Result<()> {
    let url = parse_page_url(&args.url)?;

    let session = ChromeSession::launch(&ChromeConfig::from_env())
        .await
        .context("start browser")?;
    let result =
        tokio::time::timeout(OPERATION_TIMEOUT, read_page(&session, &url, RENDER_SETTLE)).await;
    session.close().await;

    let text = result.map_err(|_| anyhow::anyhow!("visit timed out after {OPERATION_TIMEOUT:?}"))??;
    tracing::info!(%url, chars = text.chars().count(), "page read");
    println!("{text}");
    Ok(())
}

pub fn parse_page_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("parse url: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("unsupported url scheme: {}", url.scheme());
    }
    Ok(url)
}

/// Loads a client-rendered page and returns its visible body text.
pub async fn read_page(browser: &dyn Browser, url: &Url, settle: Duration) -> anyhow::Result<String> {
    browser
        .navigate(url.as_str())
        .await
        .with_context(|| format!("open {url}"))?;
    wait_visible_within(browser, "body", OPERATION_TIMEOUT)
        .await
        .context("wait for page body")?;
    browser.sleep(settle).await;

    let document_ready = evaluate_as::<Option<bool>>(browser, scripts::DOCUMENT_AVAILABLE)
        .await
        .context("probe document")?
        .unwrap_or(false);
    if !document_ready {
        tracing::warn!(%url, "document not available yet; waiting longer");
        browser.sleep(settle).await;
    }

    let text = evaluate_as::<Option<String>>(browser, scripts::VISIBLE_TEXT)
        .await
        .context("read visible text")?
        .unwrap_or_default();

    let alert = evaluate_as::<Option<String>>(browser, scripts::ALERT_TEXT)
        .await
        .unwrap_or_else(|err| {
            tracing::debug!(?err, "read alert text failed");
            None
        })
        .unwrap_or_default();
    if alert.contains("enable JavaScript") {
        tracing::warn!(%url, alert = %alert.trim(), "page asks for JavaScript");
    }

    Ok(strip_javascript_banner(&text))
}

fn strip_javascript_banner(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix(JAVASCRIPT_BANNER)
        .unwrap_or(text)
        .trim_start()
        .to_owned()
}

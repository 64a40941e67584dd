use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::browser::{Browser, ChromeConfig, ChromeSession, evaluate_as, wait_visible_within};
use crate::cli::SearchArgs;
use crate::formats::SearchHit;
use crate::scripts;

const SEARCH_ENDPOINT: &str = "https://www.baidu.com/s";
const RESULTS_SELECTOR: &str = "#content_left";
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn run(args: SearchArgs) -> anyhow::Result<()> {
    let url = search_url(&args.keyword)?;
    tracing::info!(keyword = %args.keyword, %url, "searching");

    let session = ChromeSession::launch(&ChromeConfig::from_env())
        .await
        .context("start browser")?;
    let result = tokio::time::timeout(OPERATION_TIMEOUT, search(&session, &url)).await;
    session.close().await;

    let hits = result
        .map_err(|_| anyhow::anyhow!("search timed out after {OPERATION_TIMEOUT:?}"))??;
    if hits.is_empty() {
        tracing::warn!(keyword = %args.keyword, "no search results");
    }
    print!("{}", render_hits(&hits));
    Ok(())
}

pub fn search_url(keyword: &str) -> anyhow::Result<Url> {
    Url::parse_with_params(SEARCH_ENDPOINT, &[("ie", "UTF-8"), ("wd", keyword)])
        .context("build search url")
}

pub async fn search(browser: &dyn Browser, url: &Url) -> anyhow::Result<Vec<SearchHit>> {
    browser
        .navigate(url.as_str())
        .await
        .context("open search page")?;
    wait_visible_within(browser, RESULTS_SELECTOR, OPERATION_TIMEOUT)
        .await
        .context("wait for search results")?;
    let hits: Vec<SearchHit> = evaluate_as(browser, scripts::SEARCH_RESULTS)
        .await
        .context("read search results")?;
    tracing::info!(results = hits.len(), "search results collected");
    Ok(hits
        .into_iter()
        .filter(|hit| !hit.href.trim().is_empty())
        .collect())
}

pub fn render_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("Title: {}\nLink: {}\n\n", hit.text.trim(), hit.href.trim()))
        .collect()
}

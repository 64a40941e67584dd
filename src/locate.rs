use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::browser::{Browser, BrowserError, evaluate_as};
use crate::formats::{Anchor, LinkSnapshot, LinkTarget, TocEntry};
use crate::scripts;
use crate::title::unit_ordinal;

const NEXT_KEYWORDS: &[&str] = &[
    "下一章",
    "下一页",
    "下节",
    "下一话",
    "下一回",
    "next chapter",
    "next page",
];

const PAGE_SIGNALS: &[&str] = &["下一页", "页", "next page"];

/// Used for the ordinal strategy when the title carries no unit number.
const NEXT_ORDINAL_SENTINEL: u32 = 1000;

const MIN_LIST_LINKS: usize = 5;

static EXCLUDED_LINKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "recommend", "related", "tuijian", "xiaoshuo", "book", "index", "目录", "首页", "home",
        "list",
    ]
    .iter()
    .map(|marker| Regex::new(&format!("(?i){marker}")).expect("valid regex"))
    .collect()
});

static UNIT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[第卷]([\d一二三四五六七八九十百千]+)[章节回集]").expect("valid regex")
});

static FIRST_UNIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^第1[章节回集]",
        r"^1[章节回集]",
        r"^第一章",
        r"^第一卷",
        r"^首章",
        r"^开始阅读",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

#[derive(Debug, thiserror::Error)]
#[error("harvest table of contents: {0}")]
pub struct HarvestError(#[from] pub BrowserError);

type Strategy = fn(&LinkSnapshot) -> Option<&Anchor>;

const NEXT_STRATEGIES: &[(&str, Strategy)] = &[
    ("keyword", next_by_keyword),
    ("next-token", next_by_id_or_class),
    ("ordinal", next_by_ordinal),
    ("rel-next", next_by_rel),
];

const FIRST_STRATEGIES: &[(&str, Strategy)] = &[
    ("first-unit-phrase", first_by_phrase),
    ("unit-marker", first_by_unit_marker),
    ("link-list", first_in_link_list),
];

pub async fn snapshot(browser: &dyn Browser) -> Result<LinkSnapshot, BrowserError> {
    evaluate_as(browser, scripts::LINK_SNAPSHOT).await
}

pub async fn find_next(
    browser: &dyn Browser,
    current_url: &Url,
) -> Result<Option<LinkTarget>, BrowserError> {
    let snapshot = snapshot(browser).await?;
    Ok(next_link(&snapshot, current_url))
}

pub async fn find_first(
    browser: &dyn Browser,
    toc_url: &Url,
) -> Result<Option<LinkTarget>, BrowserError> {
    let snapshot = snapshot(browser).await?;
    Ok(first_link(&snapshot, toc_url))
}

pub async fn harvest_all(
    browser: &dyn Browser,
    toc_url: &Url,
) -> Result<Vec<TocEntry>, HarvestError> {
    let snapshot = snapshot(browser).await?;
    Ok(toc_entries(&snapshot, toc_url))
}

/// Runs the next-unit strategies in order. A strategy whose pick points at
/// an excluded link yields to the next strategy.
pub fn next_link(snapshot: &LinkSnapshot, current_url: &Url) -> Option<LinkTarget> {
    run_strategies(NEXT_STRATEGIES, snapshot, current_url, true)
}

pub fn first_link(snapshot: &LinkSnapshot, toc_url: &Url) -> Option<LinkTarget> {
    run_strategies(FIRST_STRATEGIES, snapshot, toc_url, false)
}

/// Every anchor that looks like a unit link, in page order, first occurrence
/// of each URL only.
pub fn toc_entries(snapshot: &LinkSnapshot, toc_url: &Url) -> Vec<TocEntry> {
    let base = base_url(snapshot, toc_url);
    let mut seen = HashSet::new();
    snapshot
        .anchors
        .iter()
        .filter(|a| is_followable(a) && UNIT_MARKER.is_match(&a.text))
        .filter_map(|a| resolve(&base, &a.href).map(|url| (url, a.text.clone())))
        .filter(|(url, _)| seen.insert(url.to_string()))
        .map(|(url, text)| TocEntry {
            url: url.to_string(),
            text,
        })
        .collect()
}

pub fn is_page_signal(link_text: &str) -> bool {
    let lowered = link_text.to_lowercase();
    PAGE_SIGNALS.iter().any(|signal| lowered.contains(signal))
}

pub fn is_excluded(anchor: &Anchor) -> bool {
    EXCLUDED_LINKS
        .iter()
        .any(|pattern| pattern.is_match(&anchor.href) || pattern.is_match(&anchor.text))
}

fn run_strategies(
    strategies: &[(&str, Strategy)],
    snapshot: &LinkSnapshot,
    fallback_base: &Url,
    apply_exclusions: bool,
) -> Option<LinkTarget> {
    let base = base_url(snapshot, fallback_base);
    for (name, strategy) in strategies {
        let Some(anchor) = strategy(snapshot) else {
            continue;
        };
        if apply_exclusions && is_excluded(anchor) {
            tracing::debug!(strategy = name, href = %anchor.href, text = %anchor.text, "link excluded");
            continue;
        }
        let Some(url) = resolve(&base, &anchor.href) else {
            tracing::debug!(strategy = name, href = %anchor.href, "link does not resolve");
            continue;
        };
        tracing::debug!(strategy = name, %url, text = %anchor.text, "link located");
        return Some(LinkTarget {
            url,
            text: anchor.text.trim().to_owned(),
        });
    }
    None
}

/// Links are resolved against where the browser actually is, so redirects
/// between the requested URL and the rendered page do not break relative
/// hrefs.
fn base_url(snapshot: &LinkSnapshot, fallback: &Url) -> Url {
    Url::parse(&snapshot.page_url)
        .ok()
        .filter(is_http)
        .unwrap_or_else(|| fallback.clone())
}

fn resolve(base: &Url, href: &str) -> Option<Url> {
    let mut url = base.join(href.trim()).ok().filter(is_http)?;
    url.set_fragment(None);
    Some(url)
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn is_followable(anchor: &Anchor) -> bool {
    let href = anchor.href.trim();
    let lowered = href.to_ascii_lowercase();
    !href.is_empty()
        && !href.starts_with('#')
        && !lowered.starts_with("javascript:")
        && !lowered.starts_with("mailto:")
}

fn followable(snapshot: &LinkSnapshot) -> impl Iterator<Item = &Anchor> {
    snapshot.anchors.iter().filter(|a| is_followable(a))
}

fn next_by_keyword(snapshot: &LinkSnapshot) -> Option<&Anchor> {
    NEXT_KEYWORDS.iter().find_map(|keyword| {
        followable(snapshot).find(|a| a.text.to_lowercase().contains(keyword))
    })
}

fn next_by_id_or_class(snapshot: &LinkSnapshot) -> Option<&Anchor> {
    followable(snapshot).find(|a| {
        a.id.to_ascii_lowercase().contains("next") || a.class.to_ascii_lowercase().contains("next")
    })
}

fn next_by_ordinal(snapshot: &LinkSnapshot) -> Option<&Anchor> {
    let next = unit_ordinal(&snapshot.title)
        .map(|n| n.saturating_add(1))
        .unwrap_or(NEXT_ORDINAL_SENTINEL);
    let pattern = Regex::new(&format!(r"第{next}[章节回]|(?i:\bchapter\s*{next}\b)")).ok()?;
    followable(snapshot).find(|a| pattern.is_match(&a.text))
}

fn next_by_rel(snapshot: &LinkSnapshot) -> Option<&Anchor> {
    followable(snapshot).find(|a| {
        a.rel
            .split_whitespace()
            .any(|rel| rel.eq_ignore_ascii_case("next"))
    })
}

fn mentions_index(anchor: &Anchor) -> bool {
    anchor.text.contains("目录") || anchor.text.contains("index")
}

fn first_by_phrase(snapshot: &LinkSnapshot) -> Option<&Anchor> {
    FIRST_UNIT_PATTERNS.iter().find_map(|pattern| {
        followable(snapshot).find(|a| pattern.is_match(a.text.trim()) && !mentions_index(a))
    })
}

fn first_by_unit_marker(snapshot: &LinkSnapshot) -> Option<&Anchor> {
    followable(snapshot).find(|a| UNIT_MARKER.is_match(&a.text) && !mentions_index(a))
}

fn first_in_link_list(snapshot: &LinkSnapshot) -> Option<&Anchor> {
    snapshot
        .containers
        .iter()
        .find(|c| c.link_count > MIN_LIST_LINKS)
        .map(|c| &c.first)
        .filter(|a| is_followable(a))
}

use std::sync::LazyLock;

use regex::Regex;

use crate::formats::TitleSnapshot;

static PAGINATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[(（]\d+\s*/\s*\d+[)）]",
        r"第\d+页",
        r"分页\d+",
        r"\[\d+\s*/\s*\d+\]",
        r"(?i)[(\[]?\bpage\s*\d+(?:\s*(?:of|/)\s*\d+)?[)\]]?",
        r"\d+/\d+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static CHAPTER_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"第\d+[章节回]").expect("valid regex"));

static UNIT_ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第(\d+)[章节回]|(?i:\bchapter\s*(\d+))").expect("valid regex")
});

/// Strips pagination markers so that every page of one unit maps to the
/// same key. Applied until nothing changes, which makes it idempotent.
pub fn normalize(raw_title: &str) -> String {
    let mut current = collapse_whitespace(raw_title);
    loop {
        let mut next = current.clone();
        for pattern in PAGINATION_PATTERNS.iter() {
            next = pattern.replace_all(&next, "").into_owned();
        }
        let next = collapse_whitespace(&next);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Parses the unit number out of titles such as `第12章 …` or `Chapter 12`.
pub fn unit_ordinal(title: &str) -> Option<u32> {
    let captures = UNIT_ORDINAL.captures(title)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Picks the display title of a unit page: a chapter-looking heading, then
/// the first chapter line of the body, then the document title, then a
/// synthetic title built from the unit index.
pub fn refine_title(snapshot: &TitleSnapshot, unit_index: usize) -> String {
    if let Some(heading) = snapshot
        .headings
        .iter()
        .find(|h| CHAPTER_HEADING.is_match(h))
    {
        return collapse_whitespace(heading);
    }
    if let Some(body_title) = snapshot.body_title.as_deref()
        && !body_title.trim().is_empty()
    {
        return collapse_whitespace(body_title);
    }
    if !snapshot.document_title.trim().is_empty() {
        return collapse_whitespace(&snapshot.document_title);
    }
    fallback_title(unit_index)
}

pub fn fallback_title(unit_index: usize) -> String {
    format!("第{unit_index}章")
}

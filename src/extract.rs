use std::sync::LazyLock;

use regex::Regex;

use crate::browser::{Browser, BrowserError, evaluate_as};
use crate::formats::{ContentCandidate, ContentSnapshot};
use crate::scripts;

/// Blocks at or below this many characters are never chosen as content.
pub const MIN_CONTENT_CHARS: usize = 300;

const TRAILING_SCAN_LINES: usize = 10;

const TRAILING_NAVIGATION: &[&str] = &[
    "上一章",
    "上一页",
    "目录",
    "目 录",
    "下一章",
    "下一页",
    "点击下一页继续阅读",
    "小说网更新速度全网最快。",
];

static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
#[error("extract content: {0}")]
pub struct ExtractionError(#[from] pub BrowserError);

type Rejection = fn(&ContentCandidate) -> bool;

/// Checked in order; the first match rejects the candidate.
const REJECTIONS: &[(&str, Rejection)] = &[
    ("hidden", is_hidden),
    ("excluded", is_structural_noise),
    ("metadata", is_metadata_block),
    ("navigation", is_navigation_cluster),
    ("promotion", is_promotion_cluster),
];

pub async fn extract(browser: &dyn Browser) -> Result<String, ExtractionError> {
    let snapshot: ContentSnapshot = evaluate_as(browser, scripts::CONTENT_SNAPSHOT).await?;
    tracing::debug!(
        candidates = snapshot.candidates.len(),
        "content snapshot"
    );
    Ok(select_content(&snapshot))
}

pub fn select_content(snapshot: &ContentSnapshot) -> String {
    let raw = best_candidate(&snapshot.candidates)
        .map(|candidate| candidate.rendered.as_str())
        .filter(|rendered| !rendered.trim().is_empty())
        .unwrap_or(&snapshot.body_text);
    clean_text(raw)
}

pub fn rejection(candidate: &ContentCandidate) -> Option<&'static str> {
    REJECTIONS
        .iter()
        .find(|(_, rejects)| rejects(candidate))
        .map(|(name, _)| *name)
}

/// Highest characters-per-line ratio among acceptable blocks longer than
/// [`MIN_CONTENT_CHARS`]. Ties go to the earlier block.
pub fn best_candidate(candidates: &[ContentCandidate]) -> Option<&ContentCandidate> {
    let mut best: Option<(&ContentCandidate, f64)> = None;
    for candidate in candidates {
        if candidate.text.chars().count() <= MIN_CONTENT_CHARS {
            continue;
        }
        if let Some(reason) = rejection(candidate) {
            tracing::trace!(tag = %candidate.tag, reason, "content candidate rejected");
            continue;
        }
        let score = prose_density(&candidate.text);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

pub fn prose_density(text: &str) -> f64 {
    let line_breaks = text.matches('\n').count();
    text.chars().count() as f64 / (line_breaks + 1) as f64
}

fn is_hidden(candidate: &ContentCandidate) -> bool {
    candidate.hidden
}

fn is_structural_noise(candidate: &ContentCandidate) -> bool {
    candidate.excluded
}

fn is_metadata_block(candidate: &ContentCandidate) -> bool {
    ["作者：", "分类：", "更新：", "字数："]
        .iter()
        .all(|marker| candidate.text.contains(marker))
}

fn is_navigation_cluster(candidate: &ContentCandidate) -> bool {
    let text = &candidate.text;
    (text.contains("上一章") || text.contains("上一页"))
        && text.contains("目录")
        && (text.contains("下一章") || text.contains("下一页"))
}

fn is_promotion_cluster(candidate: &ContentCandidate) -> bool {
    candidate.text.contains("投推荐票") || candidate.text.contains("加入书签")
}

/// Collapses whitespace inside lines, keeps line breaks as paragraph breaks
/// and drops trailing navigation lines.
pub fn clean_text(raw: &str) -> String {
    let collapsed = INLINE_WHITESPACE.replace_all(raw.trim(), " ");
    trim_trailing_navigation(&collapsed)
}

/// Drops navigation lines from the end, looking at no more than the last ten
/// lines and stopping at the first line that is not navigation.
pub fn trim_trailing_navigation(text: &str) -> String {
    let lines = text.split('\n').collect::<Vec<_>>();
    let floor = lines.len().saturating_sub(TRAILING_SCAN_LINES);
    let mut keep = lines.len();
    while keep > floor && is_navigation_line(lines[keep - 1]) {
        keep -= 1;
    }
    lines[..keep].join("\n")
}

fn is_navigation_line(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || TRAILING_NAVIGATION.iter().any(|phrase| line.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> ContentCandidate {
        ContentCandidate {
            tag: "div".to_owned(),
            text: text.to_owned(),
            rendered: text.to_owned(),
            hidden: false,
            excluded: false,
        }
    }

    fn prose(sentences: usize) -> String {
        "夜色渐深，城中灯火一盏盏熄灭，只有远处的钟楼还亮着。".repeat(sentences)
    }

    #[test]
    fn metadata_block_loses_to_prose() {
        let metadata = format!(
            "作者：某人 分类：玄幻 更新：2024-01-01 字数：100万\n{}",
            prose(20)
        );
        let story = prose(14);
        let snapshot = ContentSnapshot {
            candidates: vec![block(&metadata), block(&story)],
            body_text: "fallback".to_owned(),
        };

        assert_eq!(rejection(&snapshot.candidates[0]), Some("metadata"));
        assert_eq!(select_content(&snapshot), story);
    }

    #[test]
    fn navigation_and_promotion_clusters_are_rejected() {
        let nav = block(&format!("上一页 目录 下一章 {}", prose(20)));
        let promo = block(&format!("{} 投推荐票", prose(20)));
        let partial_nav = block(&format!("上一章 下一章 {}", prose(20)));

        assert_eq!(rejection(&nav), Some("navigation"));
        assert_eq!(rejection(&promo), Some("promotion"));
        assert_eq!(rejection(&partial_nav), None);
    }

    #[test]
    fn hidden_and_excluded_blocks_are_rejected() {
        let mut hidden = block(&prose(20));
        hidden.hidden = true;
        let mut excluded = block(&prose(20));
        excluded.excluded = true;

        assert_eq!(best_candidate(&[hidden, excluded]).map(|c| c.tag.as_str()), None);
    }

    #[test]
    fn dense_prose_beats_link_lists() {
        let links = (1..=80)
            .map(|n| format!("第{n}章 标题"))
            .collect::<Vec<_>>()
            .join("\n");
        let story = format!("{}\n{}", prose(10), prose(10));
        let candidates = vec![block(&links), block(&story)];

        let best = best_candidate(&candidates).map(|c| c.text.clone());
        assert_eq!(best, Some(story));
    }

    #[test]
    fn short_blocks_fall_back_to_body_text() {
        let snapshot = ContentSnapshot {
            candidates: vec![block("太短了")],
            body_text: "正文  第一段\n第二段\n下一章".to_owned(),
        };
        assert_eq!(select_content(&snapshot), "正文 第一段\n第二段");
    }

    #[test]
    fn trailing_navigation_lines_are_dropped() {
        let text = "第一段\n第二段\n正文结束\n下一章\n目录";
        assert_eq!(trim_trailing_navigation(text), "第一段\n第二段\n正文结束");
    }

    #[test]
    fn trimming_stops_at_first_prose_line() {
        let text = "回到目录前的一句话\n正文\n上一页\n下一页";
        assert_eq!(trim_trailing_navigation(text), "回到目录前的一句话\n正文");
    }

    #[test]
    fn trimming_only_scans_last_ten_lines() {
        let mut lines = vec!["正文"];
        lines.extend(std::iter::repeat_n("下一章", 12));
        let text = lines.join("\n");

        let trimmed = trim_trailing_navigation(&text);
        assert_eq!(trimmed.lines().count(), 3);
        assert!(trimmed.starts_with("正文\n下一章"));
    }

    #[test]
    fn inline_whitespace_collapses_but_newlines_stay() {
        assert_eq!(clean_text("  甲 \t 乙\n丙   丁  "), "甲 乙\n丙 丁");
    }
}

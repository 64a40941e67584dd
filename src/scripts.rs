//! Scripts injected into the rendered page.
//!
//! They only collect data; every decision is made on the Rust side over the
//! decoded records in [`crate::formats`].

use std::time::Duration;

/// Visible-text candidates for the main content block.
///
/// Blocks of 300 characters or fewer are not reported at all; the extractor
/// applies the same bound again (`extract::MIN_CONTENT_CHARS`).
pub const CONTENT_SNAPSHOT: &str = r#"
(() => {
  const EXCLUDED = 'script, style, .confirm-dialog, nav, footer, header, aside';
  const isHidden = (el) => {
    const style = window.getComputedStyle(el);
    return style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0';
  };
  const renderedText = (root) => {
    const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT, null, false);
    const parts = [];
    while (walker.nextNode()) {
      const parent = walker.currentNode.parentElement;
      if (!parent || parent.closest(EXCLUDED) || isHidden(parent)) continue;
      const value = walker.currentNode.nodeValue.trim();
      if (value) parts.push(value);
    }
    return parts.join('\n');
  };
  const candidates = [];
  for (const el of document.querySelectorAll('div, article, section, span, pre, li, blockquote, main')) {
    const text = (el.textContent || '').trim();
    if (text.length <= 300) continue;
    const excluded = el.matches(EXCLUDED);
    const hidden = isHidden(el);
    candidates.push({
      tag: el.tagName.toLowerCase(),
      text,
      hidden,
      excluded,
      rendered: hidden || excluded ? '' : renderedText(el),
    });
  }
  return { candidates, body_text: document.body ? renderedText(document.body) : '' };
})()
"#;

/// Anchors, list containers and the current location.
pub const LINK_SNAPSHOT: &str = r#"
(() => {
  const describe = (a) => ({
    href: a.getAttribute('href') ? a.href : '',
    text: (a.textContent || '').trim(),
    id: a.id || '',
    class: typeof a.className === 'string' ? a.className : '',
    rel: a.getAttribute('rel') || '',
  });
  const containers = [];
  for (const container of document.querySelectorAll('.list, .chapter-list, .novel-list, ul, ol')) {
    const links = container.querySelectorAll('a');
    if (links.length === 0) continue;
    containers.push({ link_count: links.length, first: describe(links[0]) });
  }
  return {
    page_url: location.href,
    title: document.title || '',
    anchors: Array.from(document.querySelectorAll('a')).map(describe),
    containers,
  };
})()
"#;

/// Chapter-looking headings plus the first chapter line of the body text.
pub const TITLE_SNAPSHOT: &str = r#"
(() => {
  const headings = Array.from(document.querySelectorAll('h1, h2, h3'))
    .map((el) => (el.textContent || '').trim())
    .filter((text) => text.length > 0);
  const body = document.body ? (document.body.textContent || '') : '';
  const match = body.match(/第\d+[章节回][^\n]+/);
  return {
    document_title: document.title || '',
    headings,
    body_title: match ? match[0].trim() : null,
  };
})()
"#;

/// Visible body text for single-page visits.
pub const VISIBLE_TEXT: &str = r#"
(() => {
  const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT, null, false);
  let text = '';
  while (walker.nextNode()) {
    const parent = walker.currentNode.parentElement;
    if (!parent || parent.matches('script, style, .confirm-dialog')) continue;
    const style = window.getComputedStyle(parent);
    if (style.display === 'none' || style.visibility === 'hidden') continue;
    text += walker.currentNode.nodeValue.trim() + ' ';
  }
  return text.trim();
})()
"#;

pub const DOCUMENT_AVAILABLE: &str = "!!window.document";

pub const ALERT_TEXT: &str = r#"document.querySelector('[role="alert"]')?.innerText || ''"#;

pub const SEARCH_RESULTS: &str = r#"
Array.from(document.querySelectorAll('h3.t a')).map((a) => ({
  href: a.href,
  text: a.innerText,
}))
"#;

/// Starts an eased, slightly jittered scroll to the bottom of the page that
/// runs for `duration`. Returns immediately; callers wait on their own.
pub fn scroll_to_bottom(duration: Duration) -> String {
    format!(
        r#"
(() => {{
  const duration = {ms};
  const startTime = Date.now();
  const startScroll = window.scrollY;
  const distance = document.body.scrollHeight - window.innerHeight - startScroll;
  const ease = (t) => (t < 0.5 ? 4 * t * t * t : (t - 1) * (2 * t - 2) * (2 * t - 2) + 1);
  const step = () => {{
    const linear = Math.min((Date.now() - startTime) / duration, 1);
    const jitter = linear < 1 ? 1 + (Math.random() - 0.5) * 0.2 : 1;
    window.scrollTo(0, startScroll + distance * ease(linear) * jitter);
    if (linear < 1) requestAnimationFrame(step);
  }};
  step();
  return true;
}})()
"#,
        ms = duration.as_millis().max(1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_script_embeds_duration_in_millis() {
        let script = scroll_to_bottom(Duration::from_millis(2500));
        assert!(script.contains("const duration = 2500;"));
    }

    #[test]
    fn scroll_script_never_divides_by_zero() {
        let script = scroll_to_bottom(Duration::ZERO);
        assert!(script.contains("const duration = 1;"));
    }
}

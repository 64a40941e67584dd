#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chapterwalk::browser::{Browser, BrowserError};
use chapterwalk::formats::{
    Anchor, ContentCandidate, ContentSnapshot, LinkContainer, LinkSnapshot, TitleSnapshot,
};
use chapterwalk::scripts;
use tokio_util::sync::CancellationToken;

pub const TOC_URL: &str = "https://novel.test/n/";
pub const DOCUMENT_TITLE: &str = "星河旅人";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Navigate(String),
    Sleep(Duration),
    /// A page script ran; the label names which one.
    Evaluate(&'static str),
}

pub const SCROLL: &str = "scroll";
pub const LINKS: &str = "links";
pub const CONTENT: &str = "content";
pub const TITLE: &str = "title";

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub title: String,
    pub headings: Vec<String>,
    pub content: String,
    pub anchors: Vec<Anchor>,
    pub containers: Vec<LinkContainer>,
}

/// In-memory site that answers the crawler's page scripts from canned pages
/// and records every navigation and wait.
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, Page>,
    scripted: HashMap<String, serde_json::Value>,
    broken_content: HashSet<String>,
    hanging_content: HashSet<String>,
    hanging_ready: HashSet<String>,
    nav_failures: Mutex<HashMap<String, usize>>,
    cancel_on: Option<(String, CancellationToken)>,
    current: Mutex<Option<String>>,
    events: Mutex<Vec<Event>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: Page) -> Self {
        self.pages.insert(url.to_owned(), page);
        self
    }

    pub fn page_mut(&mut self, url: &str) -> &mut Page {
        self.pages.get_mut(url).expect("page exists")
    }

    pub fn script(mut self, script: &str, value: serde_json::Value) -> Self {
        self.scripted.insert(script.to_owned(), value);
        self
    }

    pub fn fail_navigation(self, url: &str, times: usize) -> Self {
        self.nav_failures
            .lock()
            .expect("lock")
            .insert(url.to_owned(), times);
        self
    }

    pub fn break_content(mut self, url: &str) -> Self {
        self.broken_content.insert(url.to_owned());
        self
    }

    /// The content script on `url` never returns.
    pub fn hang_content(mut self, url: &str) -> Self {
        self.hanging_content.insert(url.to_owned());
        self
    }

    /// `url` loads but its body never becomes visible.
    pub fn hang_ready(mut self, url: &str) -> Self {
        self.hanging_ready.insert(url.to_owned());
        self
    }

    pub fn cancel_on(mut self, url: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.to_owned(), token));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("lock").clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Sleep(duration) => Some(duration),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().expect("lock").push(event);
    }

    fn current(&self) -> Result<(String, &Page), BrowserError> {
        let url = self
            .current
            .lock()
            .expect("lock")
            .clone()
            .ok_or_else(|| BrowserError::Script("no page loaded".to_owned()))?;
        let page = self
            .pages
            .get(&url)
            .ok_or_else(|| BrowserError::Script(format!("no page at {url}")))?;
        Ok((url, page))
    }
}

#[async_trait]
impl Browser for FakeSite {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.record(Event::Navigate(url.to_owned()));

        if let Some((trigger, token)) = &self.cancel_on
            && trigger == url
        {
            token.cancel();
        }

        if let Some(remaining) = self.nav_failures.lock().expect("lock").get_mut(url)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(BrowserError::Navigation {
                url: url.to_owned(),
                message: "connection reset".to_owned(),
            });
        }

        if !self.pages.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_owned(),
                message: "404".to_owned(),
            });
        }
        *self.current.lock().expect("lock") = Some(url.to_owned());
        Ok(())
    }

    async fn wait_visible(&self, selector: &str) -> Result<(), BrowserError> {
        let current = self.current.lock().expect("lock").clone();
        if let Some(url) = current {
            if self.hanging_ready.contains(&url) {
                std::future::pending::<()>().await;
            }
            Ok(())
        } else {
            Err(BrowserError::NotVisible {
                selector: selector.to_owned(),
                message: "no page loaded".to_owned(),
            })
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        if let Some(value) = self.scripted.get(script) {
            return Ok(value.clone());
        }

        let value = if script == scripts::LINK_SNAPSHOT {
            self.record(Event::Evaluate(LINKS));
            let (url, page) = self.current()?;
            serde_json::to_value(LinkSnapshot {
                page_url: url,
                title: page.title.clone(),
                anchors: page.anchors.clone(),
                containers: page.containers.clone(),
            })?
        } else if script == scripts::CONTENT_SNAPSHOT {
            self.record(Event::Evaluate(CONTENT));
            let (url, page) = self.current()?;
            if self.hanging_content.contains(&url) {
                std::future::pending::<()>().await;
            }
            if self.broken_content.contains(&url) {
                return Err(BrowserError::Script("content script threw".to_owned()));
            }
            serde_json::to_value(ContentSnapshot {
                candidates: vec![ContentCandidate {
                    tag: "div".to_owned(),
                    text: page.content.clone(),
                    rendered: page.content.clone(),
                    hidden: false,
                    excluded: false,
                }],
                body_text: page.content.clone(),
            })?
        } else if script == scripts::TITLE_SNAPSHOT {
            self.record(Event::Evaluate(TITLE));
            let (_, page) = self.current()?;
            serde_json::to_value(TitleSnapshot {
                document_title: page.title.clone(),
                headings: page.headings.clone(),
                body_title: None,
            })?
        } else if script == "document.title" {
            let (_, page) = self.current()?;
            serde_json::Value::String(page.title.clone())
        } else if script.contains("window.scrollTo") {
            self.record(Event::Evaluate(SCROLL));
            serde_json::Value::Bool(true)
        } else {
            serde_json::Value::Null
        };
        Ok(value)
    }

    async fn sleep(&self, duration: Duration) {
        self.record(Event::Sleep(duration));
    }
}

pub fn anchor(href: &str, text: &str) -> Anchor {
    Anchor {
        href: href.to_owned(),
        text: text.to_owned(),
        ..Anchor::default()
    }
}

pub fn chapter_url(i: usize) -> String {
    format!("https://novel.test/n/{i}.html")
}

pub fn chapter_title(i: usize) -> String {
    format!("第{i}章 标题{i}")
}

pub fn prose(i: usize) -> String {
    format!("第{i}段：夜色渐深，城中灯火一盏盏熄灭，只有远处的钟楼还亮着。").repeat(15)
}

pub fn chapter_page(i: usize, next_href: Option<&str>) -> Page {
    let mut anchors = vec![anchor("/n/", "目录")];
    if i > 1 {
        anchors.insert(0, anchor(&format!("/n/{}.html", i - 1), "上一章"));
    }
    if let Some(href) = next_href {
        anchors.push(anchor(href, "下一章"));
    }
    Page {
        title: chapter_title(i),
        headings: vec![chapter_title(i)],
        content: prose(i),
        anchors,
        containers: Vec::new(),
    }
}

/// A table of contents at [`TOC_URL`] listing `units` chapters, each linking
/// to the next; the last one links back to the table of contents.
pub fn novel(units: usize) -> FakeSite {
    let mut toc_anchors = vec![anchor("/", "首页")];
    toc_anchors.extend((1..=units).map(|i| anchor(&format!("/n/{i}.html"), &chapter_title(i))));
    let toc = Page {
        title: DOCUMENT_TITLE.to_owned(),
        headings: vec![DOCUMENT_TITLE.to_owned()],
        content: String::new(),
        anchors: toc_anchors,
        containers: Vec::new(),
    };

    let mut site = FakeSite::new().page(TOC_URL, toc);
    for i in 1..=units {
        let next = if i == units {
            "/n/".to_owned()
        } else {
            format!("/n/{}.html", i + 1)
        };
        site = site.page(&chapter_url(i), chapter_page(i, Some(&next)));
    }
    site
}

use std::collections::HashSet;
use std::io::Write;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::browser::{Browser, BrowserError, evaluate_as, page_title, wait_visible_within};
use crate::config::TraversalConfig;
use crate::extract;
use crate::formats::{LinkTarget, TitleSnapshot, TocEntry};
use crate::locate;
use crate::pacing::Pacer;
use crate::scripts;
use crate::sink::{SinkCreationError, TextSink};
use crate::title;

#[derive(Debug, thiserror::Error)]
pub enum TraversalError {
    #[error("open table of contents {url}: {source}")]
    TocUnavailable {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("no first unit could be located on {url}")]
    NoFirstUnit { url: String },

    #[error(transparent)]
    SinkCreation(#[from] SinkCreationError),

    #[error("cancelled before the first unit was located")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The next link pointed at a page that was already visited.
    CycleDetected,
    /// As many units as the table of contents lists have been written.
    UnitCountReached,
    /// Neither the page nor the table of contents offered a next unit.
    NoNextUnit,
    /// The last reachable unit was skipped and nothing was left to fall back
    /// to. Its placeholder is the final record.
    Exhausted,
    Cancelled,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// How far the current page got before a unit timeout can cut it off.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Progress {
    Navigating,
    Arrived { title: String },
    Written,
}

#[derive(Debug, Clone)]
pub struct TraversalReport {
    pub outcome: Outcome,
    pub units: usize,
    pub pages: usize,
    pub errors: usize,
    pub visited: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// How the engine got to a page, which decides how the page is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    Entry,
    Toc,
    Link { page_signal: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: Url,
    pub text: String,
    pub via: Via,
}

impl Target {
    fn expects_new_unit(&self) -> bool {
        !matches!(self.via, Via::Link { page_signal: true })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NewUnit,
    NextPage,
}

#[derive(Debug, Clone, Default)]
pub struct TraversalState {
    pub unit_index: usize,
    pub page_index: usize,
    pub base_title: Option<String>,
    pub visited: HashSet<String>,
    pub total_units: Option<usize>,
}

impl TraversalState {
    pub fn new(total_units: Option<usize>) -> Self {
        Self {
            total_units,
            ..Self::default()
        }
    }

    /// Equal normalized titles mean the same unit; a "next page" link forces
    /// the same unit; the entry page and table-of-contents jumps always
    /// start a new unit.
    pub fn classify(&self, via: Via, normalized_title: &str) -> Transition {
        let Some(base) = self.base_title.as_deref() else {
            return Transition::NewUnit;
        };
        match via {
            Via::Entry | Via::Toc => Transition::NewUnit,
            Via::Link { .. } if base == normalized_title => Transition::NextPage,
            Via::Link { page_signal: true } => Transition::NextPage,
            Via::Link { page_signal: false } => Transition::NewUnit,
        }
    }

    pub fn apply(&mut self, transition: Transition, normalized_title: &str) {
        match transition {
            Transition::NewUnit => {
                self.unit_index += 1;
                self.page_index = 1;
                self.base_title = Some(normalized_title.to_owned());
            }
            Transition::NextPage => {
                self.page_index += 1;
            }
        }
    }

    /// Counts a unit that could not be loaded so the table-of-contents
    /// fallback lands on the unit after it.
    fn skip(&mut self, target: &Target) {
        if target.expects_new_unit() {
            self.unit_index += 1;
            self.page_index = 1;
            self.base_title = None;
        }
    }

    fn units_exhausted(&self) -> bool {
        self.total_units
            .is_some_and(|total| total > 0 && self.unit_index >= total)
    }
}

#[derive(Debug, Clone)]
pub struct StartPoint {
    pub document_title: String,
    pub first: LinkTarget,
    pub toc: Vec<TocEntry>,
}

enum Step {
    Continue(Target),
    Terminate(Outcome),
}

/// Loads the table of contents, harvests its unit links and picks the first
/// unit. Failing to find a first unit is fatal.
pub async fn locate_start(
    browser: &dyn Browser,
    config: &TraversalConfig,
    toc_url: &Url,
) -> Result<StartPoint, TraversalError> {
    navigate_with_retries(browser, config, toc_url)
        .await
        .map_err(|source| TraversalError::TocUnavailable {
            url: toc_url.to_string(),
            source,
        })?;

    let document_title = match page_title(browser).await {
        Ok(title) => title,
        Err(err) => {
            tracing::warn!(?err, url = %toc_url, "read document title failed");
            String::new()
        }
    };

    let toc = match locate::harvest_all(browser, toc_url).await {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(?err, url = %toc_url, "table of contents harvest failed; unit count unknown");
            Vec::new()
        }
    };
    if toc.is_empty() {
        tracing::warn!(url = %toc_url, "no unit links on the table of contents page");
    } else {
        tracing::info!(units = toc.len(), "table of contents harvested");
    }

    let located = match locate::find_first(browser, toc_url).await {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(?err, url = %toc_url, "first unit lookup failed");
            None
        }
    };
    let first = located
        .or_else(|| {
            toc.first().and_then(|entry| {
                let url = Url::parse(&entry.url).ok()?;
                tracing::info!(%url, "using the first table of contents entry as first unit");
                Some(LinkTarget {
                    url,
                    text: entry.text.clone(),
                })
            })
        })
        .ok_or_else(|| TraversalError::NoFirstUnit {
            url: toc_url.to_string(),
        })?;
    tracing::info!(url = %first.url, text = %first.text, "first unit located");

    Ok(StartPoint {
        document_title,
        first,
        toc,
    })
}

/// Runs a whole traversal: locate the first unit, open the sink named after
/// the document and walk units until the document ends.
pub async fn traverse<W, F>(
    browser: &dyn Browser,
    pacer: &dyn Pacer,
    config: &TraversalConfig,
    toc_url: &Url,
    open_sink: F,
    cancel: &CancellationToken,
) -> Result<(TraversalReport, W), TraversalError>
where
    W: Write,
    F: FnOnce(&str) -> Result<TextSink<W>, SinkCreationError>,
{
    let start = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(TraversalError::Cancelled),
        start = locate_start(browser, config, toc_url) => start?,
    };
    let sink = open_sink(&start.document_title)?;
    let traversal = Traversal::new(browser, pacer, config, sink, start);
    Ok(traversal.run(cancel).await)
}

pub struct Traversal<'a, W: Write> {
    browser: &'a dyn Browser,
    pacer: &'a dyn Pacer,
    config: &'a TraversalConfig,
    sink: TextSink<W>,
    toc: Vec<TocEntry>,
    state: TraversalState,
    target: Target,
    progress: Progress,
}

impl<'a, W: Write> Traversal<'a, W> {
    pub fn new(
        browser: &'a dyn Browser,
        pacer: &'a dyn Pacer,
        config: &'a TraversalConfig,
        sink: TextSink<W>,
        start: StartPoint,
    ) -> Self {
        let total_units = (!start.toc.is_empty()).then_some(start.toc.len());
        Self {
            browser,
            pacer,
            config,
            sink,
            toc: start.toc,
            state: TraversalState::new(total_units),
            target: Target {
                url: start.first.url,
                text: start.first.text,
                via: Via::Entry,
            },
            progress: Progress::Navigating,
        }
    }

    pub async fn run(mut self, cancel: &CancellationToken) -> (TraversalReport, W) {
        let started_at = Utc::now();
        let outcome = loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Terminate(Outcome::Cancelled),
                step = self.step() => step,
            };
            let next = match step {
                Step::Continue(next) => next,
                Step::Terminate(outcome) => break outcome,
            };

            let delay = self.pacer.between_pages();
            tracing::info!(
                ?delay,
                url = %next.url,
                page_signal = matches!(next.via, Via::Link { page_signal: true }),
                "waiting before next page"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => break Outcome::Cancelled,
                () = self.browser.sleep(delay) => {}
            }
            self.target = next;
        };

        if let Err(err) = self.sink.flush() {
            tracing::error!(?err, "flush output");
        }
        let counts = self.sink.counts();
        let report = TraversalReport {
            outcome,
            units: counts.units,
            pages: counts.pages,
            errors: counts.errors,
            visited: self.state.visited.len(),
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            ?outcome,
            units = report.units,
            pages = report.pages,
            errors = report.errors,
            "traversal finished"
        );
        (report, self.sink.into_inner())
    }

    async fn step(&mut self) -> Step {
        let target = self.target.clone();
        if !self.state.visited.insert(target.url.to_string()) {
            tracing::info!(url = %target.url, "page already visited; stopping");
            return Step::Terminate(Outcome::CycleDetected);
        }
        self.progress = Progress::Navigating;

        let limit = self.config.unit_timeout;
        let Ok(step) = tokio::time::timeout(limit, self.visit(&target)).await else {
            return self.unit_timed_out(&target);
        };
        step
    }

    fn unit_timed_out(&mut self, target: &Target) -> Step {
        let limit = self.config.unit_timeout;
        match std::mem::replace(&mut self.progress, Progress::Navigating) {
            Progress::Navigating => {
                let err = BrowserError::Timeout {
                    operation: "unit",
                    elapsed: limit,
                };
                self.skip_unit(target, &err)
            }
            Progress::Arrived { title } => {
                tracing::warn!(
                    unit = self.state.unit_index,
                    url = %target.url,
                    ?limit,
                    "content extraction timed out; skipping"
                );
                self.record_error(&format!("获取章节内容失败: {title}"), &target.url);
                self.next_step(None)
            }
            Progress::Written => {
                tracing::warn!(url = %target.url, ?limit, "locating the next unit timed out");
                self.next_step(None)
            }
        }
    }

    async fn visit(&mut self, target: &Target) -> Step {
        if let Err(err) = navigate_with_retries(self.browser, self.config, &target.url).await {
            return self.skip_unit(target, &err);
        }

        let title = self.page_title().await;
        let normalized = title::normalize(&title);
        let transition = self.state.classify(target.via, &normalized);
        self.state.apply(transition, &normalized);
        self.progress = Progress::Arrived {
            title: title.clone(),
        };

        let unit = self.state.unit_index;
        let page = self.state.page_index;
        match extract::extract(self.browser).await {
            Ok(content) => {
                let written = match transition {
                    Transition::NewUnit => self.sink.write_unit(&title, &content),
                    Transition::NextPage => self.sink.write_continuation(&content),
                };
                match written {
                    Ok(()) => tracing::info!(
                        unit,
                        page,
                        title = %title,
                        chars = content.chars().count(),
                        "page written"
                    ),
                    Err(err) => tracing::error!(?err, unit, page, url = %target.url, "write page"),
                }
            }
            Err(err) => {
                tracing::warn!(?err, unit, page, url = %target.url, "content extraction failed; skipping");
                self.record_error(&format!("获取章节内容失败: {title}"), &target.url);
            }
        }
        self.progress = Progress::Written;

        self.locate_next(&target.url).await
    }

    async fn locate_next(&mut self, current_url: &Url) -> Step {
        let scroll = self.pacer.scroll_duration();
        if let Err(err) = self
            .browser
            .evaluate(&scripts::scroll_to_bottom(scroll))
            .await
        {
            tracing::debug!(?err, "scroll to bottom failed");
        }
        self.browser.sleep(scroll + self.config.scroll_settle).await;

        let found = match locate::find_next(self.browser, current_url).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(?err, url = %current_url, "next unit lookup failed");
                None
            }
        };
        self.next_step(found)
    }

    fn next_step(&self, found: Option<LinkTarget>) -> Step {
        let next = match found {
            Some(link) => Target {
                via: Via::Link {
                    page_signal: locate::is_page_signal(&link.text),
                },
                url: link.url,
                text: link.text,
            },
            None => match self.toc_fallback() {
                Some(target) => {
                    tracing::info!(url = %target.url, "no next link; using table of contents");
                    target
                }
                None => {
                    tracing::info!(unit = self.state.unit_index, "no next unit; document complete");
                    return Step::Terminate(Outcome::NoNextUnit);
                }
            },
        };

        if next.expects_new_unit() && self.state.units_exhausted() {
            tracing::info!(unit = self.state.unit_index, "all listed units written");
            return Step::Terminate(Outcome::UnitCountReached);
        }
        Step::Continue(next)
    }

    fn skip_unit(&mut self, target: &Target, err: &BrowserError) -> Step {
        self.state.skip(target);
        tracing::warn!(
            ?err,
            unit = self.state.unit_index,
            url = %target.url,
            "page unreachable; skipping"
        );
        let label = match target.via {
            Via::Entry | Via::Toc if !target.text.is_empty() => target.text.clone(),
            _ => title::fallback_title(self.state.unit_index),
        };
        self.record_error(&format!("无法访问章节: {label}"), &target.url);

        match self.toc_fallback() {
            Some(next) => {
                tracing::info!(url = %next.url, "continuing from table of contents");
                Step::Continue(next)
            }
            None => {
                tracing::info!(unit = self.state.unit_index, "nothing left after the skipped unit; document complete");
                Step::Terminate(Outcome::Exhausted)
            }
        }
    }

    /// The table of contents entry after the current unit.
    fn toc_fallback(&self) -> Option<Target> {
        let entry = self.toc.get(self.state.unit_index)?;
        let url = Url::parse(&entry.url).ok()?;
        Some(Target {
            url,
            text: entry.text.clone(),
            via: Via::Toc,
        })
    }

    async fn page_title(&self) -> String {
        match evaluate_as::<TitleSnapshot>(self.browser, scripts::TITLE_SNAPSHOT).await {
            Ok(snapshot) => title::refine_title(&snapshot, self.state.unit_index + 1),
            Err(err) => {
                tracing::warn!(?err, "read page title failed");
                title::fallback_title(self.state.unit_index + 1)
            }
        }
    }

    fn record_error(&mut self, description: &str, url: &Url) {
        if let Err(err) = self.sink.write_error(description, url.as_str()) {
            tracing::error!(?err, url = %url, "write error placeholder");
        }
    }
}

/// Navigates and waits for the page to render, retrying with a doubling
/// backoff. Sleeps after every failed attempt, including the last one.
pub async fn navigate_with_retries(
    browser: &dyn Browser,
    config: &TraversalConfig,
    url: &Url,
) -> Result<(), BrowserError> {
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match browser.navigate(url.as_str()).await {
            Ok(()) => {
                wait_visible_within(browser, &config.ready_selector, config.ready_timeout).await
            }
            Err(err) => Err(err),
        };
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let backoff = config.backoff_after(attempt);
        tracing::warn!(?err, attempt, attempts, ?backoff, url = %url, "navigation failed");
        browser.sleep(backoff).await;
        if attempt >= attempts {
            return Err(err);
        }
        attempt += 1;
    }
}

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Navigation attempts per page before it is skipped.
    pub max_attempts: u32,
    /// Wait after the first failed attempt; doubled after each further one.
    pub backoff_base: Duration,
    /// Bound on one page's navigate-extract-locate cycle.
    pub unit_timeout: Duration,
    /// Bound on waiting for the page body to become visible.
    pub ready_timeout: Duration,
    pub ready_selector: String,
    /// Extra wait after the scroll animation finishes.
    pub scroll_settle: Duration,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(10),
            unit_timeout: Duration::from_secs(300),
            ready_timeout: Duration::from_secs(30),
            ready_selector: "body".to_owned(),
            scroll_settle: Duration::from_millis(500),
        }
    }
}

impl TraversalConfig {
    /// 10s, 20s, 40s, ... for attempts 1, 2, 3, ...
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1 << exponent)
    }
}

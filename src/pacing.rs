use std::time::Duration;

use rand::Rng as _;

/// Source of the deliberate human-like waits: the pause between page loads
/// and the length of the scroll animation.
pub trait Pacer: Send + Sync {
    fn between_pages(&self) -> Duration;

    fn scroll_duration(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct RandomPacer {
    pub between_pages: (Duration, Duration),
    pub scroll: (Duration, Duration),
}

impl Default for RandomPacer {
    fn default() -> Self {
        Self {
            between_pages: (Duration::from_secs(5), Duration::from_secs(60)),
            scroll: (Duration::from_secs(2), Duration::from_secs(5)),
        }
    }
}

impl RandomPacer {
    fn pick((low, high): (Duration, Duration)) -> Duration {
        if high <= low {
            return low;
        }
        let millis = rand::thread_rng().gen_range(low.as_millis()..=high.as_millis());
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

impl Pacer for RandomPacer {
    fn between_pages(&self) -> Duration {
        Self::pick(self.between_pages)
    }

    fn scroll_duration(&self) -> Duration {
        Self::pick(self.scroll)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPacer {
    pub between_pages: Duration,
    pub scroll: Duration,
}

impl Pacer for FixedPacer {
    fn between_pages(&self) -> Duration {
        self.between_pages
    }

    fn scroll_duration(&self) -> Duration {
        self.scroll
    }
}

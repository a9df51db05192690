use embassy_time::{Duration, Instant};

/// Admits at most one event per `interval`, counting the events it swallowed in between.
pub(crate) struct RateLimit {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u32,
}

impl RateLimit {
    /// Five seconds, the kernel's default ratelimit interval.
    pub(crate) const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub(crate) const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// Returns `Some(suppressed)` if an event may be reported at `now`, where
    /// `suppressed` is the number of events dropped since the previous report.
    pub(crate) fn check(&mut self, now: Instant) -> Option<u32> {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.suppressed = self.suppressed.saturating_add(1);
                None
            }
            _ => {
                self.last = Some(now);
                Some(core::mem::take(&mut self.suppressed))
            }
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

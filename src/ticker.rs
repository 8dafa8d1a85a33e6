use std::time::{Duration, Instant};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// The one periodic schedule the app owns. Starting it again replaces the
/// previous schedule, so two tickers can never run side by side.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next: Option<Instant>,
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    pub fn cancel(&mut self) {
        self.next = None;
    }

    pub fn is_active(&self) -> bool {
        self.next.is_some()
    }

    /// Fires at most once per call. Missed periods are not replayed; the
    /// next deadline is always one period after `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next {
            Some(deadline) if now >= deadline => {
                self.next = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    /// How long the event loop may block before the next tick is due.
    pub fn timeout(&self, now: Instant, cap: Duration) -> Duration {
        self.next
            .map(|deadline| deadline.saturating_duration_since(now).min(cap))
            .unwrap_or(cap)
    }
}

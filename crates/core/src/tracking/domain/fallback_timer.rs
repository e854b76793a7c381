use std::time::{Duration, Instant};

/// Source of monotonic timestamps.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// Wall-clock-independent time from [`Instant`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Measures how long template-matching fallback has been running.
pub struct FallbackTimer {
    clock: Box<dyn Clock>,
    started_at: Option<Instant>,
}

impl FallbackTimer {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            started_at: None,
        }
    }

    /// Starts the timer. A running timer keeps its original start.
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(self.clock.now());
        }
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time since [`Self::start`]; zero when stopped.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|start| self.clock.now().saturating_duration_since(start))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for FallbackTimer {
    fn default() -> Self {
        Self::new(Box::new(MonotonicClock))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::Clock;

    /// Clock that only moves when told to. Clones share the same time, so a
    /// test can keep one handle while the tracker owns another.
    #[derive(Clone, Debug)]
    pub(crate) struct ManualClock {
        origin: Instant,
        offset_nanos: Arc<AtomicU64>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset_nanos: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.offset_nanos
                .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    fn timer() -> (FallbackTimer, ManualClock) {
        let clock = ManualClock::new();
        (FallbackTimer::new(Box::new(clock.clone())), clock)
    }

    #[test]
    fn test_stopped_timer_reports_zero() {
        let (t, clock) = timer();
        clock.advance(Duration::from_secs(5));
        assert!(!t.is_running());
        assert_eq!(t.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_follows_clock() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance(Duration::from_millis(1500));
        assert!(t.is_running());
        assert_eq!(t.elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn test_start_does_not_restart_running_timer() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance(Duration::from_secs(2));
        t.start();
        clock.advance(Duration::from_secs(1));
        assert_eq!(t.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_stop_clears_and_restart_begins_fresh() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance(Duration::from_secs(2));
        t.stop();
        assert!(!t.is_running());
        assert_eq!(t.elapsed(), Duration::ZERO);

        t.start();
        clock.advance(Duration::from_millis(250));
        assert_eq!(t.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_default_timer_uses_real_time() {
        let mut t = FallbackTimer::default();
        t.start();
        assert!(t.elapsed() < Duration::from_secs(60));
    }
}

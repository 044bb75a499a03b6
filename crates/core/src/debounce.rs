//! Cancel-then-reschedule timer for coalescing bursts of events.
//!
//! The debouncer owns no thread or clock. The host passes the current
//! [`Instant`] to [`Debouncer::signal`] and [`Debouncer::poll`], which keeps the
//! timing contract testable without sleeping.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

/// Handle to one scheduled firing.
///
/// Clones share the cancellation flag, so the host can cancel a pending
/// firing from anywhere it holds a handle.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new(deadline: Instant) -> Self {
        Self { deadline, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<TimerHandle>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancels any pending firing and schedules a new one `delay` after `now`.
    pub fn signal(&mut self, now: Instant) -> TimerHandle {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }

        let handle = TimerHandle::new(now + self.delay);
        self.pending = Some(handle.clone());
        handle
    }

    /// Returns `true` exactly once per schedule, when its deadline has passed
    /// and it was not cancelled.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(handle) = &self.pending else {
            return false;
        };

        if handle.is_cancelled() {
            self.pending = None;
            return false;
        }
        if now < handle.deadline() {
            return false;
        }

        self.pending = None;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_cancelled())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(300);

    #[test]
    fn fires_once_after_delay() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.signal(start);

        assert!(!debouncer.poll(start + Duration::from_millis(299)));
        assert!(debouncer.poll(start + DELAY));
        assert!(!debouncer.poll(start + Duration::from_millis(900)));
    }

    #[test]
    fn repeated_signals_coalesce() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);

        let first = debouncer.signal(start);
        debouncer.signal(start + Duration::from_millis(100));
        debouncer.signal(start + Duration::from_millis(200));

        assert!(first.is_cancelled());
        assert!(!debouncer.poll(start + Duration::from_millis(400)));
        assert!(debouncer.poll(start + Duration::from_millis(500)));
        assert!(!debouncer.poll(start + Duration::from_millis(600)));
    }

    #[test]
    fn host_cancellation_suppresses_firing() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);

        let handle = debouncer.signal(start);
        handle.cancel();

        assert!(!debouncer.is_pending());
        assert!(!debouncer.poll(start + Duration::from_secs(1)));
    }
}

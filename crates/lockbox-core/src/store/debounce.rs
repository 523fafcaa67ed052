//! Single-slot debounce timer.
//!
//! Pure bookkeeping: the flusher thread asks how long to sleep, the store
//! arms and cancels. Re-arming replaces the previous deadline, so there is
//! never more than one pending flush.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Push the deadline to `now + delay`, replacing any earlier one.
    pub(crate) fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub(crate) fn cancel(&mut self) {
        self.deadline = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the deadline. `Some(ZERO)` means due, `None` means idle.
    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Whether the deadline has passed.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.remaining(now) == Some(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(3000);

    #[test]
    fn test_idle_until_armed() {
        let timer = Debounce::new(DELAY);
        let now = Instant::now();
        assert!(!timer.is_armed());
        assert_eq!(timer.remaining(now), None);
        assert!(!timer.is_due(now));
    }

    #[test]
    fn test_fires_after_delay() {
        let mut timer = Debounce::new(DELAY);
        let start = Instant::now();
        timer.arm(start);

        assert_eq!(timer.remaining(start), Some(DELAY));
        assert!(!timer.is_due(start + Duration::from_millis(2999)));
        assert!(timer.is_due(start + DELAY));
        assert!(timer.is_due(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_rearm_pushes_deadline_out() {
        let mut timer = Debounce::new(DELAY);
        let start = Instant::now();

        // Ten mutations 100ms apart collapse into one deadline after the last.
        for i in 0..10 {
            timer.arm(start + Duration::from_millis(100 * i));
        }
        let last = start + Duration::from_millis(900);

        assert!(!timer.is_due(start + DELAY));
        assert!(!timer.is_due(last + Duration::from_millis(2999)));
        assert!(timer.is_due(last + DELAY));
    }

    #[test]
    fn test_cancel() {
        let mut timer = Debounce::new(DELAY);
        let start = Instant::now();
        timer.arm(start);
        timer.cancel();

        assert!(!timer.is_armed());
        assert!(!timer.is_due(start + Duration::from_secs(60)));
    }
}

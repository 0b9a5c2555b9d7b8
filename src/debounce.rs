//! Trailing debounce for frequency updates
//!
//! Every push replaces the pending value and moves the deadline to
//! `now + window`. The value is released only once the deadline passes with
//! no further push, so a burst produces exactly one forward carrying its last
//! value, and two forwards are never closer than one window.
//!
//! The debouncer owns no timer. The engine task sleeps until
//! [`Debouncer::deadline`] and then calls [`Debouncer::poll`]; dropping the
//! deadline with [`Debouncer::cancel`] is therefore the whole cancellation story.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a candidate, restarting the quiescence window.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.deadline = Some(now + self.window);
    }

    /// When the pending value becomes due, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop the scheduled forward, handing back whatever was pending.
    pub fn cancel(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn test_burst_forwards_last_value_once() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        for i in 0..10u64 {
            debouncer.push(i, start + Duration::from_millis(i * 5));
            assert_eq!(debouncer.poll(start + Duration::from_millis(i * 5)), None);
        }

        // Last push at 45 ms, so nothing is due before 145 ms
        assert_eq!(debouncer.poll(start + Duration::from_millis(144)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(145)), Some(9));
        assert_eq!(debouncer.poll(start + Duration::from_millis(500)), None);
    }

    #[test]
    fn test_spaced_updates_each_forwarded() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        let mut forwarded = Vec::new();

        for i in 0..4u64 {
            let t = start + Duration::from_millis(i * 250);
            debouncer.push(i, t);
            if let Some(v) = debouncer.poll(t + WINDOW) {
                forwarded.push(v);
            }
        }

        assert_eq!(forwarded, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cancel_clears_deadline_and_returns_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.push("a", start);

        assert_eq!(debouncer.cancel(), Some("a"));
        assert!(debouncer.deadline().is_none());
        assert_eq!(debouncer.poll(start + WINDOW * 2), None);
    }

    #[test]
    fn test_push_moves_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.push(1, start);
        debouncer.push(2, start + Duration::from_millis(60));
        assert_eq!(
            debouncer.deadline(),
            Some(start + Duration::from_millis(160))
        );
        assert_eq!(debouncer.pending(), Some(&2));
    }
}

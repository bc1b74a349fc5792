//! Echo suppression window.
//!
//! When Uniclip writes a received message to the local clipboard, the
//! watcher must not report that write back as a user change. The guard is a
//! deadline: while `now` is before it, change notifications are dropped.

use std::time::{Duration, Instant};

/// Time-bounded suppression flag.
///
/// Callers pass the current time in, so the guard is deterministic under
/// test clocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoGuard {
    active_until: Option<Instant>,
}

impl EchoGuard {
    /// Create an inactive guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress notifications for `window` starting at `now`.
    ///
    /// Overlapping activations extend the window; they never shorten it.
    pub fn activate(&mut self, now: Instant, window: Duration) {
        let until = now + window;
        match self.active_until {
            Some(current) if current >= until => {}
            _ => self.active_until = Some(until),
        }
    }

    /// Whether notifications are currently suppressed.
    pub fn is_active(&self, now: Instant) -> bool {
        self.active_until.map_or(false, |until| now < until)
    }

    /// Time left in the current window.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.active_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default()
    }

    /// End suppression immediately.
    pub fn clear(&mut self) {
        self.active_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn inactive_by_default() {
        let guard = EchoGuard::new();
        assert!(!guard.is_active(Instant::now()));
        assert_eq!(guard.remaining(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn active_within_window() {
        let start = Instant::now();
        let mut guard = EchoGuard::new();
        guard.activate(start, WINDOW);

        assert!(guard.is_active(start));
        assert!(guard.is_active(start + Duration::from_millis(499)));
        assert!(!guard.is_active(start + WINDOW));
        assert!(!guard.is_active(start + Duration::from_secs(2)));
    }

    #[test]
    fn overlapping_activation_extends() {
        let start = Instant::now();
        let mut guard = EchoGuard::new();
        guard.activate(start, WINDOW);
        guard.activate(start + Duration::from_millis(300), WINDOW);

        assert!(guard.is_active(start + Duration::from_millis(700)));
        assert_eq!(
            guard.remaining(start + Duration::from_millis(300)),
            WINDOW
        );
    }

    #[test]
    fn shorter_activation_does_not_shrink() {
        let start = Instant::now();
        let mut guard = EchoGuard::new();
        guard.activate(start, Duration::from_millis(700));
        guard.activate(start, Duration::from_millis(100));

        assert!(guard.is_active(start + Duration::from_millis(600)));
    }

    #[test]
    fn clear_ends_window() {
        let start = Instant::now();
        let mut guard = EchoGuard::new();
        guard.activate(start, WINDOW);
        guard.clear();
        assert!(!guard.is_active(start));
    }
}

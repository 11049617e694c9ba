//! Trailing-edge debounce with distinct-until-changed suppression.

use std::time::Duration;

use tokio::time::Instant;

use crate::occupancy::OccupancyVerdict;

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<(OccupancyVerdict, Instant)>,
    last_published: Option<OccupancyVerdict>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            pending: None,
            last_published: None,
        }
    }

    /// Feed a fresh verdict. Returns the value to publish right away, which
    /// only happens when the window is zero.
    pub fn offer(&mut self, verdict: OccupancyVerdict, now: Instant) -> Option<OccupancyVerdict> {
        if self.window.is_zero() {
            self.pending = None;
            return self.publish(verdict);
        }
        self.pending = Some((verdict, now + self.window));
        None
    }

    /// When the pending value becomes eligible, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, deadline)| deadline)
    }

    /// Release the pending value once its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<OccupancyVerdict> {
        match self.pending {
            Some((verdict, deadline)) if now >= deadline => {
                self.pending = None;
                self.publish(verdict)
            }
            _ => None,
        }
    }

    pub fn last_published(&self) -> Option<OccupancyVerdict> {
        self.last_published
    }

    fn publish(&mut self, verdict: OccupancyVerdict) -> Option<OccupancyVerdict> {
        if self.last_published == Some(verdict) {
            return None;
        }
        self.last_published = Some(verdict);
        Some(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OccupancyVerdict::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_zero_window_publishes_immediately() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        assert_eq!(debouncer.offer(Detected, start), Some(Detected));
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.offer(NotDetected, start), Some(NotDetected));
    }

    #[test]
    fn test_distinct_until_changed() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        assert_eq!(debouncer.offer(Detected, start), Some(Detected));
        assert_eq!(debouncer.offer(Detected, start + ms(10)), None);
        assert_eq!(debouncer.last_published(), Some(Detected));
    }

    #[test]
    fn test_only_settled_value_is_published() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(2));

        assert_eq!(debouncer.offer(Detected, start), None);
        assert_eq!(debouncer.offer(NotDetected, start + ms(500)), None);
        assert_eq!(debouncer.offer(Detected, start + ms(1000)), None);

        // The window restarted at t=1.0s, so nothing is due at t=2.5s.
        assert_eq!(debouncer.poll(start + ms(2500)), None);
        assert_eq!(debouncer.deadline(), Some(start + ms(3000)));
        assert_eq!(debouncer.poll(start + ms(3000)), Some(Detected));
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.poll(start + ms(10_000)), None);
    }

    #[test]
    fn test_settled_duplicate_is_suppressed() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(2));

        debouncer.offer(NotDetected, start);
        assert_eq!(debouncer.poll(start + ms(2000)), Some(NotDetected));

        // Flaps back to the published value before settling.
        debouncer.offer(Detected, start + ms(3000));
        debouncer.offer(NotDetected, start + ms(3500));
        assert_eq!(debouncer.poll(start + ms(5500)), None);
        assert_eq!(debouncer.last_published(), Some(NotDetected));
    }
}

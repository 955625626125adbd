//! Exponential backoff implementations

use std::{iter::Iterator, time::Duration};

/// Exponential backoff iterator
///
/// Each element in the Iterator is the previous element multiplied by the `multiplier` property,
/// capped at the `ceiling`. Without a limit the iterator never ends, which makes it suitable for
/// retry loops that only stop once the operation succeeds or an outer deadline passes.
pub struct Backoff {
    retries: u32,
    limit: Option<u32>,
    multiplier: u32,
    current: Duration,
    ceiling: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            retries: 0,
            limit: None,
            multiplier: 2,
            current: Duration::from_millis(25),
            ceiling: Duration::from_secs(5),
        }
    }
}

impl Backoff {
    /// Creates a backoff which yields at most `limit` durations
    pub fn limited(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Upper bound for individual durations
    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Resets the iterator to its initial state after an operation succeeded
    pub fn reset(&mut self) {
        *self = Self {
            limit: self.limit,
            ceiling: self.ceiling,
            ..Default::default()
        };
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.retries += 1;

        if matches!(self.limit, Some(limit) if self.retries > limit) {
            None
        } else {
            self.current = (self.current * self.multiplier).min(self.ceiling);
            Some(self.current)
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn increase_monotonically() {
        let mut previous = Duration::default();

        for duration in Backoff::limited(13).with_ceiling(Duration::from_secs(3600)) {
            assert!(previous < duration);
            previous = duration;
        }
    }

    #[test]
    fn respect_the_ceiling() {
        let ceiling = Duration::from_millis(400);
        let durations: Vec<Duration> = Backoff::default().with_ceiling(ceiling).take(20).collect();

        assert_eq!(durations.len(), 20);
        assert!(durations.iter().all(|d| *d <= ceiling));
        assert_eq!(durations.last(), Some(&ceiling));
    }

    #[test]
    fn stop_at_the_limit() {
        assert_eq!(Backoff::limited(3).count(), 3);
    }

    #[test]
    fn start_over_after_reset() {
        let mut backoff = Backoff::limited(2);
        let first = backoff.next();
        backoff.next();
        assert_eq!(backoff.next(), None);

        backoff.reset();
        assert_eq!(backoff.next(), first);
    }
}

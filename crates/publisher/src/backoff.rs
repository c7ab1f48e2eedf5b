//! Exponential backoff schedule for delivery attempts.

use std::time::Duration;

/// How many times to try a delivery and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the second attempt; doubles for every attempt after it.
    pub initial_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Backoff {
    /// 3 attempts, 10ms then 20ms apart.
    pub const DEFAULT: Self = Self {
        initial_delay: Duration::from_millis(10),
        max_attempts: 3,
    };

    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// The wait before `attempt` (1-based). The first attempt is immediate.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        let exponent = (attempt - 2).min(31);
        Some(self.initial_delay.saturating_mul(1 << exponent))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_before(1), None);
        assert_eq!(backoff.delay_before(2), Some(Duration::from_millis(10)));
        assert_eq!(backoff.delay_before(3), Some(Duration::from_millis(20)));
        assert_eq!(backoff.max_attempts, 3);
    }

    #[test]
    fn delays_strictly_increase() {
        let backoff = Backoff::new(Duration::from_millis(10), 6);
        let delays: Vec<_> = (2..=6).filter_map(|n| backoff.delay_before(n)).collect();
        assert_eq!(delays.len(), 5);
        assert!(delays.windows(2).all(|w| w[0] < w[1]), "{delays:?}");
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(Backoff::new(Duration::ZERO, 0).max_attempts, 1);
    }
}

//! Consecutive-failure counter shared by both transports.

use std::time::Duration;

/// Failure counter that rests at 1.
///
/// The next poll interval is `min(base * count, max)`. A count above 1 is
/// "elevated" (rotate the node); reaching the ceiling escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    count: u32,
    ceiling: u32,
}

impl RetryCounter {
    /// A counter at rest.
    pub fn new(ceiling: u32) -> Self {
        Self { count: 1, ceiling }
    }

    /// Current value.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Records a failure and returns the new value.
    pub fn fail(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Back to rest.
    pub fn reset(&mut self) {
        self.count = 1;
    }

    pub fn is_elevated(&self) -> bool {
        self.count > 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.ceiling
    }

    /// `min(base * count, max)`.
    pub fn interval(&self, base: Duration, max: Duration) -> Duration {
        base.saturating_mul(self.count.max(1)).min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_scales_with_failures_and_resets() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(30);
        let mut counter = RetryCounter::new(10);

        assert_eq!(counter.interval(base, max), base);
        assert!(!counter.is_elevated());

        counter.fail();
        counter.fail();
        assert_eq!(counter.count(), 3);
        assert!(counter.is_elevated());
        assert_eq!(counter.interval(base, max), Duration::from_secs(15));

        for _ in 0..4 {
            counter.fail();
        }
        assert_eq!(counter.interval(base, max), max);

        counter.reset();
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.interval(base, max), base);
    }

    #[test]
    fn ceiling() {
        let mut counter = RetryCounter::new(3);
        counter.fail();
        assert!(!counter.is_exhausted());
        counter.fail();
        assert!(counter.is_exhausted());
    }
}

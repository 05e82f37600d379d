// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped exponential backoff with a terminal attempt limit.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts,
        }
    }

    /// `min(base * 2^attempt, max)`; `attempt` counts from zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// True once `failures` consecutive attempts have failed.
    pub fn exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let b = Backoff::default();
        assert_eq!(b.delay(0), Duration::from_secs(1));
        assert_eq!(b.delay(1), Duration::from_secs(2));
        assert_eq!(b.delay(4), Duration::from_secs(16));
        assert_eq!(b.delay(5), Duration::from_secs(30));
        assert_eq!(b.delay(60), Duration::from_secs(30));
    }

    #[test]
    fn exhaustion_is_at_the_limit() {
        let b = Backoff::default();
        assert!(!b.exhausted(4));
        assert!(b.exhausted(5));
    }
}

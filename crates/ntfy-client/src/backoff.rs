//! Reconnection policy: bounded exponential backoff with a give-up point.

use std::time::Duration;

const BASE_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Backoff parameters. `Default` is 5s doubling up to 60s, giving up on the
/// 10th consecutive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

/// What to do after a session ends abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: BASE_BACKOFF,
            cap: MAX_BACKOFF,
            max_attempts: MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^(attempt-1), cap)` for attempt >= 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Decide the next step given the consecutive failures recorded before
    /// the one that just happened.
    pub fn next_step(&self, failures_so_far: u32) -> RetryDecision {
        let attempt = failures_so_far.saturating_add(1);
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            attempt,
            delay: self.delay_for(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_sequence() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=9).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, [5, 10, 20, 40, 60, 60, 60, 60, 60]);
    }

    #[test]
    fn tenth_failure_gives_up() {
        let policy = ReconnectPolicy::default();
        let mut failures = 0;
        let mut scheduled = Vec::new();
        loop {
            match policy.next_step(failures) {
                RetryDecision::Retry { attempt, delay } => {
                    assert_eq!(attempt, failures + 1);
                    scheduled.push(delay.as_secs());
                    failures = attempt;
                }
                RetryDecision::GiveUp => break,
            }
        }
        assert_eq!(scheduled, [5, 10, 20, 40, 60, 60, 60, 60, 60]);
        assert_eq!(failures, 9);
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(64), MAX_BACKOFF);
        assert_eq!(policy.delay_for(u32::MAX), MAX_BACKOFF);
        assert_eq!(policy.next_step(u32::MAX), RetryDecision::GiveUp);
    }

    #[test]
    fn custom_policy_scales() {
        let policy = ReconnectPolicy {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(35),
            max_attempts: 3,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(35));
        assert!(matches!(policy.next_step(1), RetryDecision::Retry { attempt: 2, .. }));
        assert_eq!(policy.next_step(2), RetryDecision::GiveUp);
    }
}

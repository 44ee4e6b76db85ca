//! Back-off between connection attempts

use std::time::Duration;

use rand::Rng;

use sl_core::config::{BackoffConfig, BackoffPolicy};

/// Seconds to wait before the next attempt.
///
/// `attempt` counts failures so far, starting at 0. The result never
/// exceeds `max_interval`.
pub fn wait_for_retry(policy: BackoffPolicy, attempt: u32, interval: u64, max_interval: u64) -> u64 {
    let wait = match policy {
        BackoffPolicy::None => interval,
        BackoffPolicy::Linear => interval.saturating_mul(u64::from(attempt) + 1),
        BackoffPolicy::Exponential => {
            let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
            interval.saturating_mul(factor)
        }
    };
    wait.min(max_interval)
}

/// Replace `wait` with a uniform random value in `[0, wait]`
pub fn jittered<R: Rng>(wait: u64, rng: &mut R) -> u64 {
    if wait == 0 {
        0
    } else {
        rng.gen_range(0..=wait)
    }
}

/// Attempt bookkeeping, owned by the supervisor loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Failed attempts so far
    pub attempt: u32,
    /// Last wait handed out, in seconds
    pub last_wait_secs: u64,
}

/// Hands out waits according to the configured policy
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    config: BackoffConfig,
    state: RetryState,
}

impl RetryScheduler {
    /// Create a scheduler from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            config: config.clone(),
            state: RetryState::default(),
        }
    }

    /// Record a failed attempt and return the wait before the next one.
    ///
    /// The wait is computed from the attempt count *before* this failure is
    /// counted, so the first failure always waits one base interval.
    pub fn next_wait(&mut self) -> Duration {
        let mut wait = wait_for_retry(
            self.config.policy,
            self.state.attempt,
            self.config.interval.as_secs(),
            self.config.max_interval.as_secs(),
        );
        if self.config.jitter {
            wait = jittered(wait, &mut rand::thread_rng());
        }

        self.state.attempt = self.state.attempt.saturating_add(1);
        self.state.last_wait_secs = wait;
        Duration::from_secs(wait)
    }

    /// Failed attempts so far
    pub fn attempts(&self) -> u32 {
        self.state.attempt
    }

    /// Current state
    pub fn state(&self) -> RetryState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const POLICIES: [BackoffPolicy; 3] = [
        BackoffPolicy::None,
        BackoffPolicy::Linear,
        BackoffPolicy::Exponential,
    ];

    #[test]
    fn test_none_is_constant() {
        for attempt in 0..50 {
            assert_eq!(wait_for_retry(BackoffPolicy::None, attempt, 10, 60), 10);
        }
    }

    #[test]
    fn test_linear_grows_by_interval() {
        assert_eq!(wait_for_retry(BackoffPolicy::Linear, 0, 10, 60), 10);
        assert_eq!(wait_for_retry(BackoffPolicy::Linear, 1, 10, 60), 20);
        assert_eq!(wait_for_retry(BackoffPolicy::Linear, 4, 10, 60), 50);
        assert_eq!(wait_for_retry(BackoffPolicy::Linear, 5, 10, 60), 60);
        assert_eq!(wait_for_retry(BackoffPolicy::Linear, 100, 10, 60), 60);
    }

    #[test]
    fn test_exponential_doubles() {
        assert_eq!(wait_for_retry(BackoffPolicy::Exponential, 0, 1, 60), 1);
        assert_eq!(wait_for_retry(BackoffPolicy::Exponential, 1, 1, 60), 2);
        assert_eq!(wait_for_retry(BackoffPolicy::Exponential, 2, 1, 60), 4);
        assert_eq!(wait_for_retry(BackoffPolicy::Exponential, 5, 1, 60), 32);
        assert_eq!(wait_for_retry(BackoffPolicy::Exponential, 6, 1, 60), 60);
    }

    #[test]
    fn test_huge_attempts_do_not_overflow() {
        for policy in POLICIES {
            let expected = if policy == BackoffPolicy::None { 10 } else { 300 };
            assert_eq!(wait_for_retry(policy, u32::MAX, 10, 300), expected);
        }
    }

    #[test]
    fn test_all_policies_match_closed_form_and_are_monotonic() {
        for interval in 1..=12u64 {
            for max_interval in [interval, interval * 3, 100, 1000] {
                for policy in POLICIES {
                    let mut previous = 0;
                    for attempt in 0..40u32 {
                        let wait = wait_for_retry(policy, attempt, interval, max_interval);
                        let expected = match policy {
                            BackoffPolicy::None => interval,
                            BackoffPolicy::Linear => {
                                (interval * (u64::from(attempt) + 1)).min(max_interval)
                            }
                            BackoffPolicy::Exponential => interval
                                .saturating_mul(1u64 << attempt)
                                .min(max_interval),
                        };
                        assert_eq!(wait, expected, "{:?} attempt {}", policy, attempt);
                        assert!(wait <= max_interval);
                        assert!(wait >= previous);
                        previous = wait;
                    }
                }
            }
        }
    }

    #[test]
    fn test_jitter_stays_in_range_and_varies() {
        let mut rng = StdRng::seed_from_u64(1);
        let seen: HashSet<u64> = (0..200).map(|_| jittered(30, &mut rng)).collect();
        assert!(seen.len() > 1);
        assert!(seen.iter().all(|w| *w <= 30));
    }

    #[test]
    fn test_jitter_of_zero_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(jittered(0, &mut rng), 0);
    }

    #[test]
    fn test_scheduler_counts_attempts() {
        let config = BackoffConfig {
            policy: BackoffPolicy::Exponential,
            interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(10),
            jitter: false,
        };
        let mut scheduler = RetryScheduler::from_config(&config);

        assert_eq!(scheduler.next_wait(), Duration::from_secs(2));
        assert_eq!(scheduler.next_wait(), Duration::from_secs(4));
        assert_eq!(scheduler.next_wait(), Duration::from_secs(8));
        assert_eq!(scheduler.next_wait(), Duration::from_secs(10));
        assert_eq!(
            scheduler.state(),
            RetryState {
                attempt: 4,
                last_wait_secs: 10
            }
        );
    }

    #[test]
    fn test_scheduler_jitter_bounded_by_policy() {
        let config = BackoffConfig {
            policy: BackoffPolicy::Linear,
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(20),
            jitter: true,
        };
        let mut scheduler = RetryScheduler::from_config(&config);
        for attempt in 0..10u64 {
            let wait = scheduler.next_wait().as_secs();
            assert!(wait <= (5 * (attempt + 1)).min(20));
        }
    }
}

// ABOUTME: Attempt-bounded retry strategies computing when the next attempt may run
// ABOUTME: Fixed delay, fixed interval, exponential backoff and per-execution delay variants

use std::time::Duration;

use tokio::time::Instant;

/// Decides whether and when a failed action may be retried.
///
/// A strategy is consumed by a single execution: the executor obtains a fresh
/// instance per call through a [`RetryStrategyProvider`]. `next_date` is
/// invoked exactly once per real attempt and is the only method with side
/// effects; `terminated` and `remaining_retries` can be called any number of
/// times between attempts without changing the outcome.
pub trait RetryStrategy: Send {
    /// Whether the attempt budget is exhausted
    fn terminated(&self) -> bool;

    /// Attempts still allowed before `terminated` becomes true
    fn remaining_retries(&self) -> u32;

    /// Consume one attempt and return the instant the next attempt may run.
    ///
    /// `first_attempt` and `last_attempt` are the start instants of the first
    /// and the most recent attempt of this execution.
    fn next_date(&mut self, first_attempt: Instant, last_attempt: Instant) -> Instant;
}

/// Supplies a fresh [`RetryStrategy`] for each execution.
///
/// Returning `None` means retries are disabled: the executor performs a
/// single attempt and surfaces its failure immediately.
pub trait RetryStrategyProvider: Send + Sync {
    /// Provide a new strategy, or `None` when retries are disabled
    fn provide(&self) -> Option<Box<dyn RetryStrategy>>;
}

/// Retry after a fixed delay counted from the end of the last attempt
#[derive(Debug)]
pub struct FixedDelayRetry {
    max_attempts: u32,
    delay: Duration,
    executed: u32,
}

impl FixedDelayRetry {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            executed: 0,
        }
    }
}

impl RetryStrategy for FixedDelayRetry {
    fn terminated(&self) -> bool {
        self.executed >= self.max_attempts
    }

    fn remaining_retries(&self) -> u32 {
        self.max_attempts - self.executed
    }

    fn next_date(&mut self, _first_attempt: Instant, last_attempt: Instant) -> Instant {
        self.executed += 1;
        last_attempt + self.delay
    }
}

/// Retry on a fixed schedule anchored at the first attempt.
///
/// Attempt *n* runs at `first_attempt + n × interval` regardless of how long
/// the attempts themselves take. If an attempt overruns its slot the next
/// date may already be in the past; the executor then retries immediately.
#[derive(Debug)]
pub struct FixedIntervalRetry {
    max_attempts: u32,
    interval: Duration,
    executed: u32,
}

impl FixedIntervalRetry {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            executed: 0,
        }
    }
}

impl RetryStrategy for FixedIntervalRetry {
    fn terminated(&self) -> bool {
        self.executed >= self.max_attempts
    }

    fn remaining_retries(&self) -> u32 {
        self.max_attempts - self.executed
    }

    fn next_date(&mut self, first_attempt: Instant, _last_attempt: Instant) -> Instant {
        self.executed += 1;
        first_attempt + self.interval.saturating_mul(self.executed)
    }
}

/// Retry with exponentially growing delays: base, 2×base, 4×base, ...
#[derive(Debug)]
pub struct ExponentialDelayRetry {
    max_attempts: u32,
    initial_delay: Duration,
    executed: u32,
}

impl ExponentialDelayRetry {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            executed: 0,
        }
    }
}

impl RetryStrategy for ExponentialDelayRetry {
    fn terminated(&self) -> bool {
        self.executed >= self.max_attempts
    }

    fn remaining_retries(&self) -> u32 {
        self.max_attempts - self.executed
    }

    fn next_date(&mut self, _first_attempt: Instant, last_attempt: Instant) -> Instant {
        self.executed += 1;
        let factor = 2u32.saturating_pow(self.executed - 1);
        last_attempt + self.initial_delay.saturating_mul(factor)
    }
}

/// Retry with an explicit delay per attempt.
///
/// Attempt *n* waits `delays[n - 1]` after the last attempt; once the list is
/// exhausted the final delay keeps being used for the remaining attempts.
#[derive(Debug)]
pub struct PerExecutionDelayRetry {
    max_attempts: u32,
    delays: Vec<Duration>,
    executed: u32,
}

impl PerExecutionDelayRetry {
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            delays,
            executed: 0,
        }
    }
}

impl RetryStrategy for PerExecutionDelayRetry {
    fn terminated(&self) -> bool {
        self.executed >= self.max_attempts
    }

    fn remaining_retries(&self) -> u32 {
        self.max_attempts - self.executed
    }

    fn next_date(&mut self, _first_attempt: Instant, last_attempt: Instant) -> Instant {
        self.executed += 1;
        let index = (self.executed as usize).min(self.delays.len());
        let delay = index
            .checked_sub(1)
            .and_then(|i| self.delays.get(i))
            .copied()
            .unwrap_or(Duration::ZERO);
        last_attempt + delay
    }
}

/// Configuration-driven strategy provider.
///
/// Maps directly onto the retry settings a deployment exposes; each `provide`
/// call builds a fresh strategy so concurrent executions never share attempt
/// counters.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use smsgate::retry::{RetryPolicy, RetryStrategyProvider};
///
/// let policy = RetryPolicy::ExponentialDelay {
///     max_attempts: 5,
///     initial_delay: Duration::from_millis(500),
/// };
/// assert!(policy.provide().is_some());
/// assert!(RetryPolicy::None.provide().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retries disabled: one attempt only
    None,
    /// Fixed pause between attempts
    FixedDelay {
        max_attempts: u32,
        delay: Duration,
    },
    /// Attempts anchored on a fixed schedule from the first attempt
    FixedInterval {
        max_attempts: u32,
        interval: Duration,
    },
    /// Exponentially growing pause between attempts
    ExponentialDelay {
        max_attempts: u32,
        initial_delay: Duration,
    },
    /// Explicit pause per attempt, last entry repeated
    PerExecutionDelay {
        max_attempts: u32,
        delays: Vec<Duration>,
    },
}

impl RetryStrategyProvider for RetryPolicy {
    fn provide(&self) -> Option<Box<dyn RetryStrategy>> {
        match self {
            RetryPolicy::None => None,
            RetryPolicy::FixedDelay {
                max_attempts,
                delay,
            } => Some(Box::new(FixedDelayRetry::new(*max_attempts, *delay))),
            RetryPolicy::FixedInterval {
                max_attempts,
                interval,
            } => Some(Box::new(FixedIntervalRetry::new(*max_attempts, *interval))),
            RetryPolicy::ExponentialDelay {
                max_attempts,
                initial_delay,
            } => Some(Box::new(ExponentialDelayRetry::new(
                *max_attempts,
                *initial_delay,
            ))),
            RetryPolicy::PerExecutionDelay {
                max_attempts,
                delays,
            } => Some(Box::new(PerExecutionDelayRetry::new(
                *max_attempts,
                delays.clone(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_terminated_is_idempotent_between_attempts() {
        let mut retry = FixedDelayRetry::new(3, millis(10));
        let now = Instant::now();
        retry.next_date(now, now);
        for _ in 0..3 {
            assert!(!retry.terminated());
            assert_eq!(retry.remaining_retries(), 2);
        }
    }

    #[test]
    fn test_fixed_delay_counts_from_last_attempt() {
        let mut retry = FixedDelayRetry::new(3, millis(100));
        let first = Instant::now();
        let last = first + millis(250);
        assert_eq!(retry.next_date(first, last), last + millis(100));
        assert_eq!(retry.next_date(first, last), last + millis(100));
    }

    #[test]
    fn test_fixed_interval_anchors_on_first_attempt() {
        let mut retry = FixedIntervalRetry::new(3, millis(100));
        let first = Instant::now();
        let last = first + millis(10);
        assert_eq!(retry.next_date(first, last), first + millis(100));
        assert_eq!(retry.next_date(first, last), first + millis(200));
        assert_eq!(retry.next_date(first, last), first + millis(300));
        assert!(retry.terminated());
    }

    #[test]
    fn test_exponential_delay_doubles_each_attempt() {
        let mut retry = ExponentialDelayRetry::new(5, millis(10));
        let first = Instant::now();
        for expected in [10u64, 20, 40, 80, 160] {
            assert!(!retry.terminated(), "not terminated before attempt budget");
            let last = Instant::now();
            assert_eq!(retry.next_date(first, last), last + millis(expected));
        }
        assert!(retry.terminated());
    }

    #[test]
    fn test_per_execution_delay_repeats_last_entry() {
        let mut retry = PerExecutionDelayRetry::new(4, vec![millis(5), millis(50)]);
        let now = Instant::now();
        assert_eq!(retry.next_date(now, now), now + millis(5));
        assert_eq!(retry.next_date(now, now), now + millis(50));
        assert_eq!(retry.next_date(now, now), now + millis(50));
        assert_eq!(retry.next_date(now, now), now + millis(50));
        assert!(retry.terminated());
    }

    #[test]
    fn test_per_execution_delay_with_empty_list_retries_immediately() {
        let mut retry = PerExecutionDelayRetry::new(2, vec![]);
        let now = Instant::now();
        assert_eq!(retry.next_date(now, now), now);
    }

    #[test]
    fn test_policy_provides_fresh_strategies() {
        let policy = RetryPolicy::FixedDelay {
            max_attempts: 1,
            delay: millis(10),
        };
        let mut first = policy.provide().unwrap();
        let now = Instant::now();
        first.next_date(now, now);
        assert!(first.terminated());
        // a second execution starts with a full budget
        assert!(!policy.provide().unwrap().terminated());
    }
}

// ABOUTME: Retry executor driving bounded re-execution of fallible async actions
// ABOUTME: Strategy decides the schedule, Awaiter performs the pause, errors keep every cause

//! Bounded retries for fallible actions.
//!
//! The [`SimpleRetryExecutor`] runs an action, asks a fresh [`RetryStrategy`]
//! when the next attempt may start, waits through an [`Awaiter`] and tries
//! again until the action succeeds or the attempt budget is spent. Every
//! failure is kept in attempt order so the final error tells the whole story.
//!
//! Errors opt out of retries through the [`Retryable`] trait: an error that
//! reports itself non-retryable short-circuits the loop immediately.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use smsgate::retry::{RetryPolicy, SimpleRetryExecutor, TokioAwaiter};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SimpleRetryExecutor::new(
//!     RetryPolicy::FixedDelay { max_attempts: 3, delay: Duration::from_millis(500) },
//!     TokioAwaiter,
//! );
//! let value = executor
//!     .execute("fetch", || async { fetch().await })
//!     .await?;
//! # Ok(())
//! # }
//! # async fn fetch() -> Result<u32, smsgate::session::TransportError> { Ok(1) }
//! ```

pub mod strategy;

pub use strategy::{
    ExponentialDelayRetry, FixedDelayRetry, FixedIntervalRetry, PerExecutionDelayRetry,
    RetryPolicy, RetryStrategy, RetryStrategyProvider,
};

use std::future::Future;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Error raised while waiting between attempts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The wait was cancelled before the target instant
    #[error("wait until next attempt was interrupted")]
    Interrupted,
}

/// Pauses an execution until a target instant.
///
/// Separated from the executor so tests can observe the requested instants
/// instead of sleeping through them.
pub trait Awaiter: Send + Sync {
    /// Wait until `deadline`; instants already in the past return immediately
    fn wait_until(&self, deadline: Instant) -> impl Future<Output = Result<(), WaitError>> + Send;
}

/// [`Awaiter`] backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioAwaiter;

impl Awaiter for TokioAwaiter {
    async fn wait_until(&self, deadline: Instant) -> Result<(), WaitError> {
        tokio::time::sleep_until(deadline).await;
        Ok(())
    }
}

/// Whether an error is worth another attempt.
///
/// Implemented by the error types an action can produce; permanent failures
/// (bad destination address, invalid content) return `false` and stop the
/// retry loop on the first occurrence.
pub trait Retryable {
    fn retryable(&self) -> bool;
}

/// Why a retried execution ultimately failed
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Retries are disabled and the single attempt failed
    #[error("'{action}' failed and no retry strategy is configured")]
    NotRetried {
        action: String,
        #[source]
        cause: E,
    },

    /// Every allowed attempt failed; causes are in attempt order
    #[error("'{action}' still failing after {} attempts", .causes.len())]
    MaximumAttemptsReached { action: String, causes: Vec<E> },

    /// The action reported an error not worth retrying
    #[error("'{action}' failed with an unrecoverable error")]
    Unrecoverable {
        action: String,
        #[source]
        cause: E,
    },

    /// The pause before the next attempt was interrupted
    #[error("'{action}' retry wait interrupted")]
    Interrupted {
        action: String,
        #[source]
        cause: WaitError,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Name of the action that failed
    pub fn action(&self) -> &str {
        match self {
            RetryError::NotRetried { action, .. }
            | RetryError::MaximumAttemptsReached { action, .. }
            | RetryError::Unrecoverable { action, .. }
            | RetryError::Interrupted { action, .. } => action,
        }
    }
}

/// Start instants of the first and most recent attempt of one execution
#[derive(Debug, Clone, Copy)]
struct RetryContext {
    first_attempt: Instant,
    last_attempt: Instant,
}

impl RetryContext {
    fn starting(now: Instant) -> Self {
        Self {
            first_attempt: now,
            last_attempt: now,
        }
    }

    fn record_attempt(&mut self, now: Instant) {
        self.last_attempt = now;
    }
}

/// Runs actions with retries driven by a strategy provider.
///
/// Each `execute` call obtains its own strategy, so concurrent executions
/// never share an attempt budget. The executor is cheap to clone behind an
/// `Arc` and holds no per-execution state.
#[derive(Debug)]
pub struct SimpleRetryExecutor<P, A> {
    provider: P,
    awaiter: A,
}

impl<P, A> SimpleRetryExecutor<P, A>
where
    P: RetryStrategyProvider,
    A: Awaiter,
{
    pub fn new(provider: P, awaiter: A) -> Self {
        Self { provider, awaiter }
    }

    /// Run `attempt` until it succeeds or the strategy gives up.
    ///
    /// `action` names the operation in errors and logs. Failures accumulate
    /// in attempt order; an error whose [`Retryable::retryable`] is false
    /// aborts immediately with [`RetryError::Unrecoverable`].
    pub async fn execute<V, E, F, Fut>(&self, action: &str, attempt: F) -> Result<V, RetryError<E>>
    where
        E: std::error::Error + Retryable + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let Some(mut strategy) = self.provider.provide() else {
            debug!(action, "no retry strategy configured, single attempt");
            return attempt().await.map_err(|cause| RetryError::NotRetried {
                action: action.to_string(),
                cause,
            });
        };

        let mut context = RetryContext::starting(Instant::now());
        let mut causes = Vec::new();

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(cause) if !cause.retryable() => {
                    warn!(action, error = %cause, "unrecoverable error, not retrying");
                    return Err(RetryError::Unrecoverable {
                        action: action.to_string(),
                        cause,
                    });
                }
                Err(cause) => {
                    debug!(
                        action,
                        error = %cause,
                        remaining = strategy.remaining_retries().saturating_sub(1),
                        "attempt failed"
                    );
                    causes.push(cause);
                }
            }

            let next = strategy.next_date(context.first_attempt, context.last_attempt);
            if strategy.terminated() {
                warn!(action, attempts = causes.len(), "attempt budget exhausted");
                return Err(RetryError::MaximumAttemptsReached {
                    action: action.to_string(),
                    causes,
                });
            }

            self.awaiter
                .wait_until(next)
                .await
                .map_err(|cause| RetryError::Interrupted {
                    action: action.to_string(),
                    cause,
                })?;
            context.record_attempt(Instant::now());
        }
    }
}

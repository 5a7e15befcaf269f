//! Bounded retry with exponential backoff for generative calls.
//!
//! The pipeline treats an empty capability response and an erroring one as
//! equally retryable: both come back as a non-`Complete` [`Attempt`] and
//! both consume one of the bounded attempts. After the final attempt the
//! executor returns a not-ok outcome instead of propagating an error —
//! callers must match on [`RetryOutcome`].
//!
//! ## Best-partial salvage
//!
//! Some drafting workflows produce usable intermediate text even when the
//! final response comes back empty. Rather than reading that text out of
//! hidden shared state after the fact, each attempt reports its best
//! partial output explicitly and the executor tracks the most recent one
//! across attempts. When every attempt ends empty or failed but a partial
//! exists, the outcome is [`RetryOutcome::Salvaged`].

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Result of a single attempt at a generative operation.
#[derive(Debug, Clone)]
pub enum Attempt<T> {
    /// The attempt produced a full result.
    Complete(T),
    /// The attempt finished but produced nothing usable; `partial` carries
    /// the best intermediate output observed during the attempt, if any.
    Empty { partial: Option<T> },
    /// The attempt failed outright.
    Failed { detail: String, partial: Option<T> },
}

/// Final outcome after the retry budget is spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// An attempt completed normally.
    Success(T),
    /// Every attempt ended empty or failed, but a partial result was
    /// observed and is returned in its place.
    Salvaged(T),
    /// Nothing usable was produced; carries the last failure detail.
    Exhausted(String),
}

impl<T> RetryOutcome<T> {
    /// The usable result, whether complete or salvaged.
    pub fn into_result(self) -> Option<T> {
        match self {
            RetryOutcome::Success(v) | RetryOutcome::Salvaged(v) => Some(v),
            RetryOutcome::Exhausted(_) => None,
        }
    }
}

/// Retry policy: attempt count and backoff shape.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. An always-failing operation is
    /// invoked exactly this many times.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Multiplier applied per subsequent attempt.
    pub multiplier: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: multiplier.max(1),
        }
    }

    /// Backoff before retry number `retry` (0-based): `base * multiplier^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * self.multiplier.pow(retry)
    }

    /// Drive `op` until it completes or the attempt budget is spent.
    ///
    /// `op` receives the 0-based attempt number, useful for logging.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut best_partial: Option<T> = None;
        let mut last_detail = String::from("empty response");

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = self.delay_for(attempt - 1);
                warn!(
                    "Retry {}/{} after {:?}",
                    attempt + 1,
                    self.max_attempts,
                    backoff
                );
                sleep(backoff).await;
            }

            match op(attempt).await {
                Attempt::Complete(v) => return RetryOutcome::Success(v),
                Attempt::Empty { partial } => {
                    if let Some(p) = partial {
                        best_partial = Some(p);
                    }
                    last_detail = "empty response".to_string();
                }
                Attempt::Failed { detail, partial } => {
                    if let Some(p) = partial {
                        best_partial = Some(p);
                    }
                    warn!("Attempt {} failed: {}", attempt + 1, detail);
                    last_detail = detail;
                }
            }
        }

        match best_partial {
            Some(p) => RetryOutcome::Salvaged(p),
            None => RetryOutcome::Exhausted(last_detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1), 2)
    }

    #[test]
    fn delays_are_non_decreasing() {
        let p = RetryPolicy::new(5, Duration::from_millis(500), 2);
        let mut prev = Duration::ZERO;
        for retry in 0..4 {
            let d = p.delay_for(retry);
            assert!(d >= prev, "delay shrank at retry {retry}");
            prev = d;
        }
        assert_eq!(p.delay_for(0), Duration::from_millis(500));
        assert_eq!(p.delay_for(1), Duration::from_millis(1000));
        assert_eq!(p.delay_for(2), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn success_on_first_attempt_makes_one_call() {
        let calls = AtomicU32::new(0);
        let outcome = fast_policy(3)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Attempt::Complete("ok") }
            })
            .await;
        assert_eq!(outcome, RetryOutcome::Success("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn always_failing_op_is_invoked_exactly_max_attempts_times() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<&str> = fast_policy(3)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Attempt::Failed {
                        detail: "boom".into(),
                        partial: None,
                    }
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome, RetryOutcome::Exhausted("boom".into()));
    }

    #[tokio::test]
    async fn empty_attempts_with_partial_are_salvaged() {
        let outcome = fast_policy(2)
            .run(|attempt| async move {
                Attempt::Empty {
                    partial: (attempt == 1).then(|| "draft fragment".to_string()),
                }
            })
            .await;
        assert_eq!(outcome, RetryOutcome::Salvaged("draft fragment".into()));
    }

    #[tokio::test]
    async fn later_partial_supersedes_earlier() {
        let outcome = fast_policy(2)
            .run(|attempt| async move {
                Attempt::Failed {
                    detail: "err".into(),
                    partial: Some(format!("partial-{attempt}")),
                }
            })
            .await;
        assert_eq!(outcome, RetryOutcome::Salvaged("partial-1".into()));
    }

    #[tokio::test]
    async fn recovery_after_failure_is_success() {
        let outcome = fast_policy(3)
            .run(|attempt| async move {
                if attempt < 1 {
                    Attempt::Failed {
                        detail: "transient".into(),
                        partial: None,
                    }
                } else {
                    Attempt::Complete(attempt)
                }
            })
            .await;
        assert_eq!(outcome, RetryOutcome::Success(1));
    }
}

//! Timer-based polling of an asynchronous condition.
//!
//! Jenkins reports build progress only through its JSON API, so waiting for a
//! queue item to start or a build to finish means re-evaluating a condition
//! until it holds. [`poll`] does that without blocking: between evaluations
//! the task sleeps on a tokio timer, so other requests keep running.
//!
//! # Semantics
//!
//! - `Ok(PollOutcome::Done(v))` resolves the poll with `v` immediately
//! - `Ok(PollOutcome::NotYet)` sleeps for `interval`, then evaluates again
//! - `Err(e)` is terminal and is returned as [`PollError::Predicate`] without retrying
//! - If nothing is `Done` within `timeout` of the poll starting, the poll
//!   fails with [`PollError::Timeout`]. The budget also covers an evaluation
//!   that is still in flight when it runs out.
//!
//! The poller knows nothing about Jenkins; callers interpret responses in
//! the predicate.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Result of one evaluation of a poll predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The condition holds; polling stops with this value.
    Done(T),
    /// The condition does not hold yet; evaluate again after the interval.
    NotYet,
}

/// Interval and budget for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    interval: Duration,
    timeout: Duration,
}

/// Returned when a [`PollSpec`] would never allow a second evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("poll timeout ({timeout:?}) must exceed the poll interval ({interval:?})")]
pub struct InvalidPollSpec {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSpec {
    /// Creates a poll spec, rejecting `timeout <= interval`.
    pub const fn new(interval: Duration, timeout: Duration) -> Result<Self, InvalidPollSpec> {
        if timeout.as_nanos() <= interval.as_nanos() {
            return Err(InvalidPollSpec { interval, timeout });
        }
        Ok(PollSpec { interval, timeout })
    }

    /// Convenience constructor taking milliseconds.
    pub const fn from_millis(interval_ms: u64, timeout_ms: u64) -> Result<Self, InvalidPollSpec> {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    /// Delay between consecutive evaluations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total budget measured from the start of the poll.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Error returned by [`poll`].
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// No evaluation reported `Done` within the budget.
    #[error("condition not met within {timeout:?}")]
    Timeout { timeout: Duration },

    /// The predicate reported a terminal failure.
    #[error("{0}")]
    Predicate(E),
}

/// Evaluates `predicate` until it reports `Done`, fails, or the budget runs out.
///
/// Each call is independent; nothing is shared between polls.
///
/// # Examples
///
/// ```
/// use jenkins_pr_trigger::poll::{poll, PollOutcome, PollSpec};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
/// # rt.block_on(async {
/// let spec = PollSpec::from_millis(1, 1_000).unwrap();
/// let mut attempts = 0;
///
/// let value = poll(spec, || {
///     attempts += 1;
///     let n = attempts;
///     async move {
///         if n < 3 {
///             Ok::<_, std::convert::Infallible>(PollOutcome::NotYet)
///         } else {
///             Ok(PollOutcome::Done(n))
///         }
///     }
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(value, 3);
/// # });
/// ```
pub async fn poll<T, E, F, Fut>(spec: PollSpec, mut predicate: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollOutcome<T>, E>>,
{
    let evaluate = async {
        loop {
            match predicate().await {
                Ok(PollOutcome::Done(value)) => return Ok(value),
                Ok(PollOutcome::NotYet) => tokio::time::sleep(spec.interval).await,
                Err(e) => return Err(PollError::Predicate(e)),
            }
        }
    };

    match tokio::time::timeout(spec.timeout, evaluate).await {
        Ok(result) => result,
        Err(_) => Err(PollError::Timeout {
            timeout: spec.timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting<T>(
        counter: &Arc<AtomicU32>,
        respond: impl Fn(u32) -> Result<PollOutcome<T>, &'static str>,
    ) -> impl FnMut() -> std::future::Ready<Result<PollOutcome<T>, &'static str>> {
        let counter = counter.clone();
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(respond(n))
        }
    }

    // ─── PollSpec ───

    #[test]
    fn poll_spec_rejects_timeout_not_exceeding_interval() {
        assert!(PollSpec::from_millis(500, 500).is_err());
        assert!(PollSpec::from_millis(500, 100).is_err());
    }

    #[test]
    fn poll_spec_accepts_timeout_above_interval() {
        let spec = PollSpec::from_millis(500, 20_000).unwrap();
        assert_eq!(spec.interval(), Duration::from_millis(500));
        assert_eq!(spec.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn poll_spec_allows_zero_interval() {
        assert!(PollSpec::from_millis(0, 1).is_ok());
    }

    // ─── poll ───

    #[tokio::test(start_paused = true)]
    async fn done_on_first_evaluation_resolves_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = poll(
            PollSpec::from_millis(500, 20_000).unwrap(),
            counting(&counter, |_| Ok(PollOutcome::Done("url"))),
        )
        .await;

        assert_eq!(result.unwrap(), "url");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn not_yet_waits_one_interval_between_evaluations() {
        let counter = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = poll(
            PollSpec::from_millis(500, 20_000).unwrap(),
            counting(&counter, |n| {
                if n < 4 {
                    Ok(PollOutcome::NotYet)
                } else {
                    Ok(PollOutcome::Done(n))
                }
            }),
        )
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_failure_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = poll(
            PollSpec::from_millis(500, 20_000).unwrap(),
            counting(&counter, |n| {
                if n < 2 {
                    Ok(PollOutcome::<()>::NotYet)
                } else {
                    Err("build failed")
                }
            }),
        )
        .await;

        assert!(matches!(result, Err(PollError::Predicate("build failed"))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn never_done_times_out_after_budget() {
        let counter = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = poll(
            PollSpec::from_millis(500, 2_000).unwrap(),
            counting(&counter, |_| Ok(PollOutcome::<()>::NotYet)),
        )
        .await;

        match result {
            Err(PollError::Timeout { timeout }) => assert_eq!(timeout, Duration::from_secs(2)),
            other => panic!("Expected timeout, got {:?}", other),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        // Evaluations at 0, 500, 1000, 1500ms; the 2000ms one is cut off by the budget.
        assert!(counter.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_covers_a_hanging_evaluation() {
        let spec = PollSpec::from_millis(10, 1_000).unwrap();

        let result: Result<(), PollError<&'static str>> = poll(spec, || async {
            std::future::pending::<Result<PollOutcome<()>, &'static str>>().await
        })
        .await;

        assert!(matches!(result, Err(PollError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_polls_are_independent() {
        let fast = Arc::new(AtomicU32::new(0));
        let slow = Arc::new(AtomicU32::new(0));
        let spec = PollSpec::from_millis(100, 10_000).unwrap();

        let (a, b) = tokio::join!(
            poll(
                spec,
                counting(&fast, |n| if n < 2 {
                    Ok(PollOutcome::NotYet)
                } else {
                    Ok(PollOutcome::Done("fast"))
                })
            ),
            poll(
                spec,
                counting(&slow, |n| if n < 10 {
                    Ok(PollOutcome::NotYet)
                } else {
                    Ok(PollOutcome::Done("slow"))
                })
            ),
        );

        assert_eq!(a.unwrap(), "fast");
        assert_eq!(b.unwrap(), "slow");
        assert_eq!(fast.load(Ordering::SeqCst), 2);
        assert_eq!(slow.load(Ordering::SeqCst), 10);
    }
}

/*!

A fixed-interval condition poller. Every asynchronous cluster transition the
suite observes (deployment created, CSV succeeded, cluster policy ready, pod
phase reached) goes through [`wait_for`] instead of carrying its own timeout
loop.

!*/

use snafu::Snafu;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How often to re-evaluate a condition and how long to keep trying.
///
/// A useful policy has `timeout >= interval`; a policy with `timeout <
/// interval` still performs one immediate evaluation before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub const fn from_secs(interval: u64, timeout: u64) -> Self {
        Self::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }
}

/// The result of polling a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Satisfied,
    TimedOut,
}

/// The error produced when a wait gives up. Carries enough context for an
/// operator reading a failed run to know which object never converged.
#[derive(Debug, Snafu)]
#[snafu(display(
    "timed out after {}s waiting for {} on '{}/{}'",
    waited.as_secs(),
    condition,
    namespace,
    name
))]
pub struct TimedOut {
    pub condition: String,
    pub namespace: String,
    pub name: String,
    pub waited: Duration,
}

/// Evaluate `condition` until it returns `true` or `policy.timeout` of
/// wall-clock time has elapsed.
///
/// The first evaluation happens immediately, so a condition that already
/// holds returns without sleeping. The timeout is checked after each false
/// evaluation, which keeps termination correct even when individual
/// evaluations are slow. A lookup that fails transiently (the object does not
/// exist yet, the API briefly errored) should evaluate to `false`; the next
/// tick re-queries.
pub async fn poll_until<F, Fut>(policy: PollPolicy, mut condition: F) -> Outcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if condition().await {
            return Outcome::Satisfied;
        }
        if start.elapsed() >= policy.timeout {
            return Outcome::TimedOut;
        }
        sleep(policy.interval).await;
    }
}

/// [`poll_until`] with failure context. `condition` describes what is being
/// awaited and `namespace`/`name` identify the object (pass `"-"` for the
/// namespace of cluster-scoped objects).
pub async fn wait_for<F, Fut>(
    condition: &str,
    namespace: &str,
    name: &str,
    policy: PollPolicy,
    predicate: F,
) -> std::result::Result<(), TimedOut>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    match poll_until(policy, predicate).await {
        Outcome::Satisfied => Ok(()),
        Outcome::TimedOut => Err(TimedOut {
            condition: condition.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            waited: start.elapsed(),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    // Paused-clock tests: `sleep` advances virtual time instantly, so the
    // elapsed assertions are exact rather than flaky.

    #[tokio::test(start_paused = true)]
    async fn satisfied_immediately_performs_no_sleep() {
        let start = Instant::now();
        let outcome = poll_until(PollPolicy::from_secs(30, 240), || async { true }).await;
        assert_eq!(outcome, Outcome::Satisfied);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn satisfied_after_three_false_evaluations() {
        let calls = Cell::new(0u32);
        let start = Instant::now();
        let outcome = poll_until(PollPolicy::from_secs(1, 5), || {
            calls.set(calls.get() + 1);
            let satisfied = calls.get() > 3;
            async move { satisfied }
        })
        .await;
        assert_eq!(outcome, Outcome::Satisfied);
        assert_eq!(calls.get(), 4);
        // One sleep per false evaluation, nothing more.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn never_satisfied_times_out_within_one_interval_of_timeout() {
        let start = Instant::now();
        let outcome = poll_until(PollPolicy::from_secs(30, 240), || async { false }).await;
        assert_eq!(outcome, Outcome::TimedOut);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(240), "waited {:?}", waited);
        assert!(waited <= Duration::from_secs(270), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_shorter_than_interval_still_evaluates_once() {
        let calls = Cell::new(0u32);
        let outcome = poll_until(
            PollPolicy::new(Duration::from_secs(60), Duration::from_secs(1)),
            || {
                calls.set(calls.get() + 1);
                async { false }
            },
        )
        .await;
        assert_eq!(outcome, Outcome::TimedOut);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_object_reads_as_false_until_it_appears() {
        // Models a lookup that errors with "not found" for a while: the
        // caller maps the error to false and the poll keeps going.
        let lookups = Cell::new(0u32);
        let get_opt = || -> Result<Option<u32>, &'static str> {
            lookups.set(lookups.get() + 1);
            if lookups.get() < 3 {
                Err("not found")
            } else {
                Ok(Some(7))
            }
        };
        let outcome = poll_until(PollPolicy::from_secs(2, 60), || {
            let found = get_opt().ok().flatten().is_some();
            async move { found }
        })
        .await;
        assert_eq!(outcome, Outcome::Satisfied);
        assert_eq!(lookups.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_error_names_the_object_and_duration() {
        let err = wait_for(
            "cluster policy ready",
            "nvidia-gpu-operator",
            "gpu-cluster-policy",
            PollPolicy::from_secs(1, 3),
            || async { false },
        )
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cluster policy ready"), "{}", message);
        assert!(
            message.contains("nvidia-gpu-operator/gpu-cluster-policy"),
            "{}",
            message
        );
        assert!(err.waited >= Duration::from_secs(3));
    }
}

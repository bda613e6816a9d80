//! Bounded retry with a fixed pause.
//!
//! [`with_retry`] runs an action until it succeeds or the budget is spent and
//! reports the final outcome as a value. Failures never unwind past it.

use std::thread;
use std::time::Duration;

use webpub_core::JobConfig;

/// How many extra attempts an operation gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, pause: Duration) -> Self {
        Self { retries, pause }
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(
            config.retry_count,
            Duration::from_millis(config.retry_wait_milliseconds),
        )
    }

    /// First attempt plus retries.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Final result of a retried action.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32, last_error: E },
}

/// Run `action` against `ctx` until it returns `Ok` or the policy is exhausted.
///
/// `on_failure` sees every failed attempt (1-based) and whether another
/// attempt follows. The pause is only taken between attempts.
pub fn with_retry<C, E, F, N>(
    policy: RetryPolicy,
    ctx: &mut C,
    mut action: F,
    mut on_failure: N,
) -> RetryOutcome<E>
where
    C: ?Sized,
    F: FnMut(&mut C) -> Result<(), E>,
    N: FnMut(&mut C, u32, &E, bool),
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        match action(ctx) {
            Ok(()) => return RetryOutcome::Succeeded { attempts: attempt },
            Err(err) => {
                let will_retry = attempt < max_attempts;
                on_failure(ctx, attempt, &err, will_retry);
                if !will_retry {
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: err,
                    };
                }
            }
        }
        if !policy.pause.is_zero() {
            thread::sleep(policy.pause);
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn instant(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::ZERO)
    }

    /// Fails the first `failures` calls.
    fn flaky(failures: u32) -> impl FnMut(&mut u32) -> Result<(), String> {
        move |calls: &mut u32| {
            *calls += 1;
            if *calls <= failures {
                Err(format!("failure {calls}"))
            } else {
                Ok(())
            }
        }
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 2)]
    #[case(3, 4)]
    fn succeeds_after_fewer_failures_than_budget(#[case] failures: u32, #[case] attempts: u32) {
        let mut calls = 0;
        let outcome = with_retry(instant(3), &mut calls, flaky(failures), |_, _, _, _| {});
        assert!(
            matches!(outcome, RetryOutcome::Succeeded { attempts: n } if n == attempts),
            "{outcome:?}"
        );
        assert_eq!(calls, attempts);
    }

    #[test]
    fn exhausts_after_retries_plus_one_attempts() {
        let mut calls = 0;
        let mut seen = Vec::new();
        let outcome = with_retry(
            instant(2),
            &mut calls,
            flaky(u32::MAX),
            |_, attempt, err: &String, will_retry| seen.push((attempt, err.clone(), will_retry)),
        );
        match outcome {
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "failure 3");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(
            seen,
            [
                (1, "failure 1".to_string(), true),
                (2, "failure 2".to_string(), true),
                (3, "failure 3".to_string(), false),
            ]
        );
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let mut calls = 0;
        let outcome = with_retry(instant(0), &mut calls, flaky(1), |_, _, _, _| {});
        assert!(matches!(outcome, RetryOutcome::Exhausted { .. }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn pause_is_taken_between_attempts_only() {
        let policy = RetryPolicy::new(1, Duration::from_millis(20));
        let mut calls = 0;
        let started = std::time::Instant::now();
        let outcome = with_retry(policy, &mut calls, flaky(0), |_, _, _, _| {});
        assert!(matches!(outcome, RetryOutcome::Succeeded { .. }));
        assert!(started.elapsed() < Duration::from_millis(20));

        let started = std::time::Instant::now();
        let mut calls = 0;
        let outcome = with_retry(policy, &mut calls, flaky(1), |_, _, _, _| {});
        assert!(matches!(outcome, RetryOutcome::Succeeded { .. }));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn policy_reads_job_config() {
        let mut config = JobConfig::new("LocalFolder=/x", "/site");
        config.retry_count = 5;
        config.retry_wait_milliseconds = 250;
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.pause, Duration::from_millis(250));
    }
}

//! Bounded polling loop for the readiness probe

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::check::Probe;
use super::outcome::Outcome;
use crate::target::Target;

/// How long and how often to poll for readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Give up once this much time has elapsed
    pub timeout: Duration,
    /// Spacing between attempts
    pub interval: Duration,
    /// Report progress this often; zero disables progress reports
    pub progress_every: Duration,
}

impl RetryPolicy {
    pub fn from_secs(timeout: u64, interval: u64, progress_every: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout),
            interval: Duration::from_secs(interval),
            progress_every: Duration::from_secs(progress_every),
        }
    }

    /// Longest the wait can block: the loop never outlives `timeout + interval`
    pub fn upper_bound(&self) -> Duration {
        self.timeout + self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(60, 2, 10)
    }
}

/// Periodic progress notification while waiting
#[derive(Debug, Clone)]
pub struct WaitProgress {
    pub probe: String,
    pub elapsed: Duration,
    pub timeout: Duration,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Callback receiving progress notifications
pub type ProgressFn = Arc<dyn Fn(&WaitProgress) + Send + Sync>;

/// How a readiness wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready {
        elapsed: Duration,
        attempts: u32,
    },
    TimedOut {
        elapsed: Duration,
        attempts: u32,
        last_error: Option<String>,
    },
    Cancelled {
        elapsed: Duration,
        attempts: u32,
    },
}

impl WaitOutcome {
    pub fn outcome(&self) -> Outcome {
        match self {
            WaitOutcome::Ready { .. } => Outcome::Pass,
            WaitOutcome::TimedOut { .. } | WaitOutcome::Cancelled { .. } => Outcome::Fail,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Ready { elapsed, .. }
            | WaitOutcome::TimedOut { elapsed, .. }
            | WaitOutcome::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Ready { attempts, .. }
            | WaitOutcome::TimedOut { attempts, .. }
            | WaitOutcome::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Polls a readiness probe until it passes, the policy's timeout elapses,
/// or the run is cancelled
pub struct RetryWaiter {
    policy: RetryPolicy,
    attempt_limit: Duration,
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
}

impl RetryWaiter {
    /// `attempt_limit` bounds each attempt; it is further clipped to the
    /// policy's interval
    pub fn new(policy: RetryPolicy, attempt_limit: Duration, cancel: CancellationToken) -> Self {
        Self {
            policy,
            attempt_limit,
            cancel,
            progress: None,
        }
    }

    pub fn on_progress(mut self, progress: Option<ProgressFn>) -> Self {
        self.progress = progress;
        self
    }

    fn attempt_bound(&self) -> Duration {
        if self.policy.interval.is_zero() {
            self.attempt_limit
        } else {
            self.attempt_limit.min(self.policy.interval)
        }
    }

    pub async fn wait_until_ready(&self, probe: &Probe, target: &dyn Target) -> WaitOutcome {
        let policy = self.policy;
        let bound = self.attempt_bound();
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut next_progress = policy.progress_every;

        loop {
            attempts += 1;
            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return WaitOutcome::Cancelled { elapsed: start.elapsed(), attempts };
                }
                attempt = timeout(bound, probe.execute(target)) => attempt,
            };

            let last_error = match attempt {
                Ok(Ok(verdict)) if verdict.outcome == Outcome::Pass => {
                    let elapsed = start.elapsed();
                    info!(probe = probe.name(), ?elapsed, attempts, "target ready");
                    return WaitOutcome::Ready { elapsed, attempts };
                }
                Ok(Ok(verdict)) => probe.message_for(&verdict),
                Ok(Err(error)) => error.to_string(),
                Err(_) => format!("attempt exceeded {:?}", bound),
            };

            let elapsed = start.elapsed();
            debug!(probe = probe.name(), attempts, ?elapsed, error = %last_error, "not ready");

            if elapsed >= policy.timeout {
                return WaitOutcome::TimedOut {
                    elapsed,
                    attempts,
                    last_error: Some(last_error),
                };
            }

            if !policy.progress_every.is_zero() && elapsed >= next_progress {
                let progress = WaitProgress {
                    probe: probe.name().to_string(),
                    elapsed,
                    timeout: policy.timeout,
                    attempts,
                    last_error: Some(last_error.clone()),
                };
                info!(probe = probe.name(), ?elapsed, attempts, "still waiting for target");
                if let Some(callback) = &self.progress {
                    callback(&progress);
                }
                while next_progress <= elapsed {
                    next_progress += policy.progress_every;
                }
            }

            // The last pause is clipped so the final attempt lands on the deadline
            let pause = policy.interval.min(policy.timeout - elapsed);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return WaitOutcome::Cancelled { elapsed: start.elapsed(), attempts };
                }
                _ = sleep(pause) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_adds_one_interval() {
        let policy = RetryPolicy::from_secs(60, 2, 10);
        assert_eq!(policy.upper_bound(), Duration::from_secs(62));
    }

    #[test]
    fn attempts_are_clipped_to_the_interval() {
        let waiter = RetryWaiter::new(
            RetryPolicy::from_secs(60, 2, 10),
            Duration::from_secs(10),
            CancellationToken::new(),
        );
        assert_eq!(waiter.attempt_bound(), Duration::from_secs(2));
    }

    #[test]
    fn timed_out_wait_is_a_failure() {
        let outcome = WaitOutcome::TimedOut {
            elapsed: Duration::from_secs(60),
            attempts: 31,
            last_error: None,
        };
        assert_eq!(outcome.outcome(), Outcome::Fail);
        assert_eq!(outcome.attempts(), 31);
    }
}

//! Runner for orchestrating probes against a target

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::check::Probe;
use super::outcome::{FailureKind, Outcome, ProbeKind, ProbeRecord};
use super::waiter::{ProgressFn, RetryPolicy, RetryWaiter, WaitOutcome};
use crate::target::{LogSource, Target};

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Success,
    WithWarnings,
    Failed,
}

/// Run lifecycle
///
/// `NotStarted -> WaitingForReadiness -> {Failed | RunningProbes} -> Completed(_)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    WaitingForReadiness,
    RunningProbes,
    /// A readiness probe failed; nothing after it ran
    Failed,
    Completed(Aggregate),
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Failed | RunPhase::Completed(_))
    }
}

/// Why the probe sequence stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every probe ran
    Exhausted,
    /// A readiness probe failed
    Fatal { probe: String },
    /// The run was cancelled after `completed` probes
    Cancelled { completed: usize },
}

/// Results from running a probe sequence
///
/// Built up while the runner executes and read-only once returned.
#[derive(Debug, Clone)]
pub struct RunResult {
    target: String,
    planned: usize,
    per_probe: Vec<ProbeRecord>,
    passed: usize,
    warned: usize,
    failed: usize,
    termination: Termination,
    diagnostics: Option<String>,
}

impl RunResult {
    fn new(target: String, planned: usize) -> Self {
        Self {
            target,
            planned,
            per_probe: Vec::with_capacity(planned),
            passed: 0,
            warned: 0,
            failed: 0,
            termination: Termination::Exhausted,
            diagnostics: None,
        }
    }

    fn record(&mut self, record: ProbeRecord) {
        match record.outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Warn => self.warned += 1,
            Outcome::Fail => self.failed += 1,
        }
        self.per_probe.push(record);
    }

    fn finish(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Description of the target the run was against
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Per-probe records in execution order
    pub fn records(&self) -> &[ProbeRecord] {
        &self.per_probe
    }

    /// Number of probes handed to the runner
    pub fn planned(&self) -> usize {
        self.planned
    }

    /// Number of probes that produced a record
    pub fn total(&self) -> usize {
        self.per_probe.len()
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn warned(&self) -> usize {
        self.warned
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    /// Recent target logs fetched after a fatal failure
    pub fn diagnostics(&self) -> Option<&str> {
        self.diagnostics.as_deref()
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.termination, Termination::Cancelled { .. })
    }

    /// `Success` iff nothing failed; warnings never fail a run
    pub fn aggregate(&self) -> Aggregate {
        if self.failed > 0 || self.termination != Termination::Exhausted {
            Aggregate::Failed
        } else if self.warned > 0 {
            Aggregate::WithWarnings
        } else {
            Aggregate::Success
        }
    }

    /// Terminal phase of the run
    pub fn phase(&self) -> RunPhase {
        match self.termination {
            Termination::Fatal { .. } => RunPhase::Failed,
            _ => RunPhase::Completed(self.aggregate()),
        }
    }

    /// Returns true if the run did not fail
    pub fn is_healthy(&self) -> bool {
        self.aggregate() != Aggregate::Failed
    }

    pub fn has_warnings(&self) -> bool {
        self.warned > 0
    }

    /// Process exit code: 0 = success (warnings allowed), 1 = failure
    pub fn exit_code(&self) -> u8 {
        if self.is_healthy() { 0 } else { 1 }
    }
}

/// Orchestrates probes strictly in order against a single target
pub struct ProbeRunner {
    target: Arc<dyn Target>,
    policy: RetryPolicy,
    probe_timeout: Duration,
    cancel: CancellationToken,
    logs: Option<Arc<dyn LogSource>>,
    progress: Option<ProgressFn>,
}

impl ProbeRunner {
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self {
            target,
            policy: RetryPolicy::default(),
            probe_timeout: Duration::from_secs(10),
            cancel: CancellationToken::new(),
            logs: None,
            progress: None,
        }
    }

    /// Retry policy for the leading readiness probe
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound on each probe's execution, distinct from the readiness wait
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Where to fetch diagnostics from when the run fails fatally
    pub fn with_log_source(mut self, logs: Arc<dyn LogSource>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn on_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Token that cancels this runner's in-flight and pending probes
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `probes` in order; always returns a result, even when every
    /// probe failed
    ///
    /// A leading readiness probe is polled until ready; every other probe
    /// runs exactly once.
    pub async fn run(&self, probes: &[Probe]) -> RunResult {
        let mut result = RunResult::new(self.target.describe(), probes.len());
        let mut phase = RunPhase::NotStarted;

        for (index, probe) in probes.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return self.cancelled(result, &mut phase);
            }

            let record = if index == 0 && probe.kind() == ProbeKind::Readiness {
                advance(&mut phase, RunPhase::WaitingForReadiness);
                match self.wait_for(probe).await {
                    Some(record) => record,
                    None => return self.cancelled(result, &mut phase),
                }
            } else {
                advance(&mut phase, RunPhase::RunningProbes);
                match self.execute(probe).await {
                    Some(record) => record,
                    None => return self.cancelled(result, &mut phase),
                }
            };

            let fatal = record.outcome.is_fail() && probe.kind().is_fatal();
            result.record(record);

            if fatal {
                error!(probe = probe.name(), "readiness probe failed, aborting run");
                advance(&mut phase, RunPhase::Failed);
                result.diagnostics = self.collect_diagnostics().await;
                return result.finish(Termination::Fatal {
                    probe: probe.name().to_string(),
                });
            }
        }

        let result = result.finish(Termination::Exhausted);
        advance(&mut phase, RunPhase::Completed(result.aggregate()));
        result
    }

    fn cancelled(&self, result: RunResult, phase: &mut RunPhase) -> RunResult {
        let completed = result.total();
        warn!(completed, planned = result.planned(), "run cancelled");
        let result = result.finish(Termination::Cancelled { completed });
        advance(phase, RunPhase::Completed(Aggregate::Failed));
        result
    }

    async fn wait_for(&self, probe: &Probe) -> Option<ProbeRecord> {
        let waiter = RetryWaiter::new(self.policy, self.probe_timeout, self.cancel.clone())
            .on_progress(self.progress.clone());

        let outcome = waiter.wait_until_ready(probe, self.target.as_ref()).await;
        let elapsed = outcome.elapsed();
        let record = match outcome {
            WaitOutcome::Ready { attempts, .. } => ProbeRecord::new(
                probe.name(),
                probe.kind(),
                Outcome::Pass,
                format!(
                    "{}: ready after {:.1}s ({} attempt{})",
                    probe.name(),
                    elapsed.as_secs_f64(),
                    attempts,
                    if attempts == 1 { "" } else { "s" }
                ),
            ),
            WaitOutcome::TimedOut {
                attempts,
                last_error,
                ..
            } => {
                let mut record = ProbeRecord::new(
                    probe.name(),
                    probe.kind(),
                    Outcome::Fail,
                    format!(
                        "{}: not ready after {:.1}s ({} attempts, timeout {}s)",
                        probe.name(),
                        elapsed.as_secs_f64(),
                        attempts,
                        self.policy.timeout.as_secs()
                    ),
                )
                .with_failure(FailureKind::ReadinessTimeout {
                    elapsed,
                    last_error: last_error.clone(),
                });
                if let Some(last_error) = last_error {
                    record = record.with_detail(format!("last error: {}", last_error));
                }
                record
            }
            WaitOutcome::Cancelled { .. } => return None,
        };

        Some(record.with_elapsed(elapsed))
    }

    /// Executes one probe under the per-probe bound; `None` when cancelled
    async fn execute(&self, probe: &Probe) -> Option<ProbeRecord> {
        let started = Instant::now();
        let attempt = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            attempt = timeout(self.probe_timeout, probe.execute(self.target.as_ref())) => attempt,
        };
        let elapsed = started.elapsed();
        let kind = probe.kind();

        let record = match attempt {
            Ok(Ok(verdict)) => {
                let outcome = match verdict.outcome {
                    Outcome::Fail => kind.failure_outcome(),
                    other => other,
                };
                ProbeRecord::new(probe.name(), kind, outcome, probe.message_for(&verdict))
            }
            Ok(Err(error)) => ProbeRecord::new(
                probe.name(),
                kind,
                kind.failure_outcome(),
                probe.error_message(&error.to_string()),
            ),
            Err(_) => ProbeRecord::new(
                probe.name(),
                kind,
                kind.failure_outcome(),
                probe.error_message(&format!(
                    "no result within {}s",
                    self.probe_timeout.as_secs_f64()
                )),
            )
            .with_failure(FailureKind::ExecutionTimeout {
                limit: self.probe_timeout,
            }),
        };

        debug!(
            probe = probe.name(),
            kind = %kind,
            outcome = ?record.outcome,
            ?elapsed,
            "probe finished"
        );
        Some(record.with_elapsed(elapsed))
    }

    async fn collect_diagnostics(&self) -> Option<String> {
        let logs = self.logs.as_ref()?;
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            fetched = timeout(self.probe_timeout, logs.recent_logs()) => fetched,
        };
        match fetched {
            Ok(Ok(text)) if text.is_empty() => Some("(no log output)".to_string()),
            Ok(Ok(text)) => Some(text),
            Ok(Err(error)) => Some(format!("could not fetch logs: {}", error)),
            Err(_) => Some(format!(
                "could not fetch logs: no output within {}s",
                self.probe_timeout.as_secs_f64()
            )),
        }
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    if *phase != next && !phase.is_terminal() {
        info!(from = ?*phase, to = ?next, "run phase");
        *phase = next;
    }
}

//! Outcomes, severities, and per-probe records

use std::fmt;
use std::time::Duration;

/// Result of evaluating a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Probe passed
    Pass,
    /// Probe could not be fully satisfied but the run is still healthy
    Warn,
    /// Probe failed
    Fail,
}

impl Outcome {
    /// Returns true if the probe passed (Pass or Warn)
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Pass | Outcome::Warn)
    }

    /// Returns true if the probe failed
    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail)
    }

    /// Returns the outcome as a colored string
    pub fn as_colored_str(&self) -> String {
        use colored::Colorize;
        match self {
            Outcome::Pass => "PASS".green().to_string(),
            Outcome::Warn => "WARN".yellow().to_string(),
            Outcome::Fail => "FAIL".red().to_string(),
        }
    }
}

/// How much a probe's failure matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Gates every other probe; failure aborts the run
    Readiness,
    /// Expected condition; failure fails the run but later probes still execute
    Assertion,
    /// Nice-to-have; never worse than a warning
    Informational,
}

impl ProbeKind {
    /// Outcome recorded when this kind of probe is not satisfied
    pub fn failure_outcome(self) -> Outcome {
        match self {
            ProbeKind::Readiness | ProbeKind::Assertion => Outcome::Fail,
            ProbeKind::Informational => Outcome::Warn,
        }
    }

    /// Whether a failure stops the run
    pub fn is_fatal(self) -> bool {
        matches!(self, ProbeKind::Readiness)
    }

    pub fn label(self) -> &'static str {
        match self {
            ProbeKind::Readiness => "readiness",
            ProbeKind::Assertion => "assertion",
            ProbeKind::Informational => "info",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a probe did not pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The target never became reachable within the wait window
    ReadinessTimeout {
        elapsed: Duration,
        last_error: Option<String>,
    },
    /// A gating probe failed its single attempt; the run stops
    ReadinessFailure,
    /// An expected condition was not met
    AssertionFailure,
    /// An optional condition was not met
    SoftWarning,
    /// The probe's action exceeded its own bound
    ExecutionTimeout { limit: Duration },
}

impl FailureKind {
    /// Failure kind for an unsatisfied predicate or a target error
    pub fn unmet(kind: ProbeKind, outcome: Outcome) -> Option<Self> {
        match (outcome, kind) {
            (Outcome::Pass, _) => None,
            (Outcome::Warn, _) => Some(FailureKind::SoftWarning),
            (Outcome::Fail, ProbeKind::Readiness) => Some(FailureKind::ReadinessFailure),
            (Outcome::Fail, _) => Some(FailureKind::AssertionFailure),
        }
    }
}

/// What a single probe produced
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    /// Probe name
    pub name: String,
    /// Probe severity
    pub kind: ProbeKind,
    /// Final outcome after applying the kind's severity
    pub outcome: Outcome,
    /// Rendered status message
    pub message: String,
    /// Optional detailed information
    pub detail: Option<String>,
    /// Set whenever the outcome is not `Pass`
    pub failure: Option<FailureKind>,
    /// How long the probe took (for readiness, the whole wait)
    pub elapsed: Duration,
}

impl ProbeRecord {
    pub fn new(
        name: impl Into<String>,
        kind: ProbeKind,
        outcome: Outcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            outcome,
            message: message.into(),
            detail: None,
            failure: FailureKind::unmet(kind, outcome),
            elapsed: Duration::ZERO,
        }
    }

    /// Adds optional details to the record
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Replaces the failure classification
    pub fn with_failure(mut self, failure: FailureKind) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Sets the duration for this record
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

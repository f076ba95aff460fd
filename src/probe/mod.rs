//! Readiness and diagnostic probes
//!
//! A run waits for the target to accept connections, then executes a fixed,
//! ordered battery of read-only probes and reports pass/warn/fail for each:
//! - Readiness probes gate the run; failure aborts it
//! - Assertion probes fail the run but never hide later probes
//! - Informational probes are at worst warnings
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pglab_probe::config::ProbeConfig;
//! use pglab_probe::probe::{ProbeRunner, checks, render};
//! use pglab_probe::target::PgTarget;
//!
//! # async fn demo() {
//! let config = ProbeConfig::default();
//! let target = PgTarget::new(&config.target, config.probe_timeout());
//! let result = ProbeRunner::new(Arc::new(target))
//!     .with_policy(config.retry_policy())
//!     .with_probe_timeout(config.probe_timeout())
//!     .run(&checks::default_probes(&config))
//!     .await;
//!
//! println!("{}", render(&result));
//! # }
//! ```

pub mod check;
pub mod checks;
pub mod outcome;
pub mod reporter;
pub mod runner;
pub mod waiter;

pub use check::{Action, Observation, Predicate, Probe, Verdict};
pub use outcome::{FailureKind, Outcome, ProbeKind, ProbeRecord};
pub use reporter::{Status, print_report, render, render_table, status_line};
pub use runner::{Aggregate, ProbeRunner, RunPhase, RunResult, Termination};
pub use waiter::{ProgressFn, RetryPolicy, RetryWaiter, WaitOutcome, WaitProgress};

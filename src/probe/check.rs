//! Probe definition: a named, read-only action plus a predicate over its result

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::probe::checks::system_info::{self, HostSnapshot};
use crate::probe::outcome::{Outcome, ProbeKind};
use crate::target::{Target, TargetError, command, quote_ident};

/// What an action observed on the target
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The target accepted a session
    Reachable,
    /// A single counted value
    Count(i64),
    /// How many of a named set were found
    Tally { found: usize, missing: Vec<String> },
    /// Row count of a table, `None` when the table does not exist
    TableRows { table: String, rows: Option<i64> },
    /// A ratio that may be unavailable (no statistics yet)
    Ratio(Option<f64>),
    /// A server setting, `None` when unknown to the server
    Setting { name: String, value: Option<String> },
    /// Number of rows a query returned
    Rows(usize),
    /// First line of a command's output
    Text(String),
    /// Whether a file is present
    File { path: PathBuf, exists: bool },
    /// Host resources of the machine running the harness
    Host(HostSnapshot),
}

impl Observation {
    /// Short human-readable rendering of the observed value
    pub fn summary(&self) -> String {
        match self {
            Observation::Reachable => "accepting connections".to_string(),
            Observation::Count(n) => n.to_string(),
            Observation::Tally { found, missing } if missing.is_empty() => found.to_string(),
            Observation::Tally { found, missing } => {
                format!("{} (missing: {})", found, missing.join(", "))
            }
            Observation::TableRows { rows: None, .. } => "table not found".to_string(),
            Observation::TableRows { rows: Some(0), .. } => "0 rows (table is empty)".to_string(),
            Observation::TableRows { rows: Some(n), .. } => format!("{} rows", n),
            Observation::Ratio(Some(r)) => format!("{:.2}%", r * 100.0),
            Observation::Ratio(None) => "no statistics yet".to_string(),
            Observation::Setting { value: Some(v), .. } => v.clone(),
            Observation::Setting { value: None, .. } => "not available".to_string(),
            Observation::Rows(n) => format!("{} row(s)", n),
            Observation::Text(text) => text.clone(),
            Observation::File { exists: true, .. } => "present".to_string(),
            Observation::File { exists: false, .. } => "missing".to_string(),
            Observation::Host(host) => host.summary(),
        }
    }
}

/// A side-effect-free action against the target or the local host
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open a session and run `SELECT 1`
    Ping,
    /// Query returning a single bigint
    Count { sql: String },
    /// Check which of the named relations exist
    TablesPresent { tables: Vec<String> },
    /// Check a table exists and count its rows
    TableRows { table: String },
    /// Query that must execute; its row count is observed
    Executes { sql: String },
    /// Query returning a single nullable float
    Ratio { sql: String },
    /// Read a server setting
    Setting { name: String },
    /// Run a read-only local command
    Command { program: String, args: Vec<String> },
    /// Check a local file exists
    FileExists { path: PathBuf },
    /// Probe host memory and CPU
    HostResources,
}

impl Action {
    /// Performs the action once
    pub async fn observe(&self, target: &dyn Target) -> Result<Observation, TargetError> {
        match self {
            Action::Ping => target.ping().await.map(|_| Observation::Reachable),
            Action::Count { sql } => target.fetch_count(sql).await.map(Observation::Count),
            Action::TablesPresent { tables } => {
                let mut missing = Vec::new();
                for table in tables {
                    if !target.relation_exists(table).await? {
                        missing.push(table.clone());
                    }
                }
                Ok(Observation::Tally {
                    found: tables.len() - missing.len(),
                    missing,
                })
            }
            Action::TableRows { table } => {
                let rows = if target.relation_exists(table).await? {
                    let sql = format!("SELECT count(*) FROM {}", quote_ident(table));
                    Some(target.fetch_count(&sql).await?)
                } else {
                    None
                };
                Ok(Observation::TableRows {
                    table: table.clone(),
                    rows,
                })
            }
            Action::Executes { sql } => target.row_count(sql).await.map(Observation::Rows),
            Action::Ratio { sql } => target.fetch_ratio(sql).await.map(Observation::Ratio),
            Action::Setting { name } => target.setting(name).await.map(|value| Observation::Setting {
                name: name.clone(),
                value,
            }),
            Action::Command { program, args } => command::run(program, args)
                .await
                .map(|output| Observation::Text(output.first_line().to_string())),
            Action::FileExists { path } => {
                let exists =
                    tokio::fs::try_exists(path)
                        .await
                        .map_err(|error| TargetError::Io {
                            path: path.display().to_string(),
                            detail: error.to_string(),
                        })?;
                Ok(Observation::File {
                    path: path.clone(),
                    exists,
                })
            }
            Action::HostResources => system_info::snapshot().await.map(Observation::Host),
        }
    }
}

/// A predicate's judgement of an observation
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub outcome: Outcome,
    /// What the predicate wanted, if it states a requirement
    pub expected: Option<String>,
    /// What was actually seen
    pub observed: String,
}

impl Verdict {
    pub fn pass(observed: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Pass,
            expected: None,
            observed: observed.into(),
        }
    }

    pub fn warn(expected: impl Into<String>, observed: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Warn,
            expected: Some(expected.into()),
            observed: observed.into(),
        }
    }

    pub fn fail(expected: impl Into<String>, observed: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail,
            expected: Some(expected.into()),
            observed: observed.into(),
        }
    }
}

type PredicateFn = dyn Fn(&Observation) -> Verdict + Send + Sync;

/// Maps an observation to `Pass | Warn | Fail`
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    /// Custom predicate
    pub fn new(f: impl Fn(&Observation) -> Verdict + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Passes on any observation that does not report something absent
    pub fn succeeds() -> Self {
        Self::new(|observation| match observation {
            Observation::TableRows { rows: None, table } => {
                Verdict::fail(format!("table {} to exist", table), observation.summary())
            }
            Observation::File { exists: false, path } => {
                Verdict::fail(format!("{} to exist", path.display()), "missing")
            }
            Observation::Setting { value: None, name } => {
                Verdict::fail(format!("setting {} to be readable", name), "not available")
            }
            _ => Verdict::pass(observation.summary()),
        })
    }

    /// Requires a counted value of at least `min`
    ///
    /// A missing table and an empty table are reported differently.
    pub fn at_least(min: i64) -> Self {
        Self::new(move |observation| {
            let expected = format!("at least {}", min);
            match observation {
                Observation::Count(n) if *n >= min => Verdict::pass(observation.summary()),
                Observation::Count(_) => Verdict::fail(expected, observation.summary()),
                Observation::Tally { found, .. } if *found as i64 >= min => {
                    Verdict::pass(observation.summary())
                }
                Observation::Tally { .. } => Verdict::fail(expected, observation.summary()),
                Observation::Rows(n) if *n as i64 >= min => Verdict::pass(observation.summary()),
                Observation::Rows(_) => {
                    Verdict::fail(format!("{} row(s)", expected), observation.summary())
                }
                Observation::TableRows { table, rows: None } => {
                    Verdict::fail(format!("table {} to exist", table), observation.summary())
                }
                Observation::TableRows { rows: Some(n), .. } if *n >= min => {
                    Verdict::pass(observation.summary())
                }
                Observation::TableRows { .. } => {
                    Verdict::fail(format!("{} row(s)", expected), observation.summary())
                }
                other => Verdict::fail(expected, format!("non-numeric result: {}", other.summary())),
            }
        })
    }

    /// Requires a ratio of at least `min`; missing statistics only warn
    pub fn ratio_at_least(min: f64) -> Self {
        Self::new(move |observation| {
            let expected = format!("at least {:.2}%", min * 100.0);
            match observation {
                Observation::Ratio(Some(r)) if *r >= min => Verdict::pass(observation.summary()),
                Observation::Ratio(Some(_)) => Verdict::fail(expected, observation.summary()),
                Observation::Ratio(None) => Verdict::warn(expected, observation.summary()),
                other => Verdict::fail(expected, format!("non-numeric result: {}", other.summary())),
            }
        })
    }

    /// Host has at least `min_memory_gib` of memory and a detectable CPU
    pub fn host_capacity(min_memory_gib: f64) -> Self {
        Self::new(move |observation| match observation {
            Observation::Host(host) if host.logical_cores == 0 => {
                Verdict::warn("detectable CPU cores", observation.summary())
            }
            Observation::Host(host) if host.total_memory_gib() < min_memory_gib => Verdict::warn(
                format!("at least {:.1} GiB memory", min_memory_gib),
                observation.summary(),
            ),
            _ => Verdict::pass(observation.summary()),
        })
    }

    pub fn evaluate(&self, observation: &Observation) -> Verdict {
        (self.0)(observation)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

const DEFAULT_PASS_MESSAGE: &str = "{name}: {observed}";
const DEFAULT_FAIL_MESSAGE: &str = "{name}: expected {expected}, observed {observed}";

/// A single named, read-only check against the target
///
/// Probes are immutable once built; the builder methods consume `self`.
#[derive(Debug, Clone)]
pub struct Probe {
    name: String,
    kind: ProbeKind,
    action: Action,
    predicate: Predicate,
    pass_message: String,
    fail_message: String,
}

impl Probe {
    pub fn new(name: impl Into<String>, kind: ProbeKind, action: Action, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            kind,
            action,
            predicate,
            pass_message: DEFAULT_PASS_MESSAGE.to_string(),
            fail_message: DEFAULT_FAIL_MESSAGE.to_string(),
        }
    }

    pub fn readiness(name: impl Into<String>, action: Action) -> Self {
        Self::new(name, ProbeKind::Readiness, action, Predicate::succeeds())
    }

    pub fn assertion(name: impl Into<String>, action: Action, predicate: Predicate) -> Self {
        Self::new(name, ProbeKind::Assertion, action, predicate)
    }

    pub fn informational(name: impl Into<String>, action: Action, predicate: Predicate) -> Self {
        Self::new(name, ProbeKind::Informational, action, predicate)
    }

    /// Template used when the probe passes (`{name}`, `{observed}`)
    pub fn with_pass_message(mut self, template: impl Into<String>) -> Self {
        self.pass_message = template.into();
        self
    }

    /// Template used otherwise (`{name}`, `{expected}`, `{observed}`)
    pub fn with_fail_message(mut self, template: impl Into<String>) -> Self {
        self.fail_message = template.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProbeKind {
        self.kind
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Runs the action once and judges the result
    pub async fn execute(&self, target: &dyn Target) -> Result<Verdict, TargetError> {
        let observation = self.action.observe(target).await?;
        Ok(self.predicate.evaluate(&observation))
    }

    /// Renders the status message for a verdict
    pub fn message_for(&self, verdict: &Verdict) -> String {
        let template = match verdict.outcome {
            Outcome::Pass => &self.pass_message,
            Outcome::Warn | Outcome::Fail => &self.fail_message,
        };
        template
            .replace("{name}", &self.name)
            .replace("{expected}", verdict.expected.as_deref().unwrap_or("success"))
            .replace("{observed}", &verdict.observed)
    }

    /// Renders the status message for an action that could not complete
    ///
    /// Custom templates describe an unmet predicate, so errors always use
    /// the default wording.
    pub fn error_message(&self, error: &str) -> String {
        DEFAULT_FAIL_MESSAGE
            .replace("{name}", &self.name)
            .replace("{expected}", "the check to complete")
            .replace("{observed}", error)
    }
}

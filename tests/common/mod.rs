//! Scripted in-memory target for exercising the runner without a database

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use pglab_probe::probe::{Action, Predicate, Probe};
use pglab_probe::target::{LogSource, Target, TargetError};
use tokio::time::Instant;

/// A target whose answers are fixed up front
///
/// Time is read from tokio's clock so tests can run with a paused clock.
pub struct ScriptedTarget {
    started: Instant,
    ready_after: Option<Duration>,
    counts: HashMap<String, i64>,
    tables: HashMap<String, i64>,
    settings: HashMap<String, String>,
    ratio: Option<f64>,
    hanging: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTarget {
    /// Ready immediately, with nothing in it
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            ready_after: Some(Duration::ZERO),
            counts: HashMap::new(),
            tables: HashMap::new(),
            settings: HashMap::new(),
            ratio: None,
            hanging: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Accepts connections only once `delay` has passed
    pub fn ready_after(mut self, delay: Duration) -> Self {
        self.ready_after = Some(delay);
        self
    }

    /// Never accepts connections
    pub fn unreachable(mut self) -> Self {
        self.ready_after = None;
        self
    }

    pub fn with_count(mut self, sql: &str, value: i64) -> Self {
        self.counts.insert(sql.to_string(), value);
        self
    }

    pub fn with_table(mut self, name: &str, rows: i64) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn with_setting(mut self, name: &str, value: &str) -> Self {
        self.settings.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = Some(ratio);
        self
    }

    /// Queries with this text never complete
    pub fn hanging_on(mut self, sql: &str) -> Self {
        self.hanging.insert(sql.to_string());
        self
    }

    /// Every operation issued so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn reachable(&self) -> Result<(), TargetError> {
        match self.ready_after {
            Some(delay) if self.started.elapsed() >= delay => Ok(()),
            _ => Err(TargetError::Connect("connection refused".to_string())),
        }
    }

    async fn maybe_hang(&self, sql: &str) {
        if self.hanging.contains(sql) {
            std::future::pending::<()>().await;
        }
    }
}

impl Target for ScriptedTarget {
    fn describe(&self) -> String {
        "scripted@memory:5432/lab".to_string()
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), TargetError>> {
        async move {
            self.log("ping".to_string());
            self.reachable()
        }
        .boxed()
    }

    fn fetch_count<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<i64, TargetError>> {
        async move {
            self.log(format!("count {}", sql));
            self.reachable()?;
            self.maybe_hang(sql).await;
            if let Some(value) = self.counts.get(sql) {
                return Ok(*value);
            }
            // Row counts issued by table probes: SELECT count(*) FROM "name"
            let table = sql
                .strip_prefix("SELECT count(*) FROM ")
                .map(|t| t.trim_matches('"'));
            match table.and_then(|t| self.tables.get(t)) {
                Some(rows) => Ok(*rows),
                None => Err(TargetError::Query(format!("no scripted answer for {}", sql))),
            }
        }
        .boxed()
    }

    fn fetch_ratio<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<Option<f64>, TargetError>> {
        async move {
            self.log(format!("ratio {}", sql));
            self.reachable()?;
            self.maybe_hang(sql).await;
            Ok(self.ratio)
        }
        .boxed()
    }

    fn row_count<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<usize, TargetError>> {
        async move {
            self.log(format!("rows {}", sql));
            self.reachable()?;
            self.maybe_hang(sql).await;
            match self.counts.get(sql) {
                Some(n) => Ok(*n as usize),
                None => Err(TargetError::Query(format!("no scripted answer for {}", sql))),
            }
        }
        .boxed()
    }

    fn setting<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<String>, TargetError>> {
        async move {
            self.log(format!("setting {}", name));
            self.reachable()?;
            Ok(self.settings.get(name).cloned())
        }
        .boxed()
    }

    fn relation_exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, TargetError>> {
        async move {
            self.log(format!("exists {}", name));
            self.reachable()?;
            Ok(self.tables.contains_key(name))
        }
        .boxed()
    }
}

/// Log source returning fixed text and counting how often it was asked
pub struct StaticLogs {
    text: String,
    fetched: Mutex<usize>,
}

impl StaticLogs {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fetched: Mutex::new(0),
        }
    }

    pub fn fetched(&self) -> usize {
        *self.fetched.lock().unwrap()
    }
}

impl LogSource for StaticLogs {
    fn recent_logs(&self) -> BoxFuture<'_, Result<String, TargetError>> {
        async move {
            *self.fetched.lock().unwrap() += 1;
            Ok(self.text.clone())
        }
        .boxed()
    }
}

/// Assertion probe passing when `sql` counts at least `min`
pub fn count_probe(name: &str, sql: &str, min: i64) -> Probe {
    Probe::assertion(
        name,
        Action::Count {
            sql: sql.to_string(),
        },
        Predicate::at_least(min),
    )
}

/// Informational probe passing when `sql` counts at least `min`
pub fn info_probe(name: &str, sql: &str, min: i64) -> Probe {
    Probe::informational(
        name,
        Action::Count {
            sql: sql.to_string(),
        },
        Predicate::at_least(min),
    )
}

pub fn ping_probe() -> Probe {
    Probe::readiness("database connection", Action::Ping)
}

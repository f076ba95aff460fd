//! Access to the service under test
//!
//! The harness only ever reads from the target: every operation below is a
//! side-effect-free query or command. Each call opens its own short-lived
//! session, so no state is shared between probes.

pub mod command;
pub mod logs;
pub mod postgres;

use futures::future::BoxFuture;
use thiserror::Error;

pub use logs::{DockerLogs, LogSource};
pub use postgres::PgTarget;

/// Errors raised while talking to the target
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("command `{program}` failed: {detail}")]
    Command { program: String, detail: String },

    #[error("unexpected result: {0}")]
    Decode(String),

    #[error("cannot inspect `{path}`: {detail}")]
    Io { path: String, detail: String },
}

/// A read-only view of the database under test
pub trait Target: Send + Sync {
    /// Human-readable connection description (no credentials)
    fn describe(&self) -> String;

    /// Opens a fresh session and runs a trivial statement
    fn ping(&self) -> BoxFuture<'_, Result<(), TargetError>>;

    /// Runs a query returning a single bigint
    fn fetch_count<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<i64, TargetError>>;

    /// Runs a query returning a single nullable float
    fn fetch_ratio<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<Option<f64>, TargetError>>;

    /// Runs a query and returns how many rows it produced
    fn row_count<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<usize, TargetError>>;

    /// Reads a server setting, `None` when the server does not know it
    fn setting<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<String>, TargetError>>;

    /// Whether a table or view with this (optionally schema-qualified) name exists
    fn relation_exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, TargetError>>;
}

/// Quotes a possibly schema-qualified identifier (`public.orders`)
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quotes a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_qualified_identifiers() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("public.orders"), "\"public\".\"orders\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn quotes_literals() {
        assert_eq!(quote_literal("pg_buffercache"), "'pg_buffercache'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn errors_render_their_cause() {
        let error = TargetError::Command {
            program: "pgbench".into(),
            detail: "not found".into(),
        };
        assert_eq!(error.to_string(), "command `pgbench` failed: not found");
    }
}

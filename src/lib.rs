//! pglab-probe
//!
//! Readiness and diagnostic probe runner for the PostgreSQL tuning lab.

/// Build-time information (git SHA, timestamp, compiler)
pub mod build_info;

/// Layered configuration (files, environment, defaults)
pub mod config;

/// Probes, the readiness waiter, the runner, and reporting
pub mod probe;

/// Read-only access to the database under test
pub mod target;

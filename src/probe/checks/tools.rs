//! Client tooling used by the buffer-cache workload

use crate::probe::check::{Action, Predicate, Probe};

/// `pgbench` drives the buffer-cache exercises
pub fn pgbench() -> Probe {
    Probe::informational(
        "pgbench available",
        Action::Command {
            program: "pgbench".to_string(),
            args: vec!["--version".to_string()],
        },
        Predicate::succeeds(),
    )
    .with_pass_message("{name}: {observed}")
}

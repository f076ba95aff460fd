//! Probes that query the database

use crate::probe::check::{Action, Predicate, Probe};
use crate::target::quote_literal;

/// `pg_isready` equivalent: a fresh session running `SELECT 1`
pub fn connection() -> Probe {
    Probe::readiness("database connection", Action::Ping)
        .with_pass_message("{name}: {observed}")
        .with_fail_message("{name}: {observed}")
}

pub fn server_version() -> Probe {
    Probe::informational(
        "server version",
        Action::Setting {
            name: "server_version".to_string(),
        },
        Predicate::succeeds(),
    )
    .with_pass_message("PostgreSQL {observed}")
}

/// At least `min` of the demo tables exist
pub fn demo_tables(tables: &[String], min: usize) -> Probe {
    Probe::assertion(
        "demo tables exist",
        Action::TablesPresent {
            tables: tables.to_vec(),
        },
        Predicate::at_least(min as i64),
    )
    .with_pass_message("{name}: {observed} found")
    .with_fail_message("{name}: expected {expected} tables, observed {observed}")
}

/// A demo table exists and holds data
pub fn table_rows(table: &str) -> Probe {
    Probe::assertion(
        format!("rows in {}", table),
        Action::TableRows {
            table: table.to_string(),
        },
        Predicate::at_least(1),
    )
}

/// The activity view the tutorial's monitoring scripts rely on is readable
pub fn monitoring_query() -> Probe {
    Probe::assertion(
        "monitoring query",
        Action::Executes {
            sql: "SELECT pid, state, wait_event_type, query \
                  FROM pg_stat_activity WHERE datname = current_database()"
                .to_string(),
        },
        Predicate::at_least(1),
    )
    .with_pass_message("{name}: pg_stat_activity returned {observed}")
}

pub fn extension(name: &str) -> Probe {
    Probe::informational(
        format!("extension {}", name),
        Action::Count {
            sql: format!(
                "SELECT count(*) FROM pg_extension WHERE extname = {}",
                quote_literal(name)
            ),
        },
        Predicate::at_least(1),
    )
    .with_pass_message("{name}: installed")
    .with_fail_message("{name}: not installed (CREATE EXTENSION to enable it)")
}

pub fn setting(name: &str) -> Probe {
    Probe::informational(
        format!("setting {}", name),
        Action::Setting {
            name: name.to_string(),
        },
        Predicate::succeeds(),
    )
    .with_pass_message(format!("{} = {{observed}}", name))
}

/// Shared-buffer hit ratio across the current database
pub fn cache_hit_ratio(min: f64) -> Probe {
    Probe::informational(
        "buffer cache hit ratio",
        Action::Ratio {
            sql: "SELECT blks_hit::float8 / nullif(blks_hit + blks_read, 0) \
                  FROM pg_stat_database WHERE datname = current_database()"
                .to_string(),
        },
        Predicate::ratio_at_least(min),
    )
}

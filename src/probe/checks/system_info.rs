//! Host resource probe
//!
//! The lab's tuning exercises size `shared_buffers` and `work_mem` relative
//! to host memory, so the harness reports what it sees.

use sysinfo::System;

use crate::probe::check::{Action, Predicate, Probe};
use crate::target::TargetError;

const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Minimum memory before the probe warns
const MIN_MEMORY_GIB: f64 = 1.0;

/// Host facts gathered by `sysinfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    pub os: String,
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub total_memory: u64,
    pub available_memory: u64,
}

impl HostSnapshot {
    pub fn total_memory_gib(&self) -> f64 {
        self.total_memory as f64 / BYTES_PER_GIB
    }

    pub fn available_memory_gib(&self) -> f64 {
        self.available_memory as f64 / BYTES_PER_GIB
    }

    pub fn summary(&self) -> String {
        format!(
            "{}, {} physical / {} logical cores, {:.1} GiB memory ({:.1} GiB available)",
            self.os,
            self.physical_cores,
            self.logical_cores,
            self.total_memory_gib(),
            self.available_memory_gib()
        )
    }
}

/// Gathers a snapshot off the async runtime
pub async fn snapshot() -> Result<HostSnapshot, TargetError> {
    tokio::task::spawn_blocking(gather)
        .await
        .map_err(|e| TargetError::Decode(format!("host probe panicked: {}", e)))
}

fn gather() -> HostSnapshot {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu_all();

    let os_name = System::name().unwrap_or_else(|| "Unknown".to_string());
    let os_version = System::os_version().unwrap_or_else(|| "Unknown".to_string());

    HostSnapshot {
        os: format!("{} {}", os_name, os_version),
        physical_cores: System::physical_core_count().unwrap_or(0),
        logical_cores: sys.cpus().len(),
        total_memory: sys.total_memory(),
        available_memory: sys.available_memory(),
    }
}

pub fn host_resources() -> Probe {
    Probe::informational(
        "host resources",
        Action::HostResources,
        Predicate::host_capacity(MIN_MEMORY_GIB),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::check::Observation;
    use crate::probe::outcome::Outcome;

    fn host(total_gib: u64, logical_cores: usize) -> HostSnapshot {
        HostSnapshot {
            os: "Linux 6.1".into(),
            physical_cores: logical_cores / 2,
            logical_cores,
            total_memory: total_gib * 1_073_741_824,
            available_memory: total_gib * 536_870_912,
        }
    }

    #[test]
    fn low_memory_warns() {
        let predicate = Predicate::host_capacity(MIN_MEMORY_GIB);
        let verdict = predicate.evaluate(&Observation::Host(host(0, 4)));
        assert_eq!(verdict.outcome, Outcome::Warn);
    }

    #[test]
    fn undetectable_cpus_warn() {
        let predicate = Predicate::host_capacity(MIN_MEMORY_GIB);
        let verdict = predicate.evaluate(&Observation::Host(host(8, 0)));
        assert_eq!(verdict.outcome, Outcome::Warn);
    }

    #[test]
    fn summary_reports_memory() {
        let summary = host(16, 8).summary();
        assert!(summary.contains("16.0 GiB memory"));
        assert!(summary.contains("8.0 GiB available"));
    }

    #[tokio::test]
    async fn snapshot_reads_this_host() {
        let snapshot = snapshot().await.unwrap();
        assert!(snapshot.total_memory > 0);
    }
}

//! Tutorial script presence

use std::path::Path;

use crate::probe::check::{Action, Predicate, Probe};

/// One informational probe per expected script under `sql_dir`
pub fn demo_files(sql_dir: &Path, files: &[String]) -> Vec<Probe> {
    files
        .iter()
        .map(|file| {
            let path = sql_dir.join(file);
            Probe::informational(
                format!("demo file {}", file),
                Action::FileExists { path },
                Predicate::succeeds(),
            )
            .with_pass_message("{name}: present")
            .with_fail_message("{name}: expected {expected}, observed {observed}")
        })
        .collect()
}

//! The lab's default probe battery, built from configuration

pub mod database;
pub mod files;
pub mod system_info;
pub mod tools;

use crate::config::ProbeConfig;
use crate::probe::check::Probe;

/// Builds the full probe sequence in execution order
///
/// The readiness probe comes first; table probes follow the table-count
/// assertion so a missing table is reported both in aggregate and by name.
pub fn default_probes(config: &ProbeConfig) -> Vec<Probe> {
    let settings = &config.probes;
    let mut probes = vec![database::connection(), database::server_version()];

    probes.push(database::demo_tables(&settings.tables, settings.min_tables));
    probes.extend(settings.tables.iter().map(|table| database::table_rows(table)));
    probes.push(database::monitoring_query());
    probes.extend(settings.extensions.iter().map(|name| database::extension(name)));
    probes.extend(settings.settings.iter().map(|name| database::setting(name)));
    probes.push(database::cache_hit_ratio(settings.min_cache_hit_ratio));
    probes.push(tools::pgbench());
    probes.extend(files::demo_files(&settings.sql_dir, &settings.demo_files));
    probes.push(system_info::host_resources());

    probes
}

//! Probe configuration
//!
//! Settings are layered: built-in defaults, then `config/default.toml`, then
//! `config/{profile}.toml`, then `PGLAB_`-prefixed environment variables.
//! Command-line overrides are applied by the binary on top of the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::probe::RetryPolicy;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Connection parameters for the database under test
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TargetConfig {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Container whose logs are fetched when the run fails fatally
    pub container: Option<String>,
    /// Number of log lines to fetch on fatal failure
    #[validate(range(min = 1, max = 1000))]
    pub log_lines: usize,
}

/// Readiness wait settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_wait"))]
pub struct WaitConfig {
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    #[validate(range(min = 1))]
    pub interval_secs: u64,
    /// Zero disables progress notifications
    pub progress_every_secs: u64,
}

fn validate_wait(wait: &WaitConfig) -> Result<(), ValidationError> {
    if wait.timeout_secs < wait.interval_secs {
        let mut error = ValidationError::new("timeout_shorter_than_interval");
        error.message = Some("wait.timeout_secs must be at least wait.interval_secs".into());
        return Err(error);
    }
    Ok(())
}

/// The probe battery run after the database is reachable
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProbeSettings {
    /// Bound on a single probe's execution
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// Demo tables seeded by the lab
    pub tables: Vec<String>,
    /// How many of `tables` must exist
    pub min_tables: usize,
    /// Extensions reported on (informational)
    pub extensions: Vec<String>,
    /// Server settings reported on (informational)
    pub settings: Vec<String>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_cache_hit_ratio: f64,
    /// Directory holding the tutorial SQL scripts
    pub sql_dir: PathBuf,
    /// Scripts expected under `sql_dir`
    pub demo_files: Vec<String>,
}

/// Complete harness configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProbeConfig {
    /// The active profile
    pub profile: String,
    #[validate(nested)]
    pub target: TargetConfig,
    #[validate(nested)]
    pub wait: WaitConfig,
    #[validate(nested)]
    pub probes: ProbeSettings,
}

impl ProbeConfig {
    /// Loads configuration for `profile`, searching the usual config directories
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(Self::find_config_dir().as_deref(), profile)
    }

    /// Loads configuration using the PGLAB_PROFILE environment variable,
    /// defaulting to "default"
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let profile = std::env::var("PGLAB_PROFILE").unwrap_or_else(|_| "default".to_string());
        Self::load(&profile)
    }

    /// Loads configuration with files taken from `config_dir`
    ///
    /// Missing files are skipped, so a bare environment still yields the
    /// built-in defaults.
    pub fn load_from(config_dir: Option<&Path>, profile: &str) -> Result<Self, ConfigError> {
        Self::load_layers(config_dir, profile, None)
    }

    /// Builds every layer; `env` replaces the process environment when given
    fn load_layers(
        config_dir: Option<&Path>,
        profile: &str,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(dir) = config_dir {
            builder = builder
                .add_source(File::from(dir.join("default").as_path()).required(false))
                .add_source(File::from(dir.join(profile).as_path()).required(false));
        }

        builder = builder.add_source(Self::environment(env));

        let config: Self = builder
            .set_override("profile", profile)?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// `PGLAB_TARGET__HOST` style variables: one underscore after the prefix,
    /// `__` between nested keys, comma separated lists
    fn environment(source: Option<Map<String, String>>) -> Environment {
        Environment::with_prefix("PGLAB")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("probes.tables")
            .with_list_parse_key("probes.extensions")
            .with_list_parse_key("probes.settings")
            .with_list_parse_key("probes.demo_files")
            .try_parsing(true)
            .source(source)
    }

    /// Finds the config directory next to the executable, then in the
    /// current directory
    fn find_config_dir() -> Option<PathBuf> {
        if let Ok(exe_path) = std::env::current_exe()
            && let Some(exe_dir) = exe_path.parent()
        {
            let config_dir = exe_dir.join("config");
            if config_dir.exists() {
                return Some(config_dir);
            }
        }

        let cwd_config = PathBuf::from("config");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        None
    }

    /// Retry policy for the readiness wait
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(
            self.wait.timeout_secs,
            self.wait.interval_secs,
            self.wait.progress_every_secs,
        )
    }

    /// Bound on a single probe's execution
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probes.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                database: "tuning_lab".to_string(),
                container: Some("pg-tuning-lab".to_string()),
                log_lines: 50,
            },
            wait: WaitConfig {
                timeout_secs: 60,
                interval_secs: 2,
                progress_every_secs: 10,
            },
            probes: ProbeSettings {
                timeout_secs: 10,
                tables: ["customers", "orders", "order_items", "products", "events"]
                    .map(String::from)
                    .to_vec(),
                min_tables: 5,
                extensions: ["pg_stat_statements", "pg_buffercache"]
                    .map(String::from)
                    .to_vec(),
                settings: [
                    "shared_buffers",
                    "work_mem",
                    "effective_cache_size",
                    "random_page_cost",
                    "checkpoint_timeout",
                    "autovacuum",
                ]
                .map(String::from)
                .to_vec(),
                min_cache_hit_ratio: 0.90,
                sql_dir: PathBuf::from("sql"),
                demo_files: [
                    "01_work_mem.sql",
                    "02_shared_buffers.sql",
                    "03_effective_cache_size.sql",
                    "04_random_page_cost.sql",
                    "05_checkpoints.sql",
                    "06_autovacuum.sql",
                ]
                .map(String::from)
                .to_vec(),
            },
        }
    }
}

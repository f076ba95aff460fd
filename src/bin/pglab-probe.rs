//! pglab-probe: wait for the lab database, then run the diagnostic battery
//!
//! Exit codes: 0 = healthy (warnings allowed), 1 = a probe failed, the
//! database never became ready, or the run was cancelled, 2 = bad
//! configuration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use validator::Validate;

use pglab_probe::build_info;
use pglab_probe::config::ProbeConfig;
use pglab_probe::probe::{self, ProbeRunner, Status, WaitProgress, checks, status_line};
use pglab_probe::target::{DockerLogs, PgTarget, Target};

#[derive(Parser, Debug)]
#[command(name = "pglab-probe")]
#[command(about = "Readiness and diagnostic checks for the PostgreSQL tuning lab")]
#[command(version, long_version = build_info::LONG_VERSION)]
struct Cli {
    /// Configuration profile (config/{profile}.toml)
    #[arg(long, env = "PGLAB_PROFILE", default_value = "default")]
    profile: String,

    /// Database host
    #[arg(long, env = "PGHOST")]
    host: Option<String>,

    /// Database port
    #[arg(long, env = "PGPORT")]
    port: Option<u16>,

    /// Database user
    #[arg(long, env = "PGUSER")]
    user: Option<String>,

    /// Database password
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Database name
    #[arg(long, env = "PGDATABASE")]
    database: Option<String>,

    /// Container to fetch logs from on fatal failure
    #[arg(long)]
    container: Option<String>,

    /// Seconds to wait for the database to accept connections
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds between readiness attempts
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Seconds a single probe may run
    #[arg(long, value_name = "SECS")]
    probe_timeout: Option<u64>,

    /// Cancel the whole run after this many seconds
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,

    /// Directory holding the tutorial SQL scripts
    #[arg(long, value_name = "DIR")]
    sql_dir: Option<PathBuf>,

    /// Render the report as a table
    #[arg(long)]
    table: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Print the probe plan and exit without contacting the database
    #[arg(long)]
    list: bool,

    /// Increase log verbosity (logs go to stderr)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut ProbeConfig) {
        if let Some(host) = &self.host {
            config.target.host = host.clone();
        }
        if let Some(port) = self.port {
            config.target.port = port;
        }
        if let Some(user) = &self.user {
            config.target.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.target.password = password.clone();
        }
        if let Some(database) = &self.database {
            config.target.database = database.clone();
        }
        if let Some(container) = &self.container {
            config.target.container = Some(container.clone());
        }
        if let Some(timeout) = self.timeout {
            config.wait.timeout_secs = timeout;
        }
        if let Some(interval) = self.interval {
            config.wait.interval_secs = interval;
        }
        if let Some(probe_timeout) = self.probe_timeout {
            config.probes.timeout_secs = probe_timeout;
        }
        if let Some(sql_dir) = &self.sql_dir {
            config.probes.sql_dir = sql_dir.clone();
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ProbeConfig> {
    let mut config = ProbeConfig::load(&cli.profile)
        .with_context(|| format!("loading profile '{}'", cli.profile))?;
    cli.apply(&mut config);
    config
        .validate()
        .context("invalid command-line overrides")?;
    Ok(config)
}

fn print_plan(probes: &[probe::Probe]) {
    for (index, probe) in probes.iter().enumerate() {
        println!("{:>3}. [{}] {}", index + 1, probe.kind(), probe.name());
    }
}

fn print_progress(progress: &WaitProgress) {
    let mut message = format!(
        "still waiting for {} ({}s / {}s, {} attempts)",
        progress.probe,
        progress.elapsed.as_secs(),
        progress.timeout.as_secs(),
        progress.attempts
    );
    if let Some(error) = &progress.last_error {
        message.push_str(&format!(": {}", error));
    }
    println!("{}", status_line(Status::Info, &message));
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{} {:#}", "error:".red().bold(), error);
            return ExitCode::from(2);
        }
    };

    let probes = checks::default_probes(&config);
    if cli.list {
        print_plan(&probes);
        return ExitCode::SUCCESS;
    }

    let target = Arc::new(PgTarget::new(&config.target, config.probe_timeout()));
    println!(
        "{}",
        format!("pglab-probe {}", build_info::version_string()).bold()
    );
    println!(
        "{}",
        status_line(
            Status::Info,
            &format!(
                "waiting for {} to accept connections (timeout {}s)",
                target.describe(),
                config.wait.timeout_secs
            )
        )
    );

    let mut runner = ProbeRunner::new(target)
        .with_policy(config.retry_policy())
        .with_probe_timeout(config.probe_timeout())
        .on_progress(Arc::new(print_progress));
    if let Some(container) = &config.target.container {
        runner = runner.with_log_source(Arc::new(DockerLogs::new(
            container.clone(),
            config.target.log_lines,
        )));
    }

    let token = runner.cancellation_token();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            interrupt.cancel();
        }
    });
    if let Some(deadline) = cli.deadline {
        let expired = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(deadline)).await;
            warn!(deadline, "run deadline reached, cancelling");
            expired.cancel();
        });
    }

    let result = runner.run(&probes).await;
    probe::print_report(&result, cli.table);

    ExitCode::from(result.exit_code())
}

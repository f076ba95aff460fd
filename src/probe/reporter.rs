//! Formatting and reporting for probe runs
//!
//! Rendering is a pure function of [`RunResult`]; nothing here talks to the
//! target.

use colored::Colorize;
use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Rows},
};

use super::outcome::Outcome;
use super::runner::{Aggregate, RunResult, Termination};

/// The fixed status vocabulary of the text output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
}

impl Status {
    pub fn glyph(self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Error => "✗",
            Status::Warning => "⚠",
            Status::Info => "ℹ",
        }
    }

    fn colored_glyph(self) -> String {
        match self {
            Status::Success => self.glyph().green().to_string(),
            Status::Error => self.glyph().red().to_string(),
            Status::Warning => self.glyph().yellow().to_string(),
            Status::Info => self.glyph().blue().to_string(),
        }
    }
}

impl From<Outcome> for Status {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Pass => Status::Success,
            Outcome::Warn => Status::Warning,
            Outcome::Fail => Status::Error,
        }
    }
}

/// Formats one status line: glyph, space, message
pub fn status_line(status: Status, message: &str) -> String {
    format!("{} {}", status.colored_glyph(), message)
}

/// Renders a run as one line per probe followed by a summary
pub fn render(result: &RunResult) -> String {
    let mut output = String::new();

    for record in result.records() {
        output.push_str(&status_line(record.outcome.into(), &record.message));
        output.push('\n');
        if let Some(detail) = &record.detail {
            for line in detail.lines() {
                output.push_str(&format!("    {}\n", line));
            }
        }
    }

    output.push_str(&format_termination(result));
    output.push_str(&format_summary(result));
    output
}

/// Renders a run as a table followed by the same summary
pub fn render_table(result: &RunResult) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Probe", "Kind", "Status", "Duration", "Message"]);

    for record in result.records() {
        let duration_str = format!("{:.2?}", record.elapsed);
        builder.push_record([
            record.name.as_str(),
            record.kind.label(),
            &record.outcome.as_colored_str(),
            &duration_str,
            &record.message,
        ]);
    }

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    let mut output = String::new();
    output.push_str(&table.to_string());
    output.push('\n');
    output.push_str(&format_termination(result));
    output.push_str(&format_summary(result));
    output
}

/// Lines explaining an early stop, plus fetched diagnostics
fn format_termination(result: &RunResult) -> String {
    let mut output = String::new();

    match result.termination() {
        Termination::Exhausted => {}
        Termination::Fatal { probe } => {
            let skipped = result.planned() - result.total();
            output.push_str(&status_line(
                Status::Error,
                &format!(
                    "aborted: {} failed, {} remaining probe(s) skipped",
                    probe, skipped
                ),
            ));
            output.push('\n');
        }
        Termination::Cancelled { completed } => {
            output.push_str(&status_line(
                Status::Error,
                &format!(
                    "cancelled after {} of {} probe(s)",
                    completed,
                    result.planned()
                ),
            ));
            output.push('\n');
        }
    }

    if let Some(logs) = result.diagnostics() {
        output.push_str(&format!("\n{}\n", "Recent target logs".bold()));
        for line in logs.lines() {
            output.push_str(&format!("    {}\n", line));
        }
    }

    output
}

/// Formats the summary section of the report
fn format_summary(result: &RunResult) -> String {
    let mut summary = String::new();

    summary.push_str(&format!("\n{}\n", "Summary".bold().underline()));
    summary.push_str(&format!("  Total probes: {}\n", result.total()));
    summary.push_str(&format!("  {} Passed: {}\n", "✓".green(), result.passed()));
    summary.push_str(&format!("  {} Warned: {}\n", "⚠".yellow(), result.warned()));
    summary.push_str(&format!("  {} Failed: {}\n", "✗".red(), result.failed()));

    summary.push('\n');
    match result.aggregate() {
        Aggregate::Success => {
            summary.push_str(&format!("  {}\n", "Overall: HEALTHY".green().bold()));
        }
        Aggregate::WithWarnings => {
            summary.push_str(&format!(
                "  {}\n",
                "Overall: HEALTHY (with warnings)".yellow().bold()
            ));
        }
        Aggregate::Failed => {
            summary.push_str(&format!("  {}\n", "Overall: UNHEALTHY".red().bold()));
        }
    }

    if result.is_healthy() {
        summary.push_str(&next_steps(result.target()));
    }

    summary
}

fn next_steps(target: &str) -> String {
    let mut steps = format!("\n{}\n", "Next steps".bold().underline());
    steps.push_str(&format!(
        "  1. Open a shell:              psql postgresql://{}\n",
        target
    ));
    steps.push_str(&format!(
        "  2. Run a tuning script:       psql postgresql://{} -f sql/01_work_mem.sql\n",
        target
    ));
    steps.push_str(
        "  3. Initialise pgbench data:   pgbench -i -s 10\n  \
         4. Run the buffer-cache load: pgbench -c 10 -j 2 -T 60 -S\n  \
         5. Re-run these checks:       pglab-probe\n",
    );
    steps
}

/// Prints a run report to stdout
pub fn print_report(result: &RunResult, tabular: bool) {
    if tabular {
        println!("{}", render_table(result));
    } else {
        println!("{}", render(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_map_onto_the_status_vocabulary() {
        assert_eq!(Status::from(Outcome::Pass), Status::Success);
        assert_eq!(Status::from(Outcome::Warn), Status::Warning);
        assert_eq!(Status::from(Outcome::Fail), Status::Error);
    }

    #[test]
    fn status_line_keeps_message_intact() {
        let line = status_line(Status::Info, "waiting for postgres");
        assert!(line.contains(Status::Info.glyph()));
        assert!(line.ends_with("waiting for postgres"));
    }

    #[test]
    fn next_steps_point_at_the_target() {
        let steps = next_steps("postgres@localhost:5432/tuning_lab");
        assert!(steps.contains("psql postgresql://postgres@localhost:5432/tuning_lab"));
        assert!(steps.contains("pgbench"));
    }
}

//! Status subcommand: progress of a conversion plus recent failures

use std::path::PathBuf;

use anyhow::{Context, Result};
use brick_core::{fmt_duration, fmt_num};
use brick_pubmed::{FailureRecord, ProgressReport};
use clap::Args;
use comfy_table::{Cell, Color};

use super::styled_table;
use crate::config::Config;

/// Longest error message shown in the failures table
const MESSAGE_WIDTH: usize = 80;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Directory with *.xml.gz / *.xml inputs
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory for parquet files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for failure records
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Number of failure records to list
    #[arg(short = 'n', long, default_value_t = 10)]
    pub failures: usize,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let paths = &config.paths;
    let input = args.input.unwrap_or_else(|| paths.input_dir.clone());
    let output = args.output.unwrap_or_else(|| paths.output_dir.clone());
    let log_dir = args.log_dir.unwrap_or_else(|| paths.log_dir.clone());

    let report = brick_pubmed::progress_report(&input, &output, &log_dir)?;
    eprintln!("\n{}", report_table(&report));

    let failures = brick_pubmed::list_failures(&log_dir)
        .with_context(|| format!("Failed to read {}", log_dir.display()))?;
    if failures.is_empty() {
        return Ok(());
    }
    eprintln!("\n{}", failures_table(&failures, args.failures));
    if failures.len() > args.failures {
        eprintln!("{} more not shown", failures.len() - args.failures);
    }
    Ok(())
}

fn report_table(report: &ProgressReport) -> comfy_table::Table {
    let mut table = styled_table(&["Progress", "Value"]);
    let failed = if report.failed > 0 {
        Cell::new(report.failed).fg(Color::Red)
    } else {
        Cell::new(report.failed).fg(Color::Green)
    };
    table.add_row(vec![
        Cell::new("Completed"),
        Cell::new(format!(
            "{}/{} ({:.1}%)",
            report.completed,
            report.total_inputs,
            report.percent_complete()
        )),
    ]);
    table.add_row(vec![Cell::new("Failed"), failed]);
    table.add_row(vec![Cell::new("Remaining"), Cell::new(report.remaining)]);
    table.add_row(vec![
        Cell::new("Articles"),
        Cell::new(fmt_num(report.articles as usize)),
    ]);
    table.add_row(vec![Cell::new("Elapsed"), Cell::new(fmt_duration(report.elapsed))]);
    table.add_row(vec![
        Cell::new("Throughput"),
        Cell::new(format!(
            "{:.1} files/min, {:.0} articles/min",
            report.files_per_minute, report.articles_per_minute
        )),
    ]);
    let eta = report.eta.map_or_else(|| "unknown".to_string(), fmt_duration);
    table.add_row(vec![Cell::new("ETA"), Cell::new(eta)]);
    table
}

fn failures_table(failures: &[FailureRecord], limit: usize) -> comfy_table::Table {
    let mut table = styled_table(&["File", "Kind", "Message", "When"]);
    for record in failures.iter().take(limit) {
        table.add_row(vec![
            Cell::new(&record.source_file),
            Cell::new(&record.error_kind).fg(Color::Red),
            Cell::new(truncate(&record.error_message, MESSAGE_WIDTH)),
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    table
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

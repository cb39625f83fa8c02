//! Project subcommand: year-partitioned v2 projection of converted files

use std::path::PathBuf;

use anyhow::Result;
use brick_core::{SharedProgress, fmt_duration, fmt_num};
use clap::Args;

use super::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Directory of converted parquet files
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory for year=<YYYY> partitions
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Zstd compression level (1-22)
    #[arg(short, long)]
    pub zstd_level: Option<i32>,
}

pub fn run(args: ProjectArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let project_config = brick_pubmed::ProjectConfig {
        input_dir: args.input.unwrap_or_else(|| config.paths.output_dir.clone()),
        output_dir: args
            .output
            .unwrap_or_else(|| config.paths.projection_dir.clone()),
        workers: args.workers.unwrap_or(config.workers.default),
        zstd_level: args.zstd_level.unwrap_or(config.output.compression_level),
    };

    log::info!("Projecting converted articles");
    log::info!("  Input: {}", project_config.input_dir.display());
    log::info!("  Output: {}", project_config.output_dir.display());

    let summary = brick_pubmed::run_projection(&project_config, progress)?;

    let years = match (
        summary.year_distribution.keys().find(|&&y| y > 0),
        summary.year_distribution.keys().next_back(),
    ) {
        (Some(first), Some(last)) => format!(
            "{first}-{last} ({} partitions)",
            summary.year_distribution.len()
        ),
        _ => format!("{} partitions", summary.year_distribution.len()),
    };

    print_summary(
        "Project",
        &[
            (
                "Files",
                format!(
                    "{}/{} ({} failed)",
                    summary.completed_files, summary.total_files, summary.failed_files
                ),
            ),
            ("Records", fmt_num(summary.total_records)),
            ("Years", years),
            ("Time", fmt_duration(summary.elapsed)),
        ],
    );

    if summary.failed_files > 0 {
        anyhow::bail!("Some files failed");
    }
    Ok(())
}

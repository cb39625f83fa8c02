//! Convert subcommand: run the batch driver over an input directory

use std::path::PathBuf;

use anyhow::Result;
use brick_core::{SharedProgress, fmt_duration, fmt_num};
use clap::Args;

use super::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory with *.xml.gz / *.xml inputs
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory for parquet files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for failure records
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// DTD describing the input documents
    #[arg(long)]
    pub dtd: Option<PathBuf>,

    /// Maximum number of files to process
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Zstd compression level (1-22)
    #[arg(short, long)]
    pub zstd_level: Option<i32>,
}

impl ConvertArgs {
    /// Command-line values override the config file
    fn to_config(&self, config: &Config) -> brick_pubmed::Config {
        let paths = &config.paths;
        brick_pubmed::Config {
            input_dir: self.input.clone().unwrap_or_else(|| paths.input_dir.clone()),
            output_dir: self.output.clone().unwrap_or_else(|| paths.output_dir.clone()),
            log_dir: self.log_dir.clone().unwrap_or_else(|| paths.log_dir.clone()),
            dtd_path: self.dtd.clone().unwrap_or_else(|| paths.dtd_path.clone()),
            workers: self.workers.unwrap_or(config.workers.default),
            max_files: self.limit,
            zstd_level: self.zstd_level.unwrap_or(config.output.compression_level),
        }
    }
}

pub fn run(args: ConvertArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let pm_config = args.to_config(config);

    log::info!("Converting PubMed XML");
    log::info!("  Input: {}", pm_config.input_dir.display());
    log::info!("  Output: {}", pm_config.output_dir.display());
    log::info!("  DTD: {}", pm_config.dtd_path.display());

    let summary = brick_pubmed::run(&pm_config, progress)?;

    print_summary(
        "Convert",
        &[
            (
                "Files",
                format!(
                    "{}/{} ({} skipped, {} failed, {} cancelled)",
                    summary.completed_files,
                    summary.total_files,
                    summary.skipped_files,
                    summary.failed_files,
                    summary.cancelled_files
                ),
            ),
            ("Articles", fmt_num(summary.total_articles)),
            ("Deleted citations", fmt_num(summary.deleted_citations)),
            ("Time", fmt_duration(summary.elapsed)),
        ],
    );

    if brick_core::is_shutdown_requested() {
        anyhow::bail!("Interrupted, rerun to resume");
    }
    if summary.failed_files > 0 {
        anyhow::bail!(
            "{} files failed, see {}",
            summary.failed_files,
            pm_config.log_dir.display()
        );
    }
    Ok(())
}

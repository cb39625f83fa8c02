//! brick - PubMed XML to Parquet
//!
//! Converts PubMed baseline/update archives into one Parquet file per
//! input, shaped by the PubMed DTD, and projects the result into
//! year-partitioned typed columns.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "brick")]
#[command(about = "DTD-driven PubMed XML to Parquet converter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./brick.toml or ~/.config/brick/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert XML archives to parquet, resuming where the last run stopped
    Convert(cmd::convert::ConvertArgs),
    /// Show conversion progress and recent failures
    Status(cmd::status::StatusArgs),
    /// Project converted files into year-partitioned columns
    Project(cmd::project::ProjectArgs),
    /// Show the element schema extracted from a DTD
    Schema(cmd::schema::SchemaArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(brick_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    brick_core::init_logging(quiet, cli.debug, multi).context("Failed to initialize logging")?;

    brick_core::install_signal_handlers().context("Failed to install signal handlers")?;

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Convert(args) => cmd::convert::run(args, &config, &progress),
        Command::Status(args) => cmd::status::run(args, &config),
        Command::Project(args) => cmd::project::run(args, &config, &progress),
        Command::Schema(args) => cmd::schema::run(args, &config),
        Command::Config => {
            let mut table = cmd::styled_table(&["Setting", "Value"]);
            let paths = &config.paths;

            table.add_row(vec!["Input directory", &paths.input_dir.display().to_string()]);
            table.add_row(vec!["Output directory", &paths.output_dir.display().to_string()]);
            table.add_row(vec!["Log directory", &paths.log_dir.display().to_string()]);
            table.add_row(vec!["DTD", &paths.dtd_path.display().to_string()]);
            table.add_row(vec![
                "Projection directory",
                &paths.projection_dir.display().to_string(),
            ]);
            table.add_row(vec![
                "Compression level",
                &config.output.compression_level.to_string(),
            ]);
            table.add_row(vec!["Workers", &config.workers.default.to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}

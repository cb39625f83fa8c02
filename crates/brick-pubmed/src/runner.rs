//! Batch driver: convert every input file in a directory
//!
//! Files already converted (valid parquet at the output path) are skipped,
//! the rest are claimed from a shared queue by a fixed pool of workers.
//! A failing file is recorded under the log directory and never stops the
//! batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use brick_core::{
    ProgressContext, WorkQueue, cleanup_tmp_files, fmt_duration, fmt_num, is_valid_parquet,
    shutdown_flag,
};

use crate::config::Config;
use crate::convert::{convert_file, output_filename, output_path, source_name};
use crate::dtd::DtdSchema;
use crate::error::Error;
use crate::failure::{FailureRecord, clear_failure};

/// Input name patterns, in discovery order
const INPUT_PATTERNS: [&str; 2] = ["*.xml.gz", "*.xml"];

/// Batch execution summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Inputs considered (after `max_files`)
    pub total_files: usize,
    /// Already converted before this run
    pub skipped_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    /// Abandoned or never started because of shutdown
    pub cancelled_files: usize,
    pub total_articles: usize,
    pub deleted_citations: usize,
    pub elapsed: Duration,
}

impl Summary {
    pub fn empty() -> Self {
        Self {
            total_files: 0,
            skipped_files: 0,
            completed_files: 0,
            failed_files: 0,
            cancelled_files: 0,
            total_articles: 0,
            deleted_citations: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Every input now has an output
    pub fn is_complete(&self) -> bool {
        self.failed_files == 0 && self.cancelled_files == 0
    }

    pub fn log(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!(
            "Files: {}/{} completed, {} skipped, {} failed, {} cancelled",
            self.completed_files,
            self.total_files,
            self.skipped_files,
            self.failed_files,
            self.cancelled_files
        );
        log::info!("Articles: {}", fmt_num(self.total_articles));
        if self.deleted_citations > 0 {
            log::info!("Deleted citations: {}", fmt_num(self.deleted_citations));
        }
        log::info!("Time: {}", fmt_duration(self.elapsed));
        if self.total_articles > 0 && !self.elapsed.is_zero() {
            let rate = self.total_articles as f64 / self.elapsed.as_secs_f64();
            log::info!("Throughput: {rate:.0} articles/sec");
        }
        if self.failed_files > 0 {
            log::warn!("{} files failed, see the log directory", self.failed_files);
        }
    }
}

/// `*.xml.gz` and `*.xml` files in `input_dir`, sorted by file name
pub fn discover_inputs(input_dir: &Path) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        bail!("Input directory {} does not exist", input_dir.display());
    }
    let dir = glob::Pattern::escape(&input_dir.to_string_lossy());

    let mut inputs = Vec::new();
    for pattern in INPUT_PATTERNS {
        let pattern = format!("{dir}/{pattern}");
        for entry in glob::glob(&pattern).with_context(|| format!("Bad pattern {pattern}"))? {
            let path = entry.context("Failed to list input directory")?;
            if path.is_file() {
                inputs.push(path);
            }
        }
    }
    inputs.sort_by_key(|p| source_name(p));
    inputs.dedup();
    Ok(inputs)
}

/// Split off inputs whose output name is already taken by an earlier input
/// (`a.xml` and `a.xml.gz` both become `a.parquet`).
///
/// The first input in order keeps the name; each later one is returned with
/// the error to record for it.
pub fn split_output_collisions(inputs: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<(PathBuf, Error)>) {
    let mut owners: FxHashMap<String, String> = FxHashMap::default();
    let mut unique = Vec::with_capacity(inputs.len());
    let mut collisions = Vec::new();
    for path in inputs {
        let output = output_filename(&path);
        match owners.get(&output) {
            Some(owner) => {
                let claimed_by = owner.clone();
                collisions.push((path, Error::OutputCollision { output, claimed_by }));
            }
            None => {
                owners.insert(output, source_name(&path));
                unique.push(path);
            }
        }
    }
    (unique, collisions)
}

/// Run the batch, stopping early if the process-wide shutdown flag is set
pub fn run(config: &Config, progress: &ProgressContext) -> Result<Summary> {
    run_with_cancel(config, progress, shutdown_flag())
}

/// Run the batch with an explicit cancellation flag
pub fn run_with_cancel(
    config: &Config,
    progress: &ProgressContext,
    cancel: &AtomicBool,
) -> Result<Summary> {
    let start = Instant::now();

    if config.workers == 0 {
        bail!("workers must be at least 1");
    }
    for dir in [&config.output_dir, &config.log_dir] {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let stale = cleanup_tmp_files(&config.output_dir).context("Failed to clean output directory")?;
    if stale > 0 {
        log::info!("Removed {stale} stale tmp files");
    }

    let schema = DtdSchema::from_file(&config.dtd_path)
        .with_context(|| format!("Failed to read DTD {}", config.dtd_path.display()))?;
    if schema.is_empty() {
        log::warn!("DTD {} declares no elements", config.dtd_path.display());
    }

    let mut inputs = discover_inputs(&config.input_dir)?;
    log::info!("Found {} input files in {}", inputs.len(), config.input_dir.display());
    if let Some(max) = config.max_files {
        inputs.truncate(max);
    }
    let total_files = inputs.len();

    let (inputs, collisions) = split_output_collisions(inputs);
    for (path, err) in &collisions {
        let source = source_name(path);
        log::error!("{source}: {err}");
        if let Err(write_err) = FailureRecord::new(&source, err).write_to(&config.log_dir) {
            log::error!("{source}: failed to write failure record: {write_err}");
        }
    }

    let (queue, done) = WorkQueue::partition(inputs, |path| {
        is_valid_parquet(&output_path(path, &config.output_dir))
    });
    if !done.is_empty() {
        log::info!("Skipping {} already converted files", done.len());
    }
    if queue.total() == 0 {
        log::info!("Nothing to do");
        let summary = Summary {
            total_files,
            skipped_files: done.len(),
            failed_files: collisions.len(),
            elapsed: start.elapsed(),
            ..Summary::empty()
        };
        summary.log();
        return Ok(summary);
    }

    let workers = config.workers.min(queue.total());
    log::info!("Converting {} files with {workers} workers", queue.total());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("brick-worker-{i}"))
        .build()
        .context("Failed to create thread pool")?;

    let files_pb = progress.files_bar(queue.total() as u64);
    let counters = Counters::default();

    pool.scope(|s| {
        for _ in 0..workers {
            s.spawn(|_| {
                while !cancel.load(Ordering::Relaxed) {
                    let Some((_, path)) = queue.claim() else {
                        break;
                    };
                    process_one(path, config, &schema, progress, cancel, &counters);
                    files_pb.inc(1);
                }
            });
        }
    });
    files_pb.finish_and_clear();

    let not_started = queue.remaining();
    if cancel.load(Ordering::Relaxed) {
        log::warn!("Shutdown requested, {not_started} files not started");
    }

    let summary = Summary {
        total_files,
        skipped_files: done.len(),
        completed_files: counters.completed.load(Ordering::Relaxed),
        failed_files: counters.failed.load(Ordering::Relaxed) + collisions.len(),
        cancelled_files: counters.cancelled.load(Ordering::Relaxed) + not_started,
        total_articles: counters.articles.load(Ordering::Relaxed),
        deleted_citations: counters.deleted.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    };
    summary.log();
    Ok(summary)
}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    articles: AtomicUsize,
    deleted: AtomicUsize,
}

/// Convert one file and account for the outcome. Never fails.
fn process_one(
    path: &Path,
    config: &Config,
    schema: &DtdSchema,
    progress: &ProgressContext,
    cancel: &AtomicBool,
    counters: &Counters,
) {
    let source = source_name(path);
    let pb = progress.file_bar(&source);
    let result = convert_file(
        path,
        &config.output_dir,
        schema,
        config.zstd_level,
        &pb,
        cancel,
    );
    pb.finish_and_clear();

    match result {
        Ok(stats) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            counters.articles.fetch_add(stats.articles, Ordering::Relaxed);
            counters
                .deleted
                .fetch_add(stats.deleted_pmids.len(), Ordering::Relaxed);
            log::info!("{source}: {} articles", fmt_num(stats.articles));
            match clear_failure(&config.log_dir, &source) {
                Ok(true) => log::info!("{source}: cleared earlier failure record"),
                Ok(false) => {}
                Err(e) => log::warn!("{source}: failed to clear failure record: {e}"),
            }
        }
        Err(Error::Cancelled) => {
            counters.cancelled.fetch_add(1, Ordering::Relaxed);
            log::warn!("{source}: cancelled");
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            log::error!("{source}: {e}");
            if let Err(write_err) = FailureRecord::new(&source, &e).write_to(&config.log_dir) {
                log::error!("{source}: failed to write failure record: {write_err}");
            }
        }
    }
}

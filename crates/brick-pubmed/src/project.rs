//! Year-partitioned projection of converted articles
//!
//! Reads `(pmid, json, source)` files, pulls commonly queried fields out of
//! the JSON record into typed columns and writes them under
//! `<output_dir>/year=<YYYY>/<stem>.parquet` (`year=0` when no year is
//! known). A `metadata.json` summary is written next to the partitions.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Int64Array, RecordBatch, StringArray};
use brick_core::{Accumulator, ParquetSink, ProgressContext, fmt_num, shutdown_flag};
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::config::default_workers;
use crate::schema;
use crate::transform::ProjectedAccumulator;

/// Layout version recorded in `metadata.json`
pub const SCHEMA_VERSION: &str = "2.0";

/// File name of the projection summary
pub const METADATA_FILE: &str = "metadata.json";

/// Partition for records without a usable year
pub const UNKNOWN_YEAR: i32 = 0;

/// Projection run configuration
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Directory of converted `(pmid, json, source)` files
    pub input_dir: PathBuf,
    /// Root of the `year=<YYYY>` partitions
    pub output_dir: PathBuf,
    pub workers: usize,
    pub zstd_level: i32,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("brick/pubmed.parquet"),
            output_dir: PathBuf::from("brick_v2/pubmed.parquet"),
            workers: default_workers(),
            zstd_level: 3,
        }
    }
}

/// One projected article
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedRow {
    pub pmid: i64,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub year: Option<i32>,
    pub authors: Option<String>,
    pub journal: Option<String>,
    pub mesh_terms: Option<String>,
    pub keywords: Option<String>,
    pub pub_types: Option<String>,
    pub date_created: Option<String>,
    pub date_revised: Option<String>,
    pub json: String,
    pub source: String,
}

/// Pull the searchable fields out of one JSON record.
///
/// A record that is not valid JSON keeps only its key and raw text.
pub fn project_record(pmid: i64, json: &str, source: &str) -> ProjectedRow {
    let mut row = ProjectedRow {
        pmid,
        json: json.to_string(),
        source: source.to_string(),
        ..Default::default()
    };
    let data: Json = match serde_json::from_str(json) {
        Ok(data) => data,
        Err(e) => {
            log::debug!("PMID {pmid}: record is not valid JSON: {e}");
            return row;
        }
    };

    let medline = &data["MedlineCitation"];
    let article = &medline["Article"];
    let journal = &article["Journal"];

    row.title = non_empty(text_of(&article["ArticleTitle"]));
    row.abstract_text = non_empty(text_of(&article["Abstract"]["AbstractText"]));
    row.doi = find_doi(&data["PubmedData"]["ArticleIdList"], &article["ELocationID"]);
    row.year = pub_year(&journal["JournalIssue"]["PubDate"]);
    row.authors = non_empty(
        items(&article["AuthorList"])
            .filter_map(author_name)
            .collect::<Vec<_>>()
            .join("; "),
    );
    row.journal = non_empty(text_of(&journal["Title"]));
    row.mesh_terms = joined(items(&medline["MeshHeadingList"]).map(|h| &h["DescriptorName"]));
    row.keywords = joined(items(&medline["KeywordList"]));
    row.pub_types = joined(items(&article["PublicationTypeList"]));
    row.date_created = format_date(&medline["DateCreated"]).or_else(|| format_date(&medline["DateCompleted"]));
    row.date_revised = format_date(&medline["DateRevised"]);
    row
}

/// Flattened text: strings as-is, lists and objects joined with spaces
fn text_of(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Array(items) => join_texts(items.iter()),
        Json::Object(map) => join_texts(map.values()),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn join_texts<'a>(values: impl Iterator<Item = &'a Json>) -> String {
    values
        .map(text_of)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Elements of a list, or the value itself when it is a lone item
fn items(value: &Json) -> Box<dyn Iterator<Item = &Json> + '_> {
    match value {
        Json::Array(items) => Box::new(items.iter()),
        Json::Null => Box::new(std::iter::empty()),
        other => Box::new(std::iter::once(other)),
    }
}

fn joined<'a>(values: impl Iterator<Item = &'a Json>) -> Option<String> {
    let parts: Vec<String> = values.filter_map(|v| non_empty(text_of(v))).collect();
    non_empty(parts.join("; "))
}

/// `Last, Fore`; authors without a last name (collectives) are skipped
fn author_name(author: &Json) -> Option<String> {
    let last = non_empty(text_of(&author["LastName"]))?;
    Some(match non_empty(text_of(&author["ForeName"])) {
        Some(fore) => format!("{last}, {fore}"),
        None => last,
    })
}

fn is_doi(s: &str) -> bool {
    s.starts_with("10.")
}

/// First article id shaped like a DOI, else a DOI-shaped ELocationID
fn find_doi(article_ids: &Json, elocation: &Json) -> Option<String> {
    items(article_ids)
        .chain(items(elocation))
        .map(|v| text_of(v).trim().to_string())
        .find(|s| is_doi(s))
}

/// `PubDate/Year`, falling back to the leading year of `MedlineDate`
fn pub_year(pub_date: &Json) -> Option<i32> {
    let year = text_of(&pub_date["Year"]);
    if let Ok(y) = year.trim().parse::<i32>() {
        return Some(y);
    }
    let medline_date = text_of(&pub_date["MedlineDate"]);
    let prefix = medline_date.trim().get(..4)?;
    if prefix.bytes().all(|b| b.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}

/// `YYYY-MM-DD`, month and day defaulting to `01`
fn format_date(date: &Json) -> Option<String> {
    let year = non_empty(text_of(&date["Year"]))?;
    let month = non_empty(text_of(&date["Month"])).unwrap_or_else(|| "01".to_string());
    let day = non_empty(text_of(&date["Day"])).unwrap_or_else(|| "01".to_string());
    Some(format!("{year}-{month}-{day}"))
}

/// Summary written to `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionMetadata {
    pub total_records: usize,
    pub year_distribution: BTreeMap<i32, usize>,
    pub schema_version: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl ProjectionMetadata {
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Invalid metadata in {}", path.display()))
    }

    /// Write atomically to `<dir>/metadata.json`
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(METADATA_FILE);
        let tmp = dir.join(format!("{METADATA_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

/// Projection run summary
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub total_records: usize,
    pub year_distribution: BTreeMap<i32, usize>,
    pub elapsed: Duration,
}

impl ProjectSummary {
    pub fn log(&self) {
        log::info!("=== Projection Summary ===");
        log::info!(
            "Files: {}/{} completed ({} failed)",
            self.completed_files,
            self.total_files,
            self.failed_files
        );
        log::info!("Records: {}", fmt_num(self.total_records));
        for (year, count) in &self.year_distribution {
            log::debug!("  year={year}: {}", fmt_num(*count));
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

/// Rows written per year for one input file
pub type YearCounts = BTreeMap<i32, usize>;

enum FileOutcome {
    Done(YearCounts),
    Failed,
    Cancelled,
}

/// Project every `*.parquet` file of `input_dir`
pub fn run_projection(config: &ProjectConfig, progress: &ProgressContext) -> Result<ProjectSummary> {
    run_projection_with_cancel(config, progress, shutdown_flag())
}

pub fn run_projection_with_cancel(
    config: &ProjectConfig,
    progress: &ProgressContext,
    cancel: &AtomicBool,
) -> Result<ProjectSummary> {
    let start = Instant::now();
    if config.workers == 0 {
        bail!("workers must be at least 1");
    }
    if !config.input_dir.is_dir() {
        bail!("Input directory {} does not exist", config.input_dir.display());
    }
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    let pattern = format!(
        "{}/*.parquet",
        glob::Pattern::escape(&config.input_dir.to_string_lossy())
    );
    let mut inputs: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Bad pattern {pattern}"))?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to list input directory")?;
    inputs.sort();
    log::info!("Projecting {} files with {} workers", inputs.len(), config.workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .context("Failed to create thread pool")?;

    let files_pb = progress.files_bar(inputs.len() as u64);
    let outcomes: Vec<FileOutcome> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                if cancel.load(Ordering::Relaxed) {
                    return FileOutcome::Cancelled;
                }
                let result = project_file(input, &config.output_dir, config.zstd_level);
                files_pb.inc(1);
                match result {
                    Ok(counts) => FileOutcome::Done(counts),
                    Err(e) => {
                        log::error!("{}: {e:#}", input.display());
                        FileOutcome::Failed
                    }
                }
            })
            .collect()
    });
    files_pb.finish_and_clear();

    let mut year_distribution = BTreeMap::new();
    let (mut completed_files, mut failed_files) = (0, 0);
    for outcome in &outcomes {
        match outcome {
            FileOutcome::Done(counts) => {
                completed_files += 1;
                for (year, n) in counts {
                    *year_distribution.entry(*year).or_insert(0) += n;
                }
            }
            FileOutcome::Failed => failed_files += 1,
            FileOutcome::Cancelled => {}
        }
    }
    let total_records = year_distribution.values().sum();

    let metadata = ProjectionMetadata {
        total_records,
        year_distribution: year_distribution.clone(),
        schema_version: SCHEMA_VERSION.to_string(),
        source: format!("projected from {}", config.input_dir.display()),
        created_at: Utc::now(),
    };
    let path = metadata.write_to(&config.output_dir)?;
    log::info!("Metadata written to {}", path.display());

    let summary = ProjectSummary {
        total_files: inputs.len(),
        completed_files,
        failed_files,
        total_records,
        year_distribution,
        elapsed: start.elapsed(),
    };
    summary.log();
    Ok(summary)
}

/// Open partition writers of one input file
struct YearSinks<'a> {
    output_dir: &'a Path,
    filename: String,
    zstd_level: i32,
    open: BTreeMap<i32, (ParquetSink, ProjectedAccumulator)>,
}

impl YearSinks<'_> {
    fn push(&mut self, row: ProjectedRow) -> Result<()> {
        let year = row.year.unwrap_or(UNKNOWN_YEAR);
        if !self.open.contains_key(&year) {
            let dir = self.output_dir.join(format!("year={year}"));
            fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
            let sink = ParquetSink::create(&dir, &self.filename, schema::projected(), self.zstd_level)?;
            self.open.insert(year, (sink, ProjectedAccumulator::new()));
        }
        if let Some((sink, acc)) = self.open.get_mut(&year) {
            acc.push(row);
            if acc.is_full() {
                acc.flush_to(sink)?;
            }
        }
        Ok(())
    }

    fn finalize(self) -> Result<YearCounts> {
        let mut counts = YearCounts::new();
        let mut open = self.open.into_iter();
        while let Some((year, (mut sink, mut acc))) = open.next() {
            let written = match acc.flush_to(&mut sink) {
                Ok(()) => sink.finalize(),
                Err(e) => {
                    sink.abort();
                    Err(e)
                }
            };
            match written {
                Ok(rows) => {
                    counts.insert(year, rows);
                }
                Err(e) => {
                    for (_, (rest, _)) in open {
                        rest.abort();
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(counts)
    }

    fn abort(self) {
        for (_, (sink, _)) in self.open {
            sink.abort();
        }
    }
}

/// Project one converted file into its year partitions
pub fn project_file(input: &Path, output_dir: &Path, zstd_level: i32) -> Result<YearCounts> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut sinks = YearSinks {
        output_dir,
        filename: format!("{stem}.parquet"),
        zstd_level,
        open: BTreeMap::new(),
    };

    match read_rows(input, &mut sinks) {
        Ok(()) => sinks.finalize(),
        Err(e) => {
            sinks.abort();
            Err(e)
        }
    }
}

fn read_rows(input: &Path, sinks: &mut YearSinks<'_>) -> Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    for batch in reader {
        let batch = batch?;
        let pmid = column::<Int64Array>(&batch, "pmid")?;
        let json = column::<StringArray>(&batch, "json")?;
        let source = column::<StringArray>(&batch, "source")?;
        for i in 0..batch.num_rows() {
            sinks.push(project_record(pmid.value(i), json.value(i), source.value(i)))?;
        }
    }
    Ok(())
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .with_context(|| format!("missing or mistyped column '{name}'"))
}

//! Read-only progress view over the output and log directories

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use brick_core::{fmt_duration, fmt_num, parquet_row_count};

use crate::failure::failure_paths;
use crate::runner::discover_inputs;

/// Snapshot of how far a conversion has come
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub total_inputs: usize,
    /// `.parquet` files in the output directory
    pub completed: usize,
    /// Failure records in the log directory
    pub failed: usize,
    pub remaining: usize,
    /// Rows across all outputs, from parquet footers
    pub articles: u64,
    /// Since the earliest output was created
    pub elapsed: Duration,
    pub files_per_minute: f64,
    pub articles_per_minute: f64,
    /// Linear estimate for `remaining` at `files_per_minute`
    pub eta: Option<Duration>,
}

impl ProgressReport {
    /// Share of inputs with an output, 0–100
    pub fn percent_complete(&self) -> f64 {
        if self.total_inputs == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.total_inputs as f64
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Files: {}/{} ({:.1}%), {} failed, {} remaining",
            self.completed,
            self.total_inputs,
            self.percent_complete(),
            self.failed,
            self.remaining
        )?;
        writeln!(f, "Articles: {}", fmt_num(self.articles as usize))?;
        writeln!(
            f,
            "Rate: {:.1} files/min, {:.0} articles/min over {}",
            self.files_per_minute,
            self.articles_per_minute,
            fmt_duration(self.elapsed)
        )?;
        match self.eta {
            Some(eta) => write!(f, "ETA: {}", fmt_duration(eta)),
            None => write!(f, "ETA: unknown"),
        }
    }
}

/// Build a [`ProgressReport`]. Missing directories count as empty.
pub fn progress_report(input_dir: &Path, output_dir: &Path, log_dir: &Path) -> Result<ProgressReport> {
    let total_inputs = if input_dir.is_dir() {
        discover_inputs(input_dir)?.len()
    } else {
        0
    };

    let outputs = parquet_outputs(output_dir)
        .with_context(|| format!("Failed to list {}", output_dir.display()))?;
    let failed = failure_paths(log_dir)
        .with_context(|| format!("Failed to list {}", log_dir.display()))?
        .len();

    let articles: u64 = outputs
        .iter()
        .filter_map(|p| parquet_row_count(p))
        .map(|n| n.max(0) as u64)
        .sum();

    let earliest = outputs.iter().filter_map(|p| created_at(p)).min();
    let elapsed = earliest
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .unwrap_or(Duration::ZERO);

    let completed = outputs.len();
    let remaining = total_inputs.saturating_sub(completed);
    let rates = Rates::over(elapsed, completed, articles, remaining);

    Ok(ProgressReport {
        total_inputs,
        completed,
        failed,
        remaining,
        articles,
        elapsed,
        files_per_minute: rates.files_per_minute,
        articles_per_minute: rates.articles_per_minute,
        eta: rates.eta,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rates {
    files_per_minute: f64,
    articles_per_minute: f64,
    eta: Option<Duration>,
}

impl Rates {
    /// Throughput over `elapsed`, and the time `remaining` files need at
    /// that pace. No pace yet means no estimate, unless nothing remains.
    fn over(elapsed: Duration, completed: usize, articles: u64, remaining: usize) -> Self {
        let minutes = elapsed.as_secs_f64() / 60.0;
        let (files_per_minute, articles_per_minute) = if minutes > 0.0 {
            (completed as f64 / minutes, articles as f64 / minutes)
        } else {
            (0.0, 0.0)
        };
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if files_per_minute > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / files_per_minute * 60.0))
        } else {
            None
        };
        Self {
            files_per_minute,
            articles_per_minute,
            eta,
        }
    }
}

fn parquet_outputs(output_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Creation time where the filesystem records it, else modification time
fn created_at(path: &Path) -> Option<SystemTime> {
    let meta = fs::metadata(path).ok()?;
    meta.created().or_else(|_| meta.modified()).ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int64Array, RecordBatch, StringArray};
    use brick_core::ParquetSink;
    use tempfile::TempDir;

    use super::*;
    use crate::schema;

    fn write_output(dir: &Path, name: &str, rows: i64) {
        let mut sink = ParquetSink::create(dir, name, schema::articles(), 3).unwrap();
        let n = rows as usize;
        let batch = RecordBatch::try_new(
            schema::ARTICLES.clone(),
            vec![
                Arc::new(Int64Array::from((1..=rows).collect::<Vec<_>>())),
                Arc::new(StringArray::from(vec!["{}"; n])),
                Arc::new(StringArray::from(vec!["x.xml"; n])),
            ],
        )
        .unwrap();
        sink.write_batch(&batch).unwrap();
        sink.finalize().unwrap();
    }

    #[test]
    fn empty_directories() {
        let dir = TempDir::new().unwrap();
        let report = progress_report(
            &dir.path().join("in"),
            &dir.path().join("out"),
            &dir.path().join("log"),
        )
        .unwrap();
        assert_eq!(report.total_inputs, 0);
        assert_eq!(report.completed, 0);
        assert_eq!(report.articles, 0);
        assert_eq!(report.eta, Some(Duration::ZERO));
        assert_eq!(report.percent_complete(), 0.0);
    }

    #[test]
    fn counts_inputs_outputs_and_failures() {
        let dir = TempDir::new().unwrap();
        let (input, output, log) = (
            dir.path().join("in"),
            dir.path().join("out"),
            dir.path().join("log"),
        );
        for d in [&input, &output, &log] {
            fs::create_dir_all(d).unwrap();
        }
        for i in 1..=4 {
            fs::write(input.join(format!("pubmed25n000{i}.xml.gz")), "").unwrap();
        }
        write_output(&output, "pubmed25n0001.parquet", 3);
        write_output(&output, "pubmed25n0002.parquet", 2);
        fs::write(output.join("pubmed25n0003.parquet.tmp"), "partial").unwrap();
        fs::write(log.join("pubmed25n0004.xml.gz.error.json"), "{}").unwrap();

        let report = progress_report(&input, &output, &log).unwrap();
        assert_eq!(report.total_inputs, 4);
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.articles, 5);
        assert_eq!(report.percent_complete(), 50.0);
    }

    #[test]
    fn rates_and_eta_from_elapsed_time() {
        // 6 files and 1,200 articles in 3 minutes: 2 files/min, 400 articles/min
        let rates = Rates::over(Duration::from_secs(180), 6, 1_200, 4);
        assert_eq!(rates.files_per_minute, 2.0);
        assert_eq!(rates.articles_per_minute, 400.0);
        // 4 remaining at 2/min
        assert_eq!(rates.eta, Some(Duration::from_secs(120)));

        let done = Rates::over(Duration::from_secs(180), 6, 1_200, 0);
        assert_eq!(done.eta, Some(Duration::ZERO));

        let stalled = Rates::over(Duration::from_secs(180), 0, 0, 4);
        assert_eq!(stalled.files_per_minute, 0.0);
        assert_eq!(stalled.eta, None);

        let fresh = Rates::over(Duration::ZERO, 0, 0, 4);
        assert_eq!(fresh.eta, None);
    }

    #[test]
    fn display_mentions_eta() {
        let report = ProgressReport {
            total_inputs: 10,
            completed: 5,
            failed: 0,
            remaining: 5,
            articles: 150_000,
            elapsed: Duration::from_secs(300),
            files_per_minute: 1.0,
            articles_per_minute: 30_000.0,
            eta: Some(Duration::from_secs(300)),
        };
        let text = report.to_string();
        assert!(text.contains("5/10 (50.0%)"), "{text}");
        assert!(text.contains("150,000"));
        assert!(text.contains("ETA: 5m 00s"));
    }
}

//! Brick PubMed - DTD-driven PubMed XML to Parquet conversion
//!
//! Turns PubMed baseline/update archives into one Parquet file each, with
//! every article stored as a JSON document shaped by the PubMed DTD.
//!
//! # Pipeline
//!
//! - [`dtd`]: extract occurrence and child metadata from the DTD
//! - [`transcode`]: render an article element as Text / Object / List
//! - [`convert`]: one archive → one `(pmid, json, source)` Parquet file
//! - [`runner`]: parallel batch over a directory, skipping finished files
//!   and recording failures
//! - [`report`]: progress and ETA from what is on disk
//! - [`project`]: year-partitioned projection with searchable columns
//!
//! # Example
//!
//! ```ignore
//! use brick_core::ProgressContext;
//! use brick_pubmed::{Config, run};
//!
//! let config = Config {
//!     input_dir: "download/baseline".into(),
//!     max_files: Some(1),
//!     ..Default::default()
//! };
//!
//! let summary = run(&config, &ProgressContext::new())?;
//! println!("Converted {} articles", summary.total_articles);
//! ```

pub mod config;
pub mod convert;
pub mod dtd;
pub mod error;
pub mod failure;
pub mod project;
pub mod report;
pub mod runner;
pub mod schema;
pub mod transcode;
pub mod transform;
pub mod xml;

// Re-exports
pub use config::Config;
pub use convert::{ConvertStats, convert_file};
pub use dtd::{DtdSchema, DtdWarning, ElementSchema, Occurrence};
pub use error::{Error, Result};
pub use failure::{FailureRecord, list_failures};
pub use project::{ProjectConfig, ProjectSummary, run_projection};
pub use report::{ProgressReport, progress_report};
pub use runner::{Summary, run, run_with_cancel};
pub use transcode::{Value, transcode};

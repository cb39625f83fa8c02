//! Batch conversion configuration

use std::path::PathBuf;

/// Upper bound on the default worker count
const MAX_DEFAULT_WORKERS: usize = 8;

/// Runtime configuration for a conversion run
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `*.xml.gz` / `*.xml` inputs
    pub input_dir: PathBuf,
    /// Directory receiving one parquet file per input
    pub output_dir: PathBuf,
    /// Directory receiving `<input>.error.json` failure records
    pub log_dir: PathBuf,
    /// DTD describing the input documents
    pub dtd_path: PathBuf,
    /// Number of files converted in parallel
    pub workers: usize,
    /// Maximum files to process (for testing)
    pub max_files: Option<usize>,
    /// Zstd compression level for parquet output
    pub zstd_level: i32,
}

/// `min(available cores, 8)`, at least 1
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("download/baseline"),
            output_dir: PathBuf::from("brick/pubmed.parquet"),
            log_dir: PathBuf::from("brick/log"),
            dtd_path: PathBuf::from("pubmed.dtd"),
            workers: default_workers(),
            max_files: None,
            zstd_level: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.input_dir, PathBuf::from("download/baseline"));
        assert_eq!(config.output_dir, PathBuf::from("brick/pubmed.parquet"));
        assert_eq!(config.log_dir, PathBuf::from("brick/log"));
        assert!(config.max_files.is_none());
        assert_eq!(config.zstd_level, 3);
        assert!((1..=MAX_DEFAULT_WORKERS).contains(&config.workers));
    }
}

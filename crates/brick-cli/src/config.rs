//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for brick
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub dtd_path: PathBuf,
    /// Destination of `brick project`
    pub projection_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let convert = brick_pubmed::Config::default();
        let project = brick_pubmed::ProjectConfig::default();
        Self {
            input_dir: convert.input_dir,
            output_dir: convert.output_dir,
            log_dir: convert.log_dir,
            dtd_path: convert.dtd_path,
            projection_dir: project.output_dir,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub compression_level: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression_level: brick_pubmed::Config::default().zstd_level,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            default: brick_pubmed::config::default_workers(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./brick.toml (current directory)
    /// 2. ~/.config/brick/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("brick.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "brick") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.paths.input_dir, PathBuf::from("download/baseline"));
        assert_eq!(config.paths.output_dir, PathBuf::from("brick/pubmed.parquet"));
        assert_eq!(
            config.paths.projection_dir,
            PathBuf::from("brick_v2/pubmed.parquet")
        );
        assert_eq!(config.output.compression_level, 3);
        assert!(config.workers.default >= 1);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[paths]
input_dir = "/data/baseline"
dtd_path = "/data/pubmed_250101.dtd"

[output]
compression_level = 9

[workers]
default = 4
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.paths.input_dir, PathBuf::from("/data/baseline"));
        assert_eq!(config.paths.dtd_path, PathBuf::from("/data/pubmed_250101.dtd"));
        // unset keys keep their defaults
        assert_eq!(config.paths.log_dir, PathBuf::from("brick/log"));
        assert_eq!(config.output.compression_level, 9);
        assert_eq!(config.workers.default, 4);
    }

    #[test]
    fn empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.paths.dtd_path, PathBuf::from("pubmed.dtd"));
    }

    #[test]
    fn from_file_reports_path() {
        let err = Config::from_file(Path::new("/nonexistent/brick.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/brick.toml"));
    }
}

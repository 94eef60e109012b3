//! Run configuration.
//!
//! A [`PipelineConfig`] is passed into the pipeline at construction; nothing
//! is read from module-level state. It can be built in code or loaded from
//! TOML, where every key is optional:
//!
//! ```
//! use bibrecon::{MissingSourcePolicy, PipelineConfig};
//!
//! let config = PipelineConfig::from_toml_str(r#"
//!     catalog_path = "landing/catalog.json"
//!     on_missing_source = "treat_as_empty"
//!
//!     [outputs]
//!     dim_csv = "books.csv"
//! "#).unwrap();
//!
//! assert_eq!(config.on_missing_source, MissingSourcePolicy::TreatAsEmpty);
//! assert_eq!(config.outputs.dim_csv, "books.csv");
//! assert_eq!(config.outputs.dim_json, "dim_book.json");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ReconcileError, Result};

/// What to do when a source extract is absent or cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSourcePolicy {
    /// Log the failure and produce no output for the run.
    #[default]
    Abort,
    /// Log the failure and continue with an empty table for that source.
    TreatAsEmpty,
}

impl fmt::Display for MissingSourcePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::TreatAsEmpty => write!(f, "treat_as_empty"),
        }
    }
}

/// File names of the run's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    /// Detail table, written to the output directory
    pub detail_csv: String,
    /// Canonical table, written to the output directory
    pub dim_csv: String,
    /// Canonical table, written to the output directory
    pub dim_json: String,
    /// Quality report, written to the docs directory
    pub metrics_json: String,
    /// Canonical column reference, written to the docs directory
    pub schema_md: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            detail_csv: "book_source_detail.csv".to_string(),
            dim_csv: "dim_book.csv".to_string(),
            dim_json: "dim_book.json".to_string(),
            metrics_json: "quality_metrics.json".to_string(),
            schema_md: "schema.md".to_string(),
        }
    }
}

/// Everything a pipeline run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub catalog_path: PathBuf,
    pub metadata_path: PathBuf,
    pub output_dir: PathBuf,
    pub docs_dir: PathBuf,
    /// Label of the catalog source in provenance and metrics
    pub catalog_source: String,
    /// Label of the metadata source in provenance and metrics
    pub metadata_source: String,
    pub csv_delimiter: char,
    pub on_missing_source: MissingSourcePolicy,
    pub outputs: OutputFiles,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("landing/goodreads_books.json"),
            metadata_path: PathBuf::from("landing/googlebooks_books.csv"),
            output_dir: PathBuf::from("standard"),
            docs_dir: PathBuf::from("docs"),
            catalog_source: "goodreads".to_string(),
            metadata_source: "googlebooks".to_string(),
            csv_delimiter: ',',
            on_missing_source: MissingSourcePolicy::default(),
            outputs: OutputFiles::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML configuration file.
    ///
    /// Relative paths inside the file are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let input = fs::read_to_string(path)
            .map_err(|e| ReconcileError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&input)?;

        if let Some(base) = path.parent() {
            for p in [
                &mut config.catalog_path,
                &mut config.metadata_path,
                &mut config.output_dir,
                &mut config.docs_dir,
            ] {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.csv_delimiter.is_ascii() {
            return Err(ReconcileError::Config(format!(
                "csv_delimiter must be a single ASCII character, got {:?}",
                self.csv_delimiter
            )));
        }

        if self.catalog_source.trim().is_empty() || self.metadata_source.trim().is_empty() {
            return Err(ReconcileError::Config(
                "source labels must not be empty".to_string(),
            ));
        }
        if self.catalog_source == self.metadata_source {
            return Err(ReconcileError::Config(format!(
                "source labels must differ, both are '{}'",
                self.catalog_source
            )));
        }

        let outputs = [
            ("detail_csv", &self.outputs.detail_csv),
            ("dim_csv", &self.outputs.dim_csv),
            ("dim_json", &self.outputs.dim_json),
            ("metrics_json", &self.outputs.metrics_json),
            ("schema_md", &self.outputs.schema_md),
        ];
        if let Some((key, _)) = outputs.iter().find(|(_, name)| name.trim().is_empty()) {
            return Err(ReconcileError::Config(format!(
                "outputs.{key} must not be empty"
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = path.into();
        self
    }

    #[must_use]
    pub fn with_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = path.into();
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_docs_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.docs_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_missing_source_policy(mut self, policy: MissingSourcePolicy) -> Self {
        self.on_missing_source = policy;
        self
    }

    #[must_use]
    pub fn with_csv_delimiter(mut self, delimiter: char) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    /// File name of the catalog extract, used in provenance.
    pub fn catalog_file_name(&self) -> String {
        file_name(&self.catalog_path)
    }

    /// File name of the metadata extract, used in provenance.
    pub fn metadata_file_name(&self) -> String {
        file_name(&self.metadata_path)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

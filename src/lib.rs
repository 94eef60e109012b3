//! Record linkage and survivorship for book metadata gathered from two sources.
//!
//! `bibrecon` takes the rows of a scraped book catalog and the rows returned by
//! an external metadata API, links rows that describe the same book even when
//! the two sources share no common key, and collapses every linked group into a
//! single canonical ("golden") record with quality metrics describing the run.
//!
//! # Key Features
//!
//! - **Identifier handling**: ISBN-10/13 normalization and checksum validation
//! - **Two-phase matching**:
//!   - Full outer join on normalized ISBN-13
//!   - Full outer join on a normalized `title|authors` key
//!   - Column-wise reconciliation where the ISBN join always wins
//! - **Survivorship**: deterministic field-level rules pick one value per field
//! - **Canonical model**: ISO-8601 dates, 2-letter languages, ISO-4217 currencies
//! - **Quality report**: completeness and format-validity metrics
//!
//! # Basic Usage
//!
//! ```rust
//! use bibrecon::{CatalogRecord, MetadataRecord, SourceTable};
//! use bibrecon::pipeline::Pipeline;
//! use bibrecon::PipelineConfig;
//!
//! let catalog = SourceTable::from_records(vec![CatalogRecord {
//!     title: Some("Dune".to_string()),
//!     author: Some("Frank Herbert".to_string()),
//!     ..Default::default()
//! }]);
//! let metadata = SourceTable::from_records(vec![MetadataRecord {
//!     external_id: Some("B1".to_string()),
//!     title: Some("Dune".to_string()),
//!     authors: Some(vec!["Frank Herbert".to_string()]),
//!     isbn13: Some("9780441013593".to_string()),
//!     ..Default::default()
//! }]);
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let outcome = pipeline.reconcile(&catalog, &metadata);
//! assert_eq!(outcome.canonical.len(), 1);
//! assert_eq!(outcome.canonical[0].isbn13.as_deref(), Some("9780441013593"));
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return the crate [`Result`] wrapping [`ReconcileError`].
//! Only the file boundary (loading and writing) can fail; matching, survivorship
//! and canonicalization model every "not found" case as `Option`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod canonical;
pub mod config;
pub mod csv;
pub mod isbn;
pub mod json;
pub mod loader;
pub mod matcher;
pub mod pipeline;
pub mod quality;
mod regex;
pub mod survivor;
pub mod text;
pub mod volume;
pub mod writer;

// Reexports
pub use crate::canonical::CanonicalRecord;
pub use crate::config::{MissingSourcePolicy, PipelineConfig};
pub use crate::csv::MetadataCsvParser;
pub use crate::json::CatalogJsonParser;
pub use crate::matcher::{DetailRecord, Matcher};
pub use crate::pipeline::{Pipeline, Reconciliation, RunReport};
pub use crate::quality::QualityReport;
pub use crate::survivor::{SourceWinner, SurvivedRecord, SurvivorResolver};

/// A specialized Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors raised at the boundaries of a reconciliation run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    InvalidFormat(String),

    #[error("Missing source '{source_name}': {path} does not exist")]
    MissingSource { source_name: String, path: PathBuf },

    #[error("Malformed input in source '{source_name}': {message}")]
    MalformedInput {
        source_name: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<::csv::Error> for ReconcileError {
    fn from(err: ::csv::Error) -> Self {
        ReconcileError::InvalidFormat(err.to_string())
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::InvalidFormat(err.to_string())
    }
}

impl From<toml::de::Error> for ReconcileError {
    fn from(err: toml::de::Error) -> Self {
        ReconcileError::Config(err.to_string())
    }
}

/// One row of the scraped catalog extract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Title as displayed by the catalog
    pub title: Option<String>,
    /// Author as a single free-text string
    pub author: Option<String>,
    /// Average rating on a 0-5 scale
    pub rating: Option<f64>,
    /// Number of ratings behind `rating`
    pub ratings_count: Option<u64>,
    /// Catalog page of the book
    pub url: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
}

impl CatalogRecord {
    /// The query the enrichment step sends to the metadata API for this row.
    ///
    /// ISBN lookups are preferred over title/author searches.
    ///
    /// ```
    /// use bibrecon::CatalogRecord;
    ///
    /// let record = CatalogRecord {
    ///     title: Some("Dune".to_string()),
    ///     author: Some("Frank Herbert".to_string()),
    ///     ..Default::default()
    /// };
    /// assert_eq!(record.search_query(), "intitle:Dune+inauthor:Frank Herbert");
    /// ```
    pub fn search_query(&self) -> String {
        if let Some(isbn13) = isbn::normalize_opt(self.isbn13.as_deref()) {
            return format!("isbn:{isbn13}");
        }
        if let Some(isbn10) = isbn::normalize_opt(self.isbn10.as_deref()) {
            return format!("isbn:{isbn10}");
        }
        format!(
            "intitle:{}+inauthor:{}",
            self.title.as_deref().unwrap_or(""),
            self.author.as_deref().unwrap_or("")
        )
    }
}

/// One row returned by the metadata API for a catalog query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Identifier of the volume in the metadata API
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Ordered list of author names
    pub authors: Option<Vec<String>>,
    pub publisher: Option<String>,
    /// Publication date in whatever shape the API returned it
    pub pub_date: Option<String>,
    pub language: Option<String>,
    pub categories: Option<Vec<String>>,
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,
    pub price_amount: Option<f64>,
    pub price_currency: Option<String>,
    /// Catalog title that was sent as the search query
    pub title_query: Option<String>,
    /// Catalog author that was sent as the search query
    pub author_query: Option<String>,
}

/// Rows of one source plus the column set they were read with.
///
/// `columns` always starts with the source's required columns, followed by any
/// extra columns present in the raw extract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable<R> {
    pub columns: Vec<String>,
    pub records: Vec<R>,
}

impl<R> SourceTable<R> {
    /// Wraps already-typed records with an empty column list.
    pub fn from_records(records: Vec<R>) -> Self {
        Self {
            columns: Vec::new(),
            records,
        }
    }

    /// A table with the given columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trait for parsers that turn one source extract into a [`SourceTable`].
pub trait SourceParser {
    /// Row type produced by the parser.
    type Record;

    /// Parse the full text of a source extract.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidFormat`] if the input is not a valid
    /// extract for this source.
    fn parse(&self, input: &str) -> Result<SourceTable<Self::Record>>;
}

//! Two-phase record linkage between the catalog and the metadata source.
//!
//! The two sources share no key up front. The matcher derives one on each
//! side and links rows in two independent passes:
//!
//! 1. A full outer join on the normalized ISBN-13 (primary key).
//! 2. A full outer join on the `title|authors` join key (fallback key).
//!
//! The primary join result is then reconciled against the fallback result:
//! every attribute the primary join left null is filled from the fallback
//! rows that share its join key, first non-null value wins. Values produced
//! by the primary join are never overwritten.
//!
//! Finally every row receives a `book_id`: the first normalized ISBN found in
//! the order metadata ISBN-13, catalog ISBN-13, metadata ISBN-10, catalog
//! ISBN-10, else a SHA-256 digest of title, authors and publisher.
//!
//! # Example
//!
//! ```
//! use bibrecon::{CatalogRecord, Matcher, MetadataRecord};
//!
//! let catalog = vec![CatalogRecord {
//!     title: Some("Dune".to_string()),
//!     author: Some("Frank Herbert".to_string()),
//!     ..Default::default()
//! }];
//! let metadata = vec![MetadataRecord {
//!     external_id: Some("gb-1".to_string()),
//!     title: Some("Dune".to_string()),
//!     authors: Some(vec!["Frank Herbert".to_string()]),
//!     isbn13: Some("978-0441013593".to_string()),
//!     ..Default::default()
//! }];
//!
//! let details = Matcher::new().match_sources(&catalog, &metadata);
//! assert!(details.iter().all(|d| d.book_id == "9780441013593"));
//! ```

mod detail;
mod join;

pub use detail::{DetailRecord, Provenance};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

use crate::text::{build_join_key, is_blank_join_key};
use crate::{CatalogRecord, MetadataRecord, isbn};
use join::full_outer_join;

/// Source labels and ingestion time stamped onto every detail row.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    pub catalog_source: String,
    pub catalog_file: String,
    pub metadata_source: String,
    pub metadata_file: String,
    /// One ingestion timestamp shared by every row of a run
    pub ingested_at: DateTime<Utc>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            catalog_source: "goodreads".to_string(),
            catalog_file: "goodreads_books.json".to_string(),
            metadata_source: "googlebooks".to_string(),
            metadata_file: "googlebooks_books.csv".to_string(),
            ingested_at: Utc::now(),
        }
    }
}

/// Links catalog rows to metadata rows and produces the detail table.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

/// A catalog row with its derived match keys.
#[derive(Debug)]
struct PreparedCatalog<'a> {
    original: &'a CatalogRecord,
    isbn13: Option<String>,
    isbn10: Option<String>,
    join_key: String,
}

/// A metadata row with its derived match keys.
#[derive(Debug)]
struct PreparedMetadata<'a> {
    original: &'a MetadataRecord,
    isbn13: Option<String>,
    isbn10: Option<String>,
    join_key: String,
}

impl<'a> PreparedCatalog<'a> {
    fn new(original: &'a CatalogRecord) -> Self {
        Self {
            original,
            isbn13: isbn::normalize_opt(original.isbn13.as_deref()),
            isbn10: isbn::normalize_opt(original.isbn10.as_deref()),
            join_key: build_join_key(original.title.as_deref(), original.author.as_deref()),
        }
    }
}

impl<'a> PreparedMetadata<'a> {
    fn new(original: &'a MetadataRecord) -> Self {
        // the echoed search terms are the catalog's own title/author, so they
        // line up with the catalog-side key better than the API's spelling
        let title = non_blank(original.title_query.as_deref()).or(original.title.as_deref());
        let join_key = match non_blank(original.author_query.as_deref()) {
            Some(author) => build_join_key(title, author),
            None => build_join_key(title, original.authors.as_deref()),
        };

        Self {
            original,
            isbn13: isbn::normalize_opt(original.isbn13.as_deref()),
            isbn10: isbn::normalize_opt(original.isbn10.as_deref()),
            join_key,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Matcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Produces one detail row per matched or unmatched pair.
    ///
    /// Every input row appears in at least one output row and every output
    /// row carries a non-empty `book_id`.
    pub fn match_sources(
        &self,
        catalog: &[CatalogRecord],
        metadata: &[MetadataRecord],
    ) -> Vec<DetailRecord> {
        let catalog: Vec<PreparedCatalog> = catalog.iter().map(PreparedCatalog::new).collect();
        let metadata: Vec<PreparedMetadata> = metadata.iter().map(PreparedMetadata::new).collect();

        let primary = full_outer_join(
            &metadata.iter().map(|m| m.isbn13.clone()).collect::<Vec<_>>(),
            &catalog.iter().map(|c| c.isbn13.clone()).collect::<Vec<_>>(),
        );
        let fallback = full_outer_join(
            &metadata.iter().map(|m| usable_key(&m.join_key)).collect::<Vec<_>>(),
            &catalog.iter().map(|c| usable_key(&c.join_key)).collect::<Vec<_>>(),
        );

        let fallback_rows: Vec<DetailRecord> = fallback
            .iter()
            .map(|&(m, c)| self.build_row(m.map(|i| &metadata[i]), c.map(|j| &catalog[j])))
            .collect();

        let mut backups: HashMap<&str, Vec<&DetailRecord>> = HashMap::new();
        for row in &fallback_rows {
            if !is_blank_join_key(&row.join_key) {
                backups.entry(row.join_key.as_str()).or_default().push(row);
            }
        }

        let mut filled = 0usize;
        let details: Vec<DetailRecord> = primary
            .iter()
            .map(|&(m, c)| {
                let mut row = self.build_row(m.map(|i| &metadata[i]), c.map(|j| &catalog[j]));
                if let Some(candidates) = backups.get(row.join_key.as_str()) {
                    let before = row.non_null_count();
                    for backup in candidates {
                        row.fill_missing_from(backup);
                    }
                    if row.non_null_count() > before {
                        filled += 1;
                    }
                }
                row.book_id = compute_book_id(&row);
                row
            })
            .collect();

        info!(
            catalog_rows = catalog.len(),
            metadata_rows = metadata.len(),
            primary_rows = primary.len(),
            fallback_rows = fallback_rows.len(),
            reconciled_rows = filled,
            detail_rows = details.len(),
            "sources matched"
        );

        details
    }

    fn build_row(
        &self,
        metadata: Option<&PreparedMetadata>,
        catalog: Option<&PreparedCatalog>,
    ) -> DetailRecord {
        let mut row = DetailRecord::default();

        if let Some(m) = metadata {
            row.set_metadata(
                m.original,
                m.isbn13.clone(),
                m.isbn10.clone(),
                self.provenance(&self.config.metadata_source, &self.config.metadata_file),
            );
        }
        if let Some(c) = catalog {
            row.set_catalog(
                c.original,
                c.isbn13.clone(),
                c.isbn10.clone(),
                self.provenance(&self.config.catalog_source, &self.config.catalog_file),
            );
        }

        row.join_key = metadata
            .map(|m| m.join_key.clone())
            .or_else(|| catalog.map(|c| c.join_key.clone()))
            .unwrap_or_default();
        row
    }

    fn provenance(&self, source: &str, file: &str) -> Provenance {
        Provenance {
            source: source.to_string(),
            source_file: file.to_string(),
            ingestion_ts: self.config.ingested_at,
        }
    }
}

/// The blank key `|` carries no information and must never link two rows.
fn usable_key(key: &str) -> Option<String> {
    if is_blank_join_key(key) {
        None
    } else {
        Some(key.to_string())
    }
}

/// Derives the identity of a detail row.
///
/// ISBNs strictly dominate: the hash fallback is used only when none of the
/// four ISBN columns is populated.
pub fn compute_book_id(row: &DetailRecord) -> String {
    let isbn = [
        &row.isbn13_metadata,
        &row.isbn13_catalog,
        &row.isbn10_metadata,
        &row.isbn10_catalog,
    ]
    .into_iter()
    .find_map(|value| isbn::normalize_opt(value.as_deref()));

    if let Some(isbn) = isbn {
        return isbn;
    }

    let title = row
        .title_metadata
        .as_deref()
        .or(row.title_catalog.as_deref())
        .unwrap_or("");
    let authors = match row.authors.as_deref() {
        Some(list) if !list.is_empty() => list.join("; "),
        _ => row.author_catalog.clone().unwrap_or_default(),
    };
    let publisher = row.publisher.as_deref().unwrap_or("");

    let digest = Sha256::digest(format!("{title}|{authors}|{publisher}").as_bytes());
    format!("{digest:x}")
}

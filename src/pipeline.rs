//! End-to-end reconciliation run.
//!
//! [`Pipeline::reconcile`] is the pure core: two source tables in, detail
//! table, canonical table and quality report out. [`Pipeline::run`] wraps it
//! with the file boundary: it loads both extracts, applies the
//! [`MissingSourcePolicy`], and writes every output in sequence. A failed
//! write aborts the run and leaves the files written before it in place.

use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::canonical::canonicalize_all;
use crate::csv::CsvConfig;
use crate::loader::{CATALOG_COLUMNS, METADATA_COLUMNS, load_source, load_source_or_empty};
use crate::matcher::MatcherConfig;
use crate::quality::SourceShape;
use crate::survivor::SurvivorConfig;
use crate::{
    CanonicalRecord, CatalogJsonParser, CatalogRecord, DetailRecord, Matcher, MetadataCsvParser,
    MetadataRecord, MissingSourcePolicy, PipelineConfig, QualityReport, Result, SourceParser,
    SourceTable, SurvivorResolver, writer,
};

/// In-memory result of reconciling two source tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub details: Vec<DetailRecord>,
    pub canonical: Vec<CanonicalRecord>,
    pub quality: QualityReport,
}

/// Summary of a completed [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub catalog_rows: usize,
    pub metadata_rows: usize,
    pub detail_rows: usize,
    pub canonical_rows: usize,
    pub quality: QualityReport,
    /// Every file written, in write order
    pub outputs: Vec<PathBuf>,
}

/// A configured reconciliation pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    timestamp: Option<DateTime<Utc>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            timestamp: None,
        }
    }

    /// Pins the ingestion and resolution timestamp, making runs over the same
    /// inputs produce identical outputs.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Matches, resolves, canonicalizes and measures two source tables.
    pub fn reconcile(
        &self,
        catalog: &SourceTable<CatalogRecord>,
        metadata: &SourceTable<MetadataRecord>,
    ) -> Reconciliation {
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);

        let matcher = Matcher::new().with_config(MatcherConfig {
            catalog_source: self.config.catalog_source.clone(),
            catalog_file: self.config.catalog_file_name(),
            metadata_source: self.config.metadata_source.clone(),
            metadata_file: self.config.metadata_file_name(),
            ingested_at: timestamp,
        });
        let details = matcher.match_sources(&catalog.records, &metadata.records);

        let survived = SurvivorResolver::new()
            .with_config(SurvivorConfig {
                resolved_at: Some(timestamp),
            })
            .resolve(&details);
        let canonical = canonicalize_all(&survived);

        let quality = QualityReport::compute(
            &[
                (
                    self.config.catalog_source.as_str(),
                    shape(catalog, CATALOG_COLUMNS.len()),
                ),
                (
                    self.config.metadata_source.as_str(),
                    shape(metadata, METADATA_COLUMNS.len()),
                ),
            ],
            &canonical,
        );

        Reconciliation {
            details,
            canonical,
            quality,
        }
    }

    /// Runs the full pipeline from the configured files.
    ///
    /// # Errors
    ///
    /// Under [`MissingSourcePolicy::Abort`], a missing or malformed source
    /// aborts the run before anything is written. Any failure to create the
    /// output directories or write an output aborts the run at that point.
    pub fn run(&self) -> Result<RunReport> {
        let run_id = nanoid!();
        info!(%run_id, policy = %self.config.on_missing_source, "reconciliation run started");

        let result = self.run_inner(&run_id);
        if let Err(e) = &result {
            error!(%run_id, error = %e, "reconciliation run aborted");
        }
        result
    }

    fn run_inner(&self, run_id: &str) -> Result<RunReport> {
        self.config.validate()?;

        let mut csv_config = CsvConfig::new();
        csv_config.set_delimiter(self.config.csv_delimiter as u8);
        let csv_parser = MetadataCsvParser::new().with_config(csv_config);

        let catalog = self.load(
            &self.config.catalog_source,
            &self.config.catalog_path,
            &CatalogJsonParser::new(),
            &CATALOG_COLUMNS,
        )?;
        let metadata = self.load(
            &self.config.metadata_source,
            &self.config.metadata_path,
            &csv_parser,
            &METADATA_COLUMNS,
        )?;

        let outcome = self.reconcile(&catalog, &metadata);

        fs::create_dir_all(&self.config.output_dir)?;
        fs::create_dir_all(&self.config.docs_dir)?;

        let outputs = &self.config.outputs;
        let mut written = Vec::new();

        let path = self.config.output_dir.join(&outputs.detail_csv);
        write_output(&path, |w| writer::write_detail_csv(w, &outcome.details))?;
        written.push(path);

        let path = self.config.output_dir.join(&outputs.dim_csv);
        write_output(&path, |w| writer::write_canonical_csv(w, &outcome.canonical))?;
        written.push(path);

        let path = self.config.output_dir.join(&outputs.dim_json);
        write_output(&path, |w| writer::write_canonical_json(w, &outcome.canonical))?;
        written.push(path);

        let path = self.config.docs_dir.join(&outputs.metrics_json);
        write_output(&path, |w| writer::write_quality_json(w, &outcome.quality))?;
        written.push(path);

        let path = self.config.docs_dir.join(&outputs.schema_md);
        write_output(&path, writer::write_schema_md)?;
        written.push(path);

        info!(
            run_id,
            detail_rows = outcome.details.len(),
            canonical_rows = outcome.canonical.len(),
            files = written.len(),
            "reconciliation run completed"
        );

        Ok(RunReport {
            run_id: run_id.to_string(),
            catalog_rows: catalog.len(),
            metadata_rows: metadata.len(),
            detail_rows: outcome.details.len(),
            canonical_rows: outcome.canonical.len(),
            quality: outcome.quality,
            outputs: written,
        })
    }

    fn load<P: SourceParser>(
        &self,
        source_name: &str,
        path: &Path,
        parser: &P,
        required_columns: &[&str],
    ) -> Result<SourceTable<P::Record>> {
        match self.config.on_missing_source {
            MissingSourcePolicy::Abort => load_source(source_name, path, parser),
            MissingSourcePolicy::TreatAsEmpty => {
                load_source_or_empty(source_name, path, parser, required_columns)
            }
        }
    }
}

fn shape<R>(table: &SourceTable<R>, required_columns: usize) -> SourceShape {
    SourceShape {
        rows: table.len(),
        columns: if table.columns.is_empty() {
            required_columns
        } else {
            table.columns.len()
        },
    }
}

fn write_output<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut file = BufWriter::new(File::create(path)?);
    write(&mut file)?;
    file.flush()?;
    info!(path = %path.display(), "output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReconcileError, SourceWinner};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn dune_tables() -> (SourceTable<CatalogRecord>, SourceTable<MetadataRecord>) {
        let catalog = SourceTable::from_records(vec![CatalogRecord {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            rating: Some(4.27),
            ..Default::default()
        }]);
        let metadata = SourceTable::from_records(vec![MetadataRecord {
            external_id: Some("gb-1".to_string()),
            title: Some("Dune".to_string()),
            authors: Some(vec!["Frank Herbert".to_string()]),
            isbn13: Some("9780441013593".to_string()),
            title_query: Some("Dune".to_string()),
            author_query: Some("Frank Herbert".to_string()),
            ..Default::default()
        }]);
        (catalog, metadata)
    }

    fn pinned() -> Pipeline {
        Pipeline::new(PipelineConfig::default())
            .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_dune_merges_into_one_book() {
        let (catalog, metadata) = dune_tables();
        let outcome = pinned().reconcile(&catalog, &metadata);

        assert_eq!(outcome.details.len(), 2);
        assert_eq!(outcome.canonical.len(), 1);

        let book = &outcome.canonical[0];
        assert_eq!(book.isbn13.as_deref(), Some("9780441013593"));
        assert_eq!(book.authors, vec!["Frank Herbert"]);
        assert_eq!(book.source_winner, SourceWinner::MetadataApi);
        assert_eq!(book.rating, Some(4.27));
        assert_eq!(outcome.quality.sources["goodreads"].columns, 7);
    }

    #[test]
    fn test_reconcile_is_repeatable() {
        let (catalog, metadata) = dune_tables();
        let pipeline = pinned();
        assert_eq!(
            pipeline.reconcile(&catalog, &metadata),
            pipeline.reconcile(&catalog, &metadata)
        );
    }

    #[test]
    fn test_blank_rows_become_one_hashed_book() {
        let catalog = SourceTable::from_records(vec![CatalogRecord::default()]);
        let metadata = SourceTable::from_records(vec![MetadataRecord::default()]);

        let outcome = pinned().reconcile(&catalog, &metadata);
        assert_eq!(outcome.canonical.len(), 1);
        assert_eq!(outcome.canonical[0].book_id.len(), 64);
        assert_eq!(outcome.canonical[0].title, None);
    }

    #[test]
    fn test_missing_source_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_catalog_path(dir.path().join("absent.json"))
            .with_metadata_path(dir.path().join("absent.csv"))
            .with_output_dir(dir.path().join("standard"))
            .with_docs_dir(dir.path().join("docs"));

        let result = Pipeline::new(config).run();
        assert!(matches!(result, Err(ReconcileError::MissingSource { .. })));
        assert!(!dir.path().join("standard").exists());
    }

    #[test]
    fn test_missing_source_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_catalog_path(dir.path().join("absent.json"))
            .with_metadata_path(dir.path().join("absent.csv"))
            .with_output_dir(dir.path().join("standard"))
            .with_docs_dir(dir.path().join("docs"))
            .with_missing_source_policy(MissingSourcePolicy::TreatAsEmpty);

        let report = Pipeline::new(config).run().unwrap();
        assert_eq!(report.canonical_rows, 0);
        assert_eq!(report.outputs.len(), 5);
        assert!(report.outputs.iter().all(|p| p.exists()));

        let schema = fs::read_to_string(dir.path().join("docs/schema.md")).unwrap();
        assert!(schema.starts_with("# Canonical schema: dim_book"));
    }
}

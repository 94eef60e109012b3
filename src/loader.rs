//! File boundary for source extracts.
//!
//! Reads a landing file from disk and hands its text to a [`SourceParser`].
//! A missing file surfaces as [`ReconcileError::MissingSource`]; a file that
//! cannot be parsed surfaces as [`ReconcileError::MalformedInput`]. Whether
//! either aborts the run is decided by the pipeline's
//! [`MissingSourcePolicy`](crate::MissingSourcePolicy).

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use crate::{ReconcileError, Result, SourceParser, SourceTable};

/// Columns every catalog table carries, in order.
pub const CATALOG_COLUMNS: [&str; 7] = [
    "title",
    "author",
    "rating",
    "ratings_count",
    "book_url",
    "isbn10",
    "isbn13",
];

/// Columns every metadata table carries, in order.
pub const METADATA_COLUMNS: [&str; 14] = [
    "gb_id",
    "title",
    "subtitle",
    "authors",
    "publisher",
    "pub_date",
    "language",
    "categories",
    "isbn13",
    "isbn10",
    "price_amount",
    "price_currency",
    "goodreads_title_query",
    "goodreads_author_query",
];

/// Reads and parses one source extract.
///
/// # Errors
///
/// - [`ReconcileError::MissingSource`] when `path` does not exist
/// - [`ReconcileError::MalformedInput`] when the parser rejects the content
/// - [`ReconcileError::Io`] for any other read failure
pub fn load_source<P: SourceParser>(
    source_name: &str,
    path: &Path,
    parser: &P,
) -> Result<SourceTable<P::Record>> {
    let input = match fs::read_to_string(path) {
        Ok(input) => input,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ReconcileError::MissingSource {
                source_name: source_name.to_string(),
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(ReconcileError::MalformedInput {
                source_name: source_name.to_string(),
                message: format!("{} is not valid UTF-8", path.display()),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let table = parser.parse(&input).map_err(|e| match e {
        ReconcileError::InvalidFormat(message) => ReconcileError::MalformedInput {
            source_name: source_name.to_string(),
            message,
        },
        other => other,
    })?;

    info!(
        source = source_name,
        path = %path.display(),
        rows = table.len(),
        columns = table.columns.len(),
        "loaded source"
    );
    Ok(table)
}

/// Like [`load_source`], but reports a missing or malformed source and
/// substitutes an empty table carrying the required columns.
pub fn load_source_or_empty<P: SourceParser>(
    source_name: &str,
    path: &Path,
    parser: &P,
    required_columns: &[&str],
) -> Result<SourceTable<P::Record>> {
    match load_source(source_name, path, parser) {
        Ok(table) => Ok(table),
        Err(e @ (ReconcileError::MissingSource { .. } | ReconcileError::MalformedInput { .. })) => {
            warn!(source = source_name, error = %e, "source treated as empty");
            Ok(SourceTable::empty(
                required_columns.iter().map(|c| c.to_string()).collect(),
            ))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CatalogJsonParser, MetadataCsvParser};
    use std::io::Write;

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let result = load_source("catalog", &path, &CatalogJsonParser::new());
        assert!(matches!(
            result,
            Err(ReconcileError::MissingSource { ref source_name, .. }) if source_name == "catalog"
        ));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"books\": ").unwrap();

        let result = load_source("catalog", file.path(), &CatalogJsonParser::new());
        assert!(matches!(result, Err(ReconcileError::MalformedInput { .. })));
    }

    #[test]
    fn test_loads_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "title,isbn13\nDune,9780441013593\n").unwrap();

        let table = load_source("metadata", file.path(), &MetadataCsvParser::new()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.columns.len(), METADATA_COLUMNS.len());
    }

    #[test]
    fn test_missing_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");

        let table = load_source_or_empty(
            "metadata",
            &path,
            &MetadataCsvParser::new(),
            &METADATA_COLUMNS,
        )
        .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), METADATA_COLUMNS.len());
    }

    #[test]
    fn test_malformed_file_treated_as_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{{\"title\": ").unwrap();

        let table = load_source_or_empty(
            "catalog",
            file.path(),
            &CatalogJsonParser::new(),
            &CATALOG_COLUMNS,
        )
        .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), CATALOG_COLUMNS.len());
    }
}

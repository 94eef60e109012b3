//! Output writers for the detail table, the canonical table, the quality
//! report and the schema reference.
//!
//! List-valued cells (`authors`, `categories` in the detail table) are written
//! to CSV as JSON arrays, which [`parse_list_text`](crate::text::parse_list_text)
//! reads back.

use std::io::Write;

use crate::canonical::CANONICAL_COLUMNS;
use crate::matcher::Provenance;
use crate::{CanonicalRecord, DetailRecord, QualityReport, ReconcileError, Result};

/// Columns of the detail CSV, in output order.
pub const DETAIL_COLUMNS: [&str; 29] = [
    "book_id",
    "join_key",
    "external_id",
    "title_metadata",
    "subtitle",
    "authors",
    "publisher",
    "pub_date_raw",
    "language_raw",
    "categories",
    "isbn13_metadata",
    "isbn10_metadata",
    "price_amount",
    "currency_raw",
    "title_query",
    "author_query",
    "source_metadata",
    "source_file_metadata",
    "ingestion_ts_metadata",
    "title_catalog",
    "author_catalog",
    "rating",
    "ratings_count",
    "url",
    "isbn10_catalog",
    "isbn13_catalog",
    "source_catalog",
    "source_file_catalog",
    "ingestion_ts_catalog",
];

const SCHEMA_MD: &str = "\
# Canonical schema: dim_book

One row per distinct book. Columns, in order:

- book_id: normalized ISBN-13, else ISBN-10, else a SHA-256 digest of title, authors and publisher. [str]
- isbn13: ISBN-13 without separators, metadata source preferred. [str]
- isbn10: ISBN-10 without separators, metadata source preferred. [str]
- title: longest title seen across both sources. [str]
- subtitle: subtitle. [str]
- authors: deduplicated, sorted author names. [list of str]
- publisher: publisher. [str]
- pub_date_iso: publication date, ISO-8601 (YYYY-MM-DD). [str]
- pub_year: publication year (YYYY). [int]
- language: primary language subtag (en, es, pt, ...). [str]
- categories: deduplicated, sorted categories joined by \", \". [str]
- price_amount: list price, dot as decimal separator. [float]
- price_currency: ISO-4217 code (USD, EUR, ...). [str]
- rating: average catalog rating, 0 to 5. [float]
- ratings_count: number of catalog ratings. [int]
- external_id: volume id in the metadata API. [str]
- url: catalog page of the book. [str]
- source_winner: metadata-api | catalog. [str]
- ts_last_update: resolution timestamp, ISO-8601 UTC. [str]
";

fn serialization_error(err: ::csv::Error) -> ReconcileError {
    ReconcileError::Serialization(err.to_string())
}

fn list_cell(values: &Option<Vec<String>>) -> String {
    values
        .as_ref()
        .and_then(|v| serde_json::to_string(v).ok())
        .unwrap_or_default()
}

fn provenance_cells(provenance: &Option<Provenance>) -> [String; 3] {
    match provenance {
        Some(p) => [
            p.source.clone(),
            p.source_file.clone(),
            p.ingestion_ts.to_rfc3339(),
        ],
        None => Default::default(),
    }
}

fn detail_row(row: &DetailRecord) -> Vec<String> {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    let [source_m, file_m, ts_m] = provenance_cells(&row.provenance_metadata);
    let [source_c, file_c, ts_c] = provenance_cells(&row.provenance_catalog);

    vec![
        row.book_id.clone(),
        row.join_key.clone(),
        opt(&row.external_id),
        opt(&row.title_metadata),
        opt(&row.subtitle),
        list_cell(&row.authors),
        opt(&row.publisher),
        opt(&row.pub_date_raw),
        opt(&row.language_raw),
        list_cell(&row.categories),
        opt(&row.isbn13_metadata),
        opt(&row.isbn10_metadata),
        row.price_amount.map(|p| p.to_string()).unwrap_or_default(),
        opt(&row.currency_raw),
        opt(&row.title_query),
        opt(&row.author_query),
        source_m,
        file_m,
        ts_m,
        opt(&row.title_catalog),
        opt(&row.author_catalog),
        row.rating.map(|r| r.to_string()).unwrap_or_default(),
        row.ratings_count.map(|c| c.to_string()).unwrap_or_default(),
        opt(&row.url),
        opt(&row.isbn10_catalog),
        opt(&row.isbn13_catalog),
        source_c,
        file_c,
        ts_c,
    ]
}

/// Writes the detail table as CSV with a header row.
pub fn write_detail_csv<W: Write>(writer: W, rows: &[DetailRecord]) -> Result<()> {
    let mut csv = ::csv::Writer::from_writer(writer);
    csv.write_record(DETAIL_COLUMNS).map_err(serialization_error)?;
    for row in rows {
        csv.write_record(detail_row(row)).map_err(serialization_error)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the canonical table as CSV with a header row.
pub fn write_canonical_csv<W: Write>(writer: W, rows: &[CanonicalRecord]) -> Result<()> {
    let mut csv = ::csv::Writer::from_writer(writer);
    csv.write_record(CANONICAL_COLUMNS).map_err(serialization_error)?;
    for row in rows {
        csv.write_record(row.to_row()).map_err(serialization_error)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the canonical table as a pretty-printed JSON array.
pub fn write_canonical_json<W: Write>(writer: W, rows: &[CanonicalRecord]) -> Result<()> {
    serde_json::to_writer_pretty(writer, rows)
        .map_err(|e| ReconcileError::Serialization(e.to_string()))
}

pub fn write_quality_json<W: Write>(writer: W, report: &QualityReport) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)
        .map_err(|e| ReconcileError::Serialization(e.to_string()))
}

/// Writes the static description of the canonical columns.
pub fn write_schema_md<W: Write + ?Sized>(writer: &mut W) -> Result<()> {
    writer.write_all(SCHEMA_MD.as_bytes())?;
    Ok(())
}

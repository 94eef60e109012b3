//! Canonical (`dim_book`) model.
//!
//! Normalizes dates, languages and currencies of survived records and
//! projects them onto the fixed canonical column list. Every normalizer is
//! total: a value that cannot be normalized becomes `None` and the row is
//! kept.
//!
//! # Example
//!
//! ```
//! use bibrecon::canonical::{normalize_currency, normalize_date, normalize_language};
//!
//! assert_eq!(normalize_date("1965").as_deref(), Some("1965-01-01"));
//! assert_eq!(normalize_date("March 3, 2001").as_deref(), Some("2001-03-03"));
//! assert_eq!(normalize_language("en-US").as_deref(), Some("en"));
//! assert_eq!(normalize_currency("usd").as_deref(), Some("USD"));
//! assert_eq!(normalize_currency("US$"), None);
//! ```

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::regex::Regex;
use crate::survivor::{SourceWinner, SurvivedRecord};
use crate::text::clean_string;

/// Canonical columns, in output order.
pub const CANONICAL_COLUMNS: [&str; 19] = [
    "book_id",
    "isbn13",
    "isbn10",
    "title",
    "subtitle",
    "authors",
    "publisher",
    "pub_date_iso",
    "pub_year",
    "language",
    "categories",
    "price_amount",
    "price_currency",
    "rating",
    "ratings_count",
    "external_id",
    "url",
    "source_winner",
    "ts_last_update",
];

pub(crate) static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static YEAR_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());
pub(crate) static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

const DATE_FORMATS: [&str; 9] = [
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%Y.%m.%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y%m%d",
];

/// Month-and-year layouts, parsed by pinning the day to the first.
const MONTH_YEAR_FORMATS: [&str; 2] = ["%d %B %Y", "%d %b %Y"];

/// Normalizes a publication date to `YYYY-MM-DD`.
///
/// Already-ISO strings pass through unchanged, `YYYY-MM` and `YYYY` are
/// padded to the first day, and anything else goes through a set of common
/// layouts.
pub fn normalize_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if ISO_DATE_RE.is_match(s) {
        return Some(s.to_string());
    }
    if YEAR_MONTH_RE.is_match(s) {
        return Some(format!("{s}-01"));
    }
    if YEAR_RE.is_match(s) {
        return Some(format!("{s}-01-01"));
    }

    parse_date(s).map(|date| date.format("%Y-%m-%d").to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Some(datetime.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|datetime| datetime.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        })
        .or_else(|| {
            let pinned = format!("1 {s}");
            MONTH_YEAR_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(&pinned, format).ok())
        })
}

/// Year of an ISO date, `None` unless it is a real calendar date.
pub fn pub_year(iso_date: &str) -> Option<i32> {
    NaiveDate::parse_from_str(iso_date, "%Y-%m-%d")
        .ok()
        .map(|date| date.year())
}

/// Keeps the lowercased primary subtag of a language tag (`pt-BR` -> `pt`).
pub fn normalize_language(raw: &str) -> Option<String> {
    let primary = raw.trim().split('-').next()?.trim().to_lowercase();
    if primary.is_empty() { None } else { Some(primary) }
}

/// Uppercases a currency code and keeps it only if it is three letters.
pub fn normalize_currency(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    CURRENCY_RE.is_match(&code).then_some(code)
}

/// One row of the canonical `dim_book` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub book_id: String,
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub pub_date_iso: Option<String>,
    pub pub_year: Option<i32>,
    pub language: Option<String>,
    /// Categories joined with `", "`
    pub categories: Option<String>,
    pub price_amount: Option<f64>,
    pub price_currency: Option<String>,
    pub rating: Option<f64>,
    pub ratings_count: Option<u64>,
    pub external_id: Option<String>,
    pub url: Option<String>,
    pub source_winner: SourceWinner,
    pub ts_last_update: DateTime<Utc>,
}

impl CanonicalRecord {
    /// Whether the named canonical column is null for this row.
    ///
    /// An empty author list counts as null. Unknown column names are reported
    /// as null.
    pub fn column_is_null(&self, column: &str) -> bool {
        match column {
            "book_id" => self.book_id.is_empty(),
            "isbn13" => self.isbn13.is_none(),
            "isbn10" => self.isbn10.is_none(),
            "title" => self.title.is_none(),
            "subtitle" => self.subtitle.is_none(),
            "authors" => self.authors.is_empty(),
            "publisher" => self.publisher.is_none(),
            "pub_date_iso" => self.pub_date_iso.is_none(),
            "pub_year" => self.pub_year.is_none(),
            "language" => self.language.is_none(),
            "categories" => self.categories.is_none(),
            "price_amount" => self.price_amount.is_none(),
            "price_currency" => self.price_currency.is_none(),
            "rating" => self.rating.is_none(),
            "ratings_count" => self.ratings_count.is_none(),
            "external_id" => self.external_id.is_none(),
            "url" => self.url.is_none(),
            "source_winner" | "ts_last_update" => false,
            _ => true,
        }
    }

    /// Cell values in [`CANONICAL_COLUMNS`] order, nulls as empty strings.
    ///
    /// `authors` is written as a JSON array so it can be read back losslessly.
    pub fn to_row(&self) -> Vec<String> {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        let num = |value: Option<String>| value.unwrap_or_default();

        vec![
            self.book_id.clone(),
            opt(&self.isbn13),
            opt(&self.isbn10),
            opt(&self.title),
            opt(&self.subtitle),
            serde_json::to_string(&self.authors).unwrap_or_default(),
            opt(&self.publisher),
            opt(&self.pub_date_iso),
            num(self.pub_year.map(|y| y.to_string())),
            opt(&self.language),
            opt(&self.categories),
            num(self.price_amount.map(|p| p.to_string())),
            opt(&self.price_currency),
            num(self.rating.map(|r| r.to_string())),
            num(self.ratings_count.map(|c| c.to_string())),
            opt(&self.external_id),
            opt(&self.url),
            self.source_winner.to_string(),
            self.ts_last_update.to_rfc3339(),
        ]
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Normalizes one survived record into its canonical form.
pub fn canonicalize(record: &SurvivedRecord) -> CanonicalRecord {
    let pub_date_iso = record.pub_date_raw.as_deref().and_then(normalize_date);
    if pub_date_iso.is_none() && record.pub_date_raw.is_some() {
        debug!(book_id = %record.book_id, value = ?record.pub_date_raw, "unparsable date coerced to null");
    }

    let language = record.language_raw.as_deref().and_then(normalize_language);

    let price_currency = record.currency_raw.as_deref().and_then(normalize_currency);
    if price_currency.is_none() && record.currency_raw.is_some() {
        debug!(book_id = %record.book_id, value = ?record.currency_raw, "invalid currency coerced to null");
    }

    CanonicalRecord {
        book_id: record.book_id.clone(),
        isbn13: record.isbn13.clone(),
        isbn10: record.isbn10.clone(),
        title: record.title.as_deref().map(clean_string).and_then(non_empty),
        subtitle: record.subtitle.clone(),
        authors: record.authors.clone(),
        publisher: record.publisher.as_deref().map(clean_string).and_then(non_empty),
        pub_year: pub_date_iso.as_deref().and_then(pub_year),
        pub_date_iso,
        language,
        categories: if record.categories.is_empty() {
            None
        } else {
            Some(record.categories.join(", "))
        },
        price_amount: record.price_amount,
        price_currency,
        rating: record.rating,
        ratings_count: record.ratings_count,
        external_id: record.external_id.clone(),
        url: record.url.clone(),
        source_winner: record.source_winner,
        ts_last_update: record.ts_last_update,
    }
}

pub fn canonicalize_all(records: &[SurvivedRecord]) -> Vec<CanonicalRecord> {
    records.iter().map(canonicalize).collect()
}

//! Quality metrics for a reconciliation run.
//!
//! [`QualityReport::compute`] is a pure function of the source shapes and
//! the canonical table; persisting the report is left to the caller.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use crate::CanonicalRecord;
use crate::canonical::{CANONICAL_COLUMNS, CURRENCY_RE, ISO_DATE_RE};
use crate::regex::Regex;

static LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]{2,3}$").unwrap());

/// Completeness is reported for these canonical columns, under these names.
const TRACKED_COLUMNS: [(&str, &str); 4] = [
    ("title", "title"),
    ("isbn13", "isbn13"),
    ("price", "price_amount"),
    ("pub_date", "pub_date_iso"),
];

/// Row and column counts of one loaded source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceShape {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub canonical_rows: usize,
    pub canonical_columns: usize,
}

/// Null statistics of one tracked column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub null_count: usize,
    /// Percentage of null rows, rounded to two decimals
    pub null_pct: f64,
    /// Fraction of non-null rows in `[0, 1]`
    pub non_null_rate: f64,
}

/// Rows whose value matches the expected format of its column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatValidity {
    pub valid_iso_dates: usize,
    pub valid_currencies: usize,
    pub valid_languages: usize,
}

/// Metrics describing one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Keyed by source label
    pub sources: BTreeMap<String, SourceShape>,
    pub integration: IntegrationStats,
    pub completeness: BTreeMap<String, Completeness>,
    /// Null count of every canonical column
    pub nulls_per_column: BTreeMap<String, usize>,
    /// Non-null isbn13 values that repeat an earlier row's
    pub duplicate_isbn13: usize,
    pub format_validity: FormatValidity,
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

fn count_matching(
    canonical: &[CanonicalRecord],
    re: &Regex,
    value: fn(&CanonicalRecord) -> Option<&str>,
) -> usize {
    canonical
        .iter()
        .filter_map(value)
        .filter(|v| re.is_match(v))
        .count()
}

impl QualityReport {
    /// Computes the report.
    ///
    /// `sources` pairs each source label with the shape it was loaded with.
    pub fn compute(sources: &[(&str, SourceShape)], canonical: &[CanonicalRecord]) -> Self {
        let total = canonical.len();

        let null_count =
            |column: &str| canonical.iter().filter(|r| r.column_is_null(column)).count();

        let completeness = TRACKED_COLUMNS
            .iter()
            .map(|(name, column)| {
                let nulls = null_count(*column);
                let non_null_rate = if total == 0 {
                    0.0
                } else {
                    (total - nulls) as f64 / total as f64
                };
                (
                    name.to_string(),
                    Completeness {
                        null_count: nulls,
                        null_pct: pct(nulls, total),
                        non_null_rate,
                    },
                )
            })
            .collect();

        let nulls_per_column = CANONICAL_COLUMNS
            .iter()
            .map(|column| (column.to_string(), null_count(*column)))
            .collect();

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for isbn13 in canonical.iter().filter_map(|r| r.isbn13.as_deref()) {
            *seen.entry(isbn13).or_default() += 1;
        }
        let duplicate_isbn13 = seen.values().map(|n| n - 1).sum();

        let format_validity = FormatValidity {
            valid_iso_dates: count_matching(canonical, &ISO_DATE_RE, |r| r.pub_date_iso.as_deref()),
            valid_currencies: count_matching(canonical, &CURRENCY_RE, |r| {
                r.price_currency.as_deref()
            }),
            valid_languages: count_matching(canonical, &LANGUAGE_RE, |r| r.language.as_deref()),
        };

        Self {
            sources: sources
                .iter()
                .map(|(name, shape)| (name.to_string(), *shape))
                .collect(),
            integration: IntegrationStats {
                canonical_rows: total,
                canonical_columns: CANONICAL_COLUMNS.len(),
            },
            completeness,
            nulls_per_column,
            duplicate_isbn13,
            format_validity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceWinner;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(isbn13: Option<&str>, language: Option<&str>) -> CanonicalRecord {
        CanonicalRecord {
            book_id: isbn13.unwrap_or("hash").to_string(),
            isbn13: isbn13.map(str::to_string),
            isbn10: None,
            title: Some("Title".to_string()),
            subtitle: None,
            authors: Vec::new(),
            publisher: None,
            pub_date_iso: Some("2001-02-03".to_string()),
            pub_year: Some(2001),
            language: language.map(str::to_string),
            categories: None,
            price_amount: None,
            price_currency: Some("USD".to_string()),
            rating: None,
            ratings_count: None,
            external_id: None,
            url: None,
            source_winner: SourceWinner::Catalog,
            ts_last_update: Utc::now(),
        }
    }

    #[test]
    fn test_compute_report() {
        let canonical = vec![
            record(Some("9780441013593"), Some("en")),
            record(Some("9780441013593"), Some("english")),
            record(None, None),
        ];
        let sources = [
            ("goodreads", SourceShape { rows: 2, columns: 7 }),
            ("googlebooks", SourceShape { rows: 3, columns: 14 }),
        ];

        let report = QualityReport::compute(&sources, &canonical);

        assert_eq!(report.sources["googlebooks"].rows, 3);
        assert_eq!(report.integration.canonical_rows, 3);
        assert_eq!(report.integration.canonical_columns, 19);
        assert_eq!(report.completeness["isbn13"].null_count, 1);
        assert_eq!(report.completeness["isbn13"].null_pct, 33.33);
        assert_eq!(report.completeness["price"].null_pct, 100.0);
        assert_eq!(report.completeness["title"].non_null_rate, 1.0);
        assert_eq!(report.nulls_per_column["authors"], 3);
        assert_eq!(report.duplicate_isbn13, 1);
        assert_eq!(
            report.format_validity,
            FormatValidity {
                valid_iso_dates: 3,
                valid_currencies: 3,
                valid_languages: 1,
            }
        );
    }

    #[test]
    fn test_empty_canonical_table() {
        let report = QualityReport::compute(&[], &[]);
        assert_eq!(report.integration.canonical_rows, 0);
        assert_eq!(report.completeness["title"].null_pct, 0.0);
        assert_eq!(report.completeness["title"].non_null_rate, 0.0);
        assert_eq!(report.duplicate_isbn13, 0);
    }
}

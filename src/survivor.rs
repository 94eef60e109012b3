//! Survivorship: collapsing each `book_id` group into one golden record.
//!
//! ## Usage
//!
//! ```rust
//! use bibrecon::{DetailRecord, SourceWinner, SurvivorResolver};
//!
//! let details = vec![
//!     DetailRecord {
//!         book_id: "9780441013593".to_string(),
//!         title_catalog: Some("Dune".to_string()),
//!         author_catalog: Some("Frank Herbert".to_string()),
//!         ..Default::default()
//!     },
//!     DetailRecord {
//!         book_id: "9780441013593".to_string(),
//!         external_id: Some("gb-1".to_string()),
//!         title_metadata: Some("Dune (Deluxe Edition)".to_string()),
//!         authors: Some(vec!["frank  herbert".to_string()]),
//!         isbn13_metadata: Some("9780441013593".to_string()),
//!         ..Default::default()
//!     },
//! ];
//!
//! let survived = SurvivorResolver::new().resolve(&details);
//! assert_eq!(survived.len(), 1);
//! assert_eq!(survived[0].title.as_deref(), Some("Dune (Deluxe Edition)"));
//! assert_eq!(survived[0].authors, vec!["Frank Herbert"]);
//! assert_eq!(survived[0].source_winner, SourceWinner::MetadataApi);
//! ```
//!
//! ## Rules
//!
//! Rows of a group are ranked first: rows carrying any ISBN come first, then
//! rows with more populated columns. Remaining ties are broken by comparing
//! the rows' field values, so the ranking never depends on detail-table
//! order. Then, per field:
//!
//! - `title`: the longest title by character count, from either source. Among
//!   titles of equal length the lexicographically smallest wins.
//! - `authors`: union of metadata author lists and catalog author strings,
//!   deduplicated ignoring case and whitespace, sorted ascending.
//! - `categories`: the same, from metadata category lists only.
//! - Everything else comes from the top-ranked row. ISBNs prefer the
//!   metadata value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::info;

use crate::DetailRecord;
use crate::text::{clean_string, dedup_key};

/// Which source the winning row of a group came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceWinner {
    #[serde(rename = "metadata-api")]
    MetadataApi,
    #[serde(rename = "catalog")]
    Catalog,
}

impl SourceWinner {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceWinner::MetadataApi => "metadata-api",
            SourceWinner::Catalog => "catalog",
        }
    }
}

impl fmt::Display for SourceWinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The golden record of one `book_id` group, before canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivedRecord {
    pub book_id: String,
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Deduplicated and sorted
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub pub_date_raw: Option<String>,
    pub language_raw: Option<String>,
    /// Deduplicated and sorted
    pub categories: Vec<String>,
    pub price_amount: Option<f64>,
    pub currency_raw: Option<String>,
    pub rating: Option<f64>,
    pub ratings_count: Option<u64>,
    pub external_id: Option<String>,
    pub url: Option<String>,
    pub source_winner: SourceWinner,
    pub ts_last_update: DateTime<Utc>,
}

/// Configuration for [`SurvivorResolver`].
#[derive(Debug, Default, Clone)]
pub struct SurvivorConfig {
    /// Timestamp written to `ts_last_update`. When unset, the clock is read
    /// once per [`SurvivorResolver::resolve`] call.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Applies the survivorship rules to a detail table.
#[derive(Debug, Default, Clone)]
pub struct SurvivorResolver {
    config: SurvivorConfig,
}

impl SurvivorResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: SurvivorConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns one survived record per distinct `book_id`, in order of the
    /// first row of each group.
    pub fn resolve(&self, details: &[DetailRecord]) -> Vec<SurvivedRecord> {
        let resolved_at = self.config.resolved_at.unwrap_or_else(Utc::now);

        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<&DetailRecord>> = Vec::new();
        for row in details {
            let position = *positions.entry(row.book_id.as_str()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[position].push(row);
        }

        let survived: Vec<SurvivedRecord> = groups
            .into_iter()
            .filter_map(|group| resolve_group(group, resolved_at))
            .collect();

        info!(
            detail_rows = details.len(),
            books = survived.len(),
            "survivorship resolved"
        );
        survived
    }
}

fn resolve_group(mut rows: Vec<&DetailRecord>, resolved_at: DateTime<Utc>) -> Option<SurvivedRecord> {
    rows.sort_by(|a, b| {
        (Reverse(a.has_isbn()), Reverse(a.non_null_count()))
            .cmp(&(Reverse(b.has_isbn()), Reverse(b.non_null_count())))
            .then_with(|| compare_content(a, b))
    });
    let top = *rows.first()?;

    let titles = rows
        .iter()
        .filter_map(|row| row.title_metadata.as_deref())
        .chain(rows.iter().filter_map(|row| row.title_catalog.as_deref()));

    let authors = rows.iter().flat_map(|row| {
        row.authors
            .iter()
            .flatten()
            .map(String::as_str)
            .chain(row.author_catalog.as_deref())
    });

    let categories = rows
        .iter()
        .flat_map(|row| row.categories.iter().flatten().map(String::as_str));

    Some(SurvivedRecord {
        book_id: top.book_id.clone(),
        isbn13: top.isbn13_metadata.clone().or_else(|| top.isbn13_catalog.clone()),
        isbn10: top.isbn10_metadata.clone().or_else(|| top.isbn10_catalog.clone()),
        title: longest(titles).map(str::to_string),
        subtitle: top.subtitle.clone(),
        authors: union_sorted(authors),
        publisher: top.publisher.clone(),
        pub_date_raw: top.pub_date_raw.clone(),
        language_raw: top.language_raw.clone(),
        categories: union_sorted(categories),
        price_amount: top.price_amount,
        currency_raw: top.currency_raw.clone(),
        rating: top.rating,
        ratings_count: top.ratings_count,
        external_id: top.external_id.clone(),
        url: top.url.clone(),
        source_winner: if top.external_id.is_some() {
            SourceWinner::MetadataApi
        } else {
            SourceWinner::Catalog
        },
        ts_last_update: resolved_at,
    })
}

fn content_key(row: &DetailRecord) -> [Option<&str>; 14] {
    [
        row.external_id.as_deref(),
        row.isbn13_metadata.as_deref(),
        row.isbn13_catalog.as_deref(),
        row.isbn10_metadata.as_deref(),
        row.isbn10_catalog.as_deref(),
        row.title_metadata.as_deref(),
        row.title_catalog.as_deref(),
        row.subtitle.as_deref(),
        row.publisher.as_deref(),
        row.pub_date_raw.as_deref(),
        row.language_raw.as_deref(),
        row.currency_raw.as_deref(),
        row.url.as_deref(),
        row.author_catalog.as_deref(),
    ]
}

/// Total order over every field a survived record takes from its top row.
fn compare_content(a: &DetailRecord, b: &DetailRecord) -> Ordering {
    content_key(a)
        .cmp(&content_key(b))
        .then_with(|| compare_float(a.price_amount, b.price_amount))
        .then_with(|| compare_float(a.rating, b.rating))
        .then_with(|| a.ratings_count.cmp(&b.ratings_count))
        .then_with(|| a.authors.cmp(&b.authors))
        .then_with(|| a.categories.cmp(&b.categories))
}

fn compare_float(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        _ => a.is_some().cmp(&b.is_some()),
    }
}

/// Longest string by character count; the lexicographically smallest among
/// equally long ones.
fn longest<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    values.min_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    })
}

/// Cleans, deduplicates and sorts names.
///
/// Variants that differ only in case or whitespace collapse into the
/// lexicographically smallest one, so the result does not depend on row order.
fn union_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut unique: BTreeMap<String, String> = BTreeMap::new();
    for value in values {
        let cleaned = clean_string(value);
        if cleaned.is_empty() {
            continue;
        }
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        unique
            .entry(dedup_key(&cleaned))
            .and_modify(|kept| {
                if cleaned < *kept {
                    kept.clone_from(&cleaned);
                }
            })
            .or_insert(cleaned);
    }

    let mut result: Vec<String> = unique.into_values().collect();
    result.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn fixed_resolver() -> SurvivorResolver {
        SurvivorResolver::new().with_config(SurvivorConfig {
            resolved_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        })
    }

    fn row(book_id: &str) -> DetailRecord {
        DetailRecord {
            book_id: book_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_one_record_per_book_id_in_first_seen_order() {
        let details = vec![row("b"), row("a"), row("b")];
        let survived = fixed_resolver().resolve(&details);
        let ids: Vec<&str> = survived.iter().map(|s| s.book_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let details = vec![
            DetailRecord {
                title_catalog: Some("Emma".to_string()),
                author_catalog: Some("Jane Austen".to_string()),
                ..row("x")
            },
            DetailRecord {
                external_id: Some("gb-9".to_string()),
                authors: Some(vec!["JANE AUSTEN".to_string()]),
                categories: Some(vec!["Fiction".to_string()]),
                ..row("x")
            },
        ];

        let resolver = fixed_resolver();
        assert_eq!(resolver.resolve(&details), resolver.resolve(&details));
    }

    #[test]
    fn test_authors_deduplicated_and_sorted() {
        let details = vec![
            DetailRecord {
                authors: Some(vec![
                    "Terry Pratchett".to_string(),
                    "neil  gaiman".to_string(),
                ]),
                author_catalog: Some("'Neil Gaiman'".to_string()),
                ..row("good-omens")
            },
            DetailRecord {
                author_catalog: Some("terry pratchett".to_string()),
                ..row("good-omens")
            },
        ];

        let survived = fixed_resolver().resolve(&details);
        assert_eq!(survived[0].authors, vec!["Neil Gaiman", "Terry Pratchett"]);
    }

    #[test]
    fn test_equal_length_titles_pick_smallest() {
        let details = vec![
            DetailRecord {
                title_catalog: Some("Wxyz".to_string()),
                isbn10_catalog: Some("0441013597".to_string()),
                ..row("t")
            },
            DetailRecord {
                title_metadata: Some("Abcd".to_string()),
                ..row("t")
            },
        ];

        let survived = fixed_resolver().resolve(&details);
        assert_eq!(survived[0].title.as_deref(), Some("Abcd"));
        assert_eq!(survived[0].isbn10.as_deref(), Some("0441013597"));
    }

    #[test]
    fn test_tied_rows_resolve_independently_of_order() {
        let dune = DetailRecord {
            isbn13_metadata: Some("9780441013593".to_string()),
            title_metadata: Some("Dune".to_string()),
            publisher: Some("Ace".to_string()),
            ..row("9780441013593")
        };
        let emma = DetailRecord {
            isbn13_metadata: Some("9780441013593".to_string()),
            title_metadata: Some("Emma".to_string()),
            publisher: Some("Chilton".to_string()),
            ..row("9780441013593")
        };

        let resolver = fixed_resolver();
        let forward = resolver.resolve(&[dune.clone(), emma.clone()]);
        let backward = resolver.resolve(&[emma, dune]);

        assert_eq!(forward, backward);
        assert_eq!(forward[0].title.as_deref(), Some("Dune"));
        assert_eq!(forward[0].publisher.as_deref(), Some("Ace"));
    }

    #[test]
    fn test_top_row_supplies_scalars() {
        let details = vec![
            DetailRecord {
                publisher: Some("Sparse".to_string()),
                ..row("p")
            },
            DetailRecord {
                publisher: Some("Complete".to_string()),
                isbn13_catalog: Some("9780134685991".to_string()),
                isbn13_metadata: Some("9780134685992".to_string()),
                rating: Some(4.5),
                ..row("p")
            },
        ];

        let survived = fixed_resolver().resolve(&details);
        assert_eq!(survived[0].publisher.as_deref(), Some("Complete"));
        assert_eq!(survived[0].isbn13.as_deref(), Some("9780134685992"));
        assert_eq!(survived[0].rating, Some(4.5));
        assert_eq!(survived[0].source_winner, SourceWinner::Catalog);
    }

    #[test]
    fn test_blank_group_survives_with_null_title() {
        let survived = fixed_resolver().resolve(&[row("deadbeef")]);
        assert_eq!(survived.len(), 1);
        assert_eq!(survived[0].title, None);
        assert!(survived[0].authors.is_empty());
    }

    #[rstest]
    #[case(&["ab", "abc", "xyz"], Some("abc"))]
    #[case(&["xyz", "ab", "abc"], Some("abc"))]
    #[case(&["été", "abcd"], Some("abcd"))]
    #[case(&["naïve", "abcde"], Some("naïve"))]
    #[case(&[], None)]
    fn test_longest(#[case] values: &[&str], #[case] expected: Option<&str>) {
        assert_eq!(longest(values.iter().copied()), expected);
    }

    #[test]
    fn test_source_winner_display() {
        assert_eq!(SourceWinner::MetadataApi.to_string(), "metadata-api");
        assert_eq!(
            serde_json::to_string(&SourceWinner::Catalog).unwrap(),
            "\"catalog\""
        );
    }
}

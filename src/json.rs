//! Catalog extract parser (JSON).
//!
//! The scraper writes either a bare array of book objects or an object whose
//! `books` key holds that array. Both shapes are accepted.
//!
//! # Example
//!
//! ```
//! use bibrecon::{CatalogJsonParser, SourceParser};
//!
//! let input = r#"[{"title": "Dune", "author": "Frank Herbert", "ratings_count": "1,234"}]"#;
//!
//! let table = CatalogJsonParser::new().parse(input).unwrap();
//! assert_eq!(table.records[0].title.as_deref(), Some("Dune"));
//! assert_eq!(table.records[0].ratings_count, Some(1234));
//! ```

use serde_json::{Map, Value};
use tracing::debug;

use crate::loader::CATALOG_COLUMNS;
use crate::{CatalogRecord, ReconcileError, Result, SourceParser, SourceTable};

/// Key aliases, keyed by required catalog column.
const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("title", &["title"]),
    ("author", &["author", "author_name"]),
    ("rating", &["rating", "avg_rating"]),
    ("ratings_count", &["ratings_count", "num_ratings"]),
    ("book_url", &["book_url", "url"]),
    ("isbn10", &["isbn10", "isbn_10"]),
    ("isbn13", &["isbn13", "isbn_13"]),
];

/// Parser for the scraped catalog JSON extract.
#[derive(Debug, Clone, Default)]
pub struct CatalogJsonParser;

impl CatalogJsonParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for CatalogJsonParser {
    type Record = CatalogRecord;

    fn parse(&self, input: &str) -> Result<SourceTable<CatalogRecord>> {
        let payload: Value = serde_json::from_str(input)?;

        let books = match payload {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("books") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(ReconcileError::InvalidFormat(
                        "expected a `books` array in the catalog object".to_string(),
                    ));
                }
            },
            _ => {
                return Err(ReconcileError::InvalidFormat(
                    "expected a JSON array or an object with a `books` array".to_string(),
                ));
            }
        };

        let mut columns: Vec<String> = CATALOG_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut records = Vec::with_capacity(books.len());

        for (index, book) in books.into_iter().enumerate() {
            let Value::Object(object) = book else {
                return Err(ReconcileError::InvalidFormat(format!(
                    "catalog entry {index} is not an object"
                )));
            };
            let object = trim_keys(object);

            for key in object.keys() {
                if column_for_key(key).is_none() && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }

            records.push(parse_book(&object, index));
        }

        Ok(SourceTable { columns, records })
    }
}

fn trim_keys(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(k, v)| (k.trim().to_string(), v))
        .collect()
}

fn column_for_key(key: &str) -> Option<&'static str> {
    let key = key.to_lowercase();
    KEY_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&key.as_str()))
        .map(|(column, _)| *column)
}

/// First value stored under any alias of `column`.
fn lookup<'a>(object: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    object
        .iter()
        .filter(|(k, _)| column_for_key(k) == Some(column))
        .map(|(_, v)| v)
        .find(|v| !v.is_null())
}

fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

fn parse_book(object: &Map<String, Value>, index: usize) -> CatalogRecord {
    let text = |column: &str| lookup(object, column).and_then(value_to_text);

    let rating = lookup(object, "rating").and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        other => value_to_text(other).and_then(|s| s.parse::<f64>().ok()),
    });
    if rating.is_none() && lookup(object, "rating").is_some() {
        debug!(entry = index, "unparsable rating coerced to null");
    }

    let ratings_count = lookup(object, "ratings_count").and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        other => value_to_text(other).and_then(|s| parse_count(&s)),
    });
    if ratings_count.is_none() && lookup(object, "ratings_count").is_some() {
        debug!(entry = index, "unparsable ratings count coerced to null");
    }

    CatalogRecord {
        title: text("title"),
        author: text("author"),
        rating,
        ratings_count,
        url: text("book_url"),
        isbn10: text("isbn10"),
        isbn13: text("isbn13"),
    }
}

/// Reads counts such as `1,234,567` or `12 345`.
fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | '.') && !c.is_whitespace())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_bare_array() {
        let input = r#"[
            {"title": "Dune", "author": "Frank Herbert", "rating": 4.27, "ratings_count": 1500000,
             "book_url": "https://example.org/dune", "isbn10": null, "isbn13": null}
        ]"#;

        let table = CatalogJsonParser::new().parse(input).unwrap();
        assert_eq!(table.columns.len(), CATALOG_COLUMNS.len());
        assert_eq!(
            table.records[0],
            CatalogRecord {
                title: Some("Dune".to_string()),
                author: Some("Frank Herbert".to_string()),
                rating: Some(4.27),
                ratings_count: Some(1_500_000),
                url: Some("https://example.org/dune".to_string()),
                isbn10: None,
                isbn13: None,
            }
        );
    }

    #[test]
    fn test_books_object_and_numeric_isbn() {
        let input = r#"{"metadata": {"pages": 2}, "books": [{" title ": "Emma", "isbn13": 9780141439587}]}"#;

        let table = CatalogJsonParser::new().parse(input).unwrap();
        assert_eq!(table.records[0].title.as_deref(), Some("Emma"));
        assert_eq!(table.records[0].isbn13.as_deref(), Some("9780141439587"));
        assert_eq!(table.records[0].author, None);
    }

    #[test]
    fn test_extra_keys_become_columns() {
        let input = r#"[{"title": "A", "shelf": "read"}, {"title": "B", "shelf": "to-read"}]"#;
        let table = CatalogJsonParser::new().parse(input).unwrap();
        assert_eq!(table.columns.len(), CATALOG_COLUMNS.len() + 1);
        assert_eq!(table.len(), 2);
    }

    #[rstest]
    #[case("{\"books\": 3}")]
    #[case("42")]
    #[case("[1, 2]")]
    #[case("{not json")]
    fn test_malformed_payloads(#[case] input: &str) {
        let result = CatalogJsonParser::new().parse(input);
        assert!(matches!(result, Err(ReconcileError::InvalidFormat(_))));
    }

    #[test]
    fn test_bad_numbers_are_null() {
        let input = r#"[{"title": "A", "rating": "great", "ratings_count": "many"}]"#;
        let table = CatalogJsonParser::new().parse(input).unwrap();
        assert_eq!(table.records[0].rating, None);
        assert_eq!(table.records[0].ratings_count, None);
    }

    #[rstest]
    #[case("1,234,567", Some(1_234_567))]
    #[case("12 345", Some(12_345))]
    #[case("", None)]
    #[case("n/a", None)]
    fn test_parse_count(#[case] raw: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_count(raw), expected);
    }
}

//! Free-text normalization and match-key construction.
//!
//! The join key built here is an exact-match key: two records link on it only
//! when the normalized strings are byte-for-byte equal.
//!
//! # Example
//!
//! ```
//! use bibrecon::text::build_join_key;
//!
//! let authors = vec!["J. R. R. Tolkien".to_string()];
//! assert_eq!(
//!     build_join_key("The Hobbit", &authors),
//!     build_join_key("the hobbit", "J. R. R. Tolkien"),
//! );
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Separator between the title half and the author half of a join key.
pub const JOIN_KEY_SEPARATOR: char = '|';

/// A text value as it appears in a source row: absent, a single string, or a
/// list of strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextValue<'a> {
    Missing,
    Scalar(&'a str),
    List(&'a [String]),
}

impl<'a> From<&'a str> for TextValue<'a> {
    fn from(value: &'a str) -> Self {
        TextValue::Scalar(value)
    }
}

impl<'a> From<&'a String> for TextValue<'a> {
    fn from(value: &'a String) -> Self {
        TextValue::Scalar(value.as_str())
    }
}

impl<'a> From<Option<&'a str>> for TextValue<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(TextValue::Missing, TextValue::Scalar)
    }
}

impl<'a> From<&'a [String]> for TextValue<'a> {
    fn from(value: &'a [String]) -> Self {
        TextValue::List(value)
    }
}

impl<'a> From<&'a Vec<String>> for TextValue<'a> {
    fn from(value: &'a Vec<String>) -> Self {
        TextValue::List(value.as_slice())
    }
}

impl<'a> From<Option<&'a [String]>> for TextValue<'a> {
    fn from(value: Option<&'a [String]>) -> Self {
        value.map_or(TextValue::Missing, TextValue::List)
    }
}

/// Trims whitespace and strips one layer of enclosing single quotes.
///
/// Upstream exports sometimes serialize author names as `'John Doe'`.
pub fn clean_string(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Joins the cleaned, non-empty members of a list with single spaces.
fn join_cleaned(values: &[String]) -> String {
    values
        .iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| clean_string(v))
        .join(" ")
}

/// Lowercases and trims a text value into a comparable form.
///
/// Missing values become the empty string. Lists are cleaned element-wise and
/// joined with single spaces before lowercasing.
pub fn normalize_text<'a>(value: impl Into<TextValue<'a>>) -> String {
    match value.into() {
        TextValue::Missing => String::new(),
        TextValue::Scalar(s) => s.trim().to_lowercase(),
        TextValue::List(values) => join_cleaned(values).trim().to_lowercase(),
    }
}

/// Builds the `title|authors` fallback match key.
pub fn build_join_key<'a, 'b>(
    title: impl Into<TextValue<'a>>,
    author_or_authors: impl Into<TextValue<'b>>,
) -> String {
    format!(
        "{}{}{}",
        normalize_text(title),
        JOIN_KEY_SEPARATOR,
        normalize_text(author_or_authors)
    )
}

/// True when a join key carries neither a title nor an author.
pub fn is_blank_join_key(key: &str) -> bool {
    key.chars().all(|c| c == JOIN_KEY_SEPARATOR || c.is_whitespace())
}

/// Case- and whitespace-insensitive form used to deduplicate names.
pub fn dedup_key(text: &str) -> String {
    text.split_whitespace().join(" ").to_lowercase()
}

/// Outcome of reading a list that was serialized as text.
///
/// Parsing is total: text that is not a recognizable list literal is kept as
/// a single-element list instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ListText {
    /// The text was a JSON array or a Python-style list literal.
    Parsed(Vec<String>),
    /// The text was not a list; the cleaned raw string stands alone.
    Wrapped(String),
}

impl ListText {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ListText::Parsed(_))
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            ListText::Parsed(values) => values,
            ListText::Wrapped(value) => vec![value],
        }
    }
}

/// Reads a list stored as text, e.g. `['Frank Herbert', 'Brian Herbert']`.
///
/// Returns `None` for blank input.
pub fn parse_list_text(raw: &str) -> Option<ListText> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Some(ListText::Parsed(values));
    }

    match parse_quoted_list(trimmed) {
        Some(values) => Some(ListText::Parsed(values)),
        None => Some(ListText::Wrapped(clean_string(trimmed))),
    }
}

/// Parses a bracketed list of single- or double-quoted strings.
fn parse_quoted_list(text: &str) -> Option<Vec<String>> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    let mut chars = inner.chars().peekable();
    let mut items = Vec::new();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => match chars.next()? {
                    'n' => item.push('\n'),
                    't' => item.push('\t'),
                    other => item.push(other),
                },
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }

    Some(items)
}

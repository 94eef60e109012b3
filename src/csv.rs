//! Metadata-API extract parser (CSV).
//!
//! The metadata extract is a CSV export with one row per API hit. Column names
//! are matched case-insensitively against configurable aliases, so exports from
//! slightly different tooling still land on the required column set.
//!
//! # Example
//!
//! ```
//! use bibrecon::{MetadataCsvParser, SourceParser};
//!
//! let input = "gb_id,title,authors,isbn13\nB1,Dune,['Frank Herbert'],9780441013593";
//!
//! let parser = MetadataCsvParser::new();
//! let table = parser.parse(input).unwrap();
//! assert_eq!(table.records[0].title.as_deref(), Some("Dune"));
//! assert_eq!(table.records[0].authors, Some(vec!["Frank Herbert".to_string()]));
//! ```

mod structure;

use csv::ReaderBuilder;
use std::collections::HashMap;

use crate::loader::METADATA_COLUMNS;
use crate::{MetadataRecord, ReconcileError, Result, SourceParser, SourceTable};
use structure::RawCsvRow;

/// Default header aliases, keyed by required metadata column.
const DEFAULT_HEADERS: &[(&str, &[&str])] = &[
    ("gb_id", &["gb_id", "id", "external_id", "volume_id"]),
    ("title", &["title"]),
    ("subtitle", &["subtitle"]),
    ("authors", &["authors", "author"]),
    ("publisher", &["publisher"]),
    ("pub_date", &["pub_date", "published_date", "publisheddate"]),
    ("language", &["language", "lang"]),
    ("categories", &["categories", "category"]),
    ("isbn13", &["isbn13", "isbn_13"]),
    ("isbn10", &["isbn10", "isbn_10"]),
    ("price_amount", &["price_amount", "list_price", "price"]),
    ("price_currency", &["price_currency", "currency", "currency_code"]),
    ("goodreads_title_query", &["goodreads_title_query", "title_query"]),
    ("goodreads_author_query", &["goodreads_author_query", "author_query"]),
];

/// Configuration for metadata CSV parsing.
///
/// # Examples
///
/// ```
/// use bibrecon::csv::CsvConfig;
///
/// let mut config = CsvConfig::new();
/// config
///     .set_header_mapping("gb_id", vec!["Volume".to_string()])
///     .set_delimiter(b';');
/// ```
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Header aliases per required column
    header_map: HashMap<String, Vec<String>>,
    /// Delimiter to use for parsing the CSV
    delimiter: u8,
    /// Whether to trim whitespace around values
    pub(crate) trim: bool,
    /// Whether rows may carry more fields than the header
    pub(crate) flexible: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvConfig {
    /// Creates a configuration with the default aliases and a comma delimiter.
    #[must_use]
    pub fn new() -> Self {
        let mut config = Self {
            header_map: HashMap::new(),
            delimiter: b',',
            trim: true,
            flexible: false,
        };
        config.set_default_headers();
        config
    }

    fn set_default_headers(&mut self) {
        for (field, aliases) in DEFAULT_HEADERS {
            self.header_map.insert(
                field.to_string(),
                aliases.iter().map(|s| s.to_string()).collect(),
            );
        }
    }

    /// Replaces the aliases of a required column.
    pub fn set_header_mapping(&mut self, field: &str, aliases: Vec<String>) -> &mut Self {
        self.header_map.insert(field.to_string(), aliases);
        self
    }

    pub fn set_delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn set_trim(&mut self, trim: bool) -> &mut Self {
        self.trim = trim;
        self
    }

    pub fn set_flexible(&mut self, flexible: bool) -> &mut Self {
        self.flexible = flexible;
        self
    }

    /// Finds the required column a (trimmed) header maps to.
    pub(crate) fn get_field_for_header(&self, header: &str) -> Option<&'static str> {
        let header_lower = header.trim().to_lowercase();
        METADATA_COLUMNS.iter().copied().find(|field| {
            self.header_map
                .get(*field)
                .is_some_and(|aliases| aliases.iter().any(|a| a.to_lowercase() == header_lower))
        })
    }
}

/// Parser for the metadata-API CSV extract.
#[derive(Debug, Clone, Default)]
pub struct MetadataCsvParser {
    config: CsvConfig,
}

impl MetadataCsvParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CsvConfig::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CsvConfig) -> Self {
        self.config = config;
        self
    }
}

impl SourceParser for MetadataCsvParser {
    type Record = MetadataRecord;

    fn parse(&self, input: &str) -> Result<SourceTable<MetadataRecord>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(true)
            .flexible(self.config.flexible)
            .from_reader(input.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ReconcileError::InvalidFormat(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut columns: Vec<String> = METADATA_COLUMNS.iter().map(|c| c.to_string()).collect();
        for header in &headers {
            if self.config.get_field_for_header(header).is_none() && !columns.contains(header) {
                columns.push(header.clone());
            }
        }

        let mut records = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result.map_err(|e| ReconcileError::InvalidFormat(e.to_string()))?;
            // header is line 1
            let raw = RawCsvRow::from_record(&headers, &record, &self.config, i + 2)?;
            records.push(raw.into_metadata_record());
        }

        Ok(SourceTable { columns, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_metadata_row() {
        let input = "\
gb_id,title,subtitle,authors,publisher,pub_date,language,categories,isbn13,isbn10,price_amount,price_currency,goodreads_title_query,goodreads_author_query
abc,Dune,Deluxe Edition,\"['Frank Herbert']\",Ace,1990-09-01,en,\"['Fiction']\",9780441013593,0441013597,9.99,USD,Dune,Frank Herbert";

        let table = MetadataCsvParser::new().parse(input).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.columns.len(), METADATA_COLUMNS.len());

        let record = &table.records[0];
        assert_eq!(record.external_id.as_deref(), Some("abc"));
        assert_eq!(record.subtitle.as_deref(), Some("Deluxe Edition"));
        assert_eq!(record.authors, Some(vec!["Frank Herbert".to_string()]));
        assert_eq!(record.categories, Some(vec!["Fiction".to_string()]));
        assert_eq!(record.price_amount, Some(9.99));
        assert_eq!(record.price_currency.as_deref(), Some("USD"));
        assert_eq!(record.title_query.as_deref(), Some("Dune"));
        assert_eq!(record.author_query.as_deref(), Some("Frank Herbert"));
    }

    #[test]
    fn test_missing_columns_are_synthesized_null() {
        let input = " title ,Extra\nDune,something";

        let table = MetadataCsvParser::new().parse(input).unwrap();
        assert_eq!(table.records[0].title.as_deref(), Some("Dune"));
        assert_eq!(table.records[0].isbn13, None);
        assert_eq!(table.records[0].authors, None);
        assert_eq!(table.columns.len(), METADATA_COLUMNS.len() + 1);
        assert_eq!(table.columns.last().map(String::as_str), Some("Extra"));
    }

    #[test]
    fn test_row_order_is_preserved() {
        let input = "title\nFirst\nSecond\nThird";
        let table = MetadataCsvParser::new().parse(input).unwrap();
        let titles: Vec<_> = table
            .records
            .iter()
            .map(|r| r.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_custom_delimiter_and_alias() {
        let input = "Volume;Title\nv-1;Emma";

        let mut config = CsvConfig::new();
        config
            .set_delimiter(b';')
            .set_header_mapping("gb_id", vec!["Volume".to_string()]);

        let table = MetadataCsvParser::new().with_config(config).parse(input).unwrap();
        assert_eq!(table.records[0].external_id.as_deref(), Some("v-1"));
        assert_eq!(table.records[0].title.as_deref(), Some("Emma"));
    }

    #[test]
    fn test_unparsable_price_becomes_null() {
        let input = "title,price_amount\nDune,n/a";
        let table = MetadataCsvParser::new().parse(input).unwrap();
        assert_eq!(table.records[0].price_amount, None);
        assert_eq!(table.records[0].title.as_deref(), Some("Dune"));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let input = "title\nDune,extra";
        let result = MetadataCsvParser::new().parse(input);
        assert!(matches!(result, Err(ReconcileError::InvalidFormat(_))));
    }
}

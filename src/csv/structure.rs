//! Intermediate row structure used while reading the metadata CSV.

use csv::StringRecord;
use std::collections::HashMap;
use tracing::debug;

use crate::csv::CsvConfig;
use crate::text::parse_list_text;
use crate::{MetadataRecord, ReconcileError};

/// One CSV row keyed by required column name.
#[derive(Debug, Clone)]
pub(crate) struct RawCsvRow {
    /// Non-empty values of recognized columns
    pub(crate) fields: HashMap<&'static str, String>,
    /// Line number for error reporting
    pub(crate) line_number: usize,
}

impl RawCsvRow {
    pub(crate) fn from_record(
        headers: &[String],
        record: &StringRecord,
        config: &CsvConfig,
        line_number: usize,
    ) -> Result<Self, ReconcileError> {
        let mut fields = HashMap::new();

        for (i, value) in record.iter().enumerate() {
            if i >= headers.len() {
                if !config.flexible {
                    return Err(ReconcileError::InvalidFormat(format!(
                        "line {line_number}: record has more fields ({}) than headers ({})",
                        record.len(),
                        headers.len()
                    )));
                }
                break;
            }

            let value = if config.trim { value.trim() } else { value };
            if value.is_empty() {
                continue;
            }

            if let Some(field) = config.get_field_for_header(&headers[i]) {
                // first occurrence wins when two headers alias the same column
                fields.entry(field).or_insert_with(|| value.to_string());
            }
        }

        Ok(Self {
            fields,
            line_number,
        })
    }

    fn take(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    fn take_list(&mut self, field: &str) -> Option<Vec<String>> {
        self.take(field)
            .and_then(|raw| parse_list_text(&raw))
            .map(|list| list.into_vec())
    }

    fn take_f64(&mut self, field: &str) -> Option<f64> {
        let raw = self.take(field)?;
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                debug!(
                    line = self.line_number,
                    field, value = %raw, "unparsable number coerced to null"
                );
                None
            }
        }
    }

    pub(crate) fn into_metadata_record(mut self) -> MetadataRecord {
        MetadataRecord {
            external_id: self.take("gb_id"),
            title: self.take("title"),
            subtitle: self.take("subtitle"),
            authors: self.take_list("authors"),
            publisher: self.take("publisher"),
            pub_date: self.take("pub_date"),
            language: self.take("language"),
            categories: self.take_list("categories"),
            isbn13: self.take("isbn13"),
            isbn10: self.take("isbn10"),
            price_amount: self.take_f64("price_amount"),
            price_currency: self.take("price_currency"),
            title_query: self.take("goodreads_title_query"),
            author_query: self.take("goodreads_author_query"),
        }
    }
}

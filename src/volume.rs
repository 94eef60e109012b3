//! Metadata-API volume payloads.
//!
//! The enrichment step sends one query per catalog row (see
//! [`CatalogRecord::search_query`]) and keeps the first volume of each
//! response. This module turns such a volume into a [`MetadataRecord`],
//! echoing the catalog title and author that were searched for.
//!
//! # Example
//!
//! ```
//! use bibrecon::MetadataRecord;
//!
//! let volume = serde_json::json!({
//!     "id": "B1xQ",
//!     "volumeInfo": {
//!         "title": "Dune",
//!         "authors": ["Frank Herbert"],
//!         "publishedDate": "1990-09-01",
//!         "industryIdentifiers": [
//!             {"type": "ISBN_10", "identifier": "0441172717"},
//!             {"type": "ISBN_13", "identifier": "9780441172719"}
//!         ]
//!     },
//!     "saleInfo": {"listPrice": {"amount": 9.99, "currencyCode": "USD"}}
//! });
//!
//! let record = MetadataRecord::from_volume(&volume, Some("Dune"), Some("Frank Herbert")).unwrap();
//! assert_eq!(record.external_id.as_deref(), Some("B1xQ"));
//! assert_eq!(record.isbn13.as_deref(), Some("9780441172719"));
//! assert_eq!(record.price_currency.as_deref(), Some("USD"));
//! assert_eq!(record.title_query.as_deref(), Some("Dune"));
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::isbn::{self, IndustryIdentifier};
use crate::{CatalogRecord, MetadataRecord, ReconcileError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: Option<String>,
    #[serde(default)]
    volume_info: VolumeInfo,
    #[serde(default)]
    sale_info: SaleInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Option<Vec<String>>,
    publisher: Option<String>,
    published_date: Option<String>,
    language: Option<String>,
    categories: Option<Vec<String>>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaleInfo {
    list_price: Option<ListPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPrice {
    amount: Option<f64>,
    currency_code: Option<String>,
}

/// Top level of a search response; only the first item is used.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total_items: u64,
    #[serde(default)]
    items: Vec<Value>,
}

fn non_empty(list: Option<Vec<String>>) -> Option<Vec<String>> {
    list.filter(|values| !values.is_empty())
}

impl MetadataRecord {
    /// Builds a metadata row from one volume object.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidFormat`] when `volume` is not an
    /// object or a known field has the wrong JSON type.
    pub fn from_volume(
        volume: &Value,
        title_query: Option<&str>,
        author_query: Option<&str>,
    ) -> Result<MetadataRecord> {
        if !volume.is_object() {
            return Err(ReconcileError::InvalidFormat(
                "volume must be a JSON object".to_string(),
            ));
        }
        let Volume {
            id,
            volume_info: info,
            sale_info,
        } = Volume::deserialize(volume)?;

        let price = sale_info.list_price.unwrap_or_default();

        Ok(MetadataRecord {
            external_id: id,
            isbn13: isbn::find_by_type(&info.industry_identifiers, isbn::ISBN_13),
            isbn10: isbn::find_by_type(&info.industry_identifiers, isbn::ISBN_10),
            title: info.title,
            subtitle: info.subtitle,
            authors: non_empty(info.authors),
            publisher: info.publisher,
            pub_date: info.published_date,
            language: info.language,
            categories: non_empty(info.categories),
            price_amount: price.amount,
            price_currency: price.currency_code,
            title_query: title_query.map(str::to_string),
            author_query: author_query.map(str::to_string),
        })
    }

    /// Reads a full search response for `query`, keeping its first volume.
    ///
    /// Returns `Ok(None)` when the response has no items.
    pub fn from_search_response(
        response: &str,
        query: &CatalogRecord,
    ) -> Result<Option<MetadataRecord>> {
        let response: SearchResponse = serde_json::from_str(response)?;
        if response.total_items == 0 {
            return Ok(None);
        }

        response
            .items
            .first()
            .map(|item| {
                MetadataRecord::from_volume(item, query.title.as_deref(), query.author.as_deref())
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_isbn10_only_fills_both_columns() {
        let volume = json!({
            "id": "x",
            "volumeInfo": {
                "industryIdentifiers": [{"type": "ISBN_10", "identifier": "0441013597"}]
            }
        });

        let record = MetadataRecord::from_volume(&volume, None, None).unwrap();
        assert_eq!(record.isbn13.as_deref(), Some("0441013597"));
        assert_eq!(record.isbn10.as_deref(), Some("0441013597"));
    }

    #[test]
    fn test_sparse_volume() {
        let volume = json!({"id": "y", "volumeInfo": {"title": "Untitled", "authors": []}});

        let record = MetadataRecord::from_volume(&volume, Some("Untitled"), None).unwrap();
        assert_eq!(
            record,
            MetadataRecord {
                external_id: Some("y".to_string()),
                title: Some("Untitled".to_string()),
                title_query: Some("Untitled".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        assert!(MetadataRecord::from_volume(&json!([1, 2]), None, None).is_err());
        assert!(
            MetadataRecord::from_volume(&json!({"volumeInfo": {"authors": "Frank"}}), None, None)
                .is_err()
        );
    }

    #[test]
    fn test_search_response() {
        let query = CatalogRecord {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            ..Default::default()
        };

        let empty = r#"{"kind": "books#volumes", "totalItems": 0}"#;
        assert_eq!(MetadataRecord::from_search_response(empty, &query).unwrap(), None);

        let found = r#"{"totalItems": 3, "items": [
            {"id": "first", "volumeInfo": {"title": "Dune"}},
            {"id": "second", "volumeInfo": {"title": "Dune Messiah"}}
        ]}"#;
        let record = MetadataRecord::from_search_response(found, &query)
            .unwrap()
            .unwrap();
        assert_eq!(record.external_id.as_deref(), Some("first"));
        assert_eq!(record.author_query.as_deref(), Some("Frank Herbert"));
    }
}

//! The unified detail row produced by the matcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CatalogRecord, MetadataRecord};

/// Where one side of a detail row came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source label, e.g. `goodreads`
    pub source: String,
    /// File name of the landing extract
    pub source_file: String,
    pub ingestion_ts: DateTime<Utc>,
}

/// Row-wise union of one catalog row and/or one metadata row.
///
/// Attributes that both sources carry are suffixed by source; the rest keep
/// their source-specific name. Every attribute is optional because either
/// side of an outer join may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub book_id: String,
    /// Normalized `title|authors` key of the row
    pub join_key: String,

    pub title_metadata: Option<String>,
    pub title_catalog: Option<String>,
    pub isbn13_metadata: Option<String>,
    pub isbn13_catalog: Option<String>,
    pub isbn10_metadata: Option<String>,
    pub isbn10_catalog: Option<String>,

    // metadata side
    pub external_id: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Option<Vec<String>>,
    pub publisher: Option<String>,
    pub pub_date_raw: Option<String>,
    pub language_raw: Option<String>,
    pub categories: Option<Vec<String>>,
    pub price_amount: Option<f64>,
    pub currency_raw: Option<String>,
    pub title_query: Option<String>,
    pub author_query: Option<String>,
    pub provenance_metadata: Option<Provenance>,

    // catalog side
    pub author_catalog: Option<String>,
    pub rating: Option<f64>,
    pub ratings_count: Option<u64>,
    pub url: Option<String>,
    pub provenance_catalog: Option<Provenance>,
}

fn fill<T: Clone>(target: &mut Option<T>, backup: &Option<T>) {
    if target.is_none() {
        target.clone_from(backup);
    }
}

impl DetailRecord {
    /// Sets the metadata-side attributes from a metadata row.
    pub(crate) fn set_metadata(
        &mut self,
        record: &MetadataRecord,
        isbn13: Option<String>,
        isbn10: Option<String>,
        provenance: Provenance,
    ) {
        self.title_metadata = record.title.clone();
        self.isbn13_metadata = isbn13;
        self.isbn10_metadata = isbn10;
        self.external_id = record.external_id.clone();
        self.subtitle = record.subtitle.clone();
        self.authors = record.authors.clone();
        self.publisher = record.publisher.clone();
        self.pub_date_raw = record.pub_date.clone();
        self.language_raw = record.language.clone();
        self.categories = record.categories.clone();
        self.price_amount = record.price_amount;
        self.currency_raw = record.price_currency.clone();
        self.title_query = record.title_query.clone();
        self.author_query = record.author_query.clone();
        self.provenance_metadata = Some(provenance);
    }

    /// Sets the catalog-side attributes from a catalog row.
    pub(crate) fn set_catalog(
        &mut self,
        record: &CatalogRecord,
        isbn13: Option<String>,
        isbn10: Option<String>,
        provenance: Provenance,
    ) {
        self.title_catalog = record.title.clone();
        self.isbn13_catalog = isbn13;
        self.isbn10_catalog = isbn10;
        self.author_catalog = record.author.clone();
        self.rating = record.rating;
        self.ratings_count = record.ratings_count;
        self.url = record.url.clone();
        self.provenance_catalog = Some(provenance);
    }

    /// Fills every attribute that is still null from `backup`.
    ///
    /// Values already present are never overwritten, so calling this with
    /// several backups in order implements first-non-null-wins.
    pub(crate) fn fill_missing_from(&mut self, backup: &DetailRecord) {
        fill(&mut self.title_metadata, &backup.title_metadata);
        fill(&mut self.title_catalog, &backup.title_catalog);
        fill(&mut self.isbn13_metadata, &backup.isbn13_metadata);
        fill(&mut self.isbn13_catalog, &backup.isbn13_catalog);
        fill(&mut self.isbn10_metadata, &backup.isbn10_metadata);
        fill(&mut self.isbn10_catalog, &backup.isbn10_catalog);
        fill(&mut self.external_id, &backup.external_id);
        fill(&mut self.subtitle, &backup.subtitle);
        fill(&mut self.authors, &backup.authors);
        fill(&mut self.publisher, &backup.publisher);
        fill(&mut self.pub_date_raw, &backup.pub_date_raw);
        fill(&mut self.language_raw, &backup.language_raw);
        fill(&mut self.categories, &backup.categories);
        fill(&mut self.price_amount, &backup.price_amount);
        fill(&mut self.currency_raw, &backup.currency_raw);
        fill(&mut self.title_query, &backup.title_query);
        fill(&mut self.author_query, &backup.author_query);
        fill(&mut self.provenance_metadata, &backup.provenance_metadata);
        fill(&mut self.author_catalog, &backup.author_catalog);
        fill(&mut self.rating, &backup.rating);
        fill(&mut self.ratings_count, &backup.ratings_count);
        fill(&mut self.url, &backup.url);
        fill(&mut self.provenance_catalog, &backup.provenance_catalog);
    }

    /// True when any ISBN column of the row is populated.
    pub fn has_isbn(&self) -> bool {
        self.isbn13_metadata.is_some()
            || self.isbn13_catalog.is_some()
            || self.isbn10_metadata.is_some()
            || self.isbn10_catalog.is_some()
    }

    /// Number of populated columns, used to rank rows by completeness.
    ///
    /// Provenance counts as its three columns (source, file, timestamp).
    pub fn non_null_count(&self) -> usize {
        let present = [
            self.title_metadata.is_some(),
            self.title_catalog.is_some(),
            self.isbn13_metadata.is_some(),
            self.isbn13_catalog.is_some(),
            self.isbn10_metadata.is_some(),
            self.isbn10_catalog.is_some(),
            self.external_id.is_some(),
            self.subtitle.is_some(),
            self.authors.is_some(),
            self.publisher.is_some(),
            self.pub_date_raw.is_some(),
            self.language_raw.is_some(),
            self.categories.is_some(),
            self.price_amount.is_some(),
            self.currency_raw.is_some(),
            self.title_query.is_some(),
            self.author_query.is_some(),
            self.author_catalog.is_some(),
            self.rating.is_some(),
            self.ratings_count.is_some(),
            self.url.is_some(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count();

        let provenance = [&self.provenance_metadata, &self.provenance_catalog]
            .into_iter()
            .filter(|p| p.is_some())
            .count();

        // book_id and join_key are always set
        2 + present + 3 * provenance
    }
}

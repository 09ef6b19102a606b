//! Field records as stored in the search index and the query/result shapes
//! served by the search endpoint.

use serde::{Deserialize, Serialize};

/// A sport field as indexed in Solr.
///
/// The index always receives the whole document; there are no partial
/// updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    pub id: String,
    pub name: String,
    pub sport: String,
    pub location: String,
    pub price_per_hour: f64,
    pub image: String,
    pub description: String,
    pub available: bool,
}

/// Canonical field representation returned by the fields API.
///
/// Only the attributes the index needs are decoded; owner and timestamp
/// columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub price_per_hour: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub available: bool,
}

impl From<FieldRecord> for FieldDocument {
    fn from(record: FieldRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            sport: record.sport,
            location: record.location,
            price_per_hour: record.price_per_hour,
            image: record.image,
            description: record.description,
            available: record.available,
        }
    }
}

/// Structured search request.
///
/// Field order is significant: cache keys are derived from the serialized
/// form, so every field (including absent filters) takes part in the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub sport: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_desc: bool,
    pub page: i64,
    pub size: i64,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            sport: None,
            location: None,
            min_price: None,
            max_price: None,
            sort_by: None,
            sort_desc: false,
            page: 1,
            size: crate::application::pagination::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of search hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub fields: Vec<FieldDocument>,
    pub total_count: i64,
    pub page: i64,
    pub size: i64,
    pub total_pages: i64,
}

impl SearchResult {
    /// Build a result page; `size` must already be normalized to at least 1.
    pub fn new(fields: Vec<FieldDocument>, total_count: i64, page: i64, size: i64) -> Self {
        Self {
            fields,
            total_count,
            page,
            size,
            total_pages: crate::application::pagination::total_pages(total_count, size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FieldRecord {
        FieldRecord {
            id: "65f1c0ffee".to_string(),
            name: "Cancha Norte".to_string(),
            sport: "soccer".to_string(),
            location: "Cordoba".to_string(),
            price_per_hour: 25.5,
            image: "https://img.example/norte.png".to_string(),
            description: "Synthetic grass".to_string(),
            available: true,
        }
    }

    #[test]
    fn record_maps_every_attribute() {
        let document = FieldDocument::from(record());
        assert_eq!(document.id, "65f1c0ffee");
        assert_eq!(document.sport, "soccer");
        assert_eq!(document.price_per_hour, 25.5);
        assert_eq!(document.image, "https://img.example/norte.png");
        assert!(document.available);
    }

    #[test]
    fn record_tolerates_extra_and_missing_columns() {
        let record: FieldRecord = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "name": "Padel 1",
            "owner_id": 7,
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .expect("record decodes");

        assert_eq!(record.name, "Padel 1");
        assert_eq!(record.price_per_hour, 0.0);
        assert!(!record.available);
    }

    #[test]
    fn result_derives_total_pages() {
        let result = SearchResult::new(Vec::new(), 23, 1, 10);
        assert_eq!(result.total_pages, 3);
    }
}

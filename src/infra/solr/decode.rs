//! Lenient decoding of Solr select responses.
//!
//! Solr may return any stored field as a multi-valued array depending on the
//! schema, so scalar attributes accept a single-element array as well. A
//! missing or mistyped attribute decodes to its zero value.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::application::repos::RepoError;
use crate::domain::fields::{FieldDocument, SearchResult};

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    num_found: i64,
    #[serde(default)]
    docs: Vec<Map<String, Value>>,
}

pub fn decode_select(body: &[u8], page: i64, size: i64) -> Result<SearchResult, RepoError> {
    let parsed: SelectResponse =
        serde_json::from_slice(body).map_err(|err| RepoError::Decode(err.to_string()))?;

    let fields = parsed.response.docs.iter().map(decode_document).collect();
    Ok(SearchResult::new(fields, parsed.response.num_found, page, size))
}

pub fn decode_document(doc: &Map<String, Value>) -> FieldDocument {
    FieldDocument {
        id: text(doc, "id"),
        name: text(doc, "name"),
        sport: text(doc, "sport"),
        location: text(doc, "location"),
        price_per_hour: number(doc, "price_per_hour"),
        image: text(doc, "image"),
        description: text(doc, "description"),
        available: flag(doc, "available"),
    }
}

fn scalar<'a>(doc: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match doc.get(key)? {
        Value::Array(items) => items.first(),
        value => Some(value),
    }
}

fn text(doc: &Map<String, Value>, key: &str) -> String {
    scalar(doc, key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn number(doc: &Map<String, Value>, key: &str) -> f64 {
    scalar(doc, key).and_then(Value::as_f64).unwrap_or_default()
}

fn flag(doc: &Map<String, Value>, key: &str) -> bool {
    scalar(doc, key).and_then(Value::as_bool).unwrap_or_default()
}

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::application::error::HttpError;
use crate::application::pagination::DEFAULT_PAGE_SIZE;
use crate::domain::fields::SearchQuery;

use super::HttpState;

/// Raw query-string parameters of `GET /search`.
///
/// Everything arrives as text so a malformed number never rejects the
/// request; it is simply treated as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    query: Option<String>,
    sport: Option<String>,
    location: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
    sort_by: Option<String>,
    sort_desc: Option<String>,
    page: Option<String>,
    size: Option<String>,
}

impl SearchParams {
    pub fn into_query(self) -> SearchQuery {
        SearchQuery {
            query: self.query.unwrap_or_default(),
            sport: non_empty(self.sport),
            location: non_empty(self.location),
            min_price: parse_price(self.min_price.as_deref()),
            max_price: parse_price(self.max_price.as_deref()),
            sort_by: non_empty(self.sort_by),
            sort_desc: self.sort_desc.as_deref() == Some("true"),
            page: parse_int(self.page.as_deref()).unwrap_or(1),
            size: parse_int(self.size.as_deref()).unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn parse_price(raw: Option<&str>) -> Option<f64> {
    raw?.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw?.parse().ok()
}

pub(super) async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.search.search(params.into_query()).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

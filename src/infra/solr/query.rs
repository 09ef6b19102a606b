//! Translation of a [`SearchQuery`] into Solr select parameters.

use crate::application::pagination::{normalize_page, offset, positive_page_size};
use crate::domain::fields::SearchQuery;

const MATCH_ALL: &str = "*:*";
const TEXT_FIELDS: [&str; 4] = ["name", "sport", "location", "description"];
const AVAILABLE_ONLY: &str = "available:true";

/// Parameters of a single `/select` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectParams {
    pub q: String,
    pub fq: String,
    pub sort: Option<String>,
    pub page: i64,
    pub size: i64,
    pub start: i64,
}

impl SelectParams {
    pub fn from_query(query: &SearchQuery) -> Self {
        let page = normalize_page(query.page);
        let size = positive_page_size(query.size);

        Self {
            q: text_clause(&query.query),
            fq: filter_clauses(query).join(" AND "),
            sort: sort_clause(query.sort_by.as_deref(), query.sort_desc),
            page,
            size,
            start: offset(page, size),
        }
    }

    /// Query-string pairs in the order Solr receives them.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("q", self.q.clone()),
            ("fq", self.fq.clone()),
            ("start", self.start.to_string()),
            ("rows", self.size.to_string()),
            ("wt", "json".to_string()),
        ];
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        pairs
    }
}

fn text_clause(term: &str) -> String {
    let term = term.trim();
    if term.is_empty() {
        return MATCH_ALL.to_string();
    }
    let escaped = escape_term(term);
    TEXT_FIELDS
        .iter()
        .map(|field| format!("{field}:*{escaped}*"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn filter_clauses(query: &SearchQuery) -> Vec<String> {
    let mut filters = Vec::new();

    if let Some(sport) = non_empty(query.sport.as_deref()) {
        filters.push(format!("sport:\"{}\"", escape_phrase(sport)));
    }
    if let Some(location) = non_empty(query.location.as_deref()) {
        filters.push(format!("location:*{}*", escape_term(location)));
    }
    if let Some(min) = query.min_price.filter(|value| value.is_finite()) {
        filters.push(format!("price_per_hour:[{min} TO *]"));
    }
    if let Some(max) = query.max_price.filter(|value| value.is_finite()) {
        filters.push(format!("price_per_hour:[* TO {max}]"));
    }

    filters.push(AVAILABLE_ONLY.to_string());
    filters
}

fn sort_clause(sort_by: Option<&str>, descending: bool) -> Option<String> {
    let field = non_empty(sort_by)?;
    if !field
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    let direction = if descending { "desc" } else { "asc" };
    Some(format!("{field} {direction}"))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Escape Lucene syntax characters and whitespace in an unquoted term.
fn escape_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if c.is_whitespace() || "+-&|!(){}[]^\"~*?:\\/".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape a value placed inside double quotes.
fn escape_phrase(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SearchQuery {
        SearchQuery::default()
    }

    #[test]
    fn empty_term_matches_everything_available() {
        let params = SelectParams::from_query(&query());
        assert_eq!(params.q, "*:*");
        assert_eq!(params.fq, "available:true");
        assert_eq!(params.sort, None);
        assert_eq!(params.start, 0);
        assert_eq!(params.size, 10);
    }

    #[test]
    fn term_searches_all_text_fields() {
        let params = SelectParams::from_query(&SearchQuery {
            query: "futbol".to_string(),
            ..query()
        });
        assert_eq!(
            params.q,
            "name:*futbol* OR sport:*futbol* OR location:*futbol* OR description:*futbol*"
        );
    }

    #[test]
    fn filters_are_anded_with_availability_last() {
        let params = SelectParams::from_query(&SearchQuery {
            sport: Some("soccer".to_string()),
            location: Some("Cordoba".to_string()),
            min_price: Some(10.0),
            max_price: Some(50.5),
            ..query()
        });
        assert_eq!(
            params.fq,
            "sport:\"soccer\" AND location:*Cordoba* AND price_per_hour:[10 TO *] \
             AND price_per_hour:[* TO 50.5] AND available:true"
        );
    }

    #[test]
    fn empty_filters_are_inert() {
        let params = SelectParams::from_query(&SearchQuery {
            sport: Some("  ".to_string()),
            location: Some(String::new()),
            ..query()
        });
        assert_eq!(params.fq, "available:true");
    }

    #[test]
    fn sort_defaults_to_ascending() {
        let asc = SelectParams::from_query(&SearchQuery {
            sort_by: Some("price_per_hour".to_string()),
            ..query()
        });
        assert_eq!(asc.sort.as_deref(), Some("price_per_hour asc"));

        let desc = SelectParams::from_query(&SearchQuery {
            sort_by: Some("name".to_string()),
            sort_desc: true,
            ..query()
        });
        assert_eq!(desc.sort.as_deref(), Some("name desc"));
    }

    #[test]
    fn sort_field_with_syntax_falls_back_to_relevance() {
        let params = SelectParams::from_query(&SearchQuery {
            sort_by: Some("name asc,price_per_hour".to_string()),
            ..query()
        });
        assert_eq!(params.sort, None);
    }

    #[test]
    fn degenerate_pagination_is_normalized() {
        let params = SelectParams::from_query(&SearchQuery {
            page: 0,
            size: 0,
            ..query()
        });
        assert_eq!(params.page, 1);
        assert_eq!(params.size, 10);
        assert_eq!(params.start, 0);

        let third = SelectParams::from_query(&SearchQuery {
            page: 3,
            size: 25,
            ..query()
        });
        assert_eq!(third.start, 50);
    }

    #[test]
    fn user_input_cannot_break_out_of_clauses() {
        let params = SelectParams::from_query(&SearchQuery {
            query: "a b:c".to_string(),
            sport: Some("x\" OR available:false".to_string()),
            ..query()
        });
        assert!(params.q.starts_with("name:*a\\ b\\:c*"));
        assert!(params.fq.starts_with("sport:\"x\\\" OR available:false\""));
    }

    #[test]
    fn pairs_include_sort_only_when_set() {
        let params = SelectParams::from_query(&query());
        let keys: Vec<&str> = params.pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["q", "fq", "start", "rows", "wt"]);
    }
}

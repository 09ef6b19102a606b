//! Cache key derivation.
//!
//! Both tiers must agree on the key for a logical query, so the key is the
//! serialized structured query rather than the inbound query string.

use crate::domain::fields::SearchQuery;

/// Namespace shared by every search entry, in both tiers.
pub const SEARCH_KEY_PREFIX: &str = "search:";

/// Derive the cache key for a (normalized) query.
///
/// `serde_json` writes struct fields in declaration order and absent filters
/// as `null`, which makes the encoding canonical.
pub fn search_cache_key(query: &SearchQuery) -> String {
    match serde_json::to_string(query) {
        Ok(encoded) => format!("{SEARCH_KEY_PREFIX}{encoded}"),
        // Only non-finite floats can fail here; fall back to the debug form
        // which is still deterministic.
        Err(_) => format!("{SEARCH_KEY_PREFIX}{query:?}"),
    }
}

/// Glob matching every search entry in the shared tier.
pub fn shared_key_pattern() -> String {
    format!("{SEARCH_KEY_PREFIX}*")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SearchQuery {
        SearchQuery {
            query: "futbol".to_string(),
            sport: Some("soccer".to_string()),
            location: Some("Cordoba".to_string()),
            min_price: Some(10.0),
            max_price: Some(50.0),
            sort_by: Some("price_per_hour".to_string()),
            sort_desc: false,
            page: 1,
            size: 10,
        }
    }

    #[test]
    fn identical_queries_share_a_key() {
        assert_eq!(search_cache_key(&base()), search_cache_key(&base()));
    }

    #[test]
    fn key_carries_namespace() {
        assert!(search_cache_key(&base()).starts_with("search:"));
        assert_eq!(shared_key_pattern(), "search:*");
    }

    #[test]
    fn any_differing_field_changes_the_key() {
        let reference = search_cache_key(&base());
        let variants: Vec<SearchQuery> = vec![
            SearchQuery {
                query: "padel".to_string(),
                ..base()
            },
            SearchQuery {
                sport: None,
                ..base()
            },
            SearchQuery {
                location: Some("Rosario".to_string()),
                ..base()
            },
            SearchQuery {
                min_price: None,
                ..base()
            },
            SearchQuery {
                max_price: Some(60.0),
                ..base()
            },
            SearchQuery {
                sort_by: Some("name".to_string()),
                ..base()
            },
            SearchQuery {
                sort_desc: true,
                ..base()
            },
            SearchQuery {
                page: 2,
                ..base()
            },
            SearchQuery {
                size: 20,
                ..base()
            },
        ];

        for variant in variants {
            assert_ne!(search_cache_key(&variant), reference, "{variant:?}");
        }
    }

    #[test]
    fn absent_filter_differs_from_empty_filter() {
        let absent = SearchQuery {
            sport: None,
            ..base()
        };
        let empty = SearchQuery {
            sport: Some(String::new()),
            ..base()
        };
        assert_ne!(search_cache_key(&absent), search_cache_key(&empty));
    }

    #[test]
    fn min_and_max_bounds_are_not_interchangeable() {
        let min_only = SearchQuery {
            min_price: Some(10.0),
            max_price: None,
            ..base()
        };
        let max_only = SearchQuery {
            min_price: None,
            max_price: Some(10.0),
            ..base()
        };
        assert_ne!(search_cache_key(&min_only), search_cache_key(&max_only));
    }
}

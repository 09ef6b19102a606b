//! Cache-aside search across the local tier, the shared tier and the index.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::application::pagination::{bounded_page_size, normalize_page};
use crate::application::repos::{IndexRepository, RepoError};
use crate::cache::{CacheTiers, search_cache_key};
use crate::domain::fields::{SearchQuery, SearchResult};

const METRIC_INDEX_QUERY: &str = "field_search_index_query_total";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search failed")]
    Backend(#[source] RepoError),
}

/// Search orchestrator.
///
/// Lookup order is local tier, shared tier, then the index. A shared hit is
/// copied into the local tier; an index hit is written to both tiers. Errors
/// are never cached.
pub struct SearchService {
    index: Arc<dyn IndexRepository>,
    caches: CacheTiers,
}

impl SearchService {
    pub fn new(index: Arc<dyn IndexRepository>, caches: CacheTiers) -> Self {
        Self { index, caches }
    }

    #[instrument(skip(self, query), fields(page = query.page, size = query.size))]
    pub async fn search(&self, mut query: SearchQuery) -> Result<SearchResult, SearchError> {
        query.page = normalize_page(query.page);
        query.size = bounded_page_size(query.size);

        let key = search_cache_key(&query);

        if let Some(result) = self.caches.local.get(&key).await {
            return Ok(result);
        }

        if let Some(result) = self.caches.shared.get(&key).await {
            self.caches.local.set(&key, &result).await;
            return Ok(result);
        }

        debug!(cache_key = %key, "Cache miss; querying index");
        counter!(METRIC_INDEX_QUERY).increment(1);
        let result = self.index.search(&query).await.map_err(|err| {
            error!(error = %err, "Index search failed");
            SearchError::Backend(err)
        })?;

        self.caches.local.set(&key, &result).await;
        self.caches.shared.set(&key, &result).await;

        Ok(result)
    }
}

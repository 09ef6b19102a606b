//! In-memory stand-ins for the index, the fields API and the cache tiers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use tokio::sync::Mutex;

use field_search::application::repos::{
    FieldSource, IndexRepository, RepoError, SourceError,
};
use field_search::cache::{CacheTier, CacheTiers, SearchCache};
use field_search::domain::fields::{FieldDocument, FieldRecord, SearchQuery, SearchResult};

pub fn document(
    id: &str,
    name: &str,
    sport: &str,
    price_per_hour: f64,
    available: bool,
) -> FieldDocument {
    FieldDocument {
        id: id.to_string(),
        name: name.to_string(),
        sport: sport.to_string(),
        location: "Cordoba".to_string(),
        price_per_hour,
        image: format!("https://img.example/{id}.png"),
        description: format!("{name} description"),
        available,
    }
}

pub fn record(id: &str, name: &str, sport: &str, price_per_hour: f64) -> FieldRecord {
    FieldRecord {
        id: id.to_string(),
        name: name.to_string(),
        sport: sport.to_string(),
        location: "Cordoba".to_string(),
        price_per_hour,
        image: format!("https://img.example/{id}.png"),
        description: format!("{name} description"),
        available: true,
    }
}

/// Index that evaluates queries over a map, mimicking the Solr query shape.
#[derive(Default)]
pub struct MemoryIndex {
    docs: Mutex<HashMap<String, FieldDocument>>,
    searches: AtomicUsize,
    writes: AtomicUsize,
    fail_search: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryIndex {
    pub fn with_documents(docs: impl IntoIterator<Item = FieldDocument>) -> Self {
        let index = Self::default();
        {
            let mut map = index.docs.try_lock().expect("fresh index lock");
            for doc in docs {
                map.insert(doc.id.clone(), doc);
            }
        }
        index
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, id: &str) -> Option<FieldDocument> {
        self.docs.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    fn matches(doc: &FieldDocument, query: &SearchQuery) -> bool {
        if !doc.available {
            return false;
        }
        let term = query.query.trim().to_lowercase();
        if !term.is_empty()
            && ![&doc.name, &doc.sport, &doc.location, &doc.description]
                .iter()
                .any(|value| value.to_lowercase().contains(&term))
        {
            return false;
        }
        if let Some(sport) = query.sport.as_deref()
            && doc.sport != sport
        {
            return false;
        }
        if let Some(location) = query.location.as_deref()
            && !doc.location.contains(location)
        {
            return false;
        }
        if query.min_price.is_some_and(|min| doc.price_per_hour < min) {
            return false;
        }
        if query.max_price.is_some_and(|max| doc.price_per_hour > max) {
            return false;
        }
        true
    }
}

#[async_trait]
impl IndexRepository for MemoryIndex {
    async fn index(&self, document: &FieldDocument) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Transport("index offline".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.docs
            .lock()
            .await
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Transport("index offline".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.docs.lock().await.remove(id);
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, RepoError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(RepoError::Transport(
                "connection refused (solr:8983)".to_string(),
            ));
        }

        let mut hits: Vec<FieldDocument> = self
            .docs
            .lock()
            .await
            .values()
            .filter(|doc| Self::matches(doc, query))
            .cloned()
            .collect();

        match query.sort_by.as_deref() {
            Some("price_per_hour") => hits.sort_by(|a, b| {
                a.price_per_hour
                    .partial_cmp(&b.price_per_hour)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            Some("name") => hits.sort_by(|a, b| a.name.cmp(&b.name)),
            _ => hits.sort_by(|a, b| a.id.cmp(&b.id)),
        }
        if query.sort_desc {
            hits.reverse();
        }

        let total = hits.len() as i64;
        let start = ((query.page - 1) * query.size) as usize;
        let page = hits
            .into_iter()
            .skip(start)
            .take(query.size as usize)
            .collect();
        Ok(SearchResult::new(page, total, query.page, query.size))
    }
}

/// Fields API stand-in.
#[derive(Default)]
pub struct StubSource {
    records: Mutex<HashMap<String, FieldRecord>>,
    fetches: AtomicUsize,
    fail: AtomicBool,
}

impl StubSource {
    pub async fn put(&self, record: FieldRecord) {
        self.records.lock().await.insert(record.id.clone(), record);
    }

    pub async fn remove(&self, id: &str) {
        self.records.lock().await.remove(id);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FieldSource for StubSource {
    async fn fetch_field(&self, id: &str) -> Result<Option<FieldRecord>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.records.lock().await.get(id).cloned())
    }
}

/// Cache tier without expiry that counts every call.
pub struct CountingCache {
    tier: CacheTier,
    entries: Mutex<HashMap<String, SearchResult>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub clears: AtomicUsize,
}

impl CountingCache {
    pub fn new(tier: CacheTier) -> Self {
        Self {
            tier,
            entries: Mutex::new(HashMap::new()),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchCache for CountingCache {
    fn tier(&self) -> CacheTier {
        self.tier
    }

    async fn get(&self, key: &str) -> Option<SearchResult> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &SearchResult) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.clone());
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    async fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().await.clear();
    }
}

pub struct Harness {
    pub index: Arc<MemoryIndex>,
    pub source: Arc<StubSource>,
    pub local: Arc<CountingCache>,
    pub shared: Arc<CountingCache>,
}

impl Harness {
    pub fn new(index: MemoryIndex) -> Self {
        Self {
            index: Arc::new(index),
            source: Arc::new(StubSource::default()),
            local: Arc::new(CountingCache::new(CacheTier::Local)),
            shared: Arc::new(CountingCache::new(CacheTier::Shared)),
        }
    }

    pub fn tiers(&self) -> CacheTiers {
        CacheTiers::new(self.local.clone(), self.shared.clone())
    }

    pub fn index_repo(&self) -> Arc<dyn IndexRepository> {
        self.index.clone()
    }

    pub fn field_source(&self) -> Arc<dyn FieldSource> {
        self.source.clone()
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    addr
}

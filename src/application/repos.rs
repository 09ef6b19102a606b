//! Traits describing the external adapters the application layer drives.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::fields::{FieldDocument, FieldRecord, SearchQuery, SearchResult};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("index transport error: {0}")]
    Transport(String),
    #[error("index request timed out")]
    Timeout,
    #[error("index returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid index response: {0}")]
    Decode(String),
    #[error("invalid index request: {0}")]
    Request(String),
}

/// Full-text index holding [`FieldDocument`]s.
///
/// `update` is a full replace, identical to `index`, so redelivered events
/// are harmless.
#[async_trait]
pub trait IndexRepository: Send + Sync {
    async fn index(&self, document: &FieldDocument) -> Result<(), RepoError>;

    async fn update(&self, document: &FieldDocument) -> Result<(), RepoError> {
        self.index(document).await
    }

    /// Deleting an id that is not indexed succeeds.
    async fn delete(&self, id: &str) -> Result<(), RepoError>;

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, RepoError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("fields api transport error: {0}")]
    Transport(String),
    #[error("fields api request timed out")]
    Timeout,
    #[error("fields api returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid fields api response: {0}")]
    Decode(String),
    #[error("invalid fields api request: {0}")]
    Request(String),
}

/// Owning service holding the canonical field records.
#[async_trait]
pub trait FieldSource: Send + Sync {
    /// `Ok(None)` when the record no longer exists.
    async fn fetch_field(&self, id: &str) -> Result<Option<FieldRecord>, SourceError>;
}

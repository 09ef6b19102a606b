//! Solr-backed [`IndexRepository`].

mod decode;
mod query;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use crate::application::repos::{IndexRepository, RepoError};
use crate::domain::fields::{FieldDocument, SearchQuery, SearchResult};
use crate::infra::error::InfraError;

pub use query::SelectParams;

const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone)]
pub struct SolrRepository {
    client: Client,
    base: Url,
}

impl SolrRepository {
    /// `base_url` is the core URL, e.g. `http://solr:8983/solr/fields`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, InfraError> {
        let mut base = Url::parse(base_url).map_err(|err| {
            InfraError::configuration(format!("invalid index url `{base_url}`: {err}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RepoError> {
        self.base
            .join(path)
            .map_err(|err| RepoError::Request(err.to_string()))
    }

    async fn post_update(&self, body: Value) -> Result<(), RepoError> {
        let mut url = self.endpoint("update")?;
        url.query_pairs_mut().append_pair("commit", "true");

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        ensure_success(response).await.map(|_| ())
    }
}

#[async_trait]
impl IndexRepository for SolrRepository {
    #[instrument(skip(self, document), fields(id = %document.id))]
    async fn index(&self, document: &FieldDocument) -> Result<(), RepoError> {
        self.post_update(json!({ "add": [document] })).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), RepoError> {
        self.post_update(json!({ "delete": { "id": id } })).await
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, RepoError> {
        let params = SelectParams::from_query(query);
        let mut url = self.endpoint("select")?;
        url.query_pairs_mut().extend_pairs(params.pairs());
        debug!(q = %params.q, fq = %params.fq, start = params.start, "Querying index");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        let body = ensure_success(response).await?;

        decode::decode_select(&body, params.page, params.size)
    }
}

fn transport_error(err: reqwest::Error) -> RepoError {
    if err.is_timeout() {
        RepoError::Timeout
    } else {
        RepoError::Transport(err.to_string())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<Vec<u8>, RepoError> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_error)?;
    if status.is_success() {
        return Ok(body.to_vec());
    }
    Err(RepoError::Status {
        status: status.as_u16(),
        body: truncated(&body),
    })
}

fn truncated(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars().take(ERROR_BODY_LIMIT).collect()
}

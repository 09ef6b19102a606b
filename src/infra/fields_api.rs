//! HTTP client for the fields API, the owner of canonical field records.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::application::repos::{FieldSource, SourceError};
use crate::domain::fields::FieldRecord;
use crate::infra::error::InfraError;

const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone)]
pub struct HttpFieldSource {
    client: Client,
    base: Url,
}

impl HttpFieldSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        let mut base = Url::parse(base_url).map_err(|err| {
            InfraError::configuration(format!("invalid fields api url `{base_url}`: {err}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { client, base })
    }

    fn field_url(&self, id: &str) -> Result<Url, SourceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Request("fields api url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["fields", id]);
        Ok(url)
    }
}

#[async_trait]
impl FieldSource for HttpFieldSource {
    #[instrument(skip(self))]
    async fn fetch_field(&self, id: &str) -> Result<Option<FieldRecord>, SourceError> {
        let url = self.field_url(id)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Field not found at source");
            return Ok(None);
        }

        let body = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body)
                    .chars()
                    .take(ERROR_BODY_LIMIT)
                    .collect(),
            });
        }

        serde_json::from_slice::<FieldRecord>(&body)
            .map(Some)
            .map_err(|err| SourceError::Decode(err.to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transport(err.to_string())
    }
}

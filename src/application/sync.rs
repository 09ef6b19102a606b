//! Keeps the search index in line with the fields API.
//!
//! Each delivered change event clears both cache tiers and then re-indexes or
//! removes the affected field. Failures are logged and reported as an
//! outcome; nothing here is retried and nothing propagates to the caller.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, info, instrument, warn};

use crate::application::repos::{FieldSource, IndexRepository};
use crate::cache::CacheTiers;
use crate::domain::events::{ChangeEvent, ChangeOperation};
use crate::domain::fields::FieldDocument;

const METRIC_SYNC_OUTCOME: &str = "field_search_sync_events_total";
const METRIC_SYNC_MS: &str = "field_search_sync_ms";

/// What happened to a single delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The payload could not be decoded; the event was dropped.
    Malformed,
    /// Not a field event, or an operation this service does not handle.
    Ignored,
    /// The field was (re)indexed.
    Indexed,
    /// The field was removed from the index.
    Removed,
    /// The field no longer exists at the source; nothing was indexed.
    SourceMissing,
    /// Fetching or indexing failed; the event was abandoned.
    Failed,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Malformed => "malformed",
            SyncOutcome::Ignored => "ignored",
            SyncOutcome::Indexed => "indexed",
            SyncOutcome::Removed => "removed",
            SyncOutcome::SourceMissing => "source_missing",
            SyncOutcome::Failed => "failed",
        }
    }
}

pub struct IndexSynchronizer {
    index: Arc<dyn IndexRepository>,
    source: Arc<dyn FieldSource>,
    caches: CacheTiers,
}

impl IndexSynchronizer {
    pub fn new(
        index: Arc<dyn IndexRepository>,
        source: Arc<dyn FieldSource>,
        caches: CacheTiers,
    ) -> Self {
        Self {
            index,
            source,
            caches,
        }
    }

    /// Decode and apply a raw bus payload.
    pub async fn handle_payload(&self, payload: &[u8]) -> SyncOutcome {
        let started_at = Instant::now();
        let outcome = match serde_json::from_slice::<ChangeEvent>(payload) {
            Ok(event) => self.apply(&event).await,
            Err(err) => {
                warn!(error = %err, bytes = payload.len(), "Dropping undecodable change event");
                SyncOutcome::Malformed
            }
        };

        counter!(METRIC_SYNC_OUTCOME, "outcome" => outcome.as_str()).increment(1);
        histogram!(METRIC_SYNC_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    /// Apply an already decoded event.
    #[instrument(
        skip(self, event),
        fields(
            operation = %event.operation,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id
        )
    )]
    pub async fn apply(&self, event: &ChangeEvent) -> SyncOutcome {
        if !event.is_field() {
            debug!("Ignoring change event for untracked entity type");
            return SyncOutcome::Ignored;
        }

        info!("Received field change event");

        // Any field write may affect any cached result page.
        self.caches.clear_all().await;

        match event.operation() {
            Some(ChangeOperation::Create) => self.upsert(&event.entity_id, false).await,
            Some(ChangeOperation::Update) => self.upsert(&event.entity_id, true).await,
            Some(ChangeOperation::Delete) => self.remove(&event.entity_id).await,
            None => {
                warn!("Ignoring change event with unknown operation");
                SyncOutcome::Ignored
            }
        }
    }

    async fn upsert(&self, id: &str, is_update: bool) -> SyncOutcome {
        let record = match self.source.fetch_field(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Field no longer exists at the source; skipping index");
                return SyncOutcome::SourceMissing;
            }
            Err(err) => {
                error!(error = %err, "Failed to fetch field from fields API");
                return SyncOutcome::Failed;
            }
        };

        let document = FieldDocument::from(record);
        let result = if is_update {
            self.index.update(&document).await
        } else {
            self.index.index(&document).await
        };

        match result {
            Ok(()) => {
                info!(name = %document.name, "Field indexed");
                SyncOutcome::Indexed
            }
            Err(err) => {
                error!(error = %err, "Failed to index field");
                SyncOutcome::Failed
            }
        }
    }

    async fn remove(&self, id: &str) -> SyncOutcome {
        match self.index.delete(id).await {
            Ok(()) => {
                info!("Field removed from index");
                SyncOutcome::Removed
            }
            Err(err) => {
                error!(error = %err, "Failed to remove field from index");
                SyncOutcome::Failed
            }
        }
    }
}

//! Change-event bus.
//!
//! Events travel over a Redis stream read through a consumer group. A
//! subscriber task moves entries into a bounded channel and a single worker
//! drains that channel into the [`IndexSynchronizer`]. Entries are
//! acknowledged only after the synchronizer has seen them, so a crash between
//! delivery and handling leaves the entry pending for redelivery.
//!
//! [`IndexSynchronizer`]: crate::application::sync::IndexSynchronizer

mod redis_stream;
mod worker;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::{
    DEFAULT_BUS_BATCH_SIZE, DEFAULT_BUS_BLOCK_MS, DEFAULT_BUS_CHANNEL_CAPACITY,
    DEFAULT_BUS_COMMAND_TIMEOUT_MS, DEFAULT_BUS_CONSUMER, DEFAULT_BUS_GROUP, DEFAULT_BUS_STREAM,
};
use crate::domain::events::ChangeEvent;
use crate::infra::error::InfraError;

pub use redis_stream::RedisStreamBus;
pub use worker::run_event_worker;


#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode change event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("bus operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Connection and consumer-group parameters for the bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub url: String,
    pub stream: String,
    pub group: String,
    pub consumer: String,
    /// Entries buffered between the subscriber and the worker.
    pub channel_capacity: NonZeroUsize,
    /// Entries requested per `XREADGROUP`.
    pub batch_size: NonZeroUsize,
    /// How long a single read blocks waiting for new entries.
    pub block: Duration,
    /// Upper bound for `XACK`, `XADD` and group creation. Reads may take
    /// `block` plus this bound.
    pub command_timeout: Duration,
}

impl BusConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: DEFAULT_BUS_STREAM.to_string(),
            group: DEFAULT_BUS_GROUP.to_string(),
            consumer: DEFAULT_BUS_CONSUMER.to_string(),
            channel_capacity: NonZeroUsize::new(DEFAULT_BUS_CHANNEL_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            batch_size: NonZeroUsize::new(DEFAULT_BUS_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            block: Duration::from_millis(DEFAULT_BUS_BLOCK_MS),
            command_timeout: Duration::from_millis(DEFAULT_BUS_COMMAND_TIMEOUT_MS),
        }
    }
}

impl TryFrom<&crate::config::BusSettings> for BusConfig {
    type Error = InfraError;

    fn try_from(settings: &crate::config::BusSettings) -> Result<Self, Self::Error> {
        let url = settings
            .url
            .clone()
            .ok_or_else(|| InfraError::configuration("bus url is not configured"))?;
        Ok(Self {
            url,
            stream: settings.stream.clone(),
            group: settings.group.clone(),
            consumer: settings.consumer.clone(),
            channel_capacity: settings.channel_capacity,
            batch_size: settings.batch_size,
            block: settings.block,
            command_timeout: settings.command_timeout,
        })
    }
}

/// Settles a delivery with the bus once it has been handled.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self, entry_id: &str) -> Result<(), BusError>;
}

/// One bus entry handed to the worker.
pub struct Delivery {
    pub entry_id: String,
    pub routing_key: Option<String>,
    pub payload: Vec<u8>,
    acker: Option<Arc<dyn Acknowledge>>,
}

impl Delivery {
    pub fn new(entry_id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            entry_id: entry_id.into(),
            routing_key: None,
            payload: payload.into(),
            acker: None,
        }
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    pub fn with_acker(mut self, acker: Arc<dyn Acknowledge>) -> Self {
        self.acker = Some(acker);
        self
    }

    /// Acknowledge the entry; failures leave it pending and are only logged.
    pub async fn acknowledge(&self) {
        let Some(acker) = &self.acker else {
            return;
        };
        if let Err(err) = acker.ack(&self.entry_id).await {
            warn!(entry_id = %self.entry_id, error = %err, "Failed to acknowledge bus entry");
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("entry_id", &self.entry_id)
            .field("routing_key", &self.routing_key)
            .field("payload_bytes", &self.payload.len())
            .finish()
    }
}

/// Publishing side of the bus, used by services that own records.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Returns the id the bus assigned to the entry.
    async fn publish(&self, event: &ChangeEvent) -> Result<String, BusError>;
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::events::ChangeEvent;

use super::{Acknowledge, BusConfig, BusError, Delivery, EventPublisher};

const ROUTING_KEY_FIELD: &str = "routing_key";
const PAYLOAD_FIELD: &str = "payload";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Read position for entries already delivered to this consumer but not acked.
const PENDING_ID: &str = "0";
/// Read position for entries never delivered to any consumer of the group.
const NEW_ID: &str = ">";

/// Redis Streams implementation of the bus.
#[derive(Clone)]
pub struct RedisStreamBus {
    client: Client,
    commands: ConnectionManager,
    config: BusConfig,
}

impl RedisStreamBus {
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let client = Client::open(crate::cache::redis_url(&config.url))?;
        let commands = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client.clone()))
            .await
            .map_err(|_| BusError::Timeout(CONNECT_TIMEOUT))??;

        Ok(Self {
            client,
            commands,
            config: config.clone(),
        })
    }

    /// Create the consumer group (and the stream) unless it already exists.
    pub async fn ensure_group(&self) -> Result<(), BusError> {
        let mut conn = self.commands.clone();
        let created: Result<(), BusError> = bounded(
            self.config.command_timeout,
            conn.xgroup_create_mkstream(&self.config.stream, &self.config.group, "$"),
        )
        .await;
        match created {
            Ok(()) => {
                info!(
                    stream = %self.config.stream,
                    group = %self.config.group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(BusError::Redis(err)) if err.code() == Some("BUSYGROUP") => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Start the subscriber task.
    ///
    /// The task stops when `shutdown` flips to `true` or the worker side of
    /// `deliveries` is dropped. Dropping its sender closes the channel, which
    /// lets the worker drain and exit.
    pub fn spawn_subscriber(
        &self,
        deliveries: mpsc::Sender<Delivery>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("Bus subscriber stopping");
                }
                _ = bus.subscribe(deliveries) => {}
            }
        })
    }

    async fn subscribe(&self, deliveries: mpsc::Sender<Delivery>) {
        let acker: Arc<dyn Acknowledge> = Arc::new(StreamAck {
            conn: self.commands.clone(),
            stream: self.config.stream.clone(),
            group: self.config.group.clone(),
            timeout: self.config.command_timeout,
        });
        let mut reader: Option<MultiplexedConnection> = None;
        let mut position = PENDING_ID.to_string();

        info!(
            stream = %self.config.stream,
            group = %self.config.group,
            consumer = %self.config.consumer,
            "Bus subscriber started"
        );

        loop {
            if reader.is_none() {
                match self.open_reader().await {
                    Ok(conn) => reader = Some(conn),
                    Err(err) => {
                        warn!(error = %err, "Bus reader connection failed; retrying");
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                }
            }
            let Some(conn) = reader.as_mut() else {
                continue;
            };

            let entries = match self.read_batch(conn, &position).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, "Bus read failed; reconnecting");
                    reader = None;
                    if let Err(err) = self.ensure_group().await {
                        warn!(error = %err, "Failed to ensure consumer group");
                    }
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            let next = next_position(&position, &entries);
            if next != position && next == NEW_ID {
                debug!("No pending entries left; reading new entries");
            }
            position = next;

            if entries.is_empty() {
                continue;
            }

            for entry in entries {
                let delivery = self.to_delivery(&entry, acker.clone());
                if deliveries.send(delivery).await.is_err() {
                    info!("Event worker gone; bus subscriber stopping");
                    return;
                }
            }
        }
    }

    async fn open_reader(&self) -> Result<MultiplexedConnection, BusError> {
        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| BusError::Timeout(CONNECT_TIMEOUT))??;
        Ok(conn)
    }

    async fn read_batch(
        &self,
        conn: &mut MultiplexedConnection,
        position: &str,
    ) -> Result<Vec<StreamId>, BusError> {
        let options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(self.config.batch_size.get())
            .block(self.config.block.as_millis() as usize);

        let reply: Option<StreamReadReply> = bounded(
            self.config.block + self.config.command_timeout,
            conn.xread_options(&[&self.config.stream], &[position], &options),
        )
        .await?;

        Ok(reply
            .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default())
    }

    fn to_delivery(&self, entry: &StreamId, acker: Arc<dyn Acknowledge>) -> Delivery {
        let payload: Vec<u8> = entry.get(PAYLOAD_FIELD).unwrap_or_default();
        let mut delivery = Delivery::new(entry.id.clone(), payload).with_acker(acker);
        if let Some(routing_key) = entry.get::<String>(ROUTING_KEY_FIELD) {
            delivery = delivery.with_routing_key(routing_key);
        }
        delivery
    }
}

#[async_trait]
impl EventPublisher for RedisStreamBus {
    async fn publish(&self, event: &ChangeEvent) -> Result<String, BusError> {
        let payload = serde_json::to_vec(event)?;
        let routing_key = event.routing_key();
        let mut conn = self.commands.clone();

        let id: String = bounded(
            self.config.command_timeout,
            conn.xadd(
                &self.config.stream,
                "*",
                &[
                    (ROUTING_KEY_FIELD, routing_key.into_bytes()),
                    (PAYLOAD_FIELD, payload),
                ],
            ),
        )
        .await?;

        info!(
            entry_id = %id,
            operation = %event.operation,
            entity_id = %event.entity_id,
            "Published change event"
        );
        Ok(id)
    }
}

/// Where the next `XREADGROUP` starts.
///
/// While replaying this consumer's pending entries the cursor moves past the
/// last entry returned, so an entry still waiting in the channel is not read
/// again. An empty pending read switches to entries never delivered.
fn next_position(position: &str, entries: &[StreamId]) -> String {
    if position == NEW_ID {
        return NEW_ID.to_string();
    }
    match entries.last() {
        Some(last) => last.id.clone(),
        None => NEW_ID.to_string(),
    }
}

async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, BusError>
where
    F: Future<Output = Result<T, redis::RedisError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(BusError::from),
        Err(_) => Err(BusError::Timeout(limit)),
    }
}

struct StreamAck {
    conn: ConnectionManager,
    stream: String,
    group: String,
    timeout: Duration,
}

#[async_trait]
impl Acknowledge for StreamAck {
    async fn ack(&self, entry_id: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let _: usize = bounded(
            self.timeout,
            conn.xack(&self.stream, &self.group, &[entry_id]),
        )
        .await?;
        Ok(())
    }
}

mod support;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use field_search::application::sync::IndexSynchronizer;
use field_search::domain::events::{ChangeEvent, ChangeOperation};
use field_search::infra::bus::{Acknowledge, BusError, Delivery, run_event_worker};

use support::{Harness, MemoryIndex, document, record};

#[derive(Default)]
struct RecordingAck {
    acked: Mutex<Vec<String>>,
}

#[async_trait]
impl Acknowledge for RecordingAck {
    async fn ack(&self, entry_id: &str) -> Result<(), BusError> {
        self.acked.lock().await.push(entry_id.to_string());
        Ok(())
    }
}

fn delivery(id: &str, event: &ChangeEvent, ack: &Arc<RecordingAck>) -> Delivery {
    Delivery::new(id, serde_json::to_vec(event).expect("encode"))
        .with_routing_key(event.routing_key())
        .with_acker(ack.clone())
}

#[tokio::test]
async fn worker_handles_every_delivery_in_order_and_acks_it() {
    let harness = Harness::new(MemoryIndex::with_documents([document(
        "abc123", "Old", "soccer", 20.0, true,
    )]));
    harness.source.put(record("f1", "Cancha Norte", "soccer", 25.0)).await;
    let synchronizer = Arc::new(IndexSynchronizer::new(
        harness.index_repo(),
        harness.field_source(),
        harness.tiers(),
    ));
    let ack = Arc::new(RecordingAck::default());

    let (tx, rx) = mpsc::channel(4);
    let worker = tokio::spawn(run_event_worker(rx, synchronizer));

    tx.send(delivery("1-0", &ChangeEvent::field(ChangeOperation::Create, "f1"), &ack))
        .await
        .expect("send");
    tx.send(Delivery::new("2-0", b"garbage".to_vec()).with_acker(ack.clone()))
        .await
        .expect("send");
    tx.send(delivery("3-0", &ChangeEvent::field(ChangeOperation::Delete, "abc123"), &ack))
        .await
        .expect("send");
    drop(tx);

    let handled = worker.await.expect("worker joins");

    assert_eq!(handled, 3);
    assert_eq!(*ack.acked.lock().await, vec!["1-0", "2-0", "3-0"]);
    assert!(harness.index.get("f1").await.is_some());
    assert!(harness.index.get("abc123").await.is_none());
}

#[tokio::test]
async fn worker_survives_failing_events() {
    let harness = Harness::new(MemoryIndex::default());
    harness.source.fail(true);
    let synchronizer = Arc::new(IndexSynchronizer::new(
        harness.index_repo(),
        harness.field_source(),
        harness.tiers(),
    ));
    let ack = Arc::new(RecordingAck::default());

    let (tx, rx) = mpsc::channel(4);
    let worker = tokio::spawn(run_event_worker(rx, synchronizer));

    for n in 0..3 {
        tx.send(delivery(
            &format!("{n}-0"),
            &ChangeEvent::field(ChangeOperation::Update, format!("f{n}")),
            &ack,
        ))
        .await
        .expect("send");
    }
    drop(tx);

    assert_eq!(worker.await.expect("worker joins"), 3);
    assert_eq!(ack.acked.lock().await.len(), 3);
    assert_eq!(harness.source.fetches(), 3);
}

#[tokio::test]
async fn closed_empty_channel_stops_the_worker() {
    let harness = Harness::new(MemoryIndex::default());
    let synchronizer = Arc::new(IndexSynchronizer::new(
        harness.index_repo(),
        harness.field_source(),
        harness.tiers(),
    ));
    let (tx, rx) = mpsc::channel::<Delivery>(1);
    drop(tx);

    assert_eq!(run_event_worker(rx, synchronizer).await, 0);
}

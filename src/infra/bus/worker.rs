use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::sync::IndexSynchronizer;

use super::Delivery;

/// Drain `deliveries` into the synchronizer, one event at a time.
///
/// Every delivery is acknowledged after handling, whatever the outcome; a
/// failed event is abandoned rather than retried. Returns the number of
/// deliveries handled once the channel is closed and empty.
pub async fn run_event_worker(
    mut deliveries: mpsc::Receiver<Delivery>,
    synchronizer: Arc<IndexSynchronizer>,
) -> usize {
    let mut handled = 0usize;

    while let Some(delivery) = deliveries.recv().await {
        let outcome = synchronizer.handle_payload(&delivery.payload).await;
        debug!(
            entry_id = %delivery.entry_id,
            routing_key = delivery.routing_key.as_deref().unwrap_or(""),
            outcome = outcome.as_str(),
            "Change event handled"
        );
        delivery.acknowledge().await;
        handled += 1;
    }

    info!(handled, "Event worker stopped");
    handled
}

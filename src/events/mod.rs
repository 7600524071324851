use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

/// Events emitted by the services after their transaction commits.
/// Consumers observe them through [`process_events`]; a send failure is
/// logged and never surfaced to the request that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Delivery order events
    DeliveryOrderCreated(Uuid),
    DeliveryOrderUpdated(Uuid),
    DeliveryOrderDeleted(Uuid),
    DeliveryOrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Shipment events
    ShipmentCreated(Uuid),
    ShipmentUpdated(Uuid),
    ShipmentCompleted(Uuid),
    ShipmentDeleted(Uuid),

    // Master data events
    CustomerCreated(Uuid),
    CustomerUpdated(Uuid),
    CustomerDeleted(Uuid),
    ItemCreated(Uuid),
    ItemUpdated(Uuid),
    ItemDeleted(Uuid),
    FleetCreated(Uuid),
    FleetUpdated(Uuid),
    FleetDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

/// Consumes events from the channel until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "processing event");
    }
    info!("event channel closed; consumer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender
            .send(Event::DeliveryOrderCreated(order_id))
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::DeliveryOrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out
        sender
            .send_or_log(Event::ShipmentCreated(Uuid::new_v4()))
            .await;
    }
}

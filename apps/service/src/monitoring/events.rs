use tokio::sync::broadcast;
use tracing::trace;

use super::types::EndpointStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    StatusChanged { name: String, from: EndpointStatus, to: EndpointStatus },
    DownRecorded { name: String, line: String },
    PersistFailed { name: String, error: String },
    TickSkipped { name: String },
}

/// Fan-out of monitor events to whoever is listening
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: MonitorEvent) {
        // No receivers is fine
        if self.tx.send(event).is_err() {
            trace!("Monitor event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

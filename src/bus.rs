//! Fan-out publication of alerts to any number of subscribers

use tokio::sync::broadcast;
use tracing::trace;

use crate::Alert;

/// Publish/subscribe channel for alerts raised during zone refreshes
#[derive(Debug, Clone)]
pub struct AlertBus {
    sender: broadcast::Sender<Alert>,
}

impl AlertBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an alert; having no subscribers is not an error
    pub fn publish(&self, alert: Alert) {
        let alert_id = alert.alert_id;
        match self.sender.send(alert) {
            Ok(receivers) => trace!("published alert {} to {} subscribers", alert_id, receivers),
            Err(_) => trace!("no alert subscribers (this is OK)"),
        }
    }

    /// A lagging subscriber loses the oldest alerts, it never blocks publishers
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

//! Webhook delivery of alerts published on the alert bus

use reqwest::Client;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::Alert;
use crate::config::Webhook;

#[derive(Debug)]
enum NotifierCommand {
    Shutdown,
}

/// Bus subscriber that POSTs every alert at or above the configured severity
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
    alert_rx: broadcast::Receiver<Alert>,
    command_rx: mpsc::Receiver<NotifierCommand>,
}

impl WebhookNotifier {
    fn new(
        webhook: Webhook,
        alert_rx: broadcast::Receiver<Alert>,
        command_rx: mpsc::Receiver<NotifierCommand>,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            webhook,
            alert_rx,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(url = %self.webhook.url))]
    async fn run(mut self) {
        debug!("starting webhook notifier");

        loop {
            tokio::select! {
                result = self.alert_rx.recv() => match result {
                    Ok(alert) => self.handle_alert(&alert).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("webhook notifier lagged, skipped {skipped} alerts");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("alert channel closed, shutting down");
                        break;
                    }
                },
                cmd = self.command_rx.recv() => match cmd {
                    Some(NotifierCommand::Shutdown) | None => {
                        debug!("webhook notifier shutting down");
                        break;
                    }
                },
            }
        }
    }

    async fn handle_alert(&self, alert: &Alert) {
        if alert.severity < self.webhook.min_severity {
            trace!("alert {} below webhook threshold", alert.alert_id);
            return;
        }

        let payload = json!({
            "message": alert.message,
            "alert": alert,
            "timestamp": alert.timestamp.to_rfc3339()
        });

        match self.client.post(&self.webhook.url).json(&payload).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    info!("sent webhook alert {}", alert.alert_id);
                } else {
                    error!("webhook alert failed with status: {}", response.status());
                }
            }
            Err(e) => {
                error!("failed to send webhook alert: {}", e);
            }
        }
    }
}

/// Handle for the webhook notifier task
#[derive(Clone)]
pub struct NotifierHandle {
    sender: mpsc::Sender<NotifierCommand>,
}

impl NotifierHandle {
    pub fn spawn(webhook: Webhook, alert_rx: broadcast::Receiver<Alert>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let notifier = WebhookNotifier::new(webhook, alert_rx, cmd_rx);

        tokio::spawn(notifier.run());

        Self { sender: cmd_tx }
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(NotifierCommand::Shutdown).await;
    }
}

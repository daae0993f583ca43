use std::{sync::Arc, time::Duration};

use log::*;
use recon_engine::traits::{DownstreamError, Notification, Notifier};
use reqwest::Client;

/// Delivers notifications by posting them as JSON to the notification service.
///
/// Without a configured endpoint, notifications are written to the log and reported as delivered.
#[derive(Clone)]
pub struct HttpNotifier {
    url: Option<String>,
    client: Arc<Client>,
}

impl HttpNotifier {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, DownstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DownstreamError::Unavailable(format!("Could not build the notification client. {e}")))?;
        Ok(Self { url, client: Arc::new(client) })
    }
}

impl Notifier for HttpNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DownstreamError> {
        let Some(url) = &self.url else {
            info!(
                "📨️ [{}] {:?} for order {}",
                notification.recipient, notification.kind, notification.order_id
            );
            return Ok(());
        };
        trace!("📨️ Posting notification for {} to {url}", notification.order_id);
        let response = self.client.post(url).json(&notification).send().await.map_err(|e| {
            if e.is_timeout() {
                DownstreamError::Timeout
            } else {
                DownstreamError::Unavailable(e.to_string())
            }
        })?;
        let status = response.status();
        if status.is_success() {
            debug!("📨️ Notified {} about order {}", notification.recipient, notification.order_id);
            Ok(())
        } else if status.is_server_error() {
            Err(DownstreamError::Unavailable(format!("Notification service returned {status}")))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DownstreamError::Rejected(format!("{status}: {body}")))
        }
    }
}

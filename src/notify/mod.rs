use async_trait::async_trait;
use std::sync::Arc;

use crate::metrics::Metrics;

mod messages;

pub use messages::*;

// ============================================================================
// Notifier - best-effort, fire-and-forget customer messages
// ============================================================================
//
// Delivery happens on a spawned task after the business transaction has
// committed. Failures are logged and counted, never surfaced to the caller.
//
// ============================================================================

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, message: &str) -> anyhow::Result<()>;
}

/// Simulated WhatsApp/SMS channel that only writes to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
        tracing::info!(recipient = %recipient, message = %message, "📱 Notification sent (simulated)");
        Ok(())
    }
}

/// Spawn delivery of `message`. A missing recipient is skipped.
pub fn dispatch(
    notifier: &Arc<dyn Notifier>,
    metrics: &Arc<Metrics>,
    recipient: Option<String>,
    message: String,
) {
    let Some(recipient) = recipient else {
        tracing::debug!("No recipient for notification, skipping");
        return;
    };

    let notifier = notifier.clone();
    let metrics = metrics.clone();

    tokio::spawn(async move {
        match notifier.notify(&recipient, &message).await {
            Ok(()) => metrics.record_notification(true),
            Err(e) => {
                tracing::warn!(recipient = %recipient, error = %e, "Notification delivery failed");
                metrics.record_notification(false);
            }
        }
    });
}

// File: kickbot-core/src/notifier.rs

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use kickbot_common::traits::Notifier;

/// Stands in for the admin layer's real notification service (spec §6). Logs
/// every call at `info` and returns immediately; callers never await delivery.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, template_id: &str, recipients: &[Uuid], data: Value) {
        info!(template_id, recipient_count = recipients.len(), ?data, "notify");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn notify_does_not_panic_with_no_recipients() {
        let notifier = TracingNotifier;
        notifier.notify("stream_reminder", &[], json!({"title": "going live"})).await;
    }
}

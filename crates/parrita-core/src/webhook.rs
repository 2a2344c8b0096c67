//! Best-effort webhook fan-out.
//!
//! After a reply finishes, matching automation hooks are notified one by
//! one. Every send is wrapped in its own failure boundary: a hook that
//! errors is logged and skipped, and nothing here ever affects the
//! response already streamed to the visitor. No retry, no backoff, no
//! delivery guarantee.

use crate::model::Webhook;
use crate::storage::SqliteStorage;

/// Trigger fired when a conversation qualifies.
pub const EVENT_CONVERSATION_QUALIFIED: &str = "conversation_qualified";
/// Trigger fired when a reply presents an automation blueprint.
pub const EVENT_BLUEPRINT_GENERATED: &str = "blueprint_generated";

/// Load the active hooks for `trigger_event` and POST `payload` to each,
/// sequentially. Returns the number of successful deliveries.
pub async fn notify_event(
    storage: &SqliteStorage,
    client: &reqwest::Client,
    trigger_event: &str,
    payload: &serde_json::Value,
) -> usize {
    let webhooks = match storage.active_webhooks(trigger_event).await {
        Ok(hooks) => hooks,
        Err(e) => {
            tracing::warn!(trigger_event, error = %e, "failed to load webhooks");
            return 0;
        }
    };

    let mut delivered = 0;
    for webhook in &webhooks {
        if send_one(client, webhook, payload).await {
            delivered += 1;
        }
    }
    delivered
}

async fn send_one(
    client: &reqwest::Client,
    webhook: &Webhook,
    payload: &serde_json::Value,
) -> bool {
    match client.post(&webhook.webhook_url).json(payload).send().await {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            tracing::warn!(
                url = %webhook.webhook_url,
                status = %resp.status(),
                "webhook returned non-success status"
            );
            false
        }
        Err(e) => {
            tracing::warn!(url = %webhook.webhook_url, error = %e, "webhook delivery failed");
            false
        }
    }
}

//! Notification Sink — delivery of "new match" / "new message" signals.
//!
//! The engine only emits intents; delivery (push, email, in-app badge) is the
//! consumer's concern. The default sink pushes serialized intents onto a
//! Redis list drained by an out-of-process worker. Delivery is best-effort:
//! a failed push is warn-logged and never fails the triggering operation.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Queue key the default sink pushes to.
pub const NOTIFICATION_QUEUE_KEY: &str = "notifications:intents";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationIntent {
    MatchCreated {
        match_id: Uuid,
        lost_item_id: Uuid,
        found_item_id: Uuid,
        confidence: f64,
        /// Both reporters — each gets a "you have a new match" signal.
        recipients: Vec<Uuid>,
    },
    MessageReceived {
        message_id: Uuid,
        match_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
    },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, intent: NotificationIntent) -> Result<()>;
}

/// Fire-and-forget helper used at every emission site: serializes failure
/// into a warning instead of an error.
pub async fn emit(sink: &dyn NotificationSink, intent: NotificationIntent) {
    if let Err(e) = sink.deliver(intent).await {
        warn!("Notification delivery failed: {e}");
    }
}

/// Default sink: LPUSH serialized intents onto a Redis list.
pub struct RedisNotifier {
    client: redis::Client,
}

impl RedisNotifier {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSink for RedisNotifier {
    async fn deliver(&self, intent: NotificationIntent) -> Result<()> {
        let payload = serde_json::to_string(&intent)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.lpush::<_, _, ()>(NOTIFICATION_QUEUE_KEY, &payload)
            .await?;
        debug!("Queued notification intent: {payload}");
        Ok(())
    }
}

/// Log-only sink for tests and local runs without Redis.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn deliver(&self, intent: NotificationIntent) -> Result<()> {
        tracing::info!("Notification intent: {}", serde_json::to_string(&intent)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_serializes_with_kind_tag() {
        let intent = NotificationIntent::MessageReceived {
            message_id: Uuid::nil(),
            match_id: Uuid::nil(),
            from_user_id: Uuid::nil(),
            to_user_id: Uuid::nil(),
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("\"kind\":\"message_received\""));
    }
}

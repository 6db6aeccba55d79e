//! Notification Bus (C13): uniform publish API over the KV/pub-sub store.
//!
//! Typed channels in use: `global` (lifecycle), `approval` (approvals),
//! `agent:<sessionId>` (per-run events), `schedule` (job events).

use std::sync::Arc;

use art_kv::KvClient;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

/// Fire-and-forget publisher. Failures are logged, never propagated —
/// the agent loop must never stall on a notification.
#[derive(Clone)]
pub struct NotificationBus {
    kv: Arc<KvClient>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    channel: &'a str,
    event: &'a str,
    data: Value,
    timestamp: String,
}

impl NotificationBus {
    pub fn new(kv: Arc<KvClient>) -> Self {
        Self { kv }
    }

    /// `publish(channel, event, data)` — writes `{channel,event,data,timestamp}`
    /// to `core:notify:<channel>`.
    pub async fn publish(&self, channel: &str, event: &str, data: Value) {
        let envelope = Envelope {
            channel,
            event,
            data,
            timestamp: Utc::now().to_rfc3339(),
        };
        let key = format!("core:notify:{channel}");
        let payload = match serde_json::to_string(&envelope) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, channel, "failed to encode notification");
                return;
            }
        };
        if let Err(e) = self.kv.publish(&key, &payload).await {
            tracing::warn!(error = %e, channel, event, "notification publish failed");
        }
    }

    pub async fn global(&self, event: &str, data: Value) {
        self.publish("global", event, data).await;
    }

    pub async fn approval(&self, event: &str, data: Value) {
        self.publish("approval", event, data).await;
    }

    pub async fn agent(&self, session_id: &str, event: &str, data: Value) {
        self.publish(&format!("agent:{session_id}"), event, data).await;
    }

    pub async fn schedule(&self, event: &str, data: Value) {
        self.publish("schedule", event, data).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_expected_fields() {
        let envelope = Envelope {
            channel: "global",
            event: "session.started",
            data: serde_json::json!({"sessionId": "abc"}),
            timestamp: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["channel"], "global");
        assert_eq!(json["event"], "session.started");
        assert_eq!(json["data"]["sessionId"], "abc");
    }
}

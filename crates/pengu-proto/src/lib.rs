use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages the client sends over the push channel after connecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this connection to a user so the server routes their events here.
    Subscribe { user_id: String },
}

/// Server-pushed events, one category per collection the client mirrors.
///
/// Payloads are opaque records; they carry at least enough fields to drive a
/// human-readable notice (a `title` or `topic`). Only `notification_created`
/// is guaranteed to carry the complete record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    MessageReceived(Value),
    RequestUpdated(Value),
    OrderUpdated(Value),
    WithdrawalUpdated(Value),
    QuoteUpdated(Value),
    ReviewCreated(Value),
    ExpertUpdated(Value),
    NotificationCreated(Value),
    TransactionCreated(Value),
}

impl ServerEvent {
    /// Payload record attached to the event.
    pub fn payload(&self) -> &Value {
        match self {
            ServerEvent::MessageReceived(v)
            | ServerEvent::RequestUpdated(v)
            | ServerEvent::OrderUpdated(v)
            | ServerEvent::WithdrawalUpdated(v)
            | ServerEvent::QuoteUpdated(v)
            | ServerEvent::ReviewCreated(v)
            | ServerEvent::ExpertUpdated(v)
            | ServerEvent::NotificationCreated(v)
            | ServerEvent::TransactionCreated(v) => v,
        }
    }

    /// Best-effort short label for notices, taken from the payload.
    pub fn topic(&self) -> Option<&str> {
        let payload = self.payload();
        payload
            .get("topic")
            .or_else(|| payload.get("title"))
            .and_then(Value::as_str)
    }
}

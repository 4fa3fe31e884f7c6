//! Typed inbound events produced by the classifier.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event from a webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    IncomingMessage(IncomingMessage),
    MessageStatus(MessageStatus),
    AccountAlert(AccountAlert),
}

impl InboundEvent {
    /// Wire discriminant (`incoming_message`, `message_status`, `account_alert`).
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::IncomingMessage(_) => "incoming_message",
            InboundEvent::MessageStatus(_) => "message_status",
            InboundEvent::AccountAlert(_) => "account_alert",
        }
    }
}

/// A message a user sent to the business number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    /// `contacts[0].wa_id`, or the message's `from` when contacts are absent.
    pub sender_phone: String,
    /// `contacts[0].profile.name`.
    pub sender_name: Option<String>,
    pub message_id: String,
    /// Unix seconds as sent by the provider (a string on the wire).
    pub timestamp: String,
    pub content: MessageContent,
    /// `value.metadata` (phone_number_id, display_phone_number).
    pub metadata: Option<Value>,
}

impl IncomingMessage {
    /// Provider message type (`text`, `image`, ...; the raw type string for unknown messages).
    pub fn message_type(&self) -> &str {
        self.content.type_name()
    }
}

/// Type-specific content of an incoming message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Image {
        id: String,
        caption: Option<String>,
    },
    Video {
        id: String,
        caption: Option<String>,
    },
    Audio {
        id: String,
        /// True for voice notes recorded in the app.
        voice: bool,
    },
    Document {
        id: String,
        filename: Option<String>,
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
    /// Raw `contacts` array.
    Contacts(Value),
    /// Raw `interactive` object (button/list replies).
    Interactive(Value),
    /// Raw `button` object (template quick-reply).
    Button(Value),
    /// Raw `order` object.
    Order(Value),
    /// Any other type, or a known type whose body was missing. Keeps the whole message.
    Unknown {
        message_type: String,
        raw: Value,
    },
}

impl MessageContent {
    pub fn type_name(&self) -> &str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Image { .. } => "image",
            MessageContent::Video { .. } => "video",
            MessageContent::Audio { .. } => "audio",
            MessageContent::Document { .. } => "document",
            MessageContent::Location { .. } => "location",
            MessageContent::Contacts(_) => "contacts",
            MessageContent::Interactive(_) => "interactive",
            MessageContent::Button(_) => "button",
            MessageContent::Order(_) => "order",
            MessageContent::Unknown { message_type, .. } => message_type,
        }
    }
}

/// Delivery state reported for a message we sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Status update for an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatus {
    pub message_id: String,
    pub status: DeliveryStatus,
    pub timestamp: Option<String>,
    pub recipient_id: Option<String>,
    /// Provider error objects; present mostly with `failed`.
    pub errors: Option<Vec<Value>>,
    pub metadata: Option<Value>,
}

/// Severity of an account alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    #[default]
    Medium,
    High,
}

impl AlertSeverity {
    /// Missing or unrecognized values map to `Medium`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => AlertSeverity::Low,
            Some("high") => AlertSeverity::High,
            _ => AlertSeverity::Medium,
        }
    }
}

/// Account-level alert (quality rating, restrictions, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAlert {
    pub alert_type: Option<String>,
    pub description: Option<String>,
    pub severity: AlertSeverity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_defaults_to_medium() {
        assert_eq!(AlertSeverity::parse(None), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::parse(Some("HIGH")), AlertSeverity::High);
        assert_eq!(AlertSeverity::parse(Some("low")), AlertSeverity::Low);
        assert_eq!(AlertSeverity::parse(Some("critical")), AlertSeverity::Medium);
    }

    #[test]
    fn delivery_status_keeps_unknown_values() {
        let s: DeliveryStatus = serde_json::from_str(r#""delivered""#).unwrap();
        assert_eq!(s, DeliveryStatus::Delivered);
        let s: DeliveryStatus = serde_json::from_str(r#""deleted""#).unwrap();
        assert_eq!(s, DeliveryStatus::Unknown);
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = InboundEvent::AccountAlert(AccountAlert {
            alert_type: Some("OBA_APPROVED".to_string()),
            description: None,
            severity: AlertSeverity::default(),
        });
        assert_eq!(event.kind(), "account_alert");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "account_alert");
        assert_eq!(json["data"]["severity"], "medium");
    }
}

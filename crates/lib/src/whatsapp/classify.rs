//! Webhook payload classification: `entry[].changes[].value` → [`InboundEvent`]s.
//!
//! The envelope is strict (a payload without an `entry` array is an error); everything below
//! it is lenient: a malformed entry or change is skipped and an off-type field is ignored. Values without messages/statuses/alerts yield nothing, unknown message
//! types are kept raw, and messages missing id/type/timestamp are dropped with a warning.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::events::{
    AccountAlert, AlertSeverity, DeliveryStatus, InboundEvent, IncomingMessage, MessageContent,
    MessageStatus,
};
use super::WhatsAppError;

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    entry: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default, deserialize_with = "lenient")]
    changes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default, deserialize_with = "lenient")]
    value: Option<ChangeValue>,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default, deserialize_with = "lenient")]
    messages: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    statuses: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    contacts: Vec<WireContact>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    account_alert: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireContact {
    wa_id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    profile: Option<WireProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireProfile {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireStatus {
    id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    status: Option<DeliveryStatus>,
    timestamp: Option<Value>,
    recipient_id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    errors: Option<Vec<Value>>,
}

/// Message bodies keyed by the `type` tag. Types not listed here fail to match and are kept raw.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireContent {
    Text { text: WireText },
    Image { image: WireMedia },
    Video { video: WireMedia },
    Audio { audio: WireAudio },
    Document { document: WireDocument },
    Location { location: WireLocation },
    Contacts { contacts: Value },
    Interactive { interactive: Value },
    Button { button: Value },
    Order { order: Value },
}

#[derive(Debug, Deserialize)]
struct WireText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct WireMedia {
    id: String,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAudio {
    id: String,
    #[serde(default)]
    voice: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WireDocument {
    id: String,
    filename: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    latitude: f64,
    longitude: f64,
    name: Option<String>,
    address: Option<String>,
}

/// Off-type fields fall back to their default (logged) instead of failing the delivery. Null is the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        log::warn!("ignoring malformed webhook field: {}", e);
        T::default()
    }))
}

/// Strings pass through; numbers are rendered (timestamps arrive both ways). Empty strings count as missing.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parse a raw webhook body. Anything that is not JSON is a classification failure.
pub fn parse_payload(raw: &[u8]) -> Result<Value, WhatsAppError> {
    serde_json::from_slice(raw)
        .map_err(|e| WhatsAppError::Classification(format!("body is not JSON: {}", e)))
}

/// Classify a webhook payload into events, in entry → change → message/status/alert order.
pub fn classify(payload: &Value) -> Result<Vec<InboundEvent>, WhatsAppError> {
    let payload = WebhookPayload::deserialize(payload)
        .map_err(|e| WhatsAppError::Classification(e.to_string()))?;

    let mut events = Vec::new();
    for entry in &payload.entry {
        let entry = match Entry::deserialize(entry) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping webhook entry: {}", e);
                continue;
            }
        };
        for change in &entry.changes {
            match Change::deserialize(change) {
                Ok(Change { value: Some(value) }) => classify_value(value, &mut events),
                Ok(_) => {}
                Err(e) => log::warn!("skipping webhook change: {}", e),
            }
        }
    }
    Ok(events)
}

fn classify_value(value: ChangeValue, events: &mut Vec<InboundEvent>) {
    for message in &value.messages {
        match incoming_message(message, &value.contacts, value.metadata.as_ref()) {
            Ok(msg) => events.push(InboundEvent::IncomingMessage(msg)),
            Err(reason) => log::warn!("dropping incoming message: {}", reason),
        }
    }
    for status in &value.statuses {
        match message_status(status, value.metadata.as_ref()) {
            Ok(s) => events.push(InboundEvent::MessageStatus(s)),
            Err(reason) => log::warn!("dropping status update: {}", reason),
        }
    }
    if let Some(alert) = value.account_alert.as_ref().filter(|a| !a.is_null()) {
        events.push(InboundEvent::AccountAlert(account_alert(alert)));
    }
}

/// Object alerts are read field by field; a bare scalar is taken as the alert type.
fn account_alert(alert: &Value) -> AccountAlert {
    if !alert.is_object() {
        return AccountAlert {
            alert_type: scalar_string(alert),
            description: None,
            severity: AlertSeverity::default(),
        };
    }
    let field = |key: &str| alert.get(key).and_then(scalar_string);
    AccountAlert {
        alert_type: field("alert_type"),
        description: field("alert_description"),
        severity: AlertSeverity::parse(field("severity").as_deref()),
    }
}

fn incoming_message(
    message: &Value,
    contacts: &[WireContact],
    metadata: Option<&Value>,
) -> Result<IncomingMessage, String> {
    let message_id = message
        .get("id")
        .and_then(scalar_string)
        .ok_or("message id missing")?;
    let message_type = message
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| format!("message {} has no type", message_id))?;
    let timestamp = message
        .get("timestamp")
        .and_then(scalar_string)
        .ok_or_else(|| format!("message {} has no timestamp", message_id))?;

    let contact = contacts.first();
    let sender_phone = contact
        .and_then(|c| c.wa_id.as_ref())
        .and_then(scalar_string)
        .or_else(|| message.get("from").and_then(scalar_string))
        .unwrap_or_default();
    let sender_name = contact
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.clone());

    Ok(IncomingMessage {
        sender_phone,
        sender_name,
        message_id,
        timestamp,
        content: message_content(message, message_type),
        metadata: metadata.cloned(),
    })
}

fn message_content(message: &Value, message_type: &str) -> MessageContent {
    let wire = match WireContent::deserialize(message) {
        Ok(wire) => wire,
        Err(e) => {
            log::debug!("keeping {} message raw: {}", message_type, e);
            return MessageContent::Unknown {
                message_type: message_type.to_string(),
                raw: message.clone(),
            };
        }
    };
    match wire {
        WireContent::Text { text } => MessageContent::Text { body: text.body },
        WireContent::Image { image } => MessageContent::Image {
            id: image.id,
            caption: non_empty(image.caption),
        },
        WireContent::Video { video } => MessageContent::Video {
            id: video.id,
            caption: non_empty(video.caption),
        },
        WireContent::Audio { audio } => MessageContent::Audio {
            id: audio.id,
            voice: audio.voice.unwrap_or(false),
        },
        WireContent::Document { document } => MessageContent::Document {
            id: document.id,
            filename: non_empty(document.filename),
            caption: non_empty(document.caption),
        },
        WireContent::Location { location } => MessageContent::Location {
            latitude: location.latitude,
            longitude: location.longitude,
            name: non_empty(location.name),
            address: non_empty(location.address),
        },
        WireContent::Contacts { contacts } => MessageContent::Contacts(contacts),
        WireContent::Interactive { interactive } => MessageContent::Interactive(interactive),
        WireContent::Button { button } => MessageContent::Button(button),
        WireContent::Order { order } => MessageContent::Order(order),
    }
}

fn message_status(status: &Value, metadata: Option<&Value>) -> Result<MessageStatus, String> {
    let wire = WireStatus::deserialize(status).map_err(|e| e.to_string())?;
    let message_id = wire
        .id
        .as_ref()
        .and_then(scalar_string)
        .ok_or("status without message id")?;
    Ok(MessageStatus {
        message_id,
        status: wire.status.unwrap_or(DeliveryStatus::Unknown),
        timestamp: wire.timestamp.as_ref().and_then(scalar_string),
        recipient_id: wire.recipient_id.as_ref().and_then(scalar_string),
        errors: wire.errors,
        metadata: metadata.cloned(),
    })
}

/// Overview of the first change in a delivery, logged on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSummary {
    pub phone_number_id: Option<String>,
    pub display_phone_number: Option<String>,
    pub timestamp: Option<String>,
    pub messages: usize,
    pub statuses: usize,
    pub contacts: usize,
}

/// Summarize `entry[0].changes[0].value`. None when that node is absent.
pub fn summarize(payload: &Value) -> Option<WebhookSummary> {
    let value = payload.pointer("/entry/0/changes/0/value")?;
    let metadata = value.get("metadata");
    let field = |key: &str| metadata.and_then(|m| m.get(key)).and_then(scalar_string);
    let count = |key: &str| value.get(key).and_then(Value::as_array).map_or(0, Vec::len);
    Some(WebhookSummary {
        phone_number_id: field("phone_number_id"),
        display_phone_number: field("display_phone_number"),
        timestamp: field("timestamp"),
        messages: count("messages"),
        statuses: count("statuses"),
        contacts: count("contacts"),
    })
}

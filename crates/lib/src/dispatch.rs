//! Event dispatch: route classified webhook events to handlers and send auto-replies.
//!
//! Only text messages can produce a reply. Media, location, interactive and button handlers
//! are log-only hooks for business logic; statuses and alerts are logged.

use serde_json::Value;

use crate::whatsapp::{
    classify, parse_payload, summarize, AccountAlert, AlertSeverity, DeliveryStatus,
    InboundEvent, IncomingMessage, MessageContent, MessageStatus, WhatsAppClient, WhatsAppError,
};

pub const GREETING_REPLY: &str = "Olá! 👋 Como posso ajudá-lo?";
pub const MENU_REPLY: &str = "Aqui está nosso menu:\n1. Produtos\n2. Atendimento\n3. Localização";
pub const HELP_REPLY: &str =
    "Como posso ajudá-lo?\n\n1. Dúvida sobre produtos\n2. Realizar pedido\n3. Falar com atendente";

/// Exact-match phrases (lowercased, trimmed).
const AUTO_RESPONSES: &[(&str, &str)] = &[
    ("oi", GREETING_REPLY),
    ("ola", GREETING_REPLY),
    ("oii", GREETING_REPLY),
    ("oj", GREETING_REPLY),
    ("menu", MENU_REPLY),
    ("ajuda", HELP_REPLY),
];

/// Substrings that still count as a greeting when no exact phrase matched.
const GREETING_TOKENS: &[&str] = &["oi", "olá"];

/// Canned reply for an inbound text, if any.
pub fn auto_response(text: &str) -> Option<&'static str> {
    let normalized = text.trim().to_lowercase();
    if let Some((_, reply)) = AUTO_RESPONSES.iter().find(|(phrase, _)| *phrase == normalized) {
        return Some(reply);
    }
    if GREETING_TOKENS.iter().any(|token| normalized.contains(token)) {
        return Some(GREETING_REPLY);
    }
    None
}

/// Handler bucket for an incoming message. Types outside these are logged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Text,
    Media,
    Location,
    Interactive,
    Button,
}

impl MessageCategory {
    pub fn of(content: &MessageContent) -> Option<Self> {
        match content {
            MessageContent::Text { .. } => Some(MessageCategory::Text),
            MessageContent::Image { .. }
            | MessageContent::Video { .. }
            | MessageContent::Audio { .. }
            | MessageContent::Document { .. } => Some(MessageCategory::Media),
            MessageContent::Location { .. } => Some(MessageCategory::Location),
            MessageContent::Interactive(_) => Some(MessageCategory::Interactive),
            MessageContent::Button(_) => Some(MessageCategory::Button),
            MessageContent::Contacts(_) | MessageContent::Order(_) | MessageContent::Unknown { .. } => None,
        }
    }
}

/// Routes events to handlers; replies go out through the shared client.
#[derive(Clone)]
pub struct Dispatcher {
    client: WhatsAppClient,
}

impl Dispatcher {
    pub fn new(client: WhatsAppClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &WhatsAppClient {
        &self.client
    }

    /// Parse, classify and dispatch one webhook body. Events are handled in order, one at a time.
    /// Returns how many events were dispatched; a malformed body is a classification error.
    pub async fn handle_webhook(&self, raw: &[u8]) -> Result<usize, WhatsAppError> {
        let payload = parse_payload(raw)?;
        if let Some(summary) = summarize(&payload) {
            log::info!(
                "webhook for phone number {} ({}): {} message(s), {} status(es), {} contact(s)",
                summary.phone_number_id.as_deref().unwrap_or("?"),
                summary.display_phone_number.as_deref().unwrap_or("?"),
                summary.messages,
                summary.statuses,
                summary.contacts,
            );
        }
        let events = classify(&payload)?;
        for event in &events {
            self.dispatch(event).await;
        }
        Ok(events.len())
    }

    /// Handle one event. Returns the provider response when a reply was sent.
    pub async fn dispatch(&self, event: &InboundEvent) -> Option<Value> {
        match event {
            InboundEvent::IncomingMessage(msg) => self.handle_incoming(msg).await,
            InboundEvent::MessageStatus(status) => {
                handle_status(status);
                None
            }
            InboundEvent::AccountAlert(alert) => {
                handle_alert(alert);
                None
            }
        }
    }

    async fn handle_incoming(&self, msg: &IncomingMessage) -> Option<Value> {
        log::info!(
            "message {} from {} ({}), type {}",
            msg.message_id,
            msg.sender_name.as_deref().unwrap_or("unknown"),
            msg.sender_phone,
            msg.message_type()
        );
        match MessageCategory::of(&msg.content) {
            Some(MessageCategory::Text) => self.handle_text(msg).await,
            Some(MessageCategory::Media) => {
                handle_media(msg);
                None
            }
            Some(MessageCategory::Location) => {
                handle_location(msg);
                None
            }
            Some(MessageCategory::Interactive) => {
                log::info!("interactive reply from {}: {:?}", msg.sender_phone, msg.content);
                None
            }
            Some(MessageCategory::Button) => {
                log::info!("button pressed by {}: {:?}", msg.sender_phone, msg.content);
                None
            }
            None => {
                log::info!("unhandled message type: {}", msg.message_type());
                None
            }
        }
    }

    async fn handle_text(&self, msg: &IncomingMessage) -> Option<Value> {
        let MessageContent::Text { body } = &msg.content else {
            return None;
        };
        log::info!("text: {:?}", body);
        let reply = auto_response(body)?;
        self.reply(&msg.sender_phone, reply).await
    }

    /// Send a text reply. Failures are logged and turned into `None`.
    pub async fn reply(&self, to: &str, text: &str) -> Option<Value> {
        match self.client.send_text(to, text).await {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("reply to {} not sent: {}", to, e);
                None
            }
        }
    }
}

fn handle_media(msg: &IncomingMessage) {
    match &msg.content {
        MessageContent::Image { id, caption } | MessageContent::Video { id, caption } => {
            log::info!("{} received: id {} caption {:?}", msg.message_type(), id, caption);
        }
        MessageContent::Audio { id, voice } => {
            log::info!("audio received: id {} voice note {}", id, voice);
        }
        MessageContent::Document { id, filename, .. } => {
            log::info!("document received: id {} filename {:?}", id, filename);
        }
        _ => {}
    }
}

fn handle_location(msg: &IncomingMessage) {
    if let MessageContent::Location {
        latitude,
        longitude,
        ..
    } = &msg.content
    {
        log::info!("location from {}: {}, {}", msg.sender_phone, latitude, longitude);
    }
}

fn handle_status(status: &MessageStatus) {
    log::info!("message {} status: {:?}", status.message_id, status.status);
    if let Some(errors) = &status.errors {
        log::warn!("message {} errors: {}", status.message_id, Value::from(errors.clone()));
    } else if status.status == DeliveryStatus::Failed {
        log::warn!("message {} failed without error details", status.message_id);
    }
}

fn handle_alert(alert: &AccountAlert) {
    let alert_type = alert.alert_type.as_deref().unwrap_or("unknown");
    let description = alert.description.as_deref().unwrap_or("");
    match alert.severity {
        AlertSeverity::High => log::error!("account alert (high): {} {}", alert_type, description),
        AlertSeverity::Medium => log::warn!("account alert (medium): {} {}", alert_type, description),
        AlertSeverity::Low => log::info!("account alert (low): {} {}", alert_type, description),
    }
}

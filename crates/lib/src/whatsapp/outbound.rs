//! Outbound message bodies for `POST /<phone_number_id>/messages`.

use serde::Serialize;
use serde_json::{json, Value};

pub const MESSAGING_PRODUCT: &str = "whatsapp";
pub const RECIPIENT_INDIVIDUAL: &str = "individual";
pub const DEFAULT_TEMPLATE_LANGUAGE: &str = "pt_BR";
pub const DEFAULT_HEADER_KIND: &str = "text";
const INTERACTIVE_HEADER_TEXT: &str = "Menu";

/// Outbound message type. Unrecognized names fall back to `Text`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageKind {
    #[default]
    Text,
    Template,
    Interactive,
    Image,
    Document,
    Video,
    Audio,
}

impl MessageKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "template" => MessageKind::Template,
            "interactive" => MessageKind::Interactive,
            "image" => MessageKind::Image,
            "document" => MessageKind::Document,
            "video" => MessageKind::Video,
            "audio" => MessageKind::Audio,
            _ => MessageKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Template => "template",
            MessageKind::Interactive => "interactive",
            MessageKind::Image => "image",
            MessageKind::Document => "document",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
        }
    }
}

/// Full request body for the messages endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundPayload {
    pub messaging_product: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_type: Option<&'static str>,
    pub to: String,
    #[serde(flatten)]
    pub body: OutboundBody,
}

impl OutboundPayload {
    pub fn kind(&self) -> MessageKind {
        match self.body {
            OutboundBody::Text { .. } => MessageKind::Text,
            OutboundBody::Template { .. } => MessageKind::Template,
            OutboundBody::Interactive { .. } => MessageKind::Interactive,
            OutboundBody::Image { .. } => MessageKind::Image,
            OutboundBody::Document { .. } => MessageKind::Document,
            OutboundBody::Video { .. } => MessageKind::Video,
            OutboundBody::Audio { .. } => MessageKind::Audio,
        }
    }
}

/// Kind-specific part: `"type"` plus the object under the kind's key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundBody {
    Text { text: TextBody },
    Template { template: Value },
    Interactive { interactive: Value },
    Image { image: Value },
    Document { document: Value },
    Video { video: Value },
    Audio { audio: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBody {
    pub body: String,
}

/// Body for marking a received message as read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadReceipt {
    pub messaging_product: &'static str,
    pub status: &'static str,
    pub message_id: String,
}

impl ReadReceipt {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            messaging_product: MESSAGING_PRODUCT,
            status: "read",
            message_id: message_id.into(),
        }
    }
}

fn text_of(body: Value) -> String {
    match body {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Wrap `body` for the given kind. Text stringifies the body; other kinds pass it through.
pub fn format_message(to: &str, body: Value, kind: MessageKind) -> OutboundPayload {
    let body = match kind {
        MessageKind::Text => OutboundBody::Text {
            text: TextBody { body: text_of(body) },
        },
        MessageKind::Template => OutboundBody::Template { template: body },
        MessageKind::Interactive => OutboundBody::Interactive { interactive: body },
        MessageKind::Image => OutboundBody::Image { image: body },
        MessageKind::Document => OutboundBody::Document { document: body },
        MessageKind::Video => OutboundBody::Video { video: body },
        MessageKind::Audio => OutboundBody::Audio { audio: body },
    };
    OutboundPayload {
        messaging_product: MESSAGING_PRODUCT,
        recipient_type: Some(RECIPIENT_INDIVIDUAL),
        to: to.to_string(),
        body,
    }
}

/// Plain text message.
pub fn format_text(to: &str, text: &str) -> OutboundPayload {
    format_message(to, Value::String(text.to_string()), MessageKind::Text)
}

/// Template message. The `parameters` key is left out entirely when `params` is empty;
/// the provider rejects an empty parameter list.
pub fn format_template(to: &str, name: &str, language: &str, params: &[Value]) -> OutboundPayload {
    let mut template = json!({
        "name": name,
        "language": { "code": language },
    });
    if !params.is_empty() {
        template["parameters"] = json!({ "body": { "parameters": params } });
    }
    OutboundPayload {
        messaging_product: MESSAGING_PRODUCT,
        recipient_type: None,
        to: to.to_string(),
        body: OutboundBody::Template { template },
    }
}

/// Reply-button message. A "Menu" text header is attached only when `header_kind` is `text`.
/// Buttons are passed through as given; the provider enforces count and shape.
pub fn format_interactive_buttons(
    to: &str,
    body_text: &str,
    buttons: Value,
    header_kind: &str,
) -> OutboundPayload {
    let mut interactive = json!({
        "type": "button",
        "body": { "text": body_text },
        "action": { "buttons": buttons },
    });
    if header_kind == DEFAULT_HEADER_KIND {
        interactive["header"] = json!({ "type": "text", "text": INTERACTIVE_HEADER_TEXT });
    }
    OutboundPayload {
        messaging_product: MESSAGING_PRODUCT,
        recipient_type: Some(RECIPIENT_INDIVIDUAL),
        to: to.to_string(),
        body: OutboundBody::Interactive { interactive },
    }
}

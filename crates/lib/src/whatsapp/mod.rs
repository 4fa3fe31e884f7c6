//! WhatsApp Cloud API: webhook verification, event classification, outbound formatting,
//! and the Graph API client.
//!
//! Inbound: the provider POSTs nested JSON (`entry[].changes[].value`); [`classify`] turns it
//! into [`InboundEvent`]s. Outbound: [`outbound`] builds message bodies and [`WhatsAppClient`]
//! sends them through an injected [`Transport`].

pub mod classify;
pub mod client;
pub mod events;
pub mod outbound;
pub mod transport;
pub mod verify;

pub use classify::{classify, parse_payload, summarize, WebhookSummary};
pub use client::WhatsAppClient;
pub use events::{
    AccountAlert, AlertSeverity, DeliveryStatus, InboundEvent, IncomingMessage, MessageContent,
    MessageStatus,
};
pub use outbound::{MessageKind, OutboundPayload, ReadReceipt};
pub use transport::{HttpTransport, Transport, TransportError};
pub use verify::{verify_handshake, verify_signature, Handshake, HandshakeQuery};

/// Errors from the WhatsApp layer.
#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    /// Required credentials (phone number id, access token) are not configured.
    #[error("whatsapp credentials not configured: {0}")]
    Configuration(String),

    /// A required request field is missing or empty.
    #[error("{0}")]
    Validation(String),

    /// An outbound body could not be encoded as JSON.
    #[error("could not encode request body: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The webhook payload does not have the expected shape.
    #[error("invalid webhook payload: {0}")]
    Classification(String),

    /// The outbound call failed (network error or non-2xx status).
    #[error("whatsapp api call failed: {0}")]
    Transport(#[from] TransportError),
}

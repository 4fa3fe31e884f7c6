//! Gateway: the HTTP surface in front of the WhatsApp layer.
//!
//! Single port. Webhook POSTs are acknowledged immediately and queued for a background
//! processor; the send endpoints call the Graph API inline and report its outcome.

mod protocol;
mod server;

pub use protocol::{
    ErrorResponse, MarkAsReadRequest, SendInteractiveRequest, SendMessageRequest,
    SendTemplateRequest, SuccessResponse,
};
pub use server::{router, run_gateway, GatewayState, WebhookDelivery};

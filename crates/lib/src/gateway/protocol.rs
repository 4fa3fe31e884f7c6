//! JSON bodies of the send endpoints and the shared response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::whatsapp::WhatsAppError;

/// `POST /webhook/whatsapp/send-message`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /webhook/whatsapp/send-template`. Parameters default to none.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTemplateRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<Value>>,
}

/// `POST /webhook/whatsapp/send-interactive`. `buttons` is the provider's button array, passed through.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInteractiveRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub buttons: Option<Value>,
}

/// `POST /webhook/whatsapp/mark-as-read`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadRequest {
    #[serde(default)]
    pub message_id: Option<String>,
}

/// 200 body: `{ "success": true, "data" }` or `{ "success": true, "message" }`.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn ack() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
        }
    }
}

/// Error body. `success` is present (false) on provider failures and absent on request validation errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub error: String,
}

impl ErrorResponse {
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            success: None,
            error: error.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            error: error.into(),
        }
    }
}

/// Trimmed, non-empty string field.
fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn missing(fields: &str) -> WhatsAppError {
    WhatsAppError::Validation(format!("{} required", fields))
}

impl SendMessageRequest {
    /// `(to, message)`.
    pub fn validate(&self) -> Result<(&str, &str), WhatsAppError> {
        match (required(&self.phone_number), required(&self.message)) {
            (Some(to), Some(message)) => Ok((to, message)),
            _ => Err(missing("phoneNumber and message are")),
        }
    }
}

impl SendTemplateRequest {
    /// `(to, template name, parameters)`; absent parameters are empty.
    pub fn validate(&self) -> Result<(&str, &str, &[Value]), WhatsAppError> {
        match (required(&self.phone_number), required(&self.template_name)) {
            (Some(to), Some(name)) => Ok((to, name, self.parameters.as_deref().unwrap_or_default())),
            _ => Err(missing("phoneNumber and templateName are")),
        }
    }
}

impl SendInteractiveRequest {
    /// `(to, body text, buttons)`. A null `buttons` counts as missing.
    pub fn validate(&self) -> Result<(&str, &str, &Value), WhatsAppError> {
        let buttons = self.buttons.as_ref().filter(|b| !b.is_null());
        match (required(&self.phone_number), required(&self.message), buttons) {
            (Some(to), Some(message), Some(buttons)) => Ok((to, message, buttons)),
            _ => Err(missing("phoneNumber, message and buttons are")),
        }
    }
}

impl MarkAsReadRequest {
    pub fn validate(&self) -> Result<&str, WhatsAppError> {
        required(&self.message_id).ok_or_else(|| missing("messageId is"))
    }
}

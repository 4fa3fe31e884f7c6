//! Graph API client for the WhatsApp Business Cloud API.
//!
//! Credentials come from the immutable [`WhatsAppConfig`]; missing ones fail the call with
//! [`WhatsAppError::Configuration`] before any request is made.

use std::sync::Arc;

use serde_json::Value;

use super::outbound::{
    self, OutboundPayload, ReadReceipt, DEFAULT_HEADER_KIND, DEFAULT_TEMPLATE_LANGUAGE,
};
use super::transport::Transport;
use super::WhatsAppError;
use crate::config::WhatsAppConfig;

/// Sends messages and reads message metadata through an injected [`Transport`].
#[derive(Clone)]
pub struct WhatsAppClient {
    config: Arc<WhatsAppConfig>,
    transport: Arc<dyn Transport>,
}

impl WhatsAppClient {
    pub fn new(config: Arc<WhatsAppConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }

    fn access_token(&self) -> Result<&str, WhatsAppError> {
        self.config
            .access_token
            .as_deref()
            .ok_or_else(|| WhatsAppError::Configuration("access token missing".to_string()))
    }

    fn messages_url(&self) -> Result<String, WhatsAppError> {
        let phone_number_id = self
            .config
            .phone_number_id
            .as_deref()
            .ok_or_else(|| WhatsAppError::Configuration("phone number id missing".to_string()))?;
        Ok(format!("{}/{}/messages", self.config.api_base_url, phone_number_id))
    }

    async fn post_messages(&self, body: &Value) -> Result<Value, WhatsAppError> {
        let url = self.messages_url()?;
        let token = self.access_token()?;
        Ok(self.transport.send_json(&url, body, token).await?)
    }

    /// POST a formatted payload to the messages endpoint. Returns the provider response.
    pub async fn send(&self, payload: &OutboundPayload) -> Result<Value, WhatsAppError> {
        let body = serde_json::to_value(payload)?;
        match self.post_messages(&body).await {
            Ok(data) => {
                log::info!("{} message sent to {}", payload.kind().as_str(), payload.to);
                Ok(data)
            }
            Err(e) => {
                log::error!("sending {} message to {} failed: {}", payload.kind().as_str(), payload.to, e);
                Err(e)
            }
        }
    }

    pub async fn send_text(&self, to: &str, text: &str) -> Result<Value, WhatsAppError> {
        self.send(&outbound::format_text(to, text)).await
    }

    /// Send a template in the default language (pt_BR).
    pub async fn send_template(&self, to: &str, name: &str, params: &[Value]) -> Result<Value, WhatsAppError> {
        self.send(&outbound::format_template(to, name, DEFAULT_TEMPLATE_LANGUAGE, params))
            .await
    }

    /// Send reply buttons with the default "Menu" text header.
    pub async fn send_interactive(&self, to: &str, text: &str, buttons: Value) -> Result<Value, WhatsAppError> {
        self.send(&outbound::format_interactive_buttons(
            to,
            text,
            buttons,
            DEFAULT_HEADER_KIND,
        ))
        .await
    }

    pub async fn mark_as_read(&self, message_id: &str) -> Result<(), WhatsAppError> {
        let body = serde_json::to_value(ReadReceipt::new(message_id))?;
        match self.post_messages(&body).await {
            Ok(_) => {
                log::info!("message {} marked as read", message_id);
                Ok(())
            }
            Err(e) => {
                log::error!("marking message {} as read failed: {}", message_id, e);
                Err(e)
            }
        }
    }

    /// GET `<base>/<message_id>`.
    pub async fn message_info(&self, message_id: &str) -> Result<Value, WhatsAppError> {
        let token = self.access_token()?;
        let url = format!("{}/{}", self.config.api_base_url, message_id);
        self.transport.get_json(&url, token).await.map_err(|e| {
            log::error!("fetching message {} failed: {}", message_id, e);
            WhatsAppError::from(e)
        })
    }
}

//! wagate core library: WhatsApp webhook verification, classification, outbound
//! formatting, dispatch, and the gateway used by the CLI.

pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod init;
pub mod whatsapp;

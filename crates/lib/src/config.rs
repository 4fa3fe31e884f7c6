//! Configuration types and loading.
//!
//! Config is loaded once at startup from a JSON file (e.g. `~/.wagate/config.json`) and
//! the environment, then shared read-only (behind `Arc`) with the client, dispatcher, and gateway.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Port used when neither the config file nor PORT sets one.
pub const DEFAULT_PORT: u16 = 3000;

/// Default Graph API base URL (version included).
pub const DEFAULT_API_BASE_URL: &str = "https://graph.facebook.com/v18.0";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Cloud API credentials and endpoint.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP. Overridden by PORT env; None means [`DEFAULT_PORT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address (default "0.0.0.0"; the provider must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl GatewayConfig {
    /// Port to listen on.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: None,
            bind: default_gateway_bind(),
        }
    }
}

/// WhatsApp Business account settings. Every credential may be overridden by its env var.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Secret echoed by the provider during the verification handshake (WHATSAPP_VERIFY_TOKEN).
    pub verify_token: Option<String>,
    /// Business phone number id used in the messages endpoint (WHATSAPP_PHONE_ID).
    pub phone_number_id: Option<String>,
    /// Business account id (WHATSAPP_BUSINESS_ACCOUNT_ID). Informational only.
    pub business_account_id: Option<String>,
    /// Bearer token for the Graph API (WHATSAPP_ACCESS_TOKEN).
    pub access_token: Option<String>,
    /// App secret for X-Hub-Signature-256 verification (WHATSAPP_APP_SECRET). When unset, signatures are not checked.
    pub app_secret: Option<String>,
    /// Graph API base URL including version (WHATSAPP_API_BASE_URL).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            phone_number_id: None,
            business_account_id: None,
            access_token: None,
            app_secret: None,
            api_base_url: default_api_base_url(),
        }
    }
}

/// Read an env var as-is; a blank value counts as unset.
fn env_value(name: &str) -> Option<String> {
    present(std::env::var(name).ok())
}

/// Blank counts as unset; the value itself is kept verbatim.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Trimmed; blank counts as unset.
fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    /// Apply environment overrides on top of file values. Env wins when set.
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(env_value);
        self
    }

    /// The verify token is compared byte for byte during the handshake, so it is never trimmed.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let env = |name: &str| trimmed(lookup(name));
        let wa = &mut self.whatsapp;
        wa.verify_token = present(lookup("WHATSAPP_VERIFY_TOKEN")).or_else(|| present(wa.verify_token.take()));
        wa.phone_number_id = env("WHATSAPP_PHONE_ID").or_else(|| trimmed(wa.phone_number_id.take()));
        wa.business_account_id =
            env("WHATSAPP_BUSINESS_ACCOUNT_ID").or_else(|| trimmed(wa.business_account_id.take()));
        wa.access_token = env("WHATSAPP_ACCESS_TOKEN").or_else(|| trimmed(wa.access_token.take()));
        wa.app_secret = env("WHATSAPP_APP_SECRET").or_else(|| trimmed(wa.app_secret.take()));
        if let Some(url) = env("WHATSAPP_API_BASE_URL") {
            wa.api_base_url = url;
        }
        wa.api_base_url = wa.api_base_url.trim().trim_end_matches('/').to_string();

        if let Some(port) = env("PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.gateway.port = Some(p),
                Err(_) => log::warn!("ignoring invalid PORT value: {}", port),
            }
        }
    }
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("WAGATE_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".wagate").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, the default path (or WAGATE_CONFIG_PATH), then apply env overrides.
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config.apply_env(), path))
}

/// One line of the credential report printed by `wagate check-env`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    /// Env var name the value can come from.
    pub name: &'static str,
    /// Display value (masked for secrets). None when not loaded.
    pub display: Option<String>,
    /// Length of the raw value in characters (0 when missing).
    pub len: usize,
}

impl CredentialStatus {
    pub fn loaded(&self) -> bool {
        self.display.is_some()
    }
}

/// Mask a secret: first 20 and last 10 characters; short secrets are fully hidden.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 30 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..20].iter().collect();
    let tail: String = chars[chars.len() - 10..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Report which required settings are loaded. Secrets are masked.
pub fn credential_report(config: &Config) -> Vec<CredentialStatus> {
    let wa = &config.whatsapp;
    let port = config.gateway.port.map(|p| p.to_string());
    let entries: [(&'static str, Option<&str>, bool); 5] = [
        ("WHATSAPP_VERIFY_TOKEN", wa.verify_token.as_deref(), true),
        ("WHATSAPP_PHONE_ID", wa.phone_number_id.as_deref(), false),
        ("WHATSAPP_BUSINESS_ACCOUNT_ID", wa.business_account_id.as_deref(), false),
        ("WHATSAPP_ACCESS_TOKEN", wa.access_token.as_deref(), true),
        ("PORT", port.as_deref(), false),
    ];
    entries
        .into_iter()
        .map(|(name, value, secret)| CredentialStatus {
            name,
            display: value.map(|v| if secret { mask_secret(v) } else { v.to_string() }),
            len: value.map(|v| v.chars().count()).unwrap_or(0),
        })
        .collect()
}

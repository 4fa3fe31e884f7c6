//! Webhook verification: the `hub.*` subscription handshake and `X-Hub-Signature-256` checks.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SUBSCRIBE_MODE: &str = "subscribe";

/// Query params of `GET /webhook/whatsapp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Handshake outcome. `challenge` is set only when valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub valid: bool,
    pub challenge: Option<String>,
}

/// Valid iff mode is `subscribe` and the token equals the configured one (exact match, no trimming).
/// An unconfigured token never validates.
pub fn verify_handshake(query: &HandshakeQuery, configured_token: Option<&str>) -> Handshake {
    let mode_ok = query.mode.as_deref() == Some(SUBSCRIBE_MODE);
    let token_ok = match (configured_token, query.verify_token.as_deref()) {
        (Some(expected), Some(provided)) => expected == provided,
        _ => false,
    };
    if mode_ok && token_ok {
        Handshake {
            valid: true,
            challenge: Some(query.challenge.clone().unwrap_or_default()),
        }
    } else {
        Handshake {
            valid: false,
            challenge: None,
        }
    }
}

/// Header value for a body: `sha256=<hex hmac>`.
pub fn sign_payload(app_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature_header` (`sha256=<hex>` or bare hex) against the HMAC-SHA256 of `raw_body`.
/// Comparison is constant-time.
pub fn verify_signature(raw_body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let provided = signature_header.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let Ok(expected) = hex::decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> HandshakeQuery {
        HandshakeQuery {
            mode: mode.map(str::to_string),
            verify_token: token.map(str::to_string),
            challenge: challenge.map(str::to_string),
        }
    }

    #[test]
    fn handshake_valid_echoes_challenge() {
        let q = query(Some("subscribe"), Some("s3cret"), Some("1158201444"));
        let result = verify_handshake(&q, Some("s3cret"));
        assert_eq!(
            result,
            Handshake {
                valid: true,
                challenge: Some("1158201444".to_string())
            }
        );
    }

    #[test]
    fn handshake_rejects_other_combinations() {
        let invalid = Handshake {
            valid: false,
            challenge: None,
        };
        let cases = [
            query(Some("unsubscribe"), Some("s3cret"), Some("c")),
            query(Some("subscribe"), Some("wrong"), Some("c")),
            query(Some("subscribe"), Some(" s3cret"), Some("c")),
            query(None, Some("s3cret"), Some("c")),
            query(Some("subscribe"), None, Some("c")),
            query(Some("Subscribe"), Some("s3cret"), Some("c")),
        ];
        for q in &cases {
            assert_eq!(verify_handshake(q, Some("s3cret")), invalid, "{:?}", q);
        }
        let q = query(Some("subscribe"), Some("s3cret"), Some("c"));
        assert_eq!(verify_handshake(&q, None), invalid);
    }

    #[test]
    fn handshake_query_parses_hub_params() {
        let q: HandshakeQuery = serde_json::from_value(serde_json::json!({
            "hub.mode": "subscribe",
            "hub.verify_token": "t",
            "hub.challenge": "42"
        }))
        .unwrap();
        assert_eq!(q.mode.as_deref(), Some("subscribe"));
        assert_eq!(q.verify_token.as_deref(), Some("t"));
        assert_eq!(q.challenge.as_deref(), Some("42"));
    }

    #[test]
    fn signature_known_vector() {
        let header = sign_payload("key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(
            header,
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn signature_accepts_prefixed_and_bare_hex() {
        let body = br#"{"entry":[]}"#;
        let header = sign_payload("app-secret", body);
        assert!(verify_signature(body, &header, "app-secret"));
        let bare = header.trim_start_matches("sha256=");
        assert!(verify_signature(body, bare, "app-secret"));
    }

    #[test]
    fn signature_rejects_tampering() {
        let body = br#"{"entry":[]}"#;
        let header = sign_payload("app-secret", body);
        assert!(!verify_signature(body, &header, "other-secret"));
        assert!(!verify_signature(br#"{"entry":[1]}"#, &header, "app-secret"));
        assert!(!verify_signature(body, "sha256=not-hex", "app-secret"));
        assert!(!verify_signature(body, "", "app-secret"));
    }
}

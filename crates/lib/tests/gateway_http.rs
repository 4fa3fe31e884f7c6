//! Integration tests: serve the gateway router on a free local port and drive it over HTTP.
//! Outbound Graph API calls go to an in-memory transport, so no credentials or network are needed.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wagate::config::Config;
use wagate::gateway::{self, GatewayState};
use wagate::whatsapp::verify::sign_payload;
use wagate::whatsapp::{Transport, TransportError};

/// Records outbound calls; fails every call with a 500 when `fail` is set.
#[derive(Default)]
struct StubTransport {
    fail: bool,
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

impl StubTransport {
    fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, url: &str, body: Option<&Value>) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push((url.to_string(), body.cloned()));
        if self.fail {
            Err(TransportError::Status {
                status: 500,
                body: "upstream error".to_string(),
            })
        } else {
            Ok(json!({ "messages": [{ "id": "wamid.out" }] }))
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send_json(&self, url: &str, body: &Value, _auth_token: &str) -> Result<Value, TransportError> {
        self.answer(url, Some(body))
    }

    async fn get_json(&self, url: &str, _auth_token: &str) -> Result<Value, TransportError> {
        self.answer(url, None)
    }
}

/// Never answers; a reply through it stalls the processor for good.
struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send_json(&self, _url: &str, _body: &Value, _auth_token: &str) -> Result<Value, TransportError> {
        std::future::pending().await
    }

    async fn get_json(&self, _url: &str, _auth_token: &str) -> Result<Value, TransportError> {
        std::future::pending().await
    }
}

fn test_config(app_secret: Option<&str>) -> Config {
    let mut config = Config::default();
    config.gateway.bind = "127.0.0.1".to_string();
    config.whatsapp.verify_token = Some("verify-me".to_string());
    config.whatsapp.phone_number_id = Some("123456".to_string());
    config.whatsapp.access_token = Some("token".to_string());
    config.whatsapp.api_base_url = "https://graph.test/v18.0".to_string();
    config.whatsapp.app_secret = app_secret.map(str::to_string);
    config
}

/// Serve the router on 127.0.0.1:0 and return its base URL. The server task is left running.
async fn spawn_gateway(config: Config, transport: Arc<dyn Transport>) -> String {
    let (state, _processor) = GatewayState::new(Arc::new(config), transport);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, gateway::router(state)).await;
    });
    format!("http://{}", addr)
}

fn webhook_body(text: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "object": "whatsapp_business_account",
        "entry": [{ "id": "1", "changes": [{ "field": "messages", "value": {
            "messaging_product": "whatsapp",
            "metadata": { "display_phone_number": "15550000000", "phone_number_id": "123456" },
            "contacts": [{ "profile": { "name": "Maria" }, "wa_id": "5511999999999" }],
            "messages": [{
                "from": "5511999999999",
                "id": "wamid.in",
                "timestamp": "1700000000",
                "type": "text",
                "text": { "body": text }
            }]
        }}]}]
    }))
    .unwrap()
}

/// Poll until the transport saw `n` calls, or give up after ~2s.
async fn wait_for_calls(transport: &StubTransport, n: usize) -> Vec<(String, Option<Value>)> {
    for _ in 0..40 {
        let calls = transport.calls();
        if calls.len() >= n {
            return calls;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    transport.calls()
}

#[tokio::test]
async fn health_responds_ok() {
    let base = spawn_gateway(test_config(None), Arc::new(StubTransport::default())).await;
    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "OK" }));
}

#[tokio::test]
async fn handshake_echoes_challenge_or_forbids() {
    let base = spawn_gateway(test_config(None), Arc::new(StubTransport::default())).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/webhook/whatsapp", base))
        .query(&[("hub.mode", "subscribe"), ("hub.verify_token", "verify-me"), ("hub.challenge", "1158201444")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "1158201444");

    let resp = client
        .get(format!("{}/webhook/whatsapp", base))
        .query(&[("hub.mode", "subscribe"), ("hub.verify_token", "wrong"), ("hub.challenge", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert!(!resp.text().await.unwrap().contains("verify-me"));
}

#[tokio::test]
async fn send_message_validates_and_reports_provider_failure() {
    let transport = Arc::new(StubTransport {
        fail: true,
        ..Default::default()
    });
    let base = spawn_gateway(test_config(None), transport.clone()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/webhook/whatsapp/send-message", base);

    let resp = client.post(&url).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "phoneNumber and message are required" }));
    assert!(transport.calls().is_empty());

    let resp = client
        .post(&url)
        .json(&json!({ "phoneNumber": "5511999999999", "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn send_endpoints_return_provider_data() {
    let transport = Arc::new(StubTransport::default());
    let base = spawn_gateway(test_config(None), transport.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/webhook/whatsapp/send-template", base))
        .json(&json!({ "phoneNumber": "5511", "templateName": "promo" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["messages"][0]["id"], "wamid.out");

    let resp = client
        .post(format!("{}/webhook/whatsapp/send-interactive", base))
        .json(&json!({ "phoneNumber": "5511", "message": "Escolha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/webhook/whatsapp/mark-as-read", base))
        .json(&json!({ "messageId": "wamid.9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["message"].is_string());

    let resp = client
        .get(format!("{}/webhook/whatsapp/message/wamid.9", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    let template = calls[0].1.as_ref().unwrap();
    assert_eq!(template["template"]["name"], "promo");
    assert!(template["template"].get("parameters").is_none());
    assert_eq!(calls[2].0, "https://graph.test/v18.0/wamid.9");
}

#[tokio::test]
async fn webhook_is_acked_and_greeting_is_answered() {
    let transport = Arc::new(StubTransport::default());
    let base = spawn_gateway(test_config(None), transport.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/webhook/whatsapp", base))
        .header("content-type", "application/json")
        .body(webhook_body("oi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    let calls = wait_for_calls(&transport, 1).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "https://graph.test/v18.0/123456/messages");
    let reply = calls[0].1.as_ref().unwrap();
    assert_eq!(reply["to"], "5511999999999");
    assert_eq!(reply["text"]["body"], wagate::dispatch::GREETING_REPLY);
}

#[tokio::test]
async fn malformed_webhook_is_acked_without_outbound_calls() {
    let transport = Arc::new(StubTransport::default());
    let base = spawn_gateway(test_config(None), transport.clone()).await;
    let client = reqwest::Client::new();

    for body in [r#"{"object":"whatsapp_business_account"}"#, "not json"] {
        let resp = client
            .post(format!("{}/webhook/whatsapp", base))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn signature_is_checked_when_app_secret_is_set() {
    let transport = Arc::new(StubTransport::default());
    let base = spawn_gateway(test_config(Some("app-secret")), transport.clone()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/webhook/whatsapp", base);
    let body = webhook_body("oi");

    let resp = client.post(&url).body(body.clone()).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(&url)
        .header("X-Hub-Signature-256", sign_payload("other-secret", &body))
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(transport.calls().is_empty());

    let resp = client
        .post(&url)
        .header("X-Hub-Signature-256", sign_payload("app-secret", &body))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(wait_for_calls(&transport, 1).await.len(), 1);
}

#[tokio::test]
async fn webhook_ack_does_not_wait_on_a_stalled_processor() {
    let base = spawn_gateway(test_config(None), Arc::new(HangingTransport)).await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let url = format!("{}/webhook/whatsapp", base);

    // The first "oi" blocks the processor on its reply; the rest pile up past the queue capacity.
    for n in 1..=80 {
        let resp = client
            .post(&url)
            .header("content-type", "application/json")
            .body(webhook_body("oi"))
            .send()
            .await
            .unwrap_or_else(|e| panic!("delivery #{} not acked: {}", n, e));
        assert_eq!(resp.status(), 200, "delivery #{}", n);
    }
}

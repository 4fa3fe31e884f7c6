//! Outbound HTTP capability. The client and dispatcher only see [`Transport`], so they can be
//! exercised without network I/O.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("api returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Sends authenticated JSON requests to the provider.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as JSON with `Authorization: Bearer <auth_token>`; returns the decoded response.
    async fn send_json(&self, url: &str, body: &Value, auth_token: &str) -> Result<Value, TransportError>;

    /// GET with bearer auth; returns the decoded response.
    async fn get_json(&self, url: &str, auth_token: &str) -> Result<Value, TransportError>;
}

/// reqwest-backed transport. No timeout or retry is configured.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

async fn decode(res: reqwest::Response) -> Result<Value, TransportError> {
    if !res.status().is_success() {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        return Err(TransportError::Status { status, body });
    }
    let data: Value = res.json().await?;
    Ok(data)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_json(&self, url: &str, body: &Value, auth_token: &str) -> Result<Value, TransportError> {
        let res = self
            .client
            .post(url)
            .bearer_auth(auth_token)
            .json(body)
            .send()
            .await?;
        decode(res).await
    }

    async fn get_json(&self, url: &str, auth_token: &str) -> Result<Value, TransportError> {
        let res = self.client.get(url).bearer_auth(auth_token).send().await?;
        decode(res).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    /// One recorded outbound call.
    #[derive(Debug, Clone)]
    pub struct Call {
        pub url: String,
        pub body: Option<Value>,
        pub auth_token: String,
    }

    /// Records calls; answers with `response`, or a 500 when `fail` is set.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub calls: Mutex<Vec<Call>>,
        pub fail: bool,
        pub response: Value,
    }

    impl RecordingTransport {
        pub fn ok(response: Value) -> Self {
            Self {
                response,
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, url: &str, body: Option<&Value>, auth_token: &str) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push(Call {
                url: url.to_string(),
                body: body.cloned(),
                auth_token: auth_token.to_string(),
            });
            if self.fail {
                return Err(TransportError::Status {
                    status: 500,
                    body: "upstream error".to_string(),
                });
            }
            Ok(self.response.clone())
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_json(&self, url: &str, body: &Value, auth_token: &str) -> Result<Value, TransportError> {
            self.record(url, Some(body), auth_token)
        }

        async fn get_json(&self, url: &str, auth_token: &str) -> Result<Value, TransportError> {
            self.record(url, None, auth_token)
        }
    }
}

//! Gateway HTTP server (single port): WhatsApp webhook, send endpoints, and health.

use crate::config::{self, Config};
use crate::dispatch::Dispatcher;
use crate::gateway::protocol::{
    ErrorResponse, MarkAsReadRequest, SendInteractiveRequest, SendMessageRequest,
    SendTemplateRequest, SuccessResponse,
};
use crate::whatsapp::verify::SIGNATURE_HEADER;
use crate::whatsapp::{
    verify_handshake, verify_signature, HandshakeQuery, HttpTransport, Transport, WhatsAppClient,
    WhatsAppError,
};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Capacity of the webhook queue between the HTTP handler and the processor task.
const INBOUND_QUEUE_CAPACITY: usize = 64;

/// One acknowledged webhook POST waiting to be classified and dispatched.
#[derive(Debug)]
pub struct WebhookDelivery {
    pub id: String,
    pub received_at: DateTime<Utc>,
    pub body: Bytes,
}

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub client: WhatsAppClient,
    /// Sender for acknowledged webhook bodies. The processor task receives.
    pub inbound_tx: mpsc::Sender<WebhookDelivery>,
}

impl GatewayState {
    /// Build the state and spawn the webhook processor. The processor exits after every
    /// clone of the state (and so every sender) is dropped and the queue is drained.
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>) -> (Self, JoinHandle<()>) {
        let client = WhatsAppClient::new(Arc::new(config.whatsapp.clone()), transport);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let processor = spawn_processor(Dispatcher::new(client.clone()), inbound_rx);
        let state = Self {
            config,
            client,
            inbound_tx,
        };
        (state, processor)
    }
}

/// Handle deliveries one at a time, in arrival order. Errors are logged and never reach the provider.
fn spawn_processor(
    dispatcher: Dispatcher,
    mut inbound_rx: mpsc::Receiver<WebhookDelivery>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(delivery) = inbound_rx.recv().await {
            match dispatcher.handle_webhook(&delivery.body).await {
                Ok(count) => log::debug!(
                    "delivery {} processed: {} event(s) in {} ms",
                    delivery.id,
                    count,
                    (Utc::now() - delivery.received_at).num_milliseconds()
                ),
                Err(e) => log::error!("delivery {} not processed: {}", delivery.id, e),
            }
        }
        log::debug!("webhook processor stopped");
    })
}

/// Routes: `/webhook/whatsapp...` and `/health`.
pub fn router(state: GatewayState) -> Router {
    let whatsapp = Router::new()
        .route("/whatsapp", get(verify_webhook).post(receive_webhook))
        .route("/whatsapp/send-message", post(send_message))
        .route("/whatsapp/send-template", post(send_template))
        .route("/whatsapp/send-interactive", post(send_interactive))
        .route("/whatsapp/mark-as-read", post(mark_as_read))
        .route("/whatsapp/message/:message_id", get(message_info));

    Router::new()
        .nest("/webhook", whatsapp)
        .route("/health", get(health_http))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port().
/// Blocks until shutdown (Ctrl+C or SIGTERM), then drains queued webhook deliveries.
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) && config.whatsapp.app_secret.is_none() {
        log::warn!(
            "gateway bound to {} without an app secret: webhook signatures are not verified (set whatsapp.appSecret or WHATSAPP_APP_SECRET)",
            bind
        );
    }
    if config.whatsapp.verify_token.is_none() {
        log::warn!("no verify token configured: webhook verification requests will be rejected");
    }
    if config.whatsapp.phone_number_id.is_none() || config.whatsapp.access_token.is_none() {
        log::warn!("phone number id or access token missing: outbound messages will fail");
    }

    let bind_addr = format!("{}:{}", bind, config.gateway.port());
    let config = Arc::new(config);
    let (state, processor) = GatewayState::new(config, Arc::new(HttpTransport::new()));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    if let Err(e) = processor.await {
        log::warn!("webhook processor ended abnormally: {}", e);
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections and queued webhooks");
}

/// GET /webhook/whatsapp: subscription handshake. Echoes `hub.challenge` as plain text.
async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(query): Query<HandshakeQuery>,
) -> Response {
    let handshake = verify_handshake(&query, state.config.whatsapp.verify_token.as_deref());
    if handshake.valid {
        log::info!("webhook verified");
        return (StatusCode::OK, handshake.challenge.unwrap_or_default()).into_response();
    }
    log::warn!(
        "webhook verification failed (mode {:?}, token {})",
        query.mode,
        if query.verify_token.is_some() { "mismatch" } else { "missing" }
    );
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse::invalid("invalid verify token")),
    )
        .into_response()
}

/// POST /webhook/whatsapp: verifies the optional signature, queues the body, acks with 200.
/// Never waits on the queue; a delivery that does not fit is logged and dropped.
async fn receive_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = uuid::Uuid::new_v4().to_string();
    let received_at = Utc::now();
    log::info!(
        "webhook delivery {} received at {} ({} bytes)",
        id,
        received_at.to_rfc3339(),
        body.len()
    );

    if let Some(ref secret) = state.config.whatsapp.app_secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(&body, provided, secret) {
            log::warn!("webhook delivery {} rejected: bad {} header", id, SIGNATURE_HEADER);
            return (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::invalid("invalid signature")),
            )
                .into_response();
        }
    }

    let delivery = WebhookDelivery {
        id,
        received_at,
        body,
    };
    match state.inbound_tx.try_send(delivery) {
        Ok(()) => {}
        Err(TrySendError::Full(d)) => {
            log::error!("webhook delivery {} dropped: queue full ({} pending)", d.id, INBOUND_QUEUE_CAPACITY);
        }
        Err(TrySendError::Closed(d)) => {
            log::error!("webhook delivery {} dropped: processor is not running", d.id);
        }
    }
    (StatusCode::OK, Json(SuccessResponse::ack())).into_response()
}

fn rejected(rejection: JsonRejection) -> Response {
    log::debug!("rejected request body: {}", rejection);
    error_response(WhatsAppError::Validation(rejection.body_text()))
}

/// Validation errors are the caller's fault (400 `{error}`); anything else is 500 `{success:false, error}`.
fn error_response(error: WhatsAppError) -> Response {
    match error {
        WhatsAppError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::invalid(message))).into_response()
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::failed(other.to_string())),
        )
            .into_response(),
    }
}

/// 200 `{success, data}` or the mapped error.
fn provider_response(result: Result<Value, WhatsAppError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(SuccessResponse::data(data))).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /webhook/whatsapp/send-message: `{phoneNumber, message}`.
async fn send_message(
    State(state): State<GatewayState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };
    match req.validate() {
        Ok((to, message)) => provider_response(state.client.send_text(to, message).await),
        Err(e) => error_response(e),
    }
}

/// POST /webhook/whatsapp/send-template: `{phoneNumber, templateName, parameters?}`.
async fn send_template(
    State(state): State<GatewayState>,
    payload: Result<Json<SendTemplateRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };
    match req.validate() {
        Ok((to, name, params)) => provider_response(state.client.send_template(to, name, params).await),
        Err(e) => error_response(e),
    }
}

/// POST /webhook/whatsapp/send-interactive: `{phoneNumber, message, buttons}`.
async fn send_interactive(
    State(state): State<GatewayState>,
    payload: Result<Json<SendInteractiveRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };
    match req.validate() {
        Ok((to, message, buttons)) => {
            provider_response(state.client.send_interactive(to, message, buttons.clone()).await)
        }
        Err(e) => error_response(e),
    }
}

/// POST /webhook/whatsapp/mark-as-read: `{messageId}`.
async fn mark_as_read(
    State(state): State<GatewayState>,
    payload: Result<Json<MarkAsReadRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };
    let result = match req.validate() {
        Ok(message_id) => state.client.mark_as_read(message_id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(SuccessResponse::message("message marked as read")),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /webhook/whatsapp/message/:messageId: provider metadata for one message.
async fn message_info(
    State(state): State<GatewayState>,
    Path(message_id): Path<String>,
) -> Response {
    if message_id.trim().is_empty() {
        return error_response(WhatsAppError::Validation("messageId is required".to_string()));
    }
    provider_response(state.client.message_info(&message_id).await)
}

/// GET /health returns a simple health JSON (for probes).
async fn health_http() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

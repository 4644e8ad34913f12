//! Gateway HTTP server.

use crate::broker::{AmqpPublisher, BrokerConnection, MemoryPublisher, QueuePublisher};
use crate::config::Config;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::gateway::protocol::{SubmitRequest, REQUEST_ID_HEADER};
use crate::inbound::InboundMessage;
use crate::interpreter::HttpInterpreter;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state for request handlers. Read-only after startup.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
}

impl GatewayState {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Routes: `GET /` health, `POST /commands` dispatch.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/commands", post(submit_command))
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server exited")
}

/// Run the service: connect to the broker (or use the in-memory publisher when `dry_run`),
/// bind config.gateway.bind:config.gateway.port and block until SIGINT/SIGTERM.
/// The broker connection is closed after the server drains.
pub async fn run_gateway(config: Config, dry_run: bool) -> Result<()> {
    let mut connection: Option<BrokerConnection> = None;
    let publisher: Arc<dyn QueuePublisher> = if dry_run {
        log::warn!("dry run: messages are kept in memory, nothing reaches the broker");
        Arc::new(MemoryPublisher::new())
    } else {
        let conn = BrokerConnection::connect(&config.broker.uri)
            .await
            .context("connecting to broker (set RABBITMQ_CONNECTION_STRING or broker.uri)")?;
        connection = Some(conn.clone());
        Arc::new(AmqpPublisher::new(conn, &config.broker))
    };
    let interpreter = Arc::new(HttpInterpreter::from_config(&config.interpreter));
    log::info!(
        "interpreter: {} (timeout {}s)",
        config.interpreter.url,
        config.interpreter.timeout_secs
    );

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("aloy core listening on {}", bind_addr);

    let state = GatewayState::new(config, Dispatcher::new(interpreter, publisher));
    let served = serve(listener, state, shutdown_signal()).await;

    if let Some(conn) = connection {
        if let Err(e) = conn.close().await {
            log::debug!("broker: close on shutdown: {}", e);
        }
    }
    log::info!("gateway stopped");
    served
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// Request id from the incoming header, or a fresh one.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn error_status(err: &DispatchError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// POST /commands: `{ "message" }` in, `{ "status", "message" }` out; plain-text errors.
async fn submit_command(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = request_id(&headers);
    let req: SubmitRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("[{}] rejected body: {}", id, e);
            return (StatusCode::BAD_REQUEST, [(REQUEST_ID_HEADER, id)], e.to_string())
                .into_response();
        }
    };
    let msg = InboundMessage::with_request_id(id.clone(), req.message);
    // Own task: a client hanging up must not abort interpretation or publishing midway.
    let dispatcher = Arc::clone(&state.dispatcher);
    let outcome = tokio::spawn(async move { dispatcher.dispatch(&msg).await }).await;
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("[{}] dispatch task failed: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(REQUEST_ID_HEADER, id)],
                "dispatch task failed".to_string(),
            )
                .into_response();
        }
    };
    match outcome {
        Ok(result) => (StatusCode::OK, [(REQUEST_ID_HEADER, id)], Json(result)).into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                log::error!("[{}] dispatch failed: {}", id, e);
            } else {
                log::debug!("[{}] dispatch rejected: {}", id, e);
            }
            (status, [(REQUEST_ID_HEADER, id)], e.to_string()).into_response()
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let publisher = state.dispatcher.publisher();
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "broker": publisher.name(),
        "brokerConnected": publisher.is_connected(),
    }))
}

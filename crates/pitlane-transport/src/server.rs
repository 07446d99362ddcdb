//! Axum WebSocket server
//!
//! `GET /ws/:channel?role=&key=` opens one channel. A single fan-out task
//! turns race events into channel deliveries; every socket filters the
//! deliveries for its own channel.

use std::sync::Arc;

use axum::extract::ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pitlane_core::{RaceMode, SessionId};
use pitlane_runtime::RaceService;
use pitlane_store::JsonFileStore;
use pitlane_time::SystemClock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{handle_text, initial_view, route, AccessGate, Channel, Delivery, GateError, ServerConfig};

/// Deliveries buffered per socket before it starts lagging
pub const DELIVERY_CAPACITY: usize = 1024;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RaceService>,
    pub gate: Arc<AccessGate>,
    deliveries: broadcast::Sender<Delivery>,
}

impl AppState {
    pub fn new(service: Arc<RaceService>, gate: Arc<AccessGate>) -> Self {
        let (deliveries, _) = broadcast::channel(DELIVERY_CAPACITY);
        AppState {
            service,
            gate,
            deliveries,
        }
    }

    pub fn subscribe_deliveries(&self) -> broadcast::Receiver<Delivery> {
        self.deliveries.subscribe()
    }
}

/// Connection credentials from the query string
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub role: Option<String>,
    pub key: Option<String>,
}

/// Health probe body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
    pub current_session_id: Option<SessionId>,
    pub race_mode: Option<RaceMode>,
    pub timers_armed: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/:channel", get(ws_handler))
        .with_state(state)
}

/// Forward race events to channel deliveries until the event bus closes
pub fn spawn_fanout(state: &AppState) -> JoinHandle<()> {
    let mut events = state.service.subscribe();
    let service = state.service.clone();
    let deliveries = state.deliveries.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    for delivery in route(&event, &service) {
                        // No connected sockets is fine
                        let _ = deliveries.send(delivery);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "fan-out fell behind race events");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("fan-out stopped");
    })
}

/// Open the store, resume race state and serve until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let store = Arc::new(JsonFileStore::new(config.state_file.clone()));
    let race_config = config.race_config();
    info!(
        race_secs = race_config.race_duration.as_secs(),
        environment = ?config.environment,
        "race configuration"
    );
    let service = RaceService::open(race_config, store, Arc::new(SystemClock));
    let gate = Arc::new(AccessGate::new(config.keys.clone(), config.auth_failure_delay));
    let state = AppState::new(service, gate);
    let fanout = spawn_fanout(&state);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(ServerError::Bind)?;
    info!(addr = %config.listen_addr, state_file = %config.state_file.display(), "race server listening");

    let result = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve);
    fanout.abort();
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let current = state.service.current_session();
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.service.sessions().len(),
        current_session_id: current.as_ref().map(|s| s.id),
        race_mode: current.map(|s| s.mode),
        timers_armed: state.service.timers_armed(),
    })
}

async fn ws_handler(
    Path(name): Path<String>,
    Query(credentials): Query<Credentials>,
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(channel) = name.parse::<Channel>() else {
        return (StatusCode::NOT_FOUND, format!("Unknown channel: {name}")).into_response();
    };

    let admitted = state
        .gate
        .admit(
            channel.as_str(),
            channel.required_role(),
            credentials.role.as_deref(),
            credentials.key.as_deref(),
        )
        .await;
    let role = match admitted {
        Ok(role) => role,
        Err(e) => return (gate_status(&e), e.to_string()).into_response(),
    };

    match upgrade {
        Ok(upgrade) => {
            info!(channel = %channel, role = ?role, "channel connected");
            upgrade.on_upgrade(move |socket| run_socket(socket, channel, state))
        }
        Err(rejection) => rejection.into_response(),
    }
}

fn gate_status(err: &GateError) -> StatusCode {
    match err {
        GateError::Forbidden { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::UNAUTHORIZED,
    }
}

async fn run_socket(mut socket: WebSocket, channel: Channel, state: AppState) {
    let mut deliveries = state.subscribe_deliveries();

    for message in initial_view(channel, &state.service) {
        if send_json(&mut socket, &message).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = handle_text(channel, &state.service, &text);
                    if send_json(&mut socket, &reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(channel = %channel, error = %e, "socket receive failed");
                    break;
                }
            },
            delivery = deliveries.recv() => match delivery {
                Ok((target, message)) if target == channel => {
                    if send_json(&mut socket, &message).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %channel, skipped, "socket lagging, messages dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    info!(channel = %channel, "channel disconnected");
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).map_err(axum::Error::new)?;
    socket.send(Message::Text(text)).await
}

//! `GatewayServer` — Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use taskwire_auth::TokenVerifier;
use taskwire_core::events::DomainEvent;
use taskwire_core::ids::ConnectionId;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::dispatcher::NotificationDispatcher;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::ws::gateway::{self, SessionContext};
use crate::ws::registry::SessionRegistry;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session registry.
    pub registry: Arc<SessionRegistry>,
    /// Notification dispatcher for event fan-out.
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Credential verifier.
    pub verifier: Arc<TokenVerifier>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

/// The taskwire gateway server.
pub struct GatewayServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    verifier: Arc<TokenVerifier>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl GatewayServer {
    /// Create a new server from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let verifier = Arc::new(TokenVerifier::new(&config.jwt_secret));
        let registry = Arc::new(SessionRegistry::new(config.room_prefix.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(registry.clone()));
        Self {
            config: Arc::new(config),
            registry,
            dispatcher,
            verifier,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            dispatcher: self.dispatcher.clone(),
            verifier: self.verifier.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            config: self.config.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route("/publish", post(publish_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (the OS-assigned port when configured with
    /// port `0`) and the serve task's handle.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "gateway listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Get the notification dispatcher.
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the credential verifier.
    pub fn verifier(&self) -> &Arc<TokenVerifier> {
        &self.verifier
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Query parameters accepted on the `WebSocket` upgrade.
#[derive(Debug, Deserialize)]
struct WsQuery {
    /// Optional handshake credential.
    token: Option<String>,
}

/// Pull a bearer token out of an `Authorization` header, if present.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let resp = health::health_check(
        state.start_time,
        state.registry.connection_count(),
        state.registry.room_count(),
    );
    Json(resp)
}

/// GET /ws — upgrade to a gateway session.
async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.token.or_else(|| bearer_token(&headers));
    let ctx = SessionContext {
        verifier: state.verifier.clone(),
        registry: state.registry.clone(),
        config: state.config.clone(),
        shutdown: state.shutdown.token(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            gateway::run_connection(socket, ConnectionId::new(), token, ctx)
        })
}

/// POST /publish — hand-off from the CRUD layer.
///
/// Delivery is best-effort, so the count reflects frames queued for targets
/// that were online at publish time, not confirmed receipt.
async fn publish_handler(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> Response {
    if event.target_user_ids.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "event has no target users" })),
        )
            .into_response();
    }
    let delivered = state.dispatcher.publish(&event);
    (StatusCode::ACCEPTED, Json(json!({ "delivered": delivered }))).into_response()
}

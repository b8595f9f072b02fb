//! Gateway session loop — drives a single connection from upgrade through
//! teardown.
//!
//! Authentication is a separate, repeatable, post-connect event: the
//! upgrade may carry a credential, but a missing or invalid one never
//! rejects the connection (the client may immediately send a fresh one).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use taskwire_auth::TokenVerifier;
use taskwire_core::ids::{ConnectionId, UserId};
use taskwire_core::protocol::{ClientFrame, ServerFrame};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::registry::SessionRegistry;
use crate::config::ServerConfig;

/// Shared context for every gateway session.
#[derive(Clone)]
pub struct SessionContext {
    /// Credential verifier.
    pub verifier: Arc<TokenVerifier>,
    /// The session registry.
    pub registry: Arc<SessionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Cancelled on server shutdown.
    pub shutdown: CancellationToken,
}

/// Resolve an optional handshake credential to a subject.
///
/// Invalid credentials degrade to unauthenticated instead of rejecting:
/// a stale token at upgrade time must not block a client that will send a
/// fresh `authenticate` right after connecting.
pub fn resolve_handshake(verifier: &TokenVerifier, token: Option<&str>) -> Option<UserId> {
    let token = token?;
    match verifier.verify(token) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "handshake credential rejected, continuing unauthenticated");
            None
        }
    }
}

/// Run a gateway session for an upgraded connection.
///
/// 1. Registers the connection (authenticated if the handshake credential
///    verified) and sends a `connection.established` greeting
/// 2. Forwards outbound frames and sends periodic Ping frames
/// 3. Handles `authenticate` frames at any point while open
/// 4. On any close, removes the connection from the registry before the
///    session ends — nothing is delivered past this point
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_connection(
    ws: WebSocket,
    conn_id: ConnectionId,
    handshake_token: Option<String>,
    ctx: SessionContext,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.config.send_buffer);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    ctx.registry.register_unauthenticated(connection.clone());
    let handshake_subject = resolve_handshake(&ctx.verifier, handshake_token.as_deref());
    if let Some(ref user) = handshake_subject {
        ctx.registry.authenticate(&conn_id, user.clone());
        info!(user_id = %user, "connection authenticated at handshake");
    } else {
        info!("connection accepted unauthenticated");
    }
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    let greeting = ServerFrame::connection_established(&conn_id, handshake_subject.is_some());
    if let Ok(json) = serde_json::to_string(&greeting) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    // Outbound forwarder with periodic Ping frames.
    let ping_interval = Duration::from_secs(ctx.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(ctx.config.heartbeat_timeout_secs);
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        let _ = ticker.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop.
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = ctx.shutdown.cancelled() => {
                info!("server shutting down, closing connection");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };
        let Some(text) = text else { continue };

        match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::Authenticate { token }) => {
                handle_authenticate(&ctx, &connection, &token);
            }
            Err(_) => {
                // sends from unauthenticated or chatty clients carry no
                // server-side meaning
                debug!("ignoring unrecognized client frame");
            }
        }
    }

    // Teardown: membership must be gone before the session ends.
    ctx.registry.remove(&conn_id);
    outbound.abort();
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    info!("connection closed");
}

/// Verify an explicit `authenticate` frame and update the registry.
///
/// Failure keeps the connection open; the client may retry with a fresh
/// credential.
fn handle_authenticate(ctx: &SessionContext, connection: &Arc<ClientConnection>, token: &str) {
    match ctx.verifier.verify(token) {
        Ok(user) => {
            ctx.registry.authenticate(&connection.id, user.clone());
            let _ = connection.send_frame(&ServerFrame::authenticated(&user));
            info!(user_id = %user, "connection authenticated");
        }
        Err(e) => {
            warn!(error = %e, "authenticate frame rejected");
            let _ = connection.send_frame(&ServerFrame::authentication_error("Invalid token"));
        }
    }
}

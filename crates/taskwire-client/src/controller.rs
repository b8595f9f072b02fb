//! Async client controller.
//!
//! `GatewayClient` spawns a driver task that owns the transport and the
//! retry timers and feeds every observation through the pure state machine
//! in [`crate::state`]. The controller performs the returned effects: it
//! dials, sends the `authenticate` frame after every successful connect,
//! waits out backoff delays, and routes pushed frames to subscribers.

use std::sync::Arc;

use futures::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use taskwire_core::protocol::{
    DisconnectReason, AUTHENTICATED, AUTHENTICATION_ERROR, CONNECTION_ESTABLISHED,
};
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::state::{transition, ClientEvent, ClientState, Effect};
use crate::subscriptions::SubscriptionMap;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Externally visible connection status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected and not trying.
    Offline,
    /// A dial or a backoff wait is in progress.
    Connecting,
    /// The transport is open.
    Connected {
        /// Whether the gateway has acknowledged our credential.
        authenticated: bool,
    },
    /// Automatic retries ran out; an explicit `connect` is required.
    Exhausted,
}

/// Commands from the public API to the driver task.
enum Command {
    Connect,
    Disconnect,
    Send(String),
}

/// Reconnecting gateway client.
pub struct GatewayClient {
    commands: mpsc::Sender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    subscriptions: Arc<SubscriptionMap>,
    credentials: Arc<dyn CredentialStore>,
    token_key: String,
}

impl GatewayClient {
    /// Create a client and spawn its driver task.
    ///
    /// The driver idles until [`connect`](Self::connect) is called and exits
    /// when the client is dropped.
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let subscriptions = Arc::new(SubscriptionMap::new());
        let (command_tx, command_rx) = mpsc::channel(8);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Offline);

        let token_key = config.token_key.clone();
        let driver = Driver {
            config,
            credentials: credentials.clone(),
            subscriptions: subscriptions.clone(),
            status_tx,
            state: ClientState::Idle,
        };
        drop(tokio::spawn(driver.run(command_rx)));

        Self {
            commands: command_tx,
            status_rx,
            subscriptions,
            credentials,
            token_key,
        }
    }

    /// Ask the driver to connect (no-op while already connected).
    pub async fn connect(&self) {
        let _ = self.commands.send(Command::Connect).await;
    }

    /// Ask the driver to disconnect deliberately. No reconnection follows.
    pub async fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect).await;
    }

    /// Send a frame to the gateway over the open connection.
    pub async fn send(&self, frame: &Value) -> Result<(), crate::errors::ClientError> {
        if !matches!(
            *self.status_rx.borrow(),
            ConnectionStatus::Connected { .. }
        ) {
            return Err(crate::errors::ClientError::NotConnected);
        }
        self.commands
            .send(Command::Send(frame.to_string()))
            .await
            .map_err(|_| crate::errors::ClientError::NotConnected)
    }

    /// Sign out: clear the stored credential, then disconnect.
    ///
    /// Clearing first guarantees no in-flight reconnect can re-authenticate
    /// with the old token.
    pub async fn sign_out(&self) {
        self.credentials.clear(&self.token_key);
        self.disconnect().await;
    }

    /// Watch the connection status.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to pushed frames of the given kind (e.g. `task_shared`).
    pub fn subscribe(&self, kind: &str) -> mpsc::Receiver<Value> {
        self.subscriptions.subscribe(kind)
    }
}

/// The driver task: state machine plus the I/O that feeds it.
struct Driver {
    config: ClientConfig,
    credentials: Arc<dyn CredentialStore>,
    subscriptions: Arc<SubscriptionMap>,
    status_tx: watch::Sender<ConnectionStatus>,
    state: ClientState,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            match self.state {
                ClientState::Idle => match commands.recv().await {
                    Some(Command::Connect) => {
                        let _ = self.apply(ClientEvent::ConnectRequested);
                    }
                    Some(Command::Disconnect | Command::Send(_)) => {}
                    None => return,
                },
                ClientState::Connecting { .. } => {
                    if self.dial(&mut commands).await.is_break() {
                        return;
                    }
                }
                ClientState::Reconnecting { attempt } => {
                    self.backoff(attempt, &mut commands).await;
                }
                ClientState::Connected { .. } => {
                    // reachable only through dial(), which runs the session
                    // to completion before returning
                    unreachable!("driver outer loop observed Connected");
                }
            }
        }
    }

    /// Feed an event through the machine, publish the new status, and
    /// return the effects for the call site to act on.
    fn apply(&mut self, event: ClientEvent) -> Vec<Effect> {
        let (next, effects) = transition(self.state, event, &self.config.reconnect);
        debug!(?event, from = ?self.state, to = ?next, "client transition");
        self.state = next;

        let status = if effects.contains(&Effect::NotifyExhausted) {
            warn!("reconnect attempts exhausted, staying offline");
            ConnectionStatus::Exhausted
        } else {
            match self.state {
                ClientState::Idle => ConnectionStatus::Offline,
                ClientState::Connecting { .. } | ClientState::Reconnecting { .. } => {
                    ConnectionStatus::Connecting
                }
                ClientState::Connected { authenticated } => {
                    ConnectionStatus::Connected { authenticated }
                }
            }
        };
        let _ = self.status_tx.send_replace(status);
        effects
    }

    /// Dial the gateway, then run the session until the connection ends.
    ///
    /// Returns `Break` when the command channel is gone and the driver
    /// should exit.
    async fn dial(
        &mut self,
        commands: &mut mpsc::Receiver<Command>,
    ) -> std::ops::ControlFlow<()> {
        let ws = tokio::select! {
            result = connect_async(self.config.url.as_str()) => match result {
                Ok((ws, _)) => ws,
                Err(e) => {
                    warn!(url = %self.config.url, error = %e, "dial failed");
                    let _ = self.apply(ClientEvent::ConnectFailed);
                    return std::ops::ControlFlow::Continue(());
                }
            },
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Disconnect) | None => {
                        let _ = self.apply(ClientEvent::DisconnectRequested);
                        if cmd.is_none() {
                            return std::ops::ControlFlow::Break(());
                        }
                    }
                    Some(Command::Connect | Command::Send(_)) => {}
                }
                return std::ops::ControlFlow::Continue(());
            }
        };

        info!(url = %self.config.url, "connected to gateway");
        let effects = self.apply(ClientEvent::TransportOpened);
        self.session(ws, effects, commands).await
    }

    /// Run an open session until it ends, feeding observations through the
    /// machine.
    async fn session(
        &mut self,
        ws: WsStream,
        effects: Vec<Effect>,
        commands: &mut mpsc::Receiver<Command>,
    ) -> std::ops::ControlFlow<()> {
        let (mut ws_tx, mut ws_rx) = ws.split();

        if effects.contains(&Effect::SendAuthenticate) {
            self.send_authenticate(&mut ws_tx).await;
        }

        loop {
            tokio::select! {
                msg = ws_rx.next() => {
                    let reason = match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(text.as_str());
                            continue;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_tx.send(Message::Pong(data)).await;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => DisconnectReason::RemoteClose,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!(error = %e, "transport error");
                            DisconnectReason::TransportError
                        }
                    };
                    let _ = self.apply(ClientEvent::ConnectionLost(reason));
                    return std::ops::ControlFlow::Continue(());
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Disconnect) | None => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            let _ = self.apply(ClientEvent::DisconnectRequested);
                            return if cmd.is_none() {
                                std::ops::ControlFlow::Break(())
                            } else {
                                std::ops::ControlFlow::Continue(())
                            };
                        }
                        Some(Command::Send(text)) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                warn!("failed to send frame");
                            }
                        }
                        Some(Command::Connect) => {}
                    }
                }
            }
        }
    }

    /// Send an `authenticate` frame with the stored credential, if any.
    async fn send_authenticate(&self, ws_tx: &mut (impl Sink<Message> + Unpin)) {
        let Some(token) = self.credentials.get(&self.config.token_key) else {
            debug!("no stored credential, staying unauthenticated");
            return;
        };
        let frame = serde_json::json!({ "type": "authenticate", "token": token });
        if ws_tx
            .send(Message::Text(frame.to_string().into()))
            .await
            .is_err()
        {
            warn!("failed to send authenticate frame");
        }
    }

    /// Route one inbound frame: auth acknowledgements drive the machine,
    /// everything else goes to subscribers by kind.
    fn handle_frame(&mut self, raw: &str) {
        let Ok(frame) = serde_json::from_str::<Value>(raw) else {
            debug!("ignoring unparseable frame");
            return;
        };
        let Some(kind) = frame.get("type").and_then(Value::as_str) else {
            debug!("ignoring untyped frame");
            return;
        };
        let data = frame.get("data").cloned().unwrap_or(Value::Null);

        match kind {
            AUTHENTICATED => {
                info!(user = ?data.get("userId"), "authenticated");
                let _ = self.apply(ClientEvent::Authenticated);
            }
            AUTHENTICATION_ERROR => {
                warn!(?data, "authentication rejected");
                let _ = self.apply(ClientEvent::AuthenticationRejected);
            }
            CONNECTION_ESTABLISHED => {
                debug!(?data, "session established");
            }
            _ => {
                let delivered = self.subscriptions.dispatch(kind, &data);
                debug!(kind, delivered, "event dispatched");
            }
        }
    }

    /// Wait out the backoff delay for the given retry, unless a disconnect
    /// arrives first.
    async fn backoff(&mut self, attempt: u32, commands: &mut mpsc::Receiver<Command>) {
        let delay = self
            .config
            .reconnect
            .delay_ms(attempt, rand::random::<f64>());
        info!(attempt, delay_ms = delay, "waiting before reconnect");

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(delay)) => {
                let _ = self.apply(ClientEvent::RetryTimerFired);
            }
            cmd = commands.recv() => match cmd {
                Some(Command::Disconnect) | None => {
                    let _ = self.apply(ClientEvent::DisconnectRequested);
                }
                Some(Command::Connect | Command::Send(_)) => {}
            }
        }
    }
}

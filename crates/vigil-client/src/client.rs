//! WebSocket viewer with automatic reconnect.
//!
//! [`ViewerClient::connect`] spawns a driver task that feeds socket outcomes
//! into a [`ReconnectMachine`] and carries out the actions it returns.
//! Decoded messages (pings excluded) are delivered in arrival order through
//! [`ViewerClient::recv`].

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use vigil_core::{WireMessage, decode_frame};

use crate::backoff::ReconnectPolicy;
use crate::machine::{Action, ConnectionState, Input, ReconnectMachine};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors from the viewer client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The URL cannot be turned into a WebSocket request.
    #[error("Invalid viewer URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The driver task panicked.
    #[error("Viewer task failed: {0}")]
    Task(#[from] JoinError),
}

/// Viewer connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `ws://` or `wss://` URL of the event stream.
    pub url: String,
    pub policy: ReconnectPolicy,
    /// Silence after which an open connection is treated as dead.
    pub idle_timeout: Option<Duration>,
    /// Decoded messages buffered for [`ViewerClient::recv`].
    pub buffer: usize,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            policy: ReconnectPolicy::default(),
            idle_timeout: Some(Duration::from_secs(90)),
            buffer: 256,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

/// Handle to a running viewer connection.
#[derive(Debug)]
pub struct ViewerClient {
    messages: mpsc::Receiver<WireMessage>,
    state: watch::Receiver<ConnectionState>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl ViewerClient {
    /// Start connecting to `config.url` in the background.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        if let Err(e) = config.url.as_str().into_client_request() {
            return Err(ClientError::InvalidUrl {
                url: config.url,
                reason: e.to_string(),
            });
        }

        let (tx, messages) = mpsc::channel(config.buffer.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let stop = CancellationToken::new();
        let task = tokio::spawn(drive(config, tx, state_tx, stop.clone()));

        Ok(Self {
            messages,
            state,
            stop,
            task,
        })
    }

    /// Next decoded message; `None` once the client has disconnected.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.messages.recv().await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection state satisfies `predicate`.
    ///
    /// Returns `None` if the driver exited first.
    pub async fn wait_for_state(
        &mut self,
        predicate: impl FnMut(&ConnectionState) -> bool,
    ) -> Option<ConnectionState> {
        self.state.wait_for(predicate).await.ok().map(|state| *state)
    }

    /// Close the connection, cancel any pending reconnect and wait for the
    /// driver to exit. No further attempts are made.
    pub async fn disconnect(self) -> Result<(), ClientError> {
        self.stop.cancel();
        drop(self.messages);
        self.task.await?;
        Ok(())
    }
}

/// How an open session ended.
enum SessionEnd {
    /// Disconnect was requested.
    Stopped,
    /// Nobody is reading messages any more.
    Abandoned,
    /// The connection failed or was closed by the server.
    Lost(String),
}

async fn drive(
    config: ClientConfig,
    tx: mpsc::Sender<WireMessage>,
    state_tx: watch::Sender<ConnectionState>,
    stop: CancellationToken,
) {
    let mut machine = ReconnectMachine::new(config.policy);
    let mut next = machine.step(Input::Connect);

    loop {
        state_tx.send_replace(machine.state());

        let input = match next {
            Some(Action::OpenSocket) => {
                let opened = tokio::select! {
                    () = stop.cancelled() => None,
                    opened = connect_async(config.url.as_str()) => Some(opened),
                };
                match opened {
                    None => Input::Disconnect,
                    Some(Ok((socket, _))) => {
                        machine.step(Input::Opened);
                        state_tx.send_replace(machine.state());
                        info!(url = %config.url, "Viewer connected");

                        match session(socket, &tx, config.idle_timeout, &stop).await {
                            SessionEnd::Stopped | SessionEnd::Abandoned => Input::Disconnect,
                            SessionEnd::Lost(reason) => {
                                warn!(url = %config.url, %reason, "Viewer connection lost");
                                Input::Closed
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(url = %config.url, error = %e, "Viewer connect failed");
                        Input::OpenFailed
                    }
                }
            }
            Some(Action::ScheduleReconnect(delay)) => {
                debug!(url = %config.url, ?delay, "Reconnect scheduled");
                tokio::select! {
                    () = stop.cancelled() => Input::Disconnect,
                    () = tokio::time::sleep(delay) => Input::RetryElapsed,
                }
            }
            Some(Action::CancelReconnect | Action::CloseSocket) | None => break,
        };

        next = machine.step(input);
    }

    state_tx.send_replace(machine.state());
    info!(url = %config.url, "Viewer disconnected");
}

async fn session(
    socket: Socket,
    tx: &mpsc::Sender<WireMessage>,
    idle_timeout: Option<Duration>,
    stop: &CancellationToken,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    loop {
        let incoming = tokio::select! {
            () = stop.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Stopped;
            }
            incoming = next_message(&mut stream, idle_timeout) => incoming,
        };

        let message = match incoming {
            Some(Some(Ok(message))) => message,
            Some(Some(Err(e))) => return SessionEnd::Lost(e.to_string()),
            Some(None) => return SessionEnd::Lost("connection closed".to_string()),
            None => return SessionEnd::Lost("idle timeout".to_string()),
        };

        match message {
            Message::Text(text) => {
                for decoded in decode_frame(text.as_str()) {
                    match decoded {
                        Ok(msg) if msg.is_ping() => trace!("ping"),
                        Ok(msg) => {
                            // A full buffer must not keep disconnect waiting.
                            let delivered = tokio::select! {
                                () = stop.cancelled() => {
                                    let _ = sink.send(Message::Close(None)).await;
                                    return SessionEnd::Stopped;
                                }
                                sent = tx.send(msg) => sent.is_ok(),
                            };
                            if !delivered {
                                let _ = sink.send(Message::Close(None)).await;
                                return SessionEnd::Abandoned;
                            }
                        }
                        Err(e) => warn!(error = %e, "Skipping malformed message"),
                    }
                }
            }
            Message::Close(frame) => {
                return SessionEnd::Lost(format!("closed by server: {frame:?}"));
            }
            // Protocol pings are answered by tungstenite.
            _ => {}
        }
    }
}

/// Next item from the socket; `None` if `idle_timeout` passed first.
async fn next_message<S>(stream: &mut S, idle_timeout: Option<Duration>) -> Option<Option<S::Item>>
where
    S: Stream + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next()).await.ok(),
        None => Some(stream.next().await),
    }
}

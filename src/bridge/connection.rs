use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;
use uuid::Uuid;

use super::error::BridgeError;
use super::types::{ClientFrame, ConnectionUpdate, Reply, ServerFrame};
use crate::Result;
use crate::error::Error;
use crate::transport::{CloseReason, Connection, Session, Transport, TransportEvent};
use crate::types::{CredentialBlob, Identity};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<DashMap<Uuid, oneshot::Sender<Reply>>>;

const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(60);
const DEFAULT_REQUEST_TIMEOUT_DURATION: Duration = Duration::from_secs(60);

/// Configuration for the sidecar bridge.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum time for the WebSocket handshake plus the `hello` frame
    pub connect_timeout: Duration,
    /// Maximum time to wait for the sidecar to answer a send, probe or ping
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_DURATION,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_DURATION,
        }
    }
}

/// [`Transport`] backed by a WebSocket connection to the protocol sidecar.
///
/// Every [`Transport::connect`] opens a fresh socket; the returned session owns it until
/// [`Session::close`] is called or the socket drops.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    endpoint: Url,
    config: BridgeConfig,
}

impl BridgeTransport {
    pub fn new(endpoint: &str, config: BridgeConfig) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            config,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn connect(&self, credentials: Option<CredentialBlob>) -> Result<Connection> {
        let handshake = async {
            let (mut ws_stream, _) = connect_async(self.endpoint.as_str())
                .await
                .map_err(BridgeError::Connection)?;

            let hello = ClientFrame::Hello {
                credentials: credentials.as_ref().map(CredentialBlob::to_base64),
            };
            ws_stream
                .send(Message::Text(serde_json::to_string(&hello)?.into()))
                .await
                .map_err(BridgeError::Connection)?;

            Ok::<_, Error>(ws_stream)
        };

        let Ok(handshake) = timeout(self.config.connect_timeout, handshake).await else {
            warn!(
                endpoint = %self.endpoint,
                timeout = ?self.config.connect_timeout,
                "Sidecar handshake timed out"
            );
            return Err(BridgeError::Timeout.into());
        };
        let ws_stream = handshake?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(DashMap::new());
        let ready = Arc::new(AtomicBool::new(true));
        let token = CancellationToken::new();

        tokio::spawn(connection_loop(
            ws_stream,
            sender_rx,
            events_tx,
            Arc::clone(&pending),
            Arc::clone(&ready),
            token.clone(),
        ));

        let session = BridgeSession {
            sender_tx,
            pending,
            ready,
            token,
            request_timeout: self.config.request_timeout,
        };

        Ok(Connection::new(Arc::new(session), events_rx))
    }
}

/// One socket to the sidecar.
#[derive(Debug)]
pub struct BridgeSession {
    sender_tx: mpsc::UnboundedSender<String>,
    pending: Pending,
    ready: Arc<AtomicBool>,
    token: CancellationToken,
    request_timeout: Duration,
}

impl BridgeSession {
    async fn request<F>(&self, frame: F) -> Result<Reply>
    where
        F: FnOnce(Uuid) -> ClientFrame,
    {
        if !self.is_ready() {
            return Err(BridgeError::ConnectionClosed.into());
        }

        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let json = serde_json::to_string(&frame(id))?;

        self.pending.insert(id, tx);
        if self.sender_tx.send(json).is_err() {
            self.pending.remove(&id);
            return Err(BridgeError::ConnectionClosed.into());
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // The socket loop dropped the sender on its way out
            Ok(Err(_)) => Err(BridgeError::ConnectionClosed.into()),
            Err(_) => {
                self.pending.remove(&id);
                Err(BridgeError::Timeout.into())
            }
        }
    }

    fn rejected(reply: Reply) -> BridgeError {
        BridgeError::Rejected(reply.error.unwrap_or_else(|| "unknown error".to_owned()))
    }
}

#[async_trait]
impl Session for BridgeSession {
    async fn send(&self, to: &Identity, text: &str) -> Result<()> {
        let reply = self
            .request(|id| ClientFrame::Send {
                id,
                to: to.as_str().to_owned(),
                text: text.to_owned(),
            })
            .await?;

        if reply.ok {
            Ok(())
        } else {
            Err(Self::rejected(reply).into())
        }
    }

    async fn probe(&self, identity: &Identity) -> Result<bool> {
        let reply = self
            .request(|id| ClientFrame::Probe {
                id,
                to: identity.as_str().to_owned(),
            })
            .await?;

        if reply.ok {
            Ok(reply.exists.unwrap_or(false))
        } else {
            Err(Self::rejected(reply).into())
        }
    }

    async fn ping(&self) -> Result<()> {
        let reply = self.request(|id| ClientFrame::Ping { id }).await?;

        if reply.ok {
            Ok(())
        } else {
            Err(Self::rejected(reply).into())
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.ready.store(false, Ordering::Release);
        self.token.cancel();
    }
}

/// Pumps frames between the socket, pending requests and the event channel until either side
/// goes away.
async fn connection_loop(
    ws_stream: WsStream,
    mut sender_rx: mpsc::UnboundedReceiver<String>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    pending: Pending,
    ready: Arc<AtomicBool>,
    token: CancellationToken,
) {
    let (mut write, mut read) = ws_stream.split();

    // Set when the socket died without the sidecar reporting a closure first.
    let lost = loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!("Bridge session closed locally");
                _ = write.send(Message::Close(None)).await;
                break None;
            }

            // Handle incoming frames
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        trace!(%text, "Received bridge frame");
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(ServerFrame::Result { id, ok, exists, error }) => {
                                if let Some((_, tx)) = pending.remove(&id) {
                                    _ = tx.send(Reply { ok, exists, error });
                                } else {
                                    debug!(%id, "Result for unknown or expired request");
                                }
                            }
                            Ok(frame) => {
                                let closing = matches!(
                                    frame,
                                    ServerFrame::Connection {
                                        state: ConnectionUpdate::Close,
                                        ..
                                    }
                                );
                                if let Some(event) = frame.into_event() {
                                    _ = events_tx.send(event);
                                }
                                if closing {
                                    break None;
                                }
                            }
                            Err(e) => {
                                let error = BridgeError::MessageParse(e);
                                warn!(%text, %error, "Failed to parse bridge frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break Some("sidecar closed the socket".to_owned());
                    }
                    Some(Err(e)) => {
                        break Some(BridgeError::Connection(e).to_string());
                    }
                    Some(Ok(_)) => {
                        // Ignore binary frames and control frames handled by tungstenite.
                    }
                }
            }

            // Handle outgoing requests
            Some(json) = sender_rx.recv() => {
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    break Some(BridgeError::Connection(e).to_string());
                }
            }
        }
    };

    ready.store(false, Ordering::Release);
    // Dropping the senders fails every in-flight request with `ConnectionClosed`.
    pending.clear();

    if let Some(message) = lost
        && !token.is_cancelled()
    {
        warn!(%message, "Bridge socket lost");
        _ = events_tx.send(TransportEvent::Closed {
            reason: CloseReason::Transient,
            message: Some(message),
        });
    }
}

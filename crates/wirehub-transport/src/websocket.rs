//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{next_connection_id, ConnectionId, Socket, Transport, TransportError};

type WsStream = WebSocketStream<TcpStream>;

/// How long [`WebSocketSocket::close`] waits to flush a close frame to a
/// peer that is not reading.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Socket = WebSocketSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Socket, Self::Error> {
        self.accept_pending().await?.upgrade().await
    }
}

impl WebSocketTransport {
    /// Accepts the next TCP connection without running the WebSocket
    /// handshake, so a slow client cannot hold up the accept loop.
    pub async fn accept_pending(&mut self) -> Result<PendingWebSocket, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingWebSocket { stream, addr })
    }
}

/// A TCP connection that has not completed the WebSocket upgrade yet.
pub struct PendingWebSocket {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PendingWebSocket {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server side of the handshake.
    pub async fn upgrade(self) -> Result<WebSocketSocket, TransportError> {
        let ws = tokio_tungstenite::accept_async(self.stream)
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = next_connection_id();
        tracing::debug!(%id, addr = %self.addr, "accepted WebSocket connection");

        Ok(WebSocketSocket::new(id, self.addr.to_string(), ws))
    }
}

/// A single upgraded WebSocket.
///
/// The stream is split so the reading pump and the writing pump lock
/// different halves. `closed` flips once; a pending `recv` or a `send`
/// stuck on a peer that stopped reading observes it and returns
/// [`TransportError::ConnectionClosed`].
pub struct WebSocketSocket {
    id: ConnectionId,
    remote_addr: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
}

impl WebSocketSocket {
    fn new(id: ConnectionId, remote_addr: String, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        let (closed, _) = watch::channel(false);
        Self {
            id,
            remote_addr,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed,
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Socket for WebSocketSocket {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(
                "socket closed locally".into(),
            ));
        }
        // Payloads are JSON in practice; fall back to binary otherwise.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        let mut closed = self.closed.subscribe();
        tokio::select! {
            res = async move { self.sink.lock().await.send(msg).await } => res.map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            }),
            _ = wait_closed(&mut closed) => Err(TransportError::ConnectionClosed(
                "socket closed locally".into(),
            )),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        let mut stream = self.stream.lock().await;
        loop {
            let msg = tokio::select! {
                msg = stream.next() => msg,
                _ = wait_closed(&mut closed) => {
                    return Err(TransportError::ConnectionClosed(
                        "socket closed locally".into(),
                    ));
                }
            };
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        tracing::debug!(id = %self.id, addr = %self.remote_addr, "closing socket");
        // Raising the flag aborts any in-flight send, which releases the
        // sink. The close frame itself is best effort.
        let graceful = async { self.sink.lock().await.close().await };
        match tokio::time::timeout(CLOSE_FRAME_TIMEOUT, graceful).await {
            Ok(res) => res.map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            }),
            Err(_) => Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "peer is not reading; close frame not flushed",
            ))),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> &str {
        &self.remote_addr
    }
}

/// Resolves once the close flag has been raised.
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            // Sender dropped with the socket; nothing left to wait for.
            std::future::pending::<()>().await;
        }
    }
}

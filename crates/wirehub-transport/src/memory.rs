//! In-process socket pair.
//!
//! [`MemorySocket`] is the hub side; [`MemoryPeer`] plays the remote
//! client. Useful for driving pumps and dispatchers without a network,
//! and for simulating the failure modes the hub must survive (read
//! errors, peers that stop reading).

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::{next_connection_id, ConnectionId, Socket, TransportError};

type Inbound = Result<Vec<u8>, io::ErrorKind>;

/// Hub-side end of an in-memory connection.
pub struct MemorySocket {
    id: ConnectionId,
    remote_addr: String,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: watch::Sender<bool>,
    stalled: Arc<AtomicBool>,
}

/// Client-side end of an in-memory connection.
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: watch::Receiver<bool>,
    stalled: Arc<AtomicBool>,
}

impl MemorySocket {
    /// Creates a connected pair whose hub side reports `remote_addr`.
    pub fn pair(remote_addr: impl Into<String>) -> (MemorySocket, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let stalled = Arc::new(AtomicBool::new(false));

        let socket = MemorySocket {
            id: next_connection_id(),
            remote_addr: remote_addr.into(),
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            closed: closed_tx,
            stalled: Arc::clone(&stalled),
        };
        let peer = MemoryPeer {
            inbound: Some(in_tx),
            outbound: out_rx,
            closed: closed_rx,
            stalled,
        };
        (socket, peer)
    }

    fn closed_error() -> TransportError {
        TransportError::ConnectionClosed("socket closed locally".into())
    }

    async fn wait_closed(&self) {
        let mut closed = self.closed.subscribe();
        // The sender lives in `self`, so `wait_for` can only fail once the
        // socket itself is gone.
        let _ = closed.wait_for(|c| *c).await;
    }
}

impl Socket for MemorySocket {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if *self.closed.borrow() {
            return Err(Self::closed_error());
        }
        if self.stalled.load(Ordering::Acquire) {
            // A peer that stopped reading: block until someone closes us.
            self.wait_closed().await;
            return Err(Self::closed_error());
        }
        self.outbound.send(data.to_vec()).map_err(|_| {
            TransportError::SendFailed(io::ErrorKind::BrokenPipe.into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        if *self.closed.borrow() {
            return Err(Self::closed_error());
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            frame = inbound.recv() => match frame {
                Some(Ok(data)) => Ok(Some(data)),
                Some(Err(kind)) => Err(TransportError::ReceiveFailed(kind.into())),
                None => Ok(None),
            },
            _ = self.wait_closed() => Err(Self::closed_error()),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> &str {
        &self.remote_addr
    }
}

impl MemoryPeer {
    /// Sends a frame to the hub. Returns `false` once the hub side is gone
    /// or [`disconnect`](Self::disconnect) was called.
    pub fn send(&self, frame: impl Into<Vec<u8>>) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Makes the hub's next read fail with a transport error.
    pub fn break_connection(&self) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(io::ErrorKind::ConnectionReset));
        }
    }

    /// Closes the peer cleanly: the hub's next read returns `Ok(None)`.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Makes every subsequent hub write block until the socket is closed.
    pub fn stall_writes(&self) {
        self.stalled.store(true, Ordering::Release);
    }

    /// Waits for the next frame the hub wrote. `None` once the hub side
    /// has been dropped and everything was read.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    /// Returns the next frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }

    /// `true` once the hub closed its side.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Waits until the hub closes its side (or drops the socket).
    pub async fn closed(&mut self) {
        let _ = self.closed.wait_for(|c| *c).await;
    }
}

//! The two per-connection pumps.
//!
//! ```text
//!   socket ──recv──→ [inbound pump] ──process──→ Dispatcher
//!                          │ read fails / peer closes
//!                          ▼
//!                     close_queue ─────────┐
//!                                          ▼
//!   queue ──recv──→ [outbound pump] ──send──→ socket
//!                          │ queue closed / send fails / panic
//!                          ▼
//!                 unregister + close socket
//! ```
//!
//! Closing the outbound queue is the one stop signal. The outbound pump
//! is the only place that submits the unregister, and closing the socket
//! afterwards wakes the inbound pump if it is still reading.
//!
//! Each pump body runs inside `catch_unwind`. A panic is logged with a
//! backtrace and the pump finishes its normal teardown.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use wirehub_session::{Connection, OutboundQueue};
use wirehub_transport::Socket;

use crate::{Dispatcher, Hub};

/// Spawns both pumps for a freshly registered connection.
///
/// Returns the inbound and outbound task handles, in that order.
pub fn spawn_pumps<S, D>(
    hub: Hub<S>,
    conn: Arc<Connection<S>>,
    queue: OutboundQueue,
    dispatcher: Arc<D>,
) -> (JoinHandle<()>, JoinHandle<()>)
where
    S: Socket,
    D: Dispatcher<S>,
{
    let inbound = tokio::spawn(read_pump(Arc::clone(&conn), dispatcher));
    let outbound = tokio::spawn(write_pump(hub, conn, queue));
    (inbound, outbound)
}

/// Reads frames and hands each to `dispatcher` until the socket fails or
/// the peer closes it, then closes the outbound queue.
pub async fn read_pump<S, D>(conn: Arc<Connection<S>>, dispatcher: Arc<D>)
where
    S: Socket,
    D: Dispatcher<S>,
{
    let body = AssertUnwindSafe(read_loop(&conn, dispatcher.as_ref()));
    if let Err(panic) = body.catch_unwind().await {
        log_panic("inbound", &conn, panic);
    }
    conn.close_queue();
}

async fn read_loop<S: Socket, D: Dispatcher<S>>(conn: &Arc<Connection<S>>, dispatcher: &D) {
    loop {
        match conn.socket().recv().await {
            Ok(Some(frame)) => {
                tracing::debug!(conn_id = %conn.id(), len = frame.len(), "frame received");
                dispatcher.process(conn, frame).await;
            }
            Ok(None) => {
                tracing::debug!(conn_id = %conn.id(), "peer closed connection");
                return;
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "read failed");
                return;
            }
        }
    }
}

/// Drains the outbound queue to the socket. On exit, for whatever reason,
/// submits the connection for unregistration and closes the socket.
pub async fn write_pump<S: Socket>(hub: Hub<S>, conn: Arc<Connection<S>>, mut queue: OutboundQueue) {
    let body = AssertUnwindSafe(write_loop(&conn, &mut queue));
    if let Err(panic) = body.catch_unwind().await {
        log_panic("outbound", &conn, panic);
    }

    if let Err(e) = hub.unregister(Arc::clone(&conn)).await {
        tracing::warn!(conn_id = %conn.id(), error = %e, "unregister not submitted");
    }
    conn.close_socket().await;
}

async fn write_loop<S: Socket>(conn: &Connection<S>, queue: &mut OutboundQueue) {
    while let Some(payload) = queue.recv().await {
        if let Err(e) = conn.socket().send(&payload).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
            conn.close_queue();
            return;
        }
    }
    tracing::debug!(conn_id = %conn.id(), "outbound queue closed");
}

fn log_panic<S: Socket>(pump: &'static str, conn: &Connection<S>, panic: Box<dyn Any + Send>) {
    let reason = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    let backtrace = Backtrace::force_capture();
    tracing::error!(
        conn_id = %conn.id(),
        addr = conn.addr(),
        pump,
        %reason,
        %backtrace,
        "pump panicked"
    );
}

//! The seam between the inbound pump and application logic.

use std::future::Future;
use std::sync::Arc;

use wirehub_session::Connection;
use wirehub_transport::Socket;

/// Interprets inbound frames.
///
/// The inbound pump awaits `process` for each frame before reading the
/// next one, so frames from one connection are handled in order. A
/// dispatcher typically decodes the frame, replies through
/// [`Connection::enqueue`], and may log the user in through
/// [`Hub::login`](crate::Hub::login).
pub trait Dispatcher<S: Socket>: Send + Sync + 'static {
    fn process(
        &self,
        conn: &Arc<Connection<S>>,
        frame: Vec<u8>,
    ) -> impl Future<Output = ()> + Send;
}

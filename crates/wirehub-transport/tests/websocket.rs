//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and drive it with
//! a `tokio-tungstenite` client, so frames actually cross the network.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use wirehub_transport::{
        Socket, Transport, TransportError, WebSocketSocket, WebSocketTransport,
    };

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds a transport on port 0, connects one client, and returns both
    /// ends of the connection.
    async fn connected_pair() -> (WebSocketSocket, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let (client, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .expect("client should connect");
        let server = server_handle.await.expect("task should complete");
        (server, client)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (server, mut client) = connected_pair().await;

        assert!(server.id().into_inner() > 0);
        assert!(server.remote_addr().starts_with("127.0.0.1:"));

        // Server sends, client receives. UTF-8 payloads go out as text.
        server
            .send(br#"{"cmd":"ping"}"#)
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), br#"{"cmd":"ping"}"#);

        // Client sends, server receives.
        client
            .send(Message::Text("hello from client".into()))
            .await
            .unwrap();
        let received = server
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        server.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server, mut client) = connected_pair().await;

        client.send(Message::Close(None)).await.unwrap();

        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_close_wakes_pending_recv() {
        let (server, _client) = connected_pair().await;
        let server = Arc::new(server);

        let reader = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.recv().await })
        };

        // Let the reader park on the stream before closing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        server.close().await.expect("close should succeed");

        let result = tokio::time::timeout(Duration::from_secs(2), reader)
            .await
            .expect("recv should wake up")
            .expect("task should not panic");
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_websocket_close_is_idempotent_and_blocks_send() {
        let (server, _client) = connected_pair().await;

        server.close().await.expect("first close should succeed");
        server.close().await.expect("second close is a no-op");

        let result = server.send(b"late").await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_websocket_close_unblocks_send_to_stalled_reader() {
        // The client never reads, so the server's writes back up on TCP.
        let (server, _client) = connected_pair().await;
        let server = Arc::new(server);
        let payload = vec![b'x'; 1 << 20];

        let writer = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let mut sent = 0usize;
                while server.send(&payload).await.is_ok() {
                    sent += 1;
                }
                sent
            })
        };

        // Long enough for the socket buffers to fill.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!writer.is_finished(), "writer should be stalled");

        tokio::time::timeout(Duration::from_secs(5), server.close())
            .await
            .expect("close must not wait on the stalled writer")
            .ok();

        let sent = tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("stalled send should fail after close")
            .expect("task should not panic");
        assert!(sent > 0);
    }

    #[tokio::test]
    async fn test_websocket_accept_pending_defers_handshake() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        // A raw TCP client that never sends the upgrade request.
        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();
        let stuck = transport.accept_pending().await.expect("tcp accept");
        assert!(stuck.peer_addr().ip().is_loopback());
        let stuck_upgrade = tokio::spawn(stuck.upgrade());

        // The next client still gets through.
        let client = tokio::spawn(async move {
            tokio_tungstenite::connect_async(format!("ws://{addr}")).await
        });
        let pending = tokio::time::timeout(Duration::from_secs(2), transport.accept_pending())
            .await
            .expect("accept should not wait on the silent client")
            .expect("tcp accept");
        let socket = pending.upgrade().await.expect("upgrade");
        assert!(socket.remote_addr().starts_with("127.0.0.1:"));
        client.await.unwrap().expect("client handshake");

        assert!(!stuck_upgrade.is_finished());
        stuck_upgrade.abort();
    }
}

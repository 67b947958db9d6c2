//! Chat hub demo: a wirehub server with in-memory presence.
//!
//! ```text
//! WIREHUB_ADDR=0.0.0.0:8080 RUST_LOG=wirehub=debug cargo run -p chat-hub
//! ```
//!
//! Clients log in with `{"seq":"1","cmd":"login","data":{"appId":101,"userId":"alice"}}`
//! and then see everyone else come and go.

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use wirehub::prelude::*;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Logs the admin snapshot once a minute.
fn spawn_stats(hub: Hub<WebSocketSocket>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATS_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match serde_json::to_string(&hub.manager_info(false)) {
                Ok(info) => tracing::info!(%info, "hub stats"),
                Err(e) => tracing::warn!(error = %e, "failed to render hub stats"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("WIREHUB_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    tracing::info!(%addr, "starting chat hub");

    let server = WirehubServer::builder()
        .bind(&addr)
        .app_ids([AppId(101), AppId(102)])
        .build()
        .await?;
    spawn_stats(server.hub().clone());

    server.run().await?;
    Ok(())
}

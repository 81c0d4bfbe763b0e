//! Local HTTP fixtures for async tests.

use crate::config::HttpConfig;
use crate::fetch::Fetcher;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Serve `app` on an ephemeral loopback port for the rest of the test.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Client settings for loopback servers: no proxy, no retries, short timeout.
pub fn test_http_config() -> HttpConfig {
    HttpConfig {
        request_timeout_secs: 5,
        max_retries: 0,
        retry_base_delay_ms: 1,
        use_system_proxy: false,
        ..HttpConfig::default()
    }
}

pub fn test_fetcher() -> Fetcher {
    Fetcher::new(&test_http_config()).unwrap()
}

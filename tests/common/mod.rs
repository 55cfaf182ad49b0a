//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

use routekit::config::AppConfig;
use routekit::dispatch::Dispatcher;
use routekit::http::HttpServer;
use routekit::lifecycle::Shutdown;
use routekit::routing::PatternError;

/// A server running on an ephemeral port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<AppConfig>,
    pub handle: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start `factory` behind a live listener on 127.0.0.1.
#[allow(dead_code)]
pub async fn start_server<F>(config: AppConfig, factory: F) -> TestServer
where
    F: Fn(&AppConfig) -> Result<Dispatcher, PatternError> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, factory).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        shutdown,
        config_updates,
        handle,
    }
}

/// HTTP client without connection pooling or system proxies.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Send one request through the full axum stack without a socket.
#[allow(dead_code)]
pub async fn oneshot<F>(factory: F, request: Request<Body>) -> (Response<Body>, String)
where
    F: Fn(&AppConfig) -> Result<Dispatcher, PatternError> + Send + Sync + 'static,
{
    let server = HttpServer::new(AppConfig::default(), factory).unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&bytes).into_owned();
    (Response::from_parts(parts, Body::empty()), text)
}

#[allow(dead_code)]
pub fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

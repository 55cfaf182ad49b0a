//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router that feeds every request to the dispatcher
//! - Wire up tower layers (tracing, timeout, panic containment)
//! - Adapt axum requests into pooled contexts and back
//! - Rebuild and swap the dispatcher when a new config arrives
//! - Bind server to listener and shut down gracefully

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::LengthLimitError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::context::ContextPool;
use crate::dispatch::{Dispatcher, SharedDispatcher};
use crate::observability::metrics;
use crate::routing::PatternError;

/// Builds the application for a given config. Called at startup and on
/// every config reload.
pub type AppFactory = Arc<dyn Fn(&AppConfig) -> Result<Dispatcher, PatternError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build application: {0}")]
    Build(#[from] PatternError),
}

/// Application state injected into the fallback handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: SharedDispatcher,
    pub pool: Arc<ContextPool>,
    pub max_body_bytes: usize,
}

/// HTTP front end for a [`Dispatcher`].
pub struct HttpServer {
    config: AppConfig,
    factory: AppFactory,
    state: AppState,
}

impl HttpServer {
    /// Build the initial dispatcher from `factory` and prepare the server.
    pub fn new<F>(config: AppConfig, factory: F) -> Result<Self, ServerError>
    where
        F: Fn(&AppConfig) -> Result<Dispatcher, PatternError> + Send + Sync + 'static,
    {
        let factory: AppFactory = Arc::new(factory);
        let dispatcher = SharedDispatcher::new(factory(&config)?);
        let state = AppState {
            dispatcher,
            pool: ContextPool::new(config.dispatch.context_pool_size),
            max_body_bytes: config.listener.max_body_bytes,
        };
        Ok(Self {
            config,
            factory,
            state,
        })
    }

    /// Handle to the live dispatcher.
    pub fn dispatcher(&self) -> SharedDispatcher {
        self.state.dispatcher.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeouts.request_secs,
            )))
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until a
    /// shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router();

        let dispatcher = self.state.dispatcher.clone();
        let factory = Arc::clone(&self.factory);
        let mut reload_shutdown = shutdown.resubscribe();
        let mut current = self.config.clone();
        let reloader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => {
                        let Some(new_config) = update else { break };
                        reload(&dispatcher, &factory, &current, &new_config);
                        current = new_config;
                    }
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("shutdown signal received, draining connections");
                let _ = draining_tx.send(());
            })
            .into_future();
        tokio::pin!(serve);

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        tokio::select! {
            result = &mut serve => result?,
            _ = async {
                if draining_rx.await.is_ok() {
                    tokio::time::sleep(grace).await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {
                tracing::warn!(grace_secs = grace.as_secs(), "grace period elapsed; dropping in-flight requests");
            }
        }

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn reload(
    dispatcher: &SharedDispatcher,
    factory: &AppFactory,
    current: &AppConfig,
    new_config: &AppConfig,
) {
    if new_config.listener != current.listener || new_config.timeouts != current.timeouts {
        tracing::warn!("listener and timeout changes take effect after restart");
    }
    match factory(new_config) {
        Ok(next) => {
            dispatcher.store(next);
            metrics::record_reload(true);
            tracing::info!("configuration reloaded");
        }
        Err(e) => {
            metrics::record_reload(false);
            tracing::error!(error = %e, "reload rejected; keeping current application");
        }
    }
}

/// Fallback handler: every request goes through the dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) if exceeds_limit(&e) => {
            tracing::debug!(limit = state.max_body_bytes, "request body over limit");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let dispatcher = state.dispatcher.load();
    let mut ctx = state.pool.acquire();
    ctx.prepare(
        parts.method,
        target,
        parts.headers,
        (!body.is_empty()).then_some(body),
    );

    dispatcher.dispatch(&mut ctx).await;
    ctx.take_response().into_response()
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

//! HTTP request router with onion-model middleware dispatch.
//!
//! ```text
//!   request ──▶ RequestId ──▶ AccessLog ──▶ Mount(/api) ──▶ Router ──▶ NotFound
//!                                              │              │
//!                                              ▼              ▼
//!                                       mounted chain   route handlers
//!   response ◀── unwinds through every handler in reverse order ◀────┘
//! ```
//!
//! Build an application with [`AppBuilder`], serve it with [`HttpServer`]
//! or drive it directly with [`Dispatcher::dispatch`].

// Core
pub mod chain;
pub mod context;
pub mod dispatch;
pub mod routing;

// Serving
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use chain::{
    boxed, compose, handler_fn, BoxFuture, BoxedHandler, Chain, ChainEntry, Handler,
    HandlerError, HandlerResult, IntoHandlers, Mount, Next,
};
pub use config::AppConfig;
pub use context::{ContextPool, RequestContext};
pub use dispatch::{AppBuilder, DispatchState, Dispatcher, SharedDispatcher};
pub use http::{HttpServer, RequestId};
pub use lifecycle::Shutdown;
pub use observability::AccessLog;
pub use routing::{Method, Params, PatternError, PatternOptions, RouteError, Router};

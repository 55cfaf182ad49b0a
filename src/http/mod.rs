//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower layers, body buffering)
//!     → pooled RequestContext
//!     → Dispatcher (middleware, routing, handlers)
//!     → response.rs (finalized ResponseState → HTTP response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use server::{AppFactory, AppState, HttpServer, ServerError};

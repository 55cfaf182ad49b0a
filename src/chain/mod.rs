//! Handler chains.
//!
//! # Data Flow
//! ```text
//! AppBuilder entries (global, mounted)
//!     → compose.rs (Chain, Mount)
//!     → handler.rs (Handler, Next: onion-order execution)
//!     → error.rs (HandlerError propagates back up the chain)
//! ```

pub mod compose;
pub mod error;
pub mod handler;

pub use compose::{compose, Chain, ChainEntry, Mount};
pub use error::{ErrorKind, HandlerError};
pub use handler::{
    boxed, handler_fn, BoxFuture, BoxedHandler, Handler, HandlerFn, HandlerResult, IntoHandlers,
    Next,
};

pub(crate) use handler::{Forward, Tail};

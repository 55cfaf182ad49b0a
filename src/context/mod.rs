//! Per-request state and its pool.

pub mod pool;
pub mod request;
pub mod response;

pub use pool::{ContextPool, PooledContext};
pub use request::{AbortHandle, RequestContext};
pub use response::ResponseState;

pub(crate) use request::PathView;

//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! Setup:
//!     AppBuilder (use_handler, mount, route)
//!     → app.rs compiles routes, composes entries
//!     → Dispatcher (immutable) → SharedDispatcher (hot swappable)
//!
//! Per request:
//!     dispatcher.dispatch(ctx)
//!     → entries in registration order
//!     → Router (match, run route handlers, automatic OPTIONS)
//!     → NotFound
//!     → error interception, single finalization
//! ```
//!
//! # Design Decisions
//! - Build phase and serve phase are separate types
//! - Every request sees one consistent snapshot across a reload

pub mod app;
pub mod dispatcher;

pub use app::AppBuilder;
pub use dispatcher::{Dispatcher, NotFound, SharedDispatcher};

/// Progress of one request through its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Not yet started.
    Pending,
    /// Handler `n` (in invocation order) is executing.
    Running(usize),
    /// Handler `n` is suspended waiting on its continuation.
    AwaitingNext(usize),
    /// The chain completed and a response was finalized.
    Done,
    /// The chain ended with an error (or was aborted).
    Errored,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Done | DispatchState::Errored)
    }
}

//! The handler contract and the continuation cursor.
//!
//! # Responsibilities
//! - Define the single `Handler` interface shared by route handlers,
//!   middlewares, mounts, composed chains and routers
//! - Drive a handler slice with `Next`, one cursor per invocation
//! - Contain panics and convert them to 500 errors
//!
//! # Design Decisions
//! - `Next` borrows the handler slice; nothing is cloned per request
//! - A `Next` runs at most once. A second `run` logs a warning and returns
//!   `Ok(())` without touching downstream handlers
//! - Past the end of a slice the cursor runs its tail: either nothing, or a
//!   resume hook that continues an enclosing chain (mounts, sub-chains)
//!
//! # Data Flow
//! ```text
//! next.run(ctx) ──▶ handler[i].call(ctx, next[i+1]) ──▶ ... ──▶ tail
//!        ◀──────────────── result unwinds in reverse ◀─────────┘
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::chain::error::HandlerError;
use crate::context::RequestContext;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a handler.
pub type HandlerResult = Result<(), HandlerError>;

pub type BoxedHandler = Arc<dyn Handler>;

/// A unit of request processing.
///
/// Code before `next.run(ctx).await` runs on the way in, code after it on
/// the way out. Not calling `next` ends the chain at this handler.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>)
        -> BoxFuture<'a, HandlerResult>;

    /// Name used in trace output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Wrap a handler for storage in a chain.
pub fn boxed(handler: impl Handler) -> BoxedHandler {
    Arc::new(handler)
}

// ─── Closures ────────────────────────────────────────────────────────────────

/// A handler backed by a closure. Built with [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Turn a closure into a handler.
///
/// ```ignore
/// let hello = handler_fn(|ctx, _next| {
///     Box::pin(async move {
///         ctx.send_text(StatusCode::OK, "hello");
///         Ok(())
///     })
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        (self.f)(ctx, next)
    }

    fn name(&self) -> &str {
        "handler_fn"
    }
}

// ─── Handler lists ───────────────────────────────────────────────────────────

/// Anything that can be registered as an ordered list of handlers.
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<BoxedHandler>;
}

impl<H: Handler> IntoHandlers for H {
    fn into_handlers(self) -> Vec<BoxedHandler> {
        vec![Arc::new(self)]
    }
}

impl IntoHandlers for BoxedHandler {
    fn into_handlers(self) -> Vec<BoxedHandler> {
        vec![self]
    }
}

impl IntoHandlers for Vec<BoxedHandler> {
    fn into_handlers(self) -> Vec<BoxedHandler> {
        self
    }
}

impl<const N: usize> IntoHandlers for [BoxedHandler; N] {
    fn into_handlers(self) -> Vec<BoxedHandler> {
        self.into()
    }
}

macro_rules! impl_into_handlers_tuple {
    ($($h:ident),+) => {
        impl<$($h: Handler),+> IntoHandlers for ($($h,)+) {
            #[allow(non_snake_case)]
            fn into_handlers(self) -> Vec<BoxedHandler> {
                let ($($h,)+) = self;
                vec![$(Arc::new($h) as BoxedHandler),+]
            }
        }
    };
}

impl_into_handlers_tuple!(A, B);
impl_into_handlers_tuple!(A, B, C);
impl_into_handlers_tuple!(A, B, C, D);
impl_into_handlers_tuple!(A, B, C, D, E);
impl_into_handlers_tuple!(A, B, C, D, E, F);

// ─── Continuation ────────────────────────────────────────────────────────────

/// Continues an enclosing chain once a nested one runs off its end.
pub(crate) trait Resume: Send {
    fn resume<'b>(&'b mut self, ctx: &'b mut RequestContext) -> BoxFuture<'b, HandlerResult>;
}

/// What happens past the last handler of a slice.
pub(crate) enum Tail<'a> {
    End,
    Resume(&'a mut (dyn Resume + 'a)),
}

/// Resume hook that simply runs an outer continuation.
pub(crate) struct Forward<'n, 'a> {
    next: &'n mut Next<'a>,
}

impl<'n, 'a> Forward<'n, 'a> {
    pub(crate) fn new(next: &'n mut Next<'a>) -> Self {
        Self { next }
    }
}

impl Resume for Forward<'_, '_> {
    fn resume<'b>(&'b mut self, ctx: &'b mut RequestContext) -> BoxFuture<'b, HandlerResult> {
        self.next.run(ctx)
    }
}

/// Cursor over the remaining handlers of a chain.
pub struct Next<'a> {
    chain: &'a [BoxedHandler],
    tail: Tail<'a>,
    called: bool,
}

impl<'a> Next<'a> {
    /// A cursor over `chain` with nothing after it.
    pub(crate) fn root(chain: &'a [BoxedHandler]) -> Self {
        Self {
            chain,
            tail: Tail::End,
            called: false,
        }
    }

    /// A cursor over `chain` nested inside the handler currently running.
    pub(crate) fn nested(chain: &'a [BoxedHandler], tail: Tail<'a>) -> Self {
        Self {
            chain,
            tail,
            called: false,
        }
    }

    /// Whether `run` has already been invoked on this cursor.
    pub fn is_called(&self) -> bool {
        self.called
    }

    /// Number of handlers left before the tail.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }

    /// Run the rest of the chain.
    ///
    /// Resolves once every downstream handler has returned. Errors from
    /// downstream are returned here so the caller may handle them.
    pub fn run<'b>(&'b mut self, ctx: &'b mut RequestContext) -> BoxFuture<'b, HandlerResult> {
        if self.called {
            tracing::warn!(
                path = %ctx.original_path(),
                "next() called more than once; ignoring"
            );
            return Box::pin(async { Ok(()) });
        }
        self.called = true;

        Box::pin(async move {
            if ctx.is_aborted() {
                return Err(HandlerError::aborted());
            }

            let chain = self.chain;
            let Some((head, rest)) = chain.split_first() else {
                return match &mut self.tail {
                    Tail::End => Ok(()),
                    Tail::Resume(hook) => hook.resume(ctx).await,
                };
            };

            let seq = ctx.begin_handler();
            tracing::trace!(seq, handler = head.name(), "invoking handler");

            let tail = match &mut self.tail {
                Tail::End => Tail::End,
                Tail::Resume(hook) => Tail::Resume(&mut **hook),
            };
            let next = Next {
                chain: rest,
                tail,
                called: false,
            };
            let result = guarded(head.call(ctx, next)).await;
            ctx.end_handler();
            result
        })
    }
}

/// Await a handler future, converting a panic into a 500 error.
pub(crate) async fn guarded(fut: BoxFuture<'_, HandlerResult>) -> HandlerResult {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let err = HandlerError::from_panic(payload);
            tracing::error!(message = %err.message(), "handler panicked");
            Err(err)
        }
    }
}

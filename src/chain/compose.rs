//! Chain composition and prefix mounting.
//!
//! # Responsibilities
//! - Compose handlers into a single handler that runs them in order
//! - Scope handlers to a path prefix, rewriting the visible path inside
//!
//! # Design Decisions
//! - A composed chain forwards into the enclosing continuation when it runs
//!   off its own end, so chains nest without losing onion order
//! - Mount prefixes match only at segment boundaries: `/api` covers `/api`
//!   and `/api/x`, never `/apix`
//! - The outer path view is restored on every exit, including errors and
//!   contained panics
//! - While the mounted chain continues outward, the outer view is swapped
//!   back in, then the mounted view is re-applied for the way back

use std::sync::Arc;

use crate::chain::handler::{
    guarded, BoxFuture, BoxedHandler, Forward, Handler, HandlerResult, IntoHandlers, Next, Resume,
    Tail,
};
use crate::context::{PathView, RequestContext};

/// Handlers run in sequence as one handler.
#[derive(Clone)]
pub struct Chain {
    handlers: Arc<[BoxedHandler]>,
}

impl Chain {
    pub fn new(handlers: impl IntoHandlers) -> Self {
        Self {
            handlers: handlers.into_handlers().into(),
        }
    }

    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Handler for Chain {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let mut forward = Forward::new(&mut next);
            let mut inner = Next::nested(&self.handlers, Tail::Resume(&mut forward));
            inner.run(ctx).await
        })
    }

    fn name(&self) -> &str {
        "chain"
    }
}

const NO_HANDLERS: &[BoxedHandler] = &[];

/// A handler scoped to a path prefix.
pub struct Mount {
    prefix: String,
    inner: BoxedHandler,
}

impl Mount {
    /// `prefix` is normalized to a leading `/` and no trailing `/`;
    /// `/` mounts at the root without rewriting.
    pub fn new(prefix: &str, inner: impl IntoHandlers) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            inner: collapse(inner.into_handlers()),
        }
    }

    pub fn prefix(&self) -> &str {
        if self.prefix.is_empty() {
            "/"
        } else {
            &self.prefix
        }
    }

    /// Whether `path` lies under this mount.
    pub fn covers(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// A single handler stays as is; anything else becomes a [`Chain`].
pub(crate) fn collapse(mut handlers: Vec<BoxedHandler>) -> BoxedHandler {
    if handlers.len() == 1 {
        handlers.remove(0)
    } else {
        Arc::new(Chain::new(handlers))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Resume hook used inside a mount: continue the outer chain with the outer
/// view, then return to the mounted view.
struct MountResume<'n, 'a> {
    next: &'n mut Next<'a>,
    outer: Option<PathView>,
}

impl Resume for MountResume<'_, '_> {
    fn resume<'b>(&'b mut self, ctx: &'b mut RequestContext) -> BoxFuture<'b, HandlerResult> {
        Box::pin(async move {
            let Some(outer) = self.outer.take() else {
                return self.next.run(ctx).await;
            };
            let mounted = ctx.replace_view(outer);
            let result = self.next.run(ctx).await;
            self.outer = Some(ctx.replace_view(mounted));
            result
        })
    }
}

impl Handler for Mount {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if !self.covers(ctx.path()) {
                return next.run(ctx).await;
            }

            tracing::trace!(prefix = %self.prefix(), path = %ctx.path(), "entering mount");
            let outer = ctx.enter_mount(&self.prefix);
            let mut resume = MountResume {
                next: &mut next,
                outer: Some(outer),
            };

            let result = {
                let inner_next = Next::nested(NO_HANDLERS, Tail::Resume(&mut resume));
                guarded(self.inner.call(ctx, inner_next)).await
            };

            if let Some(outer) = resume.outer.take() {
                ctx.replace_view(outer);
            }
            result
        })
    }

    fn name(&self) -> &str {
        "mount"
    }
}

/// One entry of a composed chain.
pub struct ChainEntry {
    prefix: Option<String>,
    handler: BoxedHandler,
}

impl ChainEntry {
    /// An entry that runs for every path.
    pub fn global(handler: impl IntoHandlers) -> Self {
        Self {
            prefix: None,
            handler: collapse(handler.into_handlers()),
        }
    }

    /// An entry that runs only under `prefix`.
    pub fn mounted(prefix: &str, handler: impl IntoHandlers) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            handler: collapse(handler.into_handlers()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub(crate) fn into_handler(self) -> BoxedHandler {
        match self.prefix {
            Some(prefix) => Arc::new(Mount::new(&prefix, self.handler)),
            None => self.handler,
        }
    }
}

/// Compose entries into one chain. Registration order is "before" order.
pub fn compose(entries: impl IntoIterator<Item = ChainEntry>) -> Chain {
    let handlers: Vec<BoxedHandler> = entries.into_iter().map(ChainEntry::into_handler).collect();
    Chain::new(handlers)
}

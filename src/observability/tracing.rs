//! Request spans and access logging.
//!
//! `AccessLog` is a middleware: it opens a span carrying the request id,
//! runs the rest of the chain inside it, then logs one line with the final
//! status and latency.

use std::time::Instant;

use tracing::Instrument;

use crate::chain::{BoxFuture, Handler, HandlerResult, Next};
use crate::context::RequestContext;

/// Access log middleware.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLog;

impl Handler for AccessLog {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let started = Instant::now();
            let span = tracing::info_span!(
                "request",
                method = %ctx.method(),
                path = %ctx.original_path(),
                request_id = ctx.request_id().unwrap_or("-"),
            );

            let result = next.run(ctx).instrument(span.clone()).await;

            let status = match &result {
                Ok(()) => ctx.response().status(),
                Err(err) => err.status(),
            };
            span.in_scope(|| {
                tracing::info!(
                    status = status.as_u16(),
                    route = ctx.matched_route().unwrap_or("-"),
                    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "request completed"
                );
            });
            result
        })
    }

    fn name(&self) -> &str {
        "access_log"
    }
}

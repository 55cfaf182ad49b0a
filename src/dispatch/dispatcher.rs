//! The serve-phase dispatcher.
//!
//! # Responsibilities
//! - Run the composed chain for one request
//! - Intercept errors nobody handled and turn them into a response
//! - Guarantee a finalized response (404 when nothing answered)
//! - Publish dispatcher snapshots for hot reload
//!
//! # Design Decisions
//! - Immutable after build; swapped wholesale through `ArcSwap`
//! - 5xx bodies carry only the canonical reason phrase unless the error is
//!   marked exposable or `expose_errors` is on

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::http::StatusCode;

use crate::chain::{BoxFuture, BoxedHandler, Handler, HandlerError, HandlerResult, Next};
use crate::context::RequestContext;
use crate::dispatch::DispatchState;
use crate::observability::metrics;
use crate::routing::Router;

/// Terminal handler: answers 404 if nothing upstream finalized.
#[derive(Debug, Default)]
pub struct NotFound;

impl Handler for NotFound {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        _next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if !ctx.is_finalized() {
                tracing::debug!(method = %ctx.method(), path = %ctx.original_path(), "no route matched");
                metrics::record_unmatched(ctx.method().as_str());
                ctx.send_text(StatusCode::NOT_FOUND, "Not Found");
            }
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "not_found"
    }
}

/// A built application, ready to serve.
pub struct Dispatcher {
    chain: Arc<[BoxedHandler]>,
    router: Arc<Router>,
    expose_errors: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        mut handlers: Vec<BoxedHandler>,
        router: Arc<Router>,
        expose_errors: bool,
    ) -> Self {
        handlers.push(Arc::clone(&router) as BoxedHandler);
        handlers.push(Arc::new(NotFound));
        Self {
            chain: handlers.into(),
            router,
            expose_errors,
        }
    }

    /// The route table this dispatcher terminates in.
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn expose_errors(&self) -> bool {
        self.expose_errors
    }

    /// Run the chain for `ctx` and leave a finalized response behind.
    ///
    /// Returns the terminal state: `Done` on success, `Errored` when an error
    /// reached the top (the error response is already finalized) or the
    /// request was aborted.
    pub async fn dispatch(&self, ctx: &mut RequestContext) -> DispatchState {
        let started = Instant::now();
        ctx.set_dispatch_state(DispatchState::Pending);

        let result = Next::root(&self.chain).run(ctx).await;

        let state = match result {
            Ok(()) => {
                if !ctx.is_finalized() {
                    ctx.send_text(StatusCode::NOT_FOUND, "Not Found");
                }
                DispatchState::Done
            }
            Err(err) if err.is_aborted() => {
                tracing::debug!(path = %ctx.original_path(), "request aborted");
                ctx.run_cleanup();
                if !ctx.is_finalized() {
                    ctx.send_text(err.status(), err.message());
                }
                DispatchState::Errored
            }
            Err(err) => {
                self.respond_error(ctx, &err);
                DispatchState::Errored
            }
        };
        ctx.set_dispatch_state(state);

        metrics::record_request(
            ctx.method().as_str(),
            ctx.response().status().as_u16(),
            ctx.matched_route().unwrap_or("none"),
            started,
        );
        tracing::debug!(
            method = %ctx.method(),
            path = %ctx.original_path(),
            status = ctx.response().status().as_u16(),
            handlers = ctx.handlers_invoked(),
            ?state,
            "dispatch complete"
        );
        state
    }

    fn respond_error(&self, ctx: &mut RequestContext, err: &HandlerError) {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                path = %ctx.original_path(),
                kind = ?err.kind(),
                error = %err,
                "unhandled error"
            );
        } else {
            tracing::debug!(status = status.as_u16(), error = %err, "request rejected");
        }

        if ctx.is_finalized() {
            tracing::debug!("error raised after response was finalized; keeping response");
            return;
        }

        let body = if err.is_exposed() || self.expose_errors {
            err.message().to_string()
        } else {
            status.canonical_reason().unwrap_or("Error").to_string()
        };
        ctx.send_text(status, body);
    }
}

/// Hot-swappable handle to the current [`Dispatcher`].
///
/// Readers take a snapshot per request and never block writers.
#[derive(Clone)]
pub struct SharedDispatcher {
    inner: Arc<ArcSwap<Dispatcher>>,
}

impl SharedDispatcher {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(dispatcher)),
        }
    }

    /// Snapshot of the current dispatcher.
    pub fn load(&self) -> Arc<Dispatcher> {
        self.inner.load_full()
    }

    /// Replace the dispatcher. In-flight requests finish on their snapshot.
    pub fn store(&self, dispatcher: Dispatcher) {
        self.inner.store(Arc::new(dispatcher));
        tracing::info!("dispatcher swapped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::handler_fn;
    use crate::dispatch::AppBuilder;
    use axum::http::Method;

    fn text(body: &'static str) -> impl Handler {
        handler_fn(move |ctx, _next| {
            Box::pin(async move {
                ctx.send_text(StatusCode::OK, body);
                Ok(())
            })
        })
    }

    async fn send(dispatcher: &Dispatcher, method: Method, target: &str) -> RequestContext {
        let mut ctx = RequestContext::new(method, target);
        dispatcher.dispatch(&mut ctx).await;
        ctx
    }

    fn body(ctx: &RequestContext) -> String {
        String::from_utf8(ctx.response().body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_is_404() {
        let app = AppBuilder::new().get("/a", text("a")).build().unwrap();
        let ctx = send(&app, Method::GET, "/b").await;

        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ctx.dispatch_state(), DispatchState::Done);
    }

    #[tokio::test]
    async fn test_server_error_hides_message() {
        let app = AppBuilder::new()
            .get(
                "/boom",
                handler_fn(|_ctx, _next| {
                    Box::pin(async {
                        Err(HandlerError::internal(std::io::Error::other("db password wrong")))
                    })
                }),
            )
            .build()
            .unwrap();

        let ctx = send(&app, Method::GET, "/boom").await;
        assert_eq!(ctx.response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&ctx), "Internal Server Error");
        assert_eq!(ctx.dispatch_state(), DispatchState::Errored);
    }

    #[tokio::test]
    async fn test_expose_errors_shows_message() {
        let app = AppBuilder::new()
            .expose_errors(true)
            .get(
                "/boom",
                handler_fn(|_ctx, _next| {
                    Box::pin(async {
                        Err(HandlerError::new(StatusCode::SERVICE_UNAVAILABLE, "maintenance"))
                    })
                }),
            )
            .build()
            .unwrap();

        let ctx = send(&app, Method::GET, "/boom").await;
        assert_eq!(ctx.response().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(&ctx), "maintenance");
    }

    #[tokio::test]
    async fn test_client_error_message_exposed() {
        let app = AppBuilder::new()
            .get(
                "/v",
                handler_fn(|_ctx, _next| {
                    Box::pin(async { Err(HandlerError::bad_request("missing q")) })
                }),
            )
            .build()
            .unwrap();

        let ctx = send(&app, Method::GET, "/v").await;
        assert_eq!(ctx.response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&ctx), "missing q");
    }

    #[tokio::test]
    async fn test_malformed_path_is_400() {
        let app = AppBuilder::new().get("/a/:x", text("a")).build().unwrap();
        let ctx = send(&app, Method::GET, "/a/%%").await;

        assert_eq!(ctx.response().status(), StatusCode::BAD_REQUEST);
        assert!(ctx.params().is_empty());
    }

    #[tokio::test]
    async fn test_error_after_finalize_keeps_response() {
        let app = AppBuilder::new()
            .get(
                "/late",
                handler_fn(|ctx, _next| {
                    Box::pin(async move {
                        ctx.send_text(StatusCode::ACCEPTED, "queued");
                        Err(HandlerError::internal(std::io::Error::other("after the fact")))
                    })
                }),
            )
            .build()
            .unwrap();

        let ctx = send(&app, Method::GET, "/late").await;
        assert_eq!(ctx.response().status(), StatusCode::ACCEPTED);
        assert_eq!(body(&ctx), "queued");
    }

    #[tokio::test]
    async fn test_auto_options() {
        let app = AppBuilder::new()
            .get("/items", text("list"))
            .post("/items", text("created"))
            .build()
            .unwrap();

        let ctx = send(&app, Method::OPTIONS, "/items").await;
        assert_eq!(ctx.response().status(), StatusCode::NO_CONTENT);
        assert_eq!(
            ctx.response().headers().get("allow").unwrap(),
            "GET, HEAD, POST, OPTIONS"
        );

        let ctx = send(&app, Method::OPTIONS, "/missing").await;
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_uses_get_route() {
        let app = AppBuilder::new().get("/page", text("page")).build().unwrap();
        let ctx = send(&app, Method::HEAD, "/page").await;
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.matched_route(), Some("/page"));
    }

    #[tokio::test]
    async fn test_shared_dispatcher_swap() {
        let shared = SharedDispatcher::new(AppBuilder::new().get("/v", text("one")).build().unwrap());
        let before = shared.load();

        shared.store(AppBuilder::new().get("/v", text("two")).build().unwrap());

        assert_eq!(body(&send(&before, Method::GET, "/v").await), "one");
        assert_eq!(body(&send(&shared.load(), Method::GET, "/v").await), "two");
    }
}

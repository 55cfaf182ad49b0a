//! Route table: registration, lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in per-method buckets
//! - Look up the matching route for a request
//! - Return the matched route or an explicit no-match
//! - Run the matched route's handlers as part of a larger chain
//!
//! # Design Decisions
//! - Built once by `RouterBuilder`, immutable afterwards (shared without locks)
//! - Buckets are sorted by specificity at build time; equal specificity
//!   keeps registration order
//! - O(n) scan per bucket (acceptable for typical route counts)
//! - A malformed path is an error, never a silent no-match

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{HeaderValue, ALLOW};
use axum::http::StatusCode;
use thiserror::Error;

use crate::chain::{
    BoxFuture, BoxedHandler, Forward, Handler, HandlerResult, IntoHandlers, Next, Tail,
};
use crate::context::RequestContext;
use crate::routing::decode::{decode_path, DecodeError};
use crate::routing::matcher::{PatternError, PatternOptions, RoutePattern};
use crate::routing::method::{Method, CONCRETE_METHODS};
use crate::routing::params::Params;

/// Errors raised while matching a request.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("malformed request path '{path}': {source}")]
    MalformedPath {
        path: String,
        #[source]
        source: DecodeError,
    },
}

/// A registered route.
pub struct Route {
    method: Method,
    pattern: RoutePattern,
    handlers: Arc<[BoxedHandler]>,
}

impl Route {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn template(&self) -> &str {
        self.pattern.template()
    }

    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.pattern.template())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct MatchResult<'r> {
    route: &'r Route,
    params: Params,
}

impl<'r> MatchResult<'r> {
    pub fn route(&self) -> &'r Route {
        self.route
    }

    pub fn handlers(&self) -> &'r [BoxedHandler] {
        &self.route.handlers
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn into_params(self) -> Params {
        self.params
    }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Collects routes during setup.
pub struct RouterBuilder {
    options: PatternOptions,
    auto_options: bool,
    routes: Vec<Route>,
    error: Option<PatternError>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new(PatternOptions::default())
    }
}

impl RouterBuilder {
    pub fn new(options: PatternOptions) -> Self {
        Self {
            options,
            auto_options: true,
            routes: Vec::new(),
            error: None,
        }
    }

    /// Answer unmatched `OPTIONS` requests with `204` and an `Allow` header.
    pub fn auto_options(mut self, enabled: bool) -> Self {
        self.auto_options = enabled;
        self
    }

    /// Register a route, reporting template errors immediately.
    pub fn register(
        &mut self,
        method: Method,
        template: &str,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, PatternError> {
        let pattern = RoutePattern::compile(template, self.options)?;
        self.routes.push(Route {
            method,
            pattern,
            handlers: handlers.into_handlers().into(),
        });
        Ok(self)
    }

    /// Register a route. Template errors surface from [`build`](Self::build).
    pub fn route(mut self, method: Method, template: &str, handlers: impl IntoHandlers) -> Self {
        if self.error.is_none() {
            if let Err(err) = self.register(method, template, handlers) {
                self.error = Some(err);
            }
        }
        self
    }

    pub fn get(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Get, template, handlers)
    }

    pub fn post(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Post, template, handlers)
    }

    pub fn put(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Put, template, handlers)
    }

    pub fn delete(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Delete, template, handlers)
    }

    pub fn patch(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Patch, template, handlers)
    }

    pub fn head(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Head, template, handlers)
    }

    pub fn options(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Options, template, handlers)
    }

    pub fn any(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Any, template, handlers)
    }

    /// Freeze the table.
    pub fn build(self) -> Result<Router, PatternError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut buckets: HashMap<Method, Vec<Route>> = HashMap::new();
        for route in self.routes {
            buckets.entry(route.method).or_default().push(route);
        }
        for bucket in buckets.values_mut() {
            // Stable: equal specificity keeps registration order.
            bucket.sort_by(|a, b| b.pattern.specificity().cmp(a.pattern.specificity()));
        }

        let count: usize = buckets.values().map(Vec::len).sum();
        tracing::debug!(routes = count, "route table built");

        Ok(Router {
            buckets,
            options: self.options,
            auto_options: self.auto_options,
        })
    }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// An immutable route table.
pub struct Router {
    buckets: HashMap<Method, Vec<Route>>,
    options: PatternOptions,
    auto_options: bool,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    pub fn options(&self) -> PatternOptions {
        self.options
    }

    /// Routes in lookup order, bucket by bucket.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        CONCRETE_METHODS
            .iter()
            .chain(std::iter::once(&Method::Any))
            .filter_map(|m| self.buckets.get(m))
            .flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the route for `method` and a raw (percent-encoded) path.
    ///
    /// Search order: the method's bucket, then GET for HEAD requests, then
    /// the ANY bucket.
    pub fn match_route(
        &self,
        method: &axum::http::Method,
        raw_path: &str,
    ) -> Result<Option<MatchResult<'_>>, RouteError> {
        let segments = decode(raw_path)?;

        let method = Method::from_http(method);
        let fallback = (method == Some(Method::Head)).then_some(Method::Get);
        let order = [method, fallback, Some(Method::Any)];

        for bucket in order.iter().flatten().filter_map(|m| self.buckets.get(m)) {
            for route in bucket {
                if let Some(params) = route.pattern.matches(&segments) {
                    return Ok(Some(MatchResult { route, params }));
                }
            }
        }
        Ok(None)
    }

    /// Methods that would match `raw_path`, in `Allow` header order.
    pub fn allowed_methods(&self, raw_path: &str) -> Result<Vec<Method>, RouteError> {
        let segments = decode(raw_path)?;
        let hit = |method: Method| {
            self.buckets
                .get(&method)
                .is_some_and(|bucket| bucket.iter().any(|r| r.pattern.matches(&segments).is_some()))
        };

        let any = hit(Method::Any);
        let get = any || hit(Method::Get);
        let mut allowed: Vec<Method> = CONCRETE_METHODS
            .into_iter()
            .filter(|&m| match m {
                Method::Head => get || hit(Method::Head),
                Method::Get => get,
                _ => any || hit(m),
            })
            .collect();

        if !allowed.is_empty() && !allowed.contains(&Method::Options) {
            allowed.push(Method::Options);
        }
        Ok(allowed)
    }

    fn respond_options(&self, ctx: &mut RequestContext) -> Result<bool, RouteError> {
        let allowed = self.allowed_methods(ctx.path())?;
        if allowed.is_empty() {
            return Ok(false);
        }
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            ctx.set_header(ALLOW, value);
        }
        ctx.finalize(StatusCode::NO_CONTENT, Bytes::new());
        Ok(true)
    }
}

fn decode(raw_path: &str) -> Result<Vec<String>, RouteError> {
    decode_path(raw_path).map_err(|source| RouteError::MalformedPath {
        path: raw_path.to_string(),
        source,
    })
}

impl Handler for Router {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let matched = match self.match_route(ctx.method(), ctx.path()) {
                Ok(matched) => matched,
                Err(err) => {
                    tracing::warn!(error = %err, "rejecting malformed path");
                    return Err(err.into());
                }
            };

            let Some(matched) = matched else {
                if self.auto_options
                    && ctx.method() == axum::http::Method::OPTIONS
                    && self.respond_options(ctx)?
                {
                    return Ok(());
                }
                return next.run(ctx).await;
            };

            let route = matched.route();
            tracing::debug!(
                method = %ctx.method(),
                path = %ctx.path(),
                route = %route.template(),
                "route matched"
            );

            let saved = ctx.replace_params(matched.into_params());
            let full = full_template(ctx.base_path(), route.template());
            ctx.replace_matched_route(Some(full));

            let result = {
                let mut forward = Forward::new(&mut next);
                let mut inner = Next::nested(route.handlers(), Tail::Resume(&mut forward));
                inner.run(ctx).await
            };

            ctx.replace_params(saved);
            result
        })
    }

    fn name(&self) -> &str {
        "router"
    }
}

/// The template as seen from the application root.
fn full_template(base_path: &str, template: &str) -> String {
    match (base_path, template) {
        ("", _) => template.to_string(),
        (_, "/") => base_path.to_string(),
        _ => format!("{base_path}{template}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::handler_fn;
    use axum::http::Method as HttpMethod;

    fn noop() -> impl Handler {
        handler_fn(|_ctx, _next| Box::pin(async { Ok(()) }))
    }

    fn matched_template(router: &Router, method: HttpMethod, path: &str) -> Option<String> {
        router
            .match_route(&method, path)
            .unwrap()
            .map(|m| m.route().template().to_string())
    }

    #[test]
    fn test_literal_beats_param_regardless_of_order() {
        let router = Router::builder()
            .get("/a/:x", noop())
            .get("/a/b", noop())
            .build()
            .unwrap();

        let m = router.match_route(&HttpMethod::GET, "/a/b").unwrap().unwrap();
        assert_eq!(m.route().template(), "/a/b");

        let m = router.match_route(&HttpMethod::GET, "/a/z").unwrap().unwrap();
        assert_eq!(m.route().template(), "/a/:x");
        assert_eq!(m.params().get("x"), Some("z"));
    }

    #[test]
    fn test_equal_specificity_uses_registration_order() {
        let router = Router::builder()
            .get("/a/:x/b", noop())
            .get("/a/:y/:z", noop())
            .get("/a/:y/b", noop())
            .build()
            .unwrap();

        assert_eq!(
            matched_template(&router, HttpMethod::GET, "/a/1/b").as_deref(),
            Some("/a/:x/b")
        );
        assert_eq!(
            matched_template(&router, HttpMethod::GET, "/a/1/c").as_deref(),
            Some("/a/:y/:z")
        );
    }

    #[test]
    fn test_decoded_params_and_wildcard() {
        let router = Router::builder()
            .get("/users/:name", noop())
            .get("/files/*", noop())
            .build()
            .unwrap();

        let m = router
            .match_route(&HttpMethod::GET, "/users/%E4%BD%A0")
            .unwrap()
            .unwrap();
        assert_eq!(m.params().get("name"), Some("你"));

        let m = router
            .match_route(&HttpMethod::GET, "/files/a/b%20c/d.txt")
            .unwrap()
            .unwrap();
        assert_eq!(m.params().wildcard(), Some("a/b c/d.txt"));
    }

    #[test]
    fn test_malformed_path_is_error() {
        let router = Router::builder().get("/a/:x", noop()).build().unwrap();

        let err = router.match_route(&HttpMethod::GET, "/a/%%").unwrap_err();
        assert!(matches!(err, RouteError::MalformedPath { .. }));
        assert!(router.match_route(&HttpMethod::GET, "/a/%C3%28").is_err());
    }

    #[test]
    fn test_no_match_is_none() {
        let router = Router::builder().get("/a", noop()).build().unwrap();
        assert!(router.match_route(&HttpMethod::GET, "/b").unwrap().is_none());
        assert!(router.match_route(&HttpMethod::POST, "/a").unwrap().is_none());
    }

    #[test]
    fn test_bucket_fallbacks() {
        let router = Router::builder()
            .get("/page", noop())
            .any("/page", noop())
            .any("/anything/*", noop())
            .build()
            .unwrap();

        let head = router.match_route(&HttpMethod::HEAD, "/page").unwrap().unwrap();
        assert_eq!(head.route().method(), Method::Get);

        let post = router.match_route(&HttpMethod::POST, "/page").unwrap().unwrap();
        assert_eq!(post.route().method(), Method::Any);

        let trace = router
            .match_route(&HttpMethod::TRACE, "/anything/x")
            .unwrap()
            .unwrap();
        assert_eq!(trace.route().method(), Method::Any);
    }

    #[test]
    fn test_allowed_methods() {
        let router = Router::builder()
            .get("/items", noop())
            .post("/items", noop())
            .delete("/items/:id", noop())
            .build()
            .unwrap();

        assert_eq!(
            router.allowed_methods("/items").unwrap(),
            vec![Method::Get, Method::Head, Method::Post, Method::Options]
        );
        assert_eq!(
            router.allowed_methods("/items/3").unwrap(),
            vec![Method::Delete, Method::Options]
        );
        assert!(router.allowed_methods("/nothing").unwrap().is_empty());
    }

    #[test]
    fn test_build_reports_first_pattern_error() {
        let err = Router::builder()
            .get("/ok", noop())
            .get("no-slash", noop())
            .get("/a/*/b", noop())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, PatternError::MissingLeadingSlash(_)));
    }

    #[test]
    fn test_register_reports_immediately() {
        let mut builder = RouterBuilder::default();
        assert!(builder.register(Method::Get, "/a/:id/:id", noop()).is_err());
        assert!(builder.register(Method::Get, "/a/:id", noop()).is_ok());
        assert_eq!(builder.build().unwrap().len(), 1);
    }

    #[test]
    fn test_case_insensitive_option() {
        let options = PatternOptions {
            case_sensitive: false,
            ..PatternOptions::default()
        };
        let router = RouterBuilder::new(options)
            .get("/Users/:id", noop())
            .build()
            .unwrap();

        let m = router.match_route(&HttpMethod::GET, "/USERS/Ann").unwrap().unwrap();
        assert_eq!(m.params().get("id"), Some("Ann"));
    }
}

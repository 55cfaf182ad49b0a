//! Per-request mutable state.
//!
//! # Responsibilities
//! - Hold the request line, headers, body placeholder and route parameters
//! - Carry the response being built and the dispatch state
//! - Track mount rewriting of the visible path
//! - Register per-request cleanup and observe aborts
//!
//! # Design Decisions
//! - One context per in-flight request; handlers only ever borrow it
//! - `reset` clears every mutable field; the pool depends on it
//! - The abort flag is replaced on reset so stale handles cannot reach a
//!   recycled context

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Extensions, HeaderMap, Method, StatusCode};
use serde::Serialize;

use crate::chain::HandlerError;
use crate::context::response::ResponseState;
use crate::dispatch::DispatchState;
use crate::routing::Params;

type Cleanup = Box<dyn FnOnce() + Send>;

/// Handle that aborts a request from outside its handler chain.
#[derive(Debug, Clone)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Saved view of the path while inside a mount.
#[derive(Debug)]
pub(crate) struct PathView {
    path: String,
    base_path: String,
}

/// Mutable state for one request.
pub struct RequestContext {
    method: Method,
    raw_path: String,
    path: String,
    base_path: String,
    query_string: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
    params: Params,
    matched_route: Option<String>,
    request_id: Option<String>,
    extensions: Extensions,
    response: ResponseState,
    state: DispatchState,
    layers: Vec<DispatchState>,
    handler_seq: usize,
    aborted: Arc<AtomicBool>,
    cleanup: Vec<Cleanup>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            method: Method::GET,
            raw_path: "/".to_string(),
            path: "/".to_string(),
            base_path: String::new(),
            query_string: String::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            params: Params::new(),
            matched_route: None,
            request_id: None,
            extensions: Extensions::new(),
            response: ResponseState::default(),
            state: DispatchState::Pending,
            layers: Vec::new(),
            handler_seq: 0,
            aborted: Arc::new(AtomicBool::new(false)),
            cleanup: Vec::new(),
        }
    }
}

impl RequestContext {
    /// Create a context for `method` and a request target such as
    /// `/search?q=rust`. The path is kept percent-encoded.
    pub fn new(method: Method, target: &str) -> Self {
        let mut ctx = Self::default();
        ctx.prepare(method, target, HeaderMap::new(), None);
        ctx
    }

    /// Load a request into a fresh (or freshly reset) context.
    pub fn prepare(
        &mut self,
        method: Method,
        target: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let path = if path.is_empty() { "/" } else { path };

        self.method = method;
        self.raw_path = path.to_string();
        self.path = path.to_string();
        self.base_path.clear();
        self.query_string = query.to_string();
        self.query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        self.headers = headers;
        self.body = body;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path as received, never rewritten by mounts.
    pub fn original_path(&self) -> &str {
        &self.raw_path
    }

    /// The path visible at the current mount level (still percent-encoded).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Prefixes stripped by the mounts currently entered.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// First decoded value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body placeholder; populated by the HTTP layer or body middleware.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub(crate) fn replace_params(&mut self, params: Params) -> Params {
        std::mem::replace(&mut self.params, params)
    }

    /// Template of the innermost matched route.
    pub fn matched_route(&self) -> Option<&str> {
        self.matched_route.as_deref()
    }

    pub(crate) fn replace_matched_route(&mut self, route: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.matched_route, route)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.request_id = Some(id.into());
    }

    /// Typed per-request storage for middleware.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    // ─── Response ────────────────────────────────────────────────────────────

    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    pub fn is_finalized(&self) -> bool {
        self.response.is_finalized()
    }

    pub fn set_status(&mut self, status: StatusCode) -> bool {
        self.response.set_status(status)
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        self.response.set_header(name, value)
    }

    /// Finalize with a raw body. Returns `false` if a response was already
    /// finalized; the earlier response is kept.
    pub fn finalize(&mut self, status: StatusCode, body: impl Into<Bytes>) -> bool {
        let written = self.response.finalize(status, body);
        if !written {
            tracing::debug!(path = %self.raw_path, "response already finalized; write ignored");
        }
        written
    }

    pub fn send_text(&mut self, status: StatusCode, text: impl Into<String>) -> bool {
        let text: String = text.into();
        self.finalize_typed(status, "text/plain; charset=utf-8", text)
    }

    pub fn send_json<T: Serialize>(
        &mut self,
        status: StatusCode,
        value: &T,
    ) -> Result<bool, HandlerError> {
        let body = serde_json::to_vec(value)?;
        Ok(self.finalize_typed(status, "application/json", body))
    }

    fn finalize_typed(
        &mut self,
        status: StatusCode,
        content_type: &'static str,
        body: impl Into<Bytes>,
    ) -> bool {
        let written = self.response.finalize_with_type(status, content_type, body);
        if !written {
            tracing::debug!(path = %self.raw_path, "response already finalized; write ignored");
        }
        written
    }

    /// Move the response out, leaving a default one behind.
    pub fn take_response(&mut self) -> ResponseState {
        std::mem::take(&mut self.response)
    }

    // ─── Dispatch bookkeeping ────────────────────────────────────────────────

    /// State of the innermost active handler, or the request-level state
    /// when no handler is running.
    pub fn dispatch_state(&self) -> DispatchState {
        self.layers.last().copied().unwrap_or(self.state)
    }

    /// One entry per handler currently on the stack, outermost first. Every
    /// entry but the last is `AwaitingNext`.
    pub fn dispatch_layers(&self) -> &[DispatchState] {
        &self.layers
    }

    pub(crate) fn set_dispatch_state(&mut self, state: DispatchState) {
        self.layers.clear();
        self.state = state;
    }

    /// Allocate the sequence number of the next handler and push it as
    /// running; the handler that delegated to it is now awaiting.
    pub(crate) fn begin_handler(&mut self) -> usize {
        if let Some(top) = self.layers.last_mut() {
            if let DispatchState::Running(seq) = *top {
                *top = DispatchState::AwaitingNext(seq);
            }
        }
        let seq = self.handler_seq;
        self.handler_seq += 1;
        self.layers.push(DispatchState::Running(seq));
        seq
    }

    /// Pop the innermost handler and resume the one that delegated to it.
    pub(crate) fn end_handler(&mut self) {
        self.layers.pop();
        if let Some(top) = self.layers.last_mut() {
            if let DispatchState::AwaitingNext(seq) = *top {
                *top = DispatchState::Running(seq);
            }
        }
    }

    /// Number of handlers invoked so far.
    pub fn handlers_invoked(&self) -> usize {
        self.handler_seq
    }

    // ─── Mount rewriting ─────────────────────────────────────────────────────

    /// Strip `prefix` (already checked to match) from the visible path.
    pub(crate) fn enter_mount(&mut self, prefix: &str) -> PathView {
        let suffix = match &self.path[prefix.len()..] {
            "" => "/".to_string(),
            rest => rest.to_string(),
        };
        let base_path = format!("{}{}", self.base_path, prefix);
        self.replace_view(PathView {
            path: suffix,
            base_path,
        })
    }

    /// Install `view`, returning the one it replaced.
    pub(crate) fn replace_view(&mut self, view: PathView) -> PathView {
        PathView {
            path: std::mem::replace(&mut self.path, view.path),
            base_path: std::mem::replace(&mut self.base_path, view.base_path),
        }
    }

    // ─── Cancellation and cleanup ────────────────────────────────────────────

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.aborted))
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Register work to run once when the request ends or is aborted.
    pub fn on_cleanup(&mut self, f: impl FnOnce() + Send + 'static) {
        self.cleanup.push(Box::new(f));
    }

    /// Run registered cleanup in reverse registration order.
    pub(crate) fn run_cleanup(&mut self) {
        while let Some(f) = self.cleanup.pop() {
            f();
        }
    }

    /// Clear every mutable field so the context can serve another request.
    pub fn reset(&mut self) {
        self.run_cleanup();
        self.method = Method::GET;
        self.raw_path.clear();
        self.raw_path.push('/');
        self.path.clear();
        self.path.push('/');
        self.base_path.clear();
        self.query_string.clear();
        self.query.clear();
        self.headers.clear();
        self.body = None;
        self.params.clear();
        self.matched_route = None;
        self.request_id = None;
        self.extensions.clear();
        self.response.clear();
        self.state = DispatchState::Pending;
        self.layers.clear();
        self.handler_seq = 0;
        self.aborted = Arc::new(AtomicBool::new(false));
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("base_path", &self.base_path)
            .field("params", &self.params)
            .field("state", &self.dispatch_state())
            .field("finalized", &self.response.is_finalized())
            .finish_non_exhaustive()
    }
}

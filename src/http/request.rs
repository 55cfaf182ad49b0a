//! Request identification.
//!
//! # Responsibilities
//! - Accept a caller-supplied `x-request-id` or generate a UUID v4
//! - Store it on the context before downstream handlers run
//! - Echo it on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Incoming IDs longer than 128 bytes or not visible ASCII are replaced

use axum::http::header::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::chain::{BoxFuture, Handler, HandlerResult, Next};
use crate::context::RequestContext;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_ID_LEN: usize = 128;

/// Request ID middleware.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestId;

impl RequestId {
    fn incoming(ctx: &RequestContext) -> Option<String> {
        ctx.header(X_REQUEST_ID.as_str())
            .filter(|id| !id.is_empty() && id.len() <= MAX_ID_LEN)
            .filter(|id| id.bytes().all(|b| b.is_ascii_graphic()))
            .map(str::to_string)
    }
}

impl Handler for RequestId {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let id = Self::incoming(ctx).unwrap_or_else(|| Uuid::new_v4().to_string());
            if let Ok(value) = HeaderValue::from_str(&id) {
                ctx.set_header(X_REQUEST_ID, value);
            }
            ctx.set_request_id(id);
            next.run(ctx).await
        })
    }

    fn name(&self) -> &str {
        "request_id"
    }
}

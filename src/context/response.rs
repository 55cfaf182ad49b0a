//! Response state accumulated during dispatch.
//!
//! # Design Decisions
//! - Finalization is a one-way latch: the first finalize wins
//! - Once finalized, status, headers and body are frozen; later writes are
//!   dropped and reported through the `bool` return value
//! - Nothing is written to the wire here; the HTTP layer converts the
//!   finalized state after dispatch returns

use axum::body::Bytes;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};

/// The response being built for one request.
#[derive(Debug, Clone)]
pub struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    finalized: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            finalized: false,
        }
    }
}

impl ResponseState {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Set the status without finalizing.
    pub fn set_status(&mut self, status: StatusCode) -> bool {
        if self.finalized {
            return false;
        }
        self.status = status;
        true
    }

    /// Insert a header, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.finalized {
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    /// Commit status and body. Returns `false` if already finalized.
    pub fn finalize(&mut self, status: StatusCode, body: impl Into<Bytes>) -> bool {
        if self.finalized {
            return false;
        }
        self.status = status;
        self.body = body.into();
        self.finalized = true;
        true
    }

    pub(crate) fn finalize_with_type(
        &mut self,
        status: StatusCode,
        content_type: &'static str,
        body: impl Into<Bytes>,
    ) -> bool {
        if self.finalized {
            return false;
        }
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.finalize(status, body)
    }

    pub(crate) fn clear(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body = Bytes::new();
        self.finalized = false;
    }

    /// Split into status, headers and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}

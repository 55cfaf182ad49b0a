//! Errors raised by handlers.

use std::any::Any;

use axum::http::StatusCode;
use thiserror::Error;

use crate::routing::RouteError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What produced a [`HandlerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Returned by handler code.
    Handler,
    /// A handler panicked; the panic was contained.
    Panic,
    /// The request path could not be decoded.
    MalformedPath,
    /// The request was aborted before the chain finished.
    Aborted,
}

/// An error propagating through a handler chain.
///
/// Carries the status the dispatcher should answer with. Client errors are
/// exposed to the caller by default; server errors are replaced by the
/// canonical reason phrase unless explicitly exposed.
#[derive(Debug, Error)]
#[error("{message} ({status})")]
pub struct HandlerError {
    kind: ErrorKind,
    status: StatusCode,
    message: String,
    expose: bool,
    #[source]
    source: Option<BoxError>,
}

impl HandlerError {
    /// Create an error with an explicit status.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Handler,
            status,
            message: message.into(),
            expose: status.is_client_error(),
            source: None,
        }
    }

    /// Wrap an arbitrary error as a 500.
    pub fn internal(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            kind: ErrorKind::Handler,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: source.to_string(),
            expose: false,
            source: Some(source),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub(crate) fn aborted() -> Self {
        Self {
            kind: ErrorKind::Aborted,
            status: StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            message: "request aborted".to_string(),
            expose: false,
            source: None,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string());
        Self {
            kind: ErrorKind::Panic,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
            expose: false,
            source: None,
        }
    }

    /// Override whether the message may be shown to the client.
    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_exposed(&self) -> bool {
        self.expose
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == ErrorKind::Aborted
    }
}

impl From<RouteError> for HandlerError {
    fn from(err: RouteError) -> Self {
        Self {
            kind: ErrorKind::MalformedPath,
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
            expose: true,
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_exposed() {
        let err = HandlerError::new(StatusCode::UNPROCESSABLE_ENTITY, "bad field");
        assert!(err.is_exposed());
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = HandlerError::new(StatusCode::SERVICE_UNAVAILABLE, "db down");
        assert!(!err.is_exposed());
        assert!(err.with_expose(true).is_exposed());
    }

    #[test]
    fn test_internal_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = HandlerError::from(io);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "disk full");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_panic_payloads() {
        let err = HandlerError::from_panic(Box::new("boom"));
        assert_eq!(err.kind(), ErrorKind::Panic);
        assert_eq!(err.message(), "boom");

        let err = HandlerError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.message(), "owned boom");

        let err = HandlerError::from_panic(Box::new(7_u8));
        assert_eq!(err.message(), "handler panicked");
    }

    #[test]
    fn test_display() {
        let err = HandlerError::bad_request("missing q");
        assert_eq!(err.to_string(), "missing q (400 Bad Request)");
    }
}

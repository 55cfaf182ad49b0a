//! Registration methods.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// HTTP methods a route can be registered for.
///
/// `Any` registers into the bucket consulted after the method-specific one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Any,
}

/// The concrete methods, in the order used for `Allow` headers.
pub const CONCRETE_METHODS: [Method; 7] = [
    Method::Get,
    Method::Head,
    Method::Post,
    Method::Put,
    Method::Delete,
    Method::Patch,
    Method::Options,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported method '{0}'")]
pub struct UnsupportedMethod(pub String);

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Any => "ANY",
        }
    }

    /// Map a request method. Returns `None` for methods with no bucket
    /// (e.g. TRACE, CONNECT); such requests can only hit `Any` routes.
    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        method.as_str().parse().ok().filter(|m| *m != Method::Any)
    }
}

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "ANY" | "ALL" => Ok(Method::Any),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

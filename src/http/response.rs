//! Conversion of a finalized context response into an HTTP response.

use axum::body::Body;
use axum::response::{IntoResponse, Response};

use crate::context::ResponseState;

impl IntoResponse for ResponseState {
    fn into_response(self) -> Response {
        let (status, headers, body) = self.into_parts();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

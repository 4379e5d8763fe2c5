//! The router's closed error taxonomy (spec §4.11/§7) and its mapping to
//! HTTP status codes.
//!
//! `RouteNotFound`/`DisabledRoute` are *recoverable*: an ancestor
//! Produces/Language link may catch either to keep iterating over the next
//! candidate child (spec §7 "Recovery rules"). Every other variant is
//! terminal -- it stops iteration and surfaces to the transport unchanged.
use http::{HeaderValue, Response, StatusCode};
use linkrail_core::http::HttpError;
use thiserror::Error;

use crate::body::{empty_body, BoxBody};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// No route matched, or a Handler link's `handler` slot is empty.
    #[error("route not found")]
    RouteNotFound,
    /// A route matched but was disabled via `disable_route`.
    #[error("route disabled")]
    DisabledRoute,
    /// The Method link has no child for the request's method.
    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<String> },
    /// The Consumes link found at least one child but none matched the
    /// request's `Content-Type`.
    #[error("unsupported media type")]
    UnsupportedMediaType,
    /// The Produces link exhausted every `Accept` candidate.
    #[error("not acceptable")]
    NotAcceptable { offered: Vec<String> },
    /// Malformed input the router itself rejects (e.g. path normalization).
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Anything else -- a handler panic surrogate, a resource I/O failure.
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl RouterError {
    /// `RouteNotFound`/`DisabledRoute` may be caught by an ancestor
    /// Produces/Language link to try the next candidate (spec §7); every
    /// other variant is terminal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RouterError::RouteNotFound | RouterError::DisabledRoute)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RouterError::RouteNotFound => StatusCode::NOT_FOUND,
            RouterError::DisabledRoute => StatusCode::NOT_FOUND,
            RouterError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RouterError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RouterError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            RouterError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RouterError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl HttpError<BoxBody> for RouterError {
    fn to_response(&self) -> Option<Response<BoxBody>> {
        let mut builder = Response::builder().status(self.status());
        if let RouterError::MethodNotAllowed { allowed } = self {
            if let Ok(v) = HeaderValue::from_str(&allowed.join(",")) {
                builder = builder.header(http::header::ALLOW, v);
            }
        }
        builder.body(empty_body()).ok()
    }
}

//! The handler seam every routing link ultimately delegates to.
//!
//! [`HttpHandler`] is the trait a user-supplied endpoint, or any middleware
//! wrapping one, implements. It is intentionally thin: given a request body
//! and a per-request context `CX`, produce a response body plus a
//! `should_continue` flag telling the transport whether the connection may
//! be kept alive. The routing pipeline in `linkrail-router` is itself one
//! (composite) implementation of this trait.
use std::future::Future;

use http::{Request, Response};

/// Whether the transport may keep the connection open for another request
/// after writing this response.
pub type ResponseWithContinue<B> = (Response<B>, bool);

/// A handler capable of producing a response for a request, given some
/// per-request context `CX` (peer address, forked middleware state, ...).
///
/// Implementors are expected to be cheap to clone: a fresh clone is handed
/// to every accepted connection, mirroring the way the pipeline itself is
/// shared read-only across requests (see the router's read-copy-update
/// discipline).
pub trait HttpHandler<CX, B>: Clone {
    /// The body type of the produced response.
    type Body;
    /// The error type surfaced when handling fails. A failure is never
    /// turned into a response by the handler itself; it propagates to the
    /// transport's error exchange handler.
    type Error;

    fn handle(
        &self,
        request: Request<B>,
        ctx: CX,
    ) -> impl Future<Output = Result<ResponseWithContinue<Self::Body>, Self::Error>>;
}

/// Wraps a handler error to mark it as unrecoverable: once raised, no
/// ancestor link may catch it to keep iterating (§7 "terminal" errors).
#[derive(thiserror::Error, Debug)]
#[error("fatal handler error: {0}")]
pub struct HttpFatalError<E>(pub E);

/// An error that knows how to turn itself into a complete HTTP response,
/// the seam the error taxonomy (spec §4.11/§7) plugs into: the transport's
/// error exchange handler calls this when a fatal error bubbles out of the
/// handler chain, and only it writes a failure body.
pub trait HttpError<B> {
    /// `None` means "I'm not actually a terminal HTTP error" (e.g. a
    /// recoverable routing signal an ancestor link is expected to catch
    /// before it ever reaches the transport).
    fn to_response(&self) -> Option<Response<B>>;
}

//! Bridges a [`linkrail_router::Router`] into the [`HttpHandler`] seam the
//! core service drives. `RouterError` already implements
//! `linkrail_core::http::HttpError<BoxBody>` (see `linkrail_router::error`),
//! so the only thing this adapter does is turn a dispatch failure into the
//! response that error knows how to render -- it never invents a body of
//! its own (spec §7 "only the error exchange handler writes a failure
//! body").
use std::convert::Infallible;

use http::Request;
use linkrail_core::http::{HttpHandler, ResponseWithContinue};
use linkrail_router::{body::BoxBody, error::RouterError, Router};

/// The handler every accepted connection is handed: a thin, cheap-to-clone
/// wrapper around a `Router`. Exposed as its own type (rather than
/// implementing `HttpHandler` directly on `Router`) so a user can compose
/// additional middleware around it without reaching into `linkrail-router`.
#[derive(Clone)]
pub struct RoutedHandler<CX> {
    router: Router<CX>,
}

impl<CX> RoutedHandler<CX>
where
    CX: Clone + 'static,
{
    pub fn new(router: Router<CX>) -> Self {
        Self { router }
    }
}

impl<CX> HttpHandler<CX, BoxBody> for RoutedHandler<CX>
where
    CX: Clone + 'static,
{
    type Body = BoxBody;
    type Error = Infallible;

    async fn handle(
        &self,
        request: Request<BoxBody>,
        ctx: CX,
    ) -> Result<ResponseWithContinue<Self::Body>, Self::Error> {
        match self.router.dispatch(request, ctx).await {
            Ok(response) => Ok(response),
            Err(err) => Ok((render_error(&err), true)),
        }
    }
}

fn render_error(err: &RouterError) -> http::Response<BoxBody> {
    use linkrail_core::http::HttpError;
    err.to_response().unwrap_or_else(|| {
        http::Response::builder()
            .status(http::StatusCode::INTERNAL_SERVER_ERROR)
            .body(linkrail_router::body::empty_body())
            .expect("static response is well-formed")
    })
}

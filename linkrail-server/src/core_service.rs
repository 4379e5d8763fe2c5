//! Drives one accepted connection's request/response cycle against an
//! [`HttpHandler`], in the shape of
//! `monolake_services::http::core::HttpCoreService::h1_svc`: decode, hand to
//! the handler chain, encode, loop while the handler says to keep the
//! connection alive.
//!
//! Generalized from the teacher in two ways: the wire codec is
//! [`crate::h1`] rather than `monoio_http`'s decoder/encoder (see that
//! module's doc comment), and the per-request context is a plain `CX:
//! Clone` rather than a `certain_map` fork/attach pair -- this facade has
//! no per-link context of its own to compose, only the handler's.
use std::fmt::Debug;

use bytes::BytesMut;
use linkrail_core::{http::HttpHandler, AnyError};
use linkrail_router::body::BoxBody;
use monoio::io::{AsyncReadRent, AsyncWriteRent, Split, Splitable};
use tracing::{info, warn};

use crate::{h1, timeout::HttpServerTimeout};

/// Owns a handler chain and the timeouts applied around it. One instance is
/// shared (cloned cheaply) across every accepted connection.
#[derive(Clone)]
pub struct HttpCoreService<H> {
    handler: H,
    timeout: HttpServerTimeout,
}

impl<H> HttpCoreService<H> {
    pub fn new(handler: H, timeout: HttpServerTimeout) -> Self {
        Self { handler, timeout }
    }

    /// Runs the HTTP/1.1 request/response loop for one accepted connection
    /// until the peer closes it, a wire error occurs, or the handler
    /// declines to keep the connection alive.
    pub async fn serve<S, CX, Err>(&self, stream: S, ctx: CX)
    where
        S: Split + AsyncReadRent + AsyncWriteRent,
        CX: Clone + 'static,
        H: HttpHandler<CX, BoxBody, Body = BoxBody, Error = Err>,
        Err: Into<AnyError> + Debug,
    {
        let (mut reader, mut writer) = stream.into_split();
        let mut carry = BytesMut::new();

        loop {
            let decoded = match self.timeout.keepalive_timeout {
                Some(d) => match monoio::time::timeout(d, h1::read_request(&mut reader, &mut carry)).await {
                    Ok(inner) => inner,
                    Err(_) => {
                        info!("connection idle past keepalive timeout, closing");
                        break;
                    }
                },
                None => h1::read_request(&mut reader, &mut carry).await,
            };

            let req = match decoded {
                Ok(Some(req)) => req,
                Ok(None) => break,
                Err(err) => {
                    warn!("failed to decode request: {err}");
                    break;
                }
            };

            match self.handler.handle(req, ctx.clone()).await {
                Ok((resp, should_continue)) => {
                    let write = match self.timeout.read_body_timeout {
                        Some(d) => monoio::time::timeout(d, h1::write_response(&mut writer, resp))
                            .await
                            .unwrap_or_else(|_| {
                                Err(h1::H1Error::Io(std::io::Error::new(
                                    std::io::ErrorKind::TimedOut,
                                    "response write timed out",
                                )))
                            }),
                        None => h1::write_response(&mut writer, resp).await,
                    };
                    if let Err(err) = write {
                        warn!("failed to write response: {err}");
                        break;
                    }
                    if !should_continue {
                        break;
                    }
                }
                Err(err) => {
                    warn!("handler error, closing connection: {:?}", err.into());
                    break;
                }
            }
        }
    }
}

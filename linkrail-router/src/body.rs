//! Reactive response body assembly (spec §4.10): a handler selects exactly
//! one of Raw / Resource / SSE, and [`ResponseBody::finish`] stamps the
//! headers (`Content-Length` vs. `Transfer-Encoding: chunked`, resource
//! size/media-type, `Content-Type: text/event-stream`) and produces the
//! final byte stream the transport writes out.
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{stream, Stream, StreamExt};
use http::{HeaderMap, HeaderValue};
use linkrail_core::{
    resource::Resource,
    stream::{ByteStream, ReactiveStreamExt},
    AnyError,
};
use thiserror::Error;

use crate::sse::{encode_event, SseEvent};

/// A boxed, type-erased byte stream -- the one concrete body type that
/// flows through the whole pipeline (request and response alike).
pub type BoxBody = Pin<Box<dyn Stream<Item = Result<Bytes, AnyError>>>>;

pub fn empty_body() -> BoxBody {
    Box::pin(stream::empty())
}

pub fn once_body(bytes: Bytes) -> BoxBody {
    Box::pin(stream::once(async move { Ok(bytes) }))
}

/// Bridges a completion-style [`ByteStream`] (resource reads) into the
/// poll-based [`Stream`] the rest of the pipeline is built from.
fn adapt_byte_stream<S>(mut s: S) -> BoxBody
where
    S: ByteStream + 'static,
{
    Box::pin(async_stream::stream! {
        while let Some(item) = s.next_chunk().await {
            yield item;
        }
    })
}

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("response body variant already selected")]
    AlreadySelected,
    #[error("content length mismatch: declared {declared}, emitted {emitted}")]
    ContentLengthMismatch { declared: u64, emitted: u64 },
    #[error("resource not found")]
    ResourceNotFound,
    #[error("resource read error: {0}")]
    ResourceError(#[from] AnyError),
}

enum Selection {
    Raw {
        stream: BoxBody,
        content_length: Option<u64>,
    },
    ResourceMissing,
    ResourceReady {
        stream: BoxBody,
        len: Option<u64>,
        content_type: Option<mime::Mime>,
    },
    Sse {
        events: Pin<Box<dyn Stream<Item = SseEvent>>>,
    },
}

/// Builder for the outbound response body. Exactly one variant may be
/// selected (spec §3 invariant "a response's body variant is chosen at
/// most once; a second selection fails").
#[derive(Default)]
pub struct ResponseBody {
    selection: Option<Selection>,
}

impl ResponseBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the Raw variant from a single in-memory buffer. Always
    /// yields exactly one chunk, so `finish` always stamps `Content-Length`.
    pub fn raw_bytes(&mut self, bytes: Bytes) -> Result<(), BodyError> {
        let len = bytes.len() as u64;
        self.raw_stream(once_body(bytes), Some(len))
    }

    /// Select the Raw variant from a caller-supplied chunk stream. Pass
    /// `content_length` when the handler already knows the total size; the
    /// router validates the declared length against what is actually
    /// emitted (spec §4.10 "content length mismatch").
    pub fn raw_stream(
        &mut self,
        stream: BoxBody,
        content_length: Option<u64>,
    ) -> Result<(), BodyError> {
        if self.selection.is_some() {
            return Err(BodyError::AlreadySelected);
        }
        self.selection = Some(Selection::Raw {
            stream,
            content_length,
        });
        Ok(())
    }

    /// Select the Resource variant (spec §4.10). Resolves existence and
    /// opens the byte stream eagerly so `finish` can stamp `Content-Length`
    /// and `Content-Type` synchronously from what was learned here.
    pub async fn resource<R>(&mut self, resource: R) -> Result<(), BodyError>
    where
        R: Resource,
        R::Stream: 'static,
    {
        if self.selection.is_some() {
            return Err(BodyError::AlreadySelected);
        }
        if resource.exists() == Some(false) {
            self.selection = Some(Selection::ResourceMissing);
            return Ok(());
        }
        let len = resource.len();
        let content_type = resource.content_type();
        let byte_stream = resource.into_stream().await?;
        let stream: BoxBody = adapt_byte_stream(byte_stream);
        self.selection = Some(Selection::ResourceReady {
            stream,
            len,
            content_type,
        });
        Ok(())
    }

    /// Select the SSE variant (spec §4.10/§6). Events are emitted strictly
    /// in source order (`flat_map_sequential` over the per-event byte
    /// frames), never interleaving two events' bytes.
    pub fn sse<S>(&mut self, events: S) -> Result<(), BodyError>
    where
        S: Stream<Item = SseEvent> + 'static,
    {
        if self.selection.is_some() {
            return Err(BodyError::AlreadySelected);
        }
        self.selection = Some(Selection::Sse {
            events: Box::pin(events),
        });
        Ok(())
    }

    /// Stamp response headers and produce the final byte stream. Mirrors
    /// spec §4.10's per-variant rules; on the `ResourceMissing` selection
    /// returns `Err(BodyError::ResourceNotFound)`, which the router maps to
    /// 404.
    pub async fn finish(self, headers: &mut HeaderMap) -> Result<BoxBody, BodyError> {
        match self.selection {
            None => Ok(empty_body()),
            Some(Selection::Raw {
                stream,
                content_length: Some(len),
            }) => Ok(frame_raw_declared(stream, len, headers)),
            Some(Selection::Raw {
                stream,
                content_length: None,
            }) => frame_raw_auto(stream, headers).await,
            Some(Selection::ResourceMissing) => Err(BodyError::ResourceNotFound),
            Some(Selection::ResourceReady {
                stream,
                len,
                content_type,
            }) => {
                if let (Some(len), false) = (len, headers.contains_key(http::header::CONTENT_LENGTH)) {
                    headers.insert(
                        http::header::CONTENT_LENGTH,
                        HeaderValue::from_str(&len.to_string()).unwrap(),
                    );
                }
                if let (Some(ct), false) = (content_type, headers.contains_key(http::header::CONTENT_TYPE)) {
                    if let Ok(v) = HeaderValue::from_str(ct.as_ref()) {
                        headers.insert(http::header::CONTENT_TYPE, v);
                    }
                }
                Ok(stream)
            }
            Some(Selection::Sse { events }) => {
                headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("text/event-stream;charset=utf-8"),
                );
                let framed = events
                    .map(|ev| encode_event(&ev))
                    .flat_map_sequential(|bytes| stream::once(async move { Ok(bytes) }));
                Ok(Box::pin(framed))
            }
        }
    }
}

/// A caller-declared `Content-Length` is always validated against what is
/// actually emitted (spec §4.10 "content length mismatch"), regardless of
/// how many chunks the stream turns out to yield.
fn frame_raw_declared(stream: BoxBody, declared: u64, headers: &mut HeaderMap) -> BoxBody {
    headers.insert(
        http::header::CONTENT_LENGTH,
        HeaderValue::from_str(&declared.to_string()).unwrap(),
    );
    Box::pin(ValidatedLength {
        inner: stream,
        declared: Some(declared),
        emitted: 0,
    })
}

/// Peeks up to two chunks to decide, per spec §4.10, whether the Raw body
/// is a single chunk (`Content-Length`) or several
/// (`Transfer-Encoding: chunked`), then re-assembles the stream from what
/// was peeked plus whatever remains.
async fn frame_raw_auto(mut stream: BoxBody, headers: &mut HeaderMap) -> Result<BoxBody, BodyError> {
    let Some(first) = stream.next().await.transpose()? else {
        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        return Ok(empty_body());
    };
    let Some(second) = stream.next().await.transpose()? else {
        headers.insert(
            http::header::CONTENT_LENGTH,
            HeaderValue::from_str(&first.len().to_string()).unwrap(),
        );
        return Ok(once_body(first));
    };
    headers.insert(
        http::header::TRANSFER_ENCODING,
        HeaderValue::from_static("chunked"),
    );
    let head: BoxBody = Box::pin(stream::iter([Ok(first), Ok(second)]));
    Ok(Box::pin(head.chain(stream)))
}

pin_project_lite::pin_project! {
    struct ValidatedLength {
        #[pin]
        inner: BoxBody,
        declared: Option<u64>,
        emitted: u64,
    }
}

impl Stream for ValidatedLength {
    type Item = Result<Bytes, AnyError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let mut this = self.project();
        match this.inner.as_mut().poll_next(cx) {
            std::task::Poll::Ready(Some(Ok(chunk))) => {
                *this.emitted += chunk.len() as u64;
                if let Some(declared) = this.declared {
                    if *this.emitted > *declared {
                        return std::task::Poll::Ready(Some(Err(AnyError::from(
                            BodyError::ContentLengthMismatch {
                                declared: *declared,
                                emitted: *this.emitted,
                            },
                        ))));
                    }
                }
                std::task::Poll::Ready(Some(Ok(chunk)))
            }
            std::task::Poll::Ready(None) => {
                if let Some(declared) = this.declared {
                    if *declared != *this.emitted {
                        return std::task::Poll::Ready(Some(Err(AnyError::from(
                            BodyError::ContentLengthMismatch {
                                declared: *declared,
                                emitted: *this.emitted,
                            },
                        ))));
                    }
                }
                std::task::Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Collects a whole `BoxBody` into a single buffer. Used by tests and by
/// the embeddable server's HTTP/1.1 path when it must know the final size
/// up front.
pub async fn collect(mut body: BoxBody) -> Result<Bytes, AnyError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    /// A resource test double that never touches the filesystem, so the
    /// `exists()==false` -> 404 and read-error -> 500 edge cases (spec §8
    /// scenario 6) can be exercised without `monoio`'s runtime.
    struct MockResource {
        exists: bool,
        len: Option<u64>,
        fails: bool,
    }

    struct MockStream {
        chunks: Vec<Bytes>,
        fail_after: bool,
    }

    impl linkrail_core::stream::ByteStream for MockStream {
        async fn next_chunk(&mut self) -> Option<Result<Bytes, AnyError>> {
            if let Some(chunk) = self.chunks.pop() {
                return Some(Ok(chunk));
            }
            if self.fail_after {
                self.fail_after = false;
                return Some(Err(AnyError::msg("disk read failed")));
            }
            None
        }
    }

    impl Resource for MockResource {
        type Stream = MockStream;

        fn exists(&self) -> Option<bool> {
            Some(self.exists)
        }

        fn len(&self) -> Option<u64> {
            self.len
        }

        fn content_type(&self) -> Option<mime::Mime> {
            Some(mime::TEXT_PLAIN)
        }

        async fn into_stream(self) -> Result<Self::Stream, AnyError> {
            Ok(MockStream {
                chunks: vec![Bytes::from_static(b"hi")],
                fail_after: self.fails,
            })
        }
    }

    #[test]
    fn missing_resource_surfaces_as_not_found() {
        let mut body = ResponseBody::new();
        let resource = MockResource {
            exists: false,
            len: None,
            fails: false,
        };
        block_on(body.resource(resource)).unwrap();
        let mut headers = HeaderMap::new();
        let err = block_on(body.finish(&mut headers)).unwrap_err();
        assert!(matches!(err, BodyError::ResourceNotFound));
    }

    #[test]
    fn resource_read_error_surfaces_on_the_stream() {
        let mut body = ResponseBody::new();
        let resource = MockResource {
            exists: true,
            len: Some(2),
            fails: true,
        };
        block_on(body.resource(resource)).unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(headers.get(http::header::CONTENT_LENGTH), None);
        let stream = block_on(body.finish(&mut headers)).unwrap();
        assert_eq!(headers.get(http::header::CONTENT_LENGTH).unwrap(), "2");
        assert_eq!(headers.get(http::header::CONTENT_TYPE).unwrap(), "text/plain");
        let result = block_on(collect(stream));
        assert!(result.is_err());
    }

    #[test]
    fn raw_bytes_sets_content_length() {
        let mut body = ResponseBody::new();
        body.raw_bytes(Bytes::from_static(b"hello")).unwrap();
        let mut headers = HeaderMap::new();
        let stream = block_on(body.finish(&mut headers)).unwrap();
        assert_eq!(headers.get(http::header::CONTENT_LENGTH).unwrap(), "5");
        assert_eq!(block_on(collect(stream)).unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn multi_chunk_raw_sets_chunked_encoding() {
        let mut body = ResponseBody::new();
        let chunks: BoxBody = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ]));
        body.raw_stream(chunks, None).unwrap();
        let mut headers = HeaderMap::new();
        let stream = block_on(body.finish(&mut headers)).unwrap();
        assert_eq!(
            headers.get(http::header::TRANSFER_ENCODING).unwrap(),
            "chunked"
        );
        assert_eq!(block_on(collect(stream)).unwrap(), Bytes::from_static(b"ab"));
    }

    #[test]
    fn second_selection_fails() {
        let mut body = ResponseBody::new();
        body.raw_bytes(Bytes::from_static(b"a")).unwrap();
        let err = body.raw_bytes(Bytes::from_static(b"b")).unwrap_err();
        assert!(matches!(err, BodyError::AlreadySelected));
    }

    #[test]
    fn declared_length_mismatch_surfaces_as_stream_error() {
        let mut body = ResponseBody::new();
        body.raw_bytes(Bytes::from_static(b"hello")).unwrap();
        // Tamper with the declaration to simulate a handler lying about length.
        let mut headers = HeaderMap::new();
        if let Some(Selection::Raw {
            content_length: cl, ..
        }) = body.selection.as_mut()
        {
            *cl = Some(4);
        }
        let stream = block_on(body.finish(&mut headers)).unwrap();
        let res = block_on(collect(stream));
        assert!(res.is_err());
    }

    #[test]
    fn sse_selection_sets_event_stream_content_type() {
        let mut body = ResponseBody::new();
        body.sse(stream::iter(vec![SseEvent::new("hi")])).unwrap();
        let mut headers = HeaderMap::new();
        let stream = block_on(body.finish(&mut headers)).unwrap();
        assert_eq!(
            headers.get(http::header::CONTENT_TYPE).unwrap(),
            "text/event-stream;charset=utf-8"
        );
        let bytes = block_on(collect(stream)).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"data:\r\ndata:hi\r\n\r\n"));
    }
}

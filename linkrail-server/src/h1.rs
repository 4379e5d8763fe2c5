//! A minimal HTTP/1.1 wire codec over `monoio`'s completion-style I/O.
//!
//! The router pipeline and its body assembly (spec §4.10) are the parts of
//! this system worth modeling in depth; the wire-level codec is external
//! collaborator surface (spec §1 "out of scope ... only their contracts
//! surface here"). This module implements just enough of RFC 7230 to drive
//! that contract end to end: request-line/header parsing, `Content-Length`
//! and `chunked` request bodies (buffered whole, not streamed), and
//! `Content-Length`/chunked response framing. It intentionally does not
//! attempt pipelining, trailers, or `Expect: 100-continue`.
use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Uri, Version};
use linkrail_router::body::{empty_body, once_body, BoxBody};
use monoio::io::{AsyncReadRent, AsyncReadRentExt, AsyncWriteRent, AsyncWriteRentExt};
use thiserror::Error;

const MAX_HEADER_BYTES: usize = 64 * 1024;
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum H1Error {
    #[error("peer closed the connection")]
    ConnectionClosed,
    #[error("request header block exceeds {0} bytes")]
    HeadersTooLarge(usize),
    #[error("malformed request line or headers")]
    Malformed,
    #[error("unsupported transfer framing")]
    UnsupportedFraming,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads one request off `io`. Returns `Ok(None)` only when the peer closed
/// the connection before sending a single byte (a clean end of a keepalive
/// connection, not an error).
///
/// `carry` holds bytes read but not yet consumed -- possibly the start of
/// the *next* request if a client pipelined ahead of our response -- and
/// must be threaded across calls on the same connection so that data isn't
/// dropped between requests.
pub async fn read_request<S>(
    io: &mut S,
    carry: &mut BytesMut,
) -> Result<Option<Request<BoxBody>>, H1Error>
where
    S: AsyncReadRent,
{
    let header_end = loop {
        if let Some(pos) = find_header_end(carry) {
            break pos;
        }
        if carry.len() > MAX_HEADER_BYTES {
            return Err(H1Error::HeadersTooLarge(MAX_HEADER_BYTES));
        }
        let scratch = vec![0u8; READ_CHUNK];
        let (res, scratch) = io.read(scratch).await;
        let n = res?;
        if n == 0 {
            if carry.is_empty() {
                return Ok(None);
            }
            return Err(H1Error::ConnectionClosed);
        }
        carry.extend_from_slice(&scratch[..n]);
    };

    let head = carry.split_to(header_end);
    let (method, uri, version, headers) = parse_head(&head)?;
    let body = read_body(io, &headers, carry).await?;

    let mut builder = Request::builder().method(method).uri(uri).version(version);
    *builder.headers_mut().expect("builder not yet finished") = headers;
    builder.body(body).map_err(|_| H1Error::Malformed)
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| p + 4)
        .or_else(|| {
            // tolerate bare-LF line endings from lenient clients.
            buf.windows(2).position(|w| w == b"\n\n").map(|p| p + 2)
        })
}

fn parse_head(head: &[u8]) -> Result<(Method, Uri, Version, HeaderMap), H1Error> {
    let text = std::str::from_utf8(head).map_err(|_| H1Error::Malformed)?;
    let mut lines = text.split("\r\n").flat_map(|l| l.split('\n'));
    let request_line = lines.next().ok_or(H1Error::Malformed)?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or(H1Error::Malformed)
        .and_then(|m| Method::from_bytes(m.as_bytes()).map_err(|_| H1Error::Malformed))?;
    let uri: Uri = parts
        .next()
        .ok_or(H1Error::Malformed)?
        .parse()
        .map_err(|_| H1Error::Malformed)?;
    let version = match parts.next() {
        Some("HTTP/1.1") => Version::HTTP_11,
        Some("HTTP/1.0") => Version::HTTP_10,
        _ => return Err(H1Error::Malformed),
    };

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(H1Error::Malformed)?;
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| H1Error::Malformed)?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| H1Error::Malformed)?;
        headers.append(name, value);
    }
    Ok((method, uri, version, headers))
}

async fn read_body<S>(
    io: &mut S,
    headers: &HeaderMap,
    carry: &mut BytesMut,
) -> Result<BoxBody, H1Error>
where
    S: AsyncReadRent,
{
    if let Some(len) = content_length(headers) {
        while carry.len() < len {
            let scratch = vec![0u8; READ_CHUNK.min(len - carry.len())];
            let (res, scratch) = io.read(scratch).await;
            let n = res?;
            if n == 0 {
                return Err(H1Error::ConnectionClosed);
            }
            carry.extend_from_slice(&scratch[..n]);
        }
        let body = carry.split_to(len);
        return Ok(once_body(body.freeze()));
    }

    if is_chunked(headers) {
        let mut decoded = BytesMut::new();
        loop {
            while find_header_end_single(carry).is_none() {
                let scratch = vec![0u8; READ_CHUNK];
                let (res, scratch) = io.read(scratch).await;
                let n = res?;
                if n == 0 {
                    return Err(H1Error::ConnectionClosed);
                }
                carry.extend_from_slice(&scratch[..n]);
            }
            let line_end = find_header_end_single(carry).expect("checked above");
            let size_line = carry.split_to(line_end);
            let size_text = std::str::from_utf8(&size_line[..size_line.len().saturating_sub(2)])
                .map_err(|_| H1Error::Malformed)?;
            let size_text = size_text.split(';').next().unwrap_or("").trim();
            let chunk_len =
                usize::from_str_radix(size_text, 16).map_err(|_| H1Error::Malformed)?;

            if chunk_len == 0 {
                while find_header_end_single(carry).is_none() {
                    let scratch = vec![0u8; READ_CHUNK];
                    let (res, scratch) = io.read(scratch).await;
                    let n = res?;
                    if n == 0 {
                        return Err(H1Error::ConnectionClosed);
                    }
                    carry.extend_from_slice(&scratch[..n]);
                }
                let trailer_end = find_header_end_single(carry).expect("checked above");
                carry.advance(trailer_end);
                break;
            }

            while carry.len() < chunk_len + 2 {
                let scratch = vec![0u8; READ_CHUNK];
                let (res, scratch) = io.read(scratch).await;
                let n = res?;
                if n == 0 {
                    return Err(H1Error::ConnectionClosed);
                }
                carry.extend_from_slice(&scratch[..n]);
            }
            decoded.extend_from_slice(&carry[..chunk_len]);
            carry.advance(chunk_len + 2);
        }
        return Ok(once_body(decoded.freeze()));
    }

    Ok(empty_body())
}

fn find_header_end_single(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n").map(|p| p + 2)
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
}

/// Writes `response`'s status line, headers, and body to `io`, following
/// whatever framing header (`Content-Length` or `Transfer-Encoding:
/// chunked`) is already present -- [`linkrail_router::body::ResponseBody::finish`]
/// is the only place that decides which one applies.
pub async fn write_response<S>(io: &mut S, response: Response<BoxBody>) -> Result<(), H1Error>
where
    S: AsyncWriteRent,
{
    let (parts, mut body) = response.into_parts();
    let chunked = is_chunked(&parts.headers);

    let mut head = BytesMut::new();
    head.extend_from_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            parts.status.as_u16(),
            parts.status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );
    for (name, value) in parts.headers.iter() {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"\r\n");
    let (res, _) = io.write_all(head.freeze().to_vec()).await;
    res?;

    use futures_util::StreamExt;
    while let Some(chunk) = body.next().await {
        let chunk: Bytes = chunk.map_err(|_| H1Error::Malformed)?;
        if chunk.is_empty() {
            continue;
        }
        if chunked {
            let mut framed = BytesMut::with_capacity(chunk.len() + 16);
            framed.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            framed.extend_from_slice(&chunk);
            framed.extend_from_slice(b"\r\n");
            let (res, _) = io.write_all(framed.freeze().to_vec()).await;
            res?;
        } else {
            let (res, _) = io.write_all(chunk.to_vec()).await;
            res?;
        }
    }
    if chunked {
        let (res, _) = io.write_all(b"0\r\n\r\n".to_vec()).await;
        res?;
    }
    io.flush().await?;
    Ok(())
}

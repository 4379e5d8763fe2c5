//! Minimal contract for the "resource" collaborator the response body's
//! `Resource` variant depends on (spec §1 lists resource abstraction as an
//! external collaborator; only its contract — existence, size, media type,
//! a byte stream — surfaces here).
//!
//! [`FileResource`] is the one concrete implementation this crate ships,
//! backed by `monoio`'s filesystem API to match the runtime the rest of the
//! stack uses. It exists so the `Resource` response body variant
//! (`linkrail-router::body`) has something real to be tested against, not
//! as a general file/URL/classpath resolution layer.
use std::{future::Future, path::PathBuf};

use bytes::Bytes;

use crate::{error::AnyError, stream::ByteStream};

/// The contract `linkrail-router`'s response body builder depends on for
/// its `Resource` variant (spec §4.10).
pub trait Resource {
    type Stream: ByteStream;

    /// Whether the resource is known to exist. `None` means "unknown,
    /// attempt to open and find out" -- some resource kinds (e.g. remote
    /// URLs) cannot answer this without a round trip.
    fn exists(&self) -> Option<bool>;

    /// Total size in bytes, if known ahead of opening.
    fn len(&self) -> Option<u64>;

    /// Best-guess media type for the `Content-Type` header, if the resource
    /// kind can determine one (e.g. from a file extension).
    fn content_type(&self) -> Option<mime::Mime>;

    fn into_stream(self) -> impl Future<Output = Result<Self::Stream, AnyError>>;
}

/// A resource backed by a path on the local filesystem, read with monoio's
/// async file API.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn guess_content_type(&self) -> Option<mime::Mime> {
        let ext = self.path.extension()?.to_str()?;
        Some(match ext {
            "html" | "htm" => mime::TEXT_HTML,
            "css" => mime::TEXT_CSS,
            "js" => mime::APPLICATION_JAVASCRIPT_UTF_8,
            "json" => mime::APPLICATION_JSON,
            "png" => mime::IMAGE_PNG,
            "jpg" | "jpeg" => mime::IMAGE_JPEG,
            "svg" => mime::IMAGE_SVG,
            "txt" => mime::TEXT_PLAIN,
            _ => mime::APPLICATION_OCTET_STREAM,
        })
    }
}

/// Chunk size used when streaming a file resource to the response body.
const READ_CHUNK: usize = 64 * 1024;

pub struct FileStream {
    file: monoio::fs::File,
    offset: u64,
    remaining: Option<u64>,
    done: bool,
}

impl ByteStream for FileStream {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, AnyError>> {
        if self.done {
            return None;
        }
        let want = match self.remaining {
            Some(0) => {
                self.done = true;
                return None;
            }
            Some(r) => READ_CHUNK.min(r as usize),
            None => READ_CHUNK,
        };
        let buf = Vec::with_capacity(want);
        let (res, mut buf) = self.file.read_at(buf, self.offset).await;
        match res {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                self.offset += n as u64;
                if let Some(r) = self.remaining.as_mut() {
                    *r -= n as u64;
                }
                buf.truncate(n);
                Some(Ok(Bytes::from(buf)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "file resource read failed");
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

impl Resource for FileResource {
    type Stream = FileStream;

    fn exists(&self) -> Option<bool> {
        Some(self.path.exists())
    }

    fn len(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    fn content_type(&self) -> Option<mime::Mime> {
        self.guess_content_type()
    }

    async fn into_stream(self) -> Result<Self::Stream, AnyError> {
        let len = self.len();
        let file = monoio::fs::File::open(&self.path).await?;
        Ok(FileStream {
            file,
            offset: 0,
            remaining: len,
            done: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_content_type_from_extension() {
        let res = FileResource::new("/tmp/favicon.ico");
        // unknown extension falls back to octet-stream
        assert_eq!(res.content_type(), Some(mime::APPLICATION_OCTET_STREAM));
        let res = FileResource::new("/tmp/index.html");
        assert_eq!(res.content_type(), Some(mime::TEXT_HTML));
    }

    #[test]
    fn exists_is_false_for_missing_path() {
        let res = FileResource::new("/does/not/exist/linkrail-test-fixture");
        assert_eq!(res.exists(), Some(false));
    }
}

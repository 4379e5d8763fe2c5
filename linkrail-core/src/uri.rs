//! Request path normalization (RFC 3986 `remove_dot_segments`, plus
//! percent-decoding of unreserved characters and empty-segment collapse).
//!
//! The router dispatches on the *normalized* path but leaves the original,
//! as-received path on the request untouched so handlers can still inspect
//! it (spec §6). Normalization is idempotent: `normalize(normalize(p)) ==
//! normalize(p)`, which the test at the bottom of this module exercises.
use crate::error::AnyError;

#[derive(thiserror::Error, Debug)]
#[error("malformed request path: {0}")]
pub struct BadUri(pub String);

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Percent-decode *only* octets that denote unreserved characters; any other
/// `%XX` escape (notably `%2F` for `/`) is left untouched so segment
/// boundaries introduced by the client cannot be forged by normalization.
fn decode_unreserved(path: &str) -> Result<String, BadUri> {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = (i + 2 < bytes.len())
                .then(|| (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])))
                .unwrap_or((None, None));
            let (Some(hi), Some(lo)) = hex else {
                return Err(BadUri(path.to_owned()));
            };
            let decoded = hi * 16 + lo;
            if is_unreserved(decoded) {
                out.push(decoded);
            } else {
                out.push(bytes[i]);
                out.push(bytes[i + 1].to_ascii_uppercase());
                out.push(bytes[i + 2].to_ascii_uppercase());
            }
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).map_err(|_| BadUri(path.to_owned()))
}

/// Percent-decode unreserved characters, then remove `.`/`..` segments and
/// collapse empty segments, the way a conforming RFC 3986 normalizer would.
///
/// Returns [`BadUri`] (surfaced by the router as `400 Bad Request`, per
/// spec §4.11/§7) if percent-decoding yields invalid UTF-8.
pub fn normalize(path: &str) -> Result<String, AnyError> {
    let decoded = decode_unreserved(path)?;

    let absolute = decoded.starts_with('/');
    let trailing_slash = decoded.len() > 1 && decoded.ends_with('/');

    let mut stack: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            seg => stack.push(seg),
        }
    }

    let mut out = String::with_capacity(decoded.len());
    if absolute {
        out.push('/');
    }
    out.push_str(&stack.join("/"));
    if trailing_slash && !out.ends_with('/') {
        out.push('/');
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(normalize("/a/./b/../c").unwrap(), "/a/c");
    }

    #[test]
    fn collapses_empty_segments() {
        assert_eq!(normalize("/a//b").unwrap(), "/a/b");
    }

    #[test]
    fn percent_decodes_unreserved_but_not_reserved() {
        assert_eq!(normalize("/%7Euser").unwrap(), "/~user");
        // %2F is reserved (encodes '/'); it must not introduce a new segment.
        assert_eq!(normalize("/a%2Fb").unwrap(), "/a%2Fb");
    }

    #[test]
    fn preserves_trailing_slash() {
        assert_eq!(normalize("/a/b/").unwrap(), "/a/b/");
        assert_eq!(normalize("/a/b").unwrap(), "/a/b");
    }

    #[test]
    fn idempotent() {
        for p in ["/a/./b/../c/", "/a//b", "/", "/a%2Fb", "/%7Euser"] {
            let once = normalize(p).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_malformed_percent_escape() {
        assert!(normalize("/a%2").is_err());
        assert!(normalize("/a%zz").is_err());
    }
}

//! Server-Sent-Events byte framing (spec §4.10, §6 "SSE framing").
//!
//! One [`SseEvent`] encodes to exactly the byte layout spec §4.10
//! prescribes: `id:`/`event:` lines if set, a `:`-prefixed comment line,
//! then the `data:` field, each terminated the way the spec's worked
//! example (§8 scenario 4) shows -- every line of a multi-line field is
//! reintroduced with its own field-name prefix after a line break, and the
//! whole event ends with a blank line (`\r\n\r\n`).
use bytes::Bytes;

/// One Server-Sent Event. `data` is required; the rest are optional.
#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub comment: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Splits on any of CRLF, LF, or CR, without losing a trailing empty
/// segment -- the same semantics `String::lines` has, except it also
/// treats a lone `\r` as a line break.
fn split_lines(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                out.push(&s[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            b'\n' => {
                out.push(&s[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push(&s[start..]);
    out
}

/// Writes `prefix` once, then `\r\n` + `prefix` + line for every line of
/// `value` -- this is what reproduces spec §8 scenario 4's
/// `data:\r\ndata:a\r\ndata:b` for a two-line payload.
fn write_field(out: &mut String, prefix: &str, value: &str) {
    out.push_str(prefix);
    for line in split_lines(value) {
        out.push_str("\r\n");
        out.push_str(prefix);
        out.push_str(line);
    }
}

/// Encode one event to the exact wire bytes spec §4.10 describes. UTF-8
/// throughout.
pub fn encode_event(ev: &SseEvent) -> Bytes {
    let mut out = String::new();
    if let Some(id) = &ev.id {
        out.push_str("id:");
        out.push_str(id);
        out.push('\n');
    }
    if let Some(name) = &ev.event {
        out.push_str("event:");
        out.push_str(name);
        out.push('\n');
    }
    if let Some(comment) = &ev.comment {
        write_field(&mut out, ":", comment);
        out.push('\n');
    }
    write_field(&mut out, "data:", &ev.data);
    out.push_str("\r\n\r\n");
    Bytes::from(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_spec_worked_example() {
        let ev = SseEvent::new("a\nb").id("42").event("tick");
        let encoded = encode_event(&ev);
        assert_eq!(
            encoded,
            Bytes::from_static(b"id:42\nevent:tick\ndata:\r\ndata:a\r\ndata:b\r\n\r\n")
        );
    }

    #[test]
    fn single_line_data_only() {
        let ev = SseEvent::new("hello");
        let encoded = encode_event(&ev);
        assert_eq!(encoded, Bytes::from_static(b"data:\r\ndata:hello\r\n\r\n"));
    }

    #[test]
    fn comment_rewrites_internal_newlines() {
        let ev = SseEvent::new("x").comment("a\r\nb");
        let encoded = encode_event(&ev);
        assert_eq!(
            encoded,
            Bytes::from_static(b":\r\n:a\r\n:b\ndata:\r\ndata:x\r\n\r\n")
        );
    }
}

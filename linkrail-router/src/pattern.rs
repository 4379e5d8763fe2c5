//! Path template compiler and the specificity order over compiled patterns
//! (spec §4.3, §6 "Path templates").
//!
//! `/static/{name}/{name:regex}/{name:.*}` compiles segment by segment:
//! `{name}` to `([^/]+)`, `{name:regex}` to `(regex)`, `{name:.*}` to
//! `(.*)`. Unnamed captures `{}` are allowed -- they match but bind no
//! parameter. The literal portion of a segment is regex-quoted.
use std::cmp::Ordering;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unbalanced '{{' in path template segment {0:?}")]
    UnbalancedBrace(String),
    #[error("invalid capture regex {0:?}: {1}")]
    InvalidRegex(String, regex::Error),
    #[error("failed to compile path template {0:?}: {1}")]
    Compile(String, regex::Error),
}

/// Rank of a segment used by the specificity comparator (spec §4.3): a
/// literal segment beats any capture, a constrained capture beats an
/// unconstrained one, which beats a greedy catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SegmentRank {
    CatchAll = 0,
    Unconstrained = 1,
    Constrained = 2,
    Literal = 3,
}

#[derive(Debug, Clone)]
enum Piece {
    Literal(String),
    /// `name` is `None` for an unnamed capture `{}`; it still produces a
    /// regex capturing group but binds no path parameter.
    Capture { name: Option<String>, regex: String },
}

#[derive(Debug, Clone)]
struct Segment {
    pieces: Vec<Piece>,
    rank: SegmentRank,
    /// Total length of the segment's literal text, e.g. 1 for the `_` in
    /// `{p1}_{p2}`. Breaks ties between same-`rank` segments: a capture
    /// segment with literal text interleaved is more constrained than a
    /// bare capture, generalizing spec §4.3 rule 1 to partial segments.
    literal_len: usize,
}

/// A compiled path template (spec §3 `PathPattern`).
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub original: String,
    regex: Regex,
    /// One slot per regex capturing group; `None` for an unnamed capture's
    /// slot (spec §3's "literal segment's slot is a null sentinel" --
    /// unnamed captures are the only slots that can be null here, since
    /// literal segments contribute no capturing group at all).
    param_names: Vec<Option<String>>,
    segment_ranks: Vec<(SegmentRank, usize)>,
}

fn parse_segment(segment: &str) -> Result<Segment, PatternError> {
    let mut pieces = Vec::new();
    let mut worst_capture: Option<SegmentRank> = None;
    let mut literal_len = 0usize;
    let bytes = segment.as_bytes();
    let mut i = 0;
    let mut literal_start = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if literal_start < i {
                let lit = &segment[literal_start..i];
                literal_len += lit.len();
                pieces.push(Piece::Literal(lit.to_string()));
            }
            let end = segment[i..]
                .find('}')
                .map(|p| p + i)
                .ok_or_else(|| PatternError::UnbalancedBrace(segment.to_string()))?;
            let inner = &segment[i + 1..end];
            let (name, regex_src) = match inner.split_once(':') {
                Some((n, r)) => (n.trim(), r.trim()),
                None => (inner.trim(), "[^/]+"),
            };
            let rank = if regex_src == ".*" {
                SegmentRank::CatchAll
            } else if regex_src == "[^/]+" {
                SegmentRank::Unconstrained
            } else {
                SegmentRank::Constrained
            };
            worst_capture = Some(worst_capture.map_or(rank, |w| w.min(rank)));
            regex::Regex::new(regex_src)
                .map_err(|e| PatternError::InvalidRegex(regex_src.to_string(), e))?;
            let name = (!name.is_empty()).then(|| name.to_string());
            pieces.push(Piece::Capture {
                name,
                regex: regex_src.to_string(),
            });
            i = end + 1;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    if literal_start < segment.len() {
        let lit = &segment[literal_start..];
        literal_len += lit.len();
        pieces.push(Piece::Literal(lit.to_string()));
    }
    let rank = worst_capture.unwrap_or(SegmentRank::Literal);
    Ok(Segment { pieces, rank, literal_len })
}

impl PathPattern {
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let mut param_names = Vec::new();
        let mut segment_ranks = Vec::new();
        let mut regex_src = String::from("^");
        let absolute = template.starts_with('/');

        let segments: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
        if absolute {
            regex_src.push('/');
        }
        for (idx, raw_segment) in segments.iter().enumerate() {
            if idx > 0 {
                regex_src.push('/');
            }
            let segment = parse_segment(raw_segment)?;
            segment_ranks.push((segment.rank, segment.literal_len));
            for piece in &segment.pieces {
                match piece {
                    Piece::Literal(lit) => regex_src.push_str(&regex::escape(lit)),
                    Piece::Capture { name, regex } => {
                        regex_src.push('(');
                        regex_src.push_str(regex);
                        regex_src.push(')');
                        param_names.push(name.clone());
                    }
                }
            }
        }
        regex_src.push('$');
        let regex = Regex::new(&regex_src)
            .map_err(|e| PatternError::Compile(template.to_string(), e))?;

        Ok(PathPattern {
            original: template.to_string(),
            regex,
            param_names,
            segment_ranks,
        })
    }

    /// Attempt to match `path` (already normalized), returning the bound
    /// path parameters in declaration order on success.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        let mut bindings = Vec::new();
        for (idx, name) in self.param_names.iter().enumerate() {
            if let Some(name) = name {
                if let Some(m) = caps.get(idx + 1) {
                    bindings.push((name.clone(), m.as_str().to_string()));
                }
            }
        }
        Some(bindings)
    }

    fn segment_count(&self) -> usize {
        self.segment_ranks.len()
    }
}

/// Specificity order (spec §4.3): a literal segment outranks any capture at
/// the same position; among captures, constrained outranks unconstrained
/// outranks catch-all; more total segments outranks fewer. Returns
/// `Greater` when `self` is *more* specific than `other`.
pub fn specificity_cmp(a: &PathPattern, b: &PathPattern) -> Ordering {
    for ((ra, la), (rb, lb)) in a.segment_ranks.iter().zip(b.segment_ranks.iter()) {
        match ra.cmp(rb).then_with(|| la.cmp(lb)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.segment_count().cmp(&b.segment_count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_named_capture() {
        let p = PathPattern::compile("/static/{name}").unwrap();
        let bindings = p.matches("/static/foo").unwrap();
        assert_eq!(bindings, vec![("name".to_string(), "foo".to_string())]);
    }

    #[test]
    fn compiles_constrained_capture() {
        let p = PathPattern::compile("/items/{id:[0-9]+}").unwrap();
        assert!(p.matches("/items/abc").is_none());
        let bindings = p.matches("/items/42").unwrap();
        assert_eq!(bindings, vec![("id".to_string(), "42".to_string())]);
    }

    #[test]
    fn compiles_catch_all() {
        let p = PathPattern::compile("/files/{rest:.*}").unwrap();
        let bindings = p.matches("/files/a/b/c").unwrap();
        assert_eq!(bindings, vec![("rest".to_string(), "a/b/c".to_string())]);
    }

    #[test]
    fn unnamed_capture_binds_nothing() {
        let p = PathPattern::compile("/v/{}/thing").unwrap();
        let bindings = p.matches("/v/1/thing").unwrap();
        assert!(bindings.is_empty());
    }

    #[test]
    fn mixed_literal_and_captures_in_one_segment() {
        let p = PathPattern::compile("/a/{p1}_{p2}").unwrap();
        let bindings = p.matches("/a/x_y").unwrap();
        assert_eq!(
            bindings,
            vec![
                ("p1".to_string(), "x".to_string()),
                ("p2".to_string(), "y".to_string())
            ]
        );
    }

    #[test]
    fn specificity_prefers_more_segments_and_constrained_captures() {
        let mixed = PathPattern::compile("/a/{p1}_{p2}").unwrap();
        let single = PathPattern::compile("/a/{p}").unwrap();
        assert_eq!(specificity_cmp(&mixed, &single), Ordering::Greater);

        let constrained = PathPattern::compile("/items/{id:[0-9]+}").unwrap();
        let unconstrained = PathPattern::compile("/items/{id}").unwrap();
        assert_eq!(
            specificity_cmp(&constrained, &unconstrained),
            Ordering::Greater
        );

        let catch_all = PathPattern::compile("/items/{id:.*}").unwrap();
        assert_eq!(
            specificity_cmp(&unconstrained, &catch_all),
            Ordering::Greater
        );
    }

    #[test]
    fn literal_segment_outranks_capture_at_same_position() {
        let literal = PathPattern::compile("/a/b").unwrap();
        let capture = PathPattern::compile("/a/{p}").unwrap();
        assert_eq!(specificity_cmp(&literal, &capture), Ordering::Greater);
    }
}

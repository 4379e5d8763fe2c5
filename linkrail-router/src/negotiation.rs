//! Parsing and ordering for the three negotiated header families the
//! router dispatches on: `Content-Type` (exact match against a route's
//! `consume`), and `Accept`/`Accept-Language` (quality- and
//! specificity-ordered negotiation against a route's `produce`/`language`).
//!
//! Grounded on the `mime`-crate representation of media types (as the
//! retrieval pack's web-framework samples use it) plus a small RFC 7231 `q`
//! parser the `mime` crate itself does not provide.
use std::{cmp::Ordering, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed header value: {0}")]
pub struct NegotiationParseError(pub String);

/// A parsed `type/subtype;params` with an optional RFC 7231 `q` quality
/// factor. Used both for a request's `Accept`/`Content-Type` ranges and for
/// a route's own `consume`/`produce` criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    pub ty: String,
    pub subtype: String,
    /// Parameters other than `q`, in the order they appeared. Compared
    /// order-insensitively by the caller (see [`MediaRange::covers`]).
    pub params: Vec<(String, String)>,
    /// `q` in thousandths, so the type stays `Eq`/`Ord`-able (`1000` == `1.0`).
    pub q_millis: u16,
}

/// `ContentType` is a `MediaRange` with no wildcards and `q` fixed at 1.0 --
/// the shape a route's own `produce`/`consume` criterion takes (spec's
/// `MediaRange`/`ContentType` distinction in §3).
pub type ContentType = MediaRange;

impl MediaRange {
    pub fn is_wildcard_type(&self) -> bool {
        self.ty == "*"
    }

    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == "*"
    }

    pub fn is_any(&self) -> bool {
        self.is_wildcard_type() && self.is_wildcard_subtype()
    }

    pub fn q(&self) -> f32 {
        self.q_millis as f32 / 1000.0
    }

    /// Specificity score used to order children under a Consumes/Produces
    /// link (spec §4.5/§4.6): concrete type beats wildcard type, concrete
    /// subtype beats wildcard subtype, more parameters beat fewer.
    pub fn specificity(&self) -> (u8, u8, usize) {
        let ty_score = u8::from(!self.is_wildcard_type());
        let subtype_score = u8::from(!self.is_wildcard_subtype());
        (ty_score, subtype_score, self.params.len())
    }

    /// Does `self` (typically a route's produced/consumed type) satisfy
    /// `range` (typically a parsed `Accept`/`Content-Type` range)? Wildcards
    /// in `range` are honored on either segment; every parameter present on
    /// `range` must be present with an equal value on `self`.
    pub fn covers(&self, range: &MediaRange) -> bool {
        if !range.is_wildcard_type() && range.ty != self.ty {
            return false;
        }
        if !range.is_wildcard_subtype() && range.subtype != self.subtype {
            return false;
        }
        range
            .params
            .iter()
            .all(|(k, v)| self.params.iter().any(|(k2, v2)| k == k2 && v == v2))
    }

    fn parse_one(raw: &str) -> Result<Self, NegotiationParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(NegotiationParseError(raw.to_string()));
        }
        let mut parts = raw.split(';');
        let type_part = parts.next().unwrap().trim();
        let (ty, subtype) = type_part
            .split_once('/')
            .ok_or_else(|| NegotiationParseError(raw.to_string()))?;
        if ty.is_empty() || subtype.is_empty() {
            return Err(NegotiationParseError(raw.to_string()));
        }

        let mut params = Vec::new();
        let mut q_millis = 1000u16;
        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (k, v) = param
                .split_once('=')
                .ok_or_else(|| NegotiationParseError(raw.to_string()))?;
            let (k, v) = (k.trim(), v.trim().trim_matches('"'));
            if k.eq_ignore_ascii_case("q") {
                q_millis = parse_q(v)?;
            } else {
                params.push((k.to_ascii_lowercase(), v.to_string()));
            }
        }

        Ok(MediaRange {
            ty: ty.trim().to_ascii_lowercase(),
            subtype: subtype.trim().to_ascii_lowercase(),
            params,
            q_millis,
        })
    }

    /// Parse a single `Accept` header value (possibly several comma-joined
    /// ranges) into its ranges, unordered.
    pub fn parse_accept(header: &str) -> Result<Vec<Self>, NegotiationParseError> {
        header
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse_one)
            .collect()
    }
}

impl FromStr for MediaRange {
    type Err = NegotiationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_one(s)
    }
}

fn parse_q(v: &str) -> Result<u16, NegotiationParseError> {
    let q: f32 = v
        .parse()
        .map_err(|_| NegotiationParseError(v.to_string()))?;
    if !(0.0..=1.0).contains(&q) {
        return Err(NegotiationParseError(v.to_string()));
    }
    Ok((q * 1000.0).round() as u16)
}

/// Merge every `Accept` header present on a request into one preference
/// order: descending `q`, then descending specificity, stable on ties
/// (spec §4.6 "merges all `Accept` headers ... ordered by `q` then
/// specificity"). An absent/empty `Accept` falls back to `*/*`.
pub fn merge_accept<'a>(values: impl Iterator<Item = &'a str>) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = values
        .flat_map(|v| MediaRange::parse_accept(v).unwrap_or_default())
        .collect();
    if ranges.is_empty() {
        ranges.push(MediaRange {
            ty: "*".into(),
            subtype: "*".into(),
            params: Vec::new(),
            q_millis: 1000,
        });
    }
    ranges.sort_by(|a, b| {
        b.q_millis
            .cmp(&a.q_millis)
            .then_with(|| b.specificity().cmp(&a.specificity()))
    });
    ranges
}

/// A parsed `Accept-Language` range, e.g. `en-US;q=0.8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRange {
    pub primary: String,
    pub sub: Option<String>,
    pub q_millis: u16,
}

impl LanguageRange {
    pub fn q(&self) -> f32 {
        self.q_millis as f32 / 1000.0
    }

    pub fn is_any(&self) -> bool {
        self.primary == "*"
    }

    /// Does `self` (a route's `language` criterion) satisfy `range` (a
    /// parsed `Accept-Language` entry)? `*` matches anything; an
    /// unspecified sub-tag on the range matches any sub-tag on self.
    pub fn covers(&self, range: &LanguageRange) -> bool {
        if range.is_any() {
            return true;
        }
        if !range.primary.eq_ignore_ascii_case(&self.primary) {
            return false;
        }
        match &range.sub {
            Some(sub) => self.sub.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(sub)),
            None => true,
        }
    }

    pub fn specificity(&self) -> u8 {
        u8::from(self.sub.is_some())
    }

    fn parse_one(raw: &str) -> Result<Self, NegotiationParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(NegotiationParseError(raw.to_string()));
        }
        let mut parts = raw.split(';');
        let tag = parts.next().unwrap().trim();
        let (primary, sub) = match tag.split_once('-') {
            Some((p, s)) => (p.to_ascii_lowercase(), Some(s.to_ascii_lowercase())),
            None => (tag.to_ascii_lowercase(), None),
        };
        let mut q_millis = 1000u16;
        for param in parts {
            let param = param.trim();
            if let Some((k, v)) = param.split_once('=') {
                if k.trim().eq_ignore_ascii_case("q") {
                    q_millis = parse_q(v.trim())?;
                }
            }
        }
        Ok(LanguageRange {
            primary,
            sub,
            q_millis,
        })
    }

    pub fn parse_accept_language(header: &str) -> Result<Vec<Self>, NegotiationParseError> {
        header
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse_one)
            .collect()
    }
}

/// Merge all `Accept-Language` header values into preference order.
/// Absence is treated as `*` (spec §4.7).
pub fn merge_accept_language<'a>(values: impl Iterator<Item = &'a str>) -> Vec<LanguageRange> {
    let mut ranges: Vec<LanguageRange> = values
        .flat_map(|v| LanguageRange::parse_accept_language(v).unwrap_or_default())
        .collect();
    if ranges.is_empty() {
        ranges.push(LanguageRange {
            primary: "*".into(),
            sub: None,
            q_millis: 1000,
        });
    }
    ranges.sort_by(|a, b| {
        b.q_millis
            .cmp(&a.q_millis)
            .then_with(|| b.specificity().cmp(&a.specificity()))
    });
    ranges
}

/// Total order used to sort a link's children by descending specificity
/// (spec §4.5/§4.6: "sorted by descending specificity"). Earlier-registered
/// entries win ties, so the sort must be stable; `Vec::sort_by` is.
pub fn by_specificity_desc(a: &MediaRange, b: &MediaRange) -> Ordering {
    b.specificity().cmp(&a.specificity())
}

/// Same ordering, keyed on the first element of a `(MediaRange, _)` pair --
/// the shape a link's child table actually sorts (spec §3 "ordered map of
/// children is sorted by decreasing specificity").
pub fn by_specificity_desc_key<T>(a: &(MediaRange, T), b: &(MediaRange, T)) -> Ordering {
    by_specificity_desc(&a.0, &b.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_media_range_with_params_and_q() {
        let r = MediaRange::from_str("application/json;version=2;q=0.8").unwrap();
        assert_eq!(r.ty, "application");
        assert_eq!(r.subtype, "json");
        assert_eq!(r.params, vec![("version".to_string(), "2".to_string())]);
        assert_eq!(r.q_millis, 800);
    }

    #[test]
    fn merge_accept_orders_by_q_then_specificity() {
        let ranges = merge_accept(["text/*;q=0.5, application/json, text/html;q=0.5"].into_iter());
        assert_eq!(ranges[0].subtype, "json");
        // text/html is more specific than text/* at the same q, and must
        // precede it despite arriving later in the header.
        assert_eq!(ranges[1].subtype, "html");
        assert_eq!(ranges[2].subtype, "*");
    }

    #[test]
    fn absent_accept_falls_back_to_any() {
        let ranges = merge_accept(std::iter::empty());
        assert!(ranges[0].is_any());
    }

    #[test]
    fn covers_honors_wildcards_and_params() {
        let produced = MediaRange::from_str("application/json;version=2").unwrap();
        let range = MediaRange::from_str("application/*").unwrap();
        assert!(produced.covers(&range));

        let range_with_param = MediaRange::from_str("application/json;version=1").unwrap();
        assert!(!produced.covers(&range_with_param));
    }

    #[test]
    fn language_range_covers() {
        let en_us = LanguageRange {
            primary: "en".into(),
            sub: Some("us".into()),
            q_millis: 1000,
        };
        let star = LanguageRange {
            primary: "*".into(),
            sub: None,
            q_millis: 1000,
        };
        assert!(en_us.covers(&star));
        let en = LanguageRange {
            primary: "en".into(),
            sub: None,
            q_millis: 1000,
        };
        assert!(en_us.covers(&en));
        let fr = LanguageRange {
            primary: "fr".into(),
            sub: None,
            q_millis: 1000,
        };
        assert!(!en_us.covers(&fr));
    }
}

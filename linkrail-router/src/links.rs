//! The fixed six-link dispatch pipeline (spec §2/§4): `Path -> PathPattern ->
//! Method -> Consumes -> Produces -> Language -> Handler`. Each link owns its
//! own child table behind an [`ArcSwap`], giving the read-copy-update
//! discipline spec §5 "Shared mutation" requires: a mutating registration
//! call clones the current child table, inserts into the clone, and swaps it
//! in -- any dispatch already holding the old `Arc` sees a consistent
//! snapshot for the rest of its run.
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use arc_swap::{ArcSwap, ArcSwapOption};
use http::{Method, Request};
use linkrail_core::http::ResponseWithContinue;

use crate::{
    body::BoxBody,
    error::RouterError,
    negotiation::{ContentType, LanguageRange, MediaRange},
    pattern::{specificity_cmp, PathPattern},
};

/// The future a registered handler returns. Not `Send` -- the pipeline is
/// built for a thread-per-core, single-threaded-per-connection transport
/// (spec §5 "event-driven, cooperative single-threaded per connection"),
/// mirroring `monoio`'s own non-`Send` task model.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ResponseWithContinue<BoxBody>, RouterError>>>>;

/// A registered endpoint. `CX` is the per-request context (peer address,
/// forked middleware state, ...) the transport supplies.
pub type HandlerFn<CX> = Arc<dyn Fn(Request<BoxBody>, CX) -> HandlerFuture>;

/// Outcome of one dispatch attempt inside the Produces/Language links'
/// speculative per-candidate iteration (spec §4.6/§4.7 "iteration continues
/// with the next-best candidate"). A `Recoverable` failure hands back
/// whatever is left of the request body: `Some` when the candidate never
/// touched it (a `RouteNotFound`/`DisabledRoute` raised before the handler
/// ran), so the next-best candidate gets the real body instead of an empty
/// shell (spec §3, §5 suspension point (a)); `None` once the handler itself
/// ran and may have consumed it, after which later candidates in this
/// dispatch fall back to an empty shell.
enum Attempt {
    Ok(ResponseWithContinue<BoxBody>),
    Recoverable(RouterError, Option<BoxBody>),
    Terminal(RouterError),
}

/// Path parameters bound by the winning [`PathPattern`] (spec §4.3), stashed
/// as a request extension so a handler can read `request.extensions()`.
#[derive(Debug, Clone, Default)]
pub struct PathParams(pub Vec<(String, String)>);

/// The request's path exactly as received, before normalization (spec §6:
/// "The original, unnormalized path is preserved on the request for handler
/// inspection"). Stashed once, at dispatch, before the Path Routing Link
/// ever sees the (now-normalized) `Uri`.
#[derive(Debug, Clone)]
pub struct OriginalPath(pub String);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// One dimension's worth of registration criteria, threaded through the
/// pipeline by [`crate::route::RouteManager`]. `path` is mutually exclusive
/// with a `{}`-bearing template (spec §3 invariant).
#[derive(Debug, Clone)]
pub struct RouteSpec<CX> {
    pub path: String,
    pub trailing_slash_tolerant: bool,
    pub method: Option<Method>,
    pub consume: Option<MediaRange>,
    pub produce: Option<ContentType>,
    pub language: Option<LanguageRange>,
    pub handler: HandlerFn<CX>,
}

/// A criterion tuple with no handler attached -- what the extractor yields
/// for introspection (spec §4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub path: String,
    pub trailing_slash_tolerant: bool,
    pub method: Option<Method>,
    pub consume: Option<MediaRange>,
    pub produce: Option<ContentType>,
    pub language: Option<LanguageRange>,
    pub disabled: bool,
}

fn path_is_template(path: &str) -> bool {
    path.contains('{')
}

fn trailing_slash_variants(path: &str, tolerant: bool) -> Vec<String> {
    if !tolerant || !path.ends_with('/') || path == "/" {
        return vec![path.to_string()];
    }
    let stripped = path.trim_end_matches('/').to_string();
    vec![path.to_string(), stripped]
}

// ---------------------------------------------------------------------
// 4.2 Path Routing Link
// ---------------------------------------------------------------------

pub struct PathLink<CX> {
    literals: ArcSwap<HashMap<String, Arc<MethodLink<CX>>>>,
    pub patterns: Arc<PathPatternLink<CX>>,
}

impl<CX: Clone + 'static> PathLink<CX> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            literals: ArcSwap::from_pointee(HashMap::new()),
            patterns: PathPatternLink::new(),
        })
    }

    /// Get-or-create the `Method` sub-pipeline for `route.path`, inserting
    /// both trailing-slash variants when the route opted in.
    fn child_for(&self, path: &str, tolerant: bool) -> Arc<MethodLink<CX>> {
        let keys = trailing_slash_variants(path, tolerant);
        if let Some(existing) = self.literals.load().get(&keys[0]) {
            return existing.clone();
        }
        let fresh = MethodLink::new();
        self.literals.rcu(|cur| {
            let mut next = HashMap::clone(cur);
            for key in &keys {
                next.entry(key.clone()).or_insert_with(|| fresh.clone());
            }
            next
        });
        self.literals.load().get(&keys[0]).unwrap().clone()
    }

    pub fn set_route(&self, spec: RouteSpec<CX>) {
        if path_is_template(&spec.path) {
            self.patterns.set_route(spec);
            return;
        }
        let method_link = self.child_for(&spec.path, spec.trailing_slash_tolerant);
        method_link.set_route(spec);
    }

    pub async fn handle(&self, mut req: Request<BoxBody>, ctx: CX) -> Result<ResponseWithContinue<BoxBody>, RouterError> {
        let path = req.uri().path().to_string();
        if let Some(link) = self.literals.load().get(&path) {
            return link.handle(req, ctx).await;
        }
        if let Some((link, params)) = self.patterns.lookup(&path) {
            req.extensions_mut().insert(PathParams(params));
            return link.handle(req, ctx).await;
        }
        Err(RouterError::RouteNotFound)
    }

    pub fn extract(&self) -> Vec<RouteDescriptor> {
        let mut out = Vec::new();
        for (_, link) in self.literals.load().iter() {
            out.extend(link.extract(None));
        }
        out.extend(self.patterns.extract());
        out
    }

    /// Walk (creating missing nodes as needed) down to the Handler Link for
    /// a given criterion tuple, without attaching a handler -- the shared
    /// basis for `enable`/`disable`/`remove`, which target an
    /// already-registered route by its criteria rather than its handler.
    pub(crate) fn resolve_handler(
        &self,
        path: &str,
        tolerant: bool,
        method: &Option<Method>,
        consume: &Option<MediaRange>,
        produce: &Option<ContentType>,
        language: &Option<LanguageRange>,
    ) -> Arc<HandlerLink<CX>> {
        let method_link = if path_is_template(path) {
            self.patterns.child_for(path)
        } else {
            self.child_for(path, tolerant)
        };
        method_link
            .child_for(method)
            .child_for(consume)
            .child_for(produce)
            .child_for(language)
    }
}

// ---------------------------------------------------------------------
// 4.3 Path-Pattern Routing Link
// ---------------------------------------------------------------------

pub struct PathPatternLink<CX> {
    children: ArcSwap<Vec<(PathPattern, Arc<MethodLink<CX>>)>>,
}

impl<CX: Clone + 'static> PathPatternLink<CX> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            children: ArcSwap::from_pointee(Vec::new()),
        })
    }

    fn child_for(&self, template: &str) -> Arc<MethodLink<CX>> {
        let compiled = PathPattern::compile(template).expect("invalid path template");
        if let Some((_, existing)) = self
            .children
            .load()
            .iter()
            .find(|(p, _)| p.original == compiled.original)
        {
            return existing.clone();
        }
        let fresh = MethodLink::new();
        self.children.rcu(|cur| {
            let mut next = Vec::clone(cur);
            if !next.iter().any(|(p, _)| p.original == compiled.original) {
                next.push((compiled.clone(), fresh.clone()));
            }
            next
        });
        self.children
            .load()
            .iter()
            .find(|(p, _)| p.original == compiled.original)
            .unwrap()
            .1
            .clone()
    }

    fn set_route(&self, spec: RouteSpec<CX>) {
        let path = spec.path.clone();
        self.child_for(&path).set_route(spec);
    }

    /// Match `path` against every registered pattern, returning the
    /// strict winner by the §4.3 specificity comparator (earlier-registered
    /// entries win ties, since `sort_by` is stable and registration order
    /// is preserved in `children`).
    fn lookup(&self, path: &str) -> Option<(Arc<MethodLink<CX>>, Vec<(String, String)>)> {
        let snapshot = self.children.load();
        let mut best: Option<(&PathPattern, &Arc<MethodLink<CX>>, Vec<(String, String)>)> = None;
        for (pattern, link) in snapshot.iter() {
            if let Some(bindings) = pattern.matches(path) {
                best = match best {
                    None => Some((pattern, link, bindings)),
                    Some((bp, bl, bb)) if specificity_cmp(pattern, bp) == std::cmp::Ordering::Greater => {
                        Some((pattern, link, bindings))
                    }
                    other => other,
                };
            }
        }
        best.map(|(_, link, bindings)| (link.clone(), bindings))
    }

    fn extract(&self) -> Vec<RouteDescriptor> {
        self.children
            .load()
            .iter()
            .flat_map(|(pattern, link)| link.extract(Some(pattern.original.clone())))
            .collect()
    }
}

// ---------------------------------------------------------------------
// 4.4 Method Routing Link
// ---------------------------------------------------------------------

pub struct MethodLink<CX> {
    children: ArcSwap<HashMap<Method, Arc<ConsumesLink<CX>>>>,
    default: ArcSwapOption<ConsumesLink<CX>>,
}

impl<CX: Clone + 'static> MethodLink<CX> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            children: ArcSwap::from_pointee(HashMap::new()),
            default: ArcSwapOption::from(None),
        })
    }

    fn child_for(&self, method: &Option<Method>) -> Arc<ConsumesLink<CX>> {
        match method {
            None => {
                if let Some(existing) = self.default.load().as_ref() {
                    return existing.clone();
                }
                let fresh = ConsumesLink::new();
                self.default.store(Some(fresh.clone()));
                fresh
            }
            Some(m) => {
                if let Some(existing) = self.children.load().get(m) {
                    return existing.clone();
                }
                let fresh = ConsumesLink::new();
                self.children.rcu(|cur| {
                    let mut next = HashMap::clone(cur);
                    next.entry(m.clone()).or_insert_with(|| fresh.clone());
                    next
                });
                self.children.load().get(m).unwrap().clone()
            }
        }
    }

    fn set_route(&self, spec: RouteSpec<CX>) {
        let method = spec.method.clone();
        self.child_for(&method).set_route(spec);
    }

    async fn handle(&self, req: Request<BoxBody>, ctx: CX) -> Result<ResponseWithContinue<BoxBody>, RouterError> {
        let snapshot = self.children.load_full();
        if let Some(link) = snapshot.get(req.method()) {
            return link.handle(req, ctx).await;
        }
        if let Some(default) = self.default.load().as_ref() {
            return default.handle(req, ctx).await;
        }
        let mut allowed: Vec<String> = snapshot.keys().map(|m| m.to_string()).collect();
        allowed.sort();
        Err(RouterError::MethodNotAllowed { allowed })
    }

    fn extract(&self, path: Option<String>) -> Vec<RouteDescriptor> {
        let mut out = Vec::new();
        for (method, link) in self.children.load().iter() {
            out.extend(link.extract(path.clone(), Some(method.clone())));
        }
        if let Some(default) = self.default.load().as_ref() {
            out.extend(default.extract(path.clone(), None));
        }
        out
    }
}

// ---------------------------------------------------------------------
// 4.5 Consumes Routing Link
// ---------------------------------------------------------------------

pub struct ConsumesLink<CX> {
    children: ArcSwap<Vec<(MediaRange, Arc<ProducesLink<CX>>)>>,
    default: ArcSwapOption<ProducesLink<CX>>,
}

impl<CX: Clone + 'static> ConsumesLink<CX> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            children: ArcSwap::from_pointee(Vec::new()),
            default: ArcSwapOption::from(None),
        })
    }

    fn child_for(&self, consume: &Option<MediaRange>) -> Arc<ProducesLink<CX>> {
        match consume {
            None => {
                if let Some(existing) = self.default.load().as_ref() {
                    return existing.clone();
                }
                let fresh = ProducesLink::new();
                self.default.store(Some(fresh.clone()));
                fresh
            }
            Some(range) => {
                if let Some((_, existing)) = self.children.load().iter().find(|(r, _)| r == range) {
                    return existing.clone();
                }
                let fresh = ProducesLink::new();
                self.children.rcu(|cur| {
                    let mut next = Vec::clone(cur);
                    if !next.iter().any(|(r, _)| r == range) {
                        next.push((range.clone(), fresh.clone()));
                        next.sort_by(crate::negotiation::by_specificity_desc_key);
                    }
                    next
                });
                self.children.load().iter().find(|(r, _)| r == range).unwrap().1.clone()
            }
        }
    }

    fn set_route(&self, spec: RouteSpec<CX>) {
        let consume = spec.consume.clone();
        self.child_for(&consume).set_route(spec);
    }

    /// A missing `Content-Type` selects the default next-link; otherwise
    /// the single most-specific matching range, else 415 when at least one
    /// typed child exists (spec §4.5).
    async fn handle(&self, req: Request<BoxBody>, ctx: CX) -> Result<ResponseWithContinue<BoxBody>, RouterError> {
        let content_type = req
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<MediaRange>().ok());

        let Some(ct) = content_type else {
            if let Some(default) = self.default.load().as_ref() {
                return default.handle(req, ctx).await;
            }
            return Err(RouterError::RouteNotFound);
        };

        let snapshot = self.children.load();
        if let Some((_, link)) = snapshot.iter().find(|(range, _)| range.covers(&ct) || ct.covers(range)) {
            return link.handle(req, ctx).await;
        }
        if !snapshot.is_empty() {
            return Err(RouterError::UnsupportedMediaType);
        }
        if let Some(default) = self.default.load().as_ref() {
            return default.handle(req, ctx).await;
        }
        Err(RouterError::RouteNotFound)
    }

    fn extract(&self, path: Option<String>, method: Option<Method>) -> Vec<RouteDescriptor> {
        let mut out = Vec::new();
        for (range, link) in self.children.load().iter() {
            out.extend(link.extract(path.clone(), method.clone(), Some(range.clone())));
        }
        if let Some(default) = self.default.load().as_ref() {
            out.extend(default.extract(path.clone(), method.clone(), None));
        }
        out
    }
}

// ---------------------------------------------------------------------
// 4.6 Produces Routing Link (content negotiation)
// ---------------------------------------------------------------------

pub struct ProducesLink<CX> {
    children: ArcSwap<Vec<(ContentType, Arc<LanguageLink<CX>>)>>,
    default: ArcSwapOption<LanguageLink<CX>>,
}

impl<CX: Clone + 'static> ProducesLink<CX> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            children: ArcSwap::from_pointee(Vec::new()),
            default: ArcSwapOption::from(None),
        })
    }

    fn child_for(&self, produce: &Option<ContentType>) -> Arc<LanguageLink<CX>> {
        match produce {
            None => {
                if let Some(existing) = self.default.load().as_ref() {
                    return existing.clone();
                }
                let fresh = LanguageLink::new();
                self.default.store(Some(fresh.clone()));
                fresh
            }
            Some(ct) => {
                if let Some((_, existing)) = self.children.load().iter().find(|(c, _)| c == ct) {
                    return existing.clone();
                }
                let fresh = LanguageLink::new();
                self.children.rcu(|cur| {
                    let mut next = Vec::clone(cur);
                    if !next.iter().any(|(c, _)| c == ct) {
                        next.push((ct.clone(), fresh.clone()));
                        next.sort_by(crate::negotiation::by_specificity_desc_key);
                    }
                    next
                });
                self.children.load().iter().find(|(c, _)| c == ct).unwrap().1.clone()
            }
        }
    }

    fn set_route(&self, spec: RouteSpec<CX>) {
        let produce = spec.produce.clone();
        self.child_for(&produce).set_route(spec);
    }

    /// Merges every `Accept` header into preference order and, for each
    /// range in turn, tries every covering child in specificity order,
    /// trying the next-best candidate if the chosen sub-pipeline raises a
    /// recoverable error (spec §4.6). Only one candidate across the whole
    /// dispatch ever actually reads the request body -- the real body is
    /// threaded through [`Attempt`] so it reaches whichever candidate ends
    /// up succeeding, rather than every candidate getting an empty shell.
    async fn handle(&self, req: Request<BoxBody>, ctx: CX) -> Result<ResponseWithContinue<BoxBody>, RouterError> {
        let header_values: Vec<&str> = req
            .headers()
            .get_all(http::header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let merged = crate::negotiation::merge_accept(header_values.into_iter());

        let snapshot = self.children.load();
        let default = self.default.load();
        let mut seen = std::collections::HashSet::new();
        let mut offered: Vec<String> = Vec::new();
        for (ct, _) in snapshot.iter() {
            let label = format!("{}/{}", ct.ty, ct.subtype);
            if seen.insert(label.clone()) {
                offered.push(label);
            }
        }

        let (parts, body) = req.into_parts();
        let mut pending_body = Some(body);

        for range in &merged {
            if range.is_any() {
                if let Some(link) = default.as_ref() {
                    let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
                    match link.attempt(candidate, ctx.clone()).await {
                        Attempt::Ok(resp) => return Ok(resp),
                        Attempt::Recoverable(_, body_back) => pending_body = body_back,
                        Attempt::Terminal(e) => return Err(e),
                    }
                }
                for (_, link) in snapshot.iter() {
                    let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
                    match link.attempt(candidate, ctx.clone()).await {
                        Attempt::Ok(resp) => return Ok(resp),
                        Attempt::Recoverable(_, body_back) => pending_body = body_back,
                        Attempt::Terminal(e) => return Err(e),
                    }
                }
                continue;
            }
            for (_, link) in snapshot.iter().filter(|(ct, _)| ct.covers(range)) {
                let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
                match link.attempt(candidate, ctx.clone()).await {
                    Attempt::Ok(resp) => return Ok(resp),
                    Attempt::Recoverable(_, body_back) => pending_body = body_back,
                    Attempt::Terminal(e) => return Err(e),
                }
            }
        }
        if !snapshot.is_empty() {
            return Err(RouterError::NotAcceptable { offered });
        }
        if let Some(link) = default.as_ref() {
            let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
            return match link.attempt(candidate, ctx).await {
                Attempt::Ok(resp) => Ok(resp),
                Attempt::Recoverable(e, _) | Attempt::Terminal(e) => Err(e),
            };
        }
        Err(RouterError::RouteNotFound)
    }

    fn extract(&self, path: Option<String>, method: Option<Method>, consume: Option<MediaRange>) -> Vec<RouteDescriptor> {
        let mut out = Vec::new();
        for (ct, link) in self.children.load().iter() {
            out.extend(link.extract(path.clone(), method.clone(), consume.clone(), Some(ct.clone())));
        }
        if let Some(default) = self.default.load().as_ref() {
            out.extend(default.extract(path.clone(), method.clone(), consume.clone(), None));
        }
        out
    }
}

/// The Produces/Language links must re-dispatch to multiple candidate
/// children (spec §4.6/§4.7 "iteration continues with the next-best
/// candidate"); since [`Request`] isn't `Clone`, rebuild one from `parts`'
/// cloned metadata plus whichever `body` this attempt gets -- the real body
/// for the candidate currently in hand, an empty placeholder for the rest.
fn request_from_parts(parts: &http::request::Parts, body: BoxBody) -> Request<BoxBody> {
    let mut builder = Request::builder().method(parts.method.clone()).uri(parts.uri.clone()).version(parts.version);
    *builder.headers_mut().unwrap() = parts.headers.clone();
    *builder.extensions_mut().unwrap() = parts.extensions.clone();
    builder.body(body).unwrap()
}

// ---------------------------------------------------------------------
// 4.7 Language Routing Link
// ---------------------------------------------------------------------

pub struct LanguageLink<CX> {
    children: ArcSwap<Vec<(LanguageRange, Arc<HandlerLink<CX>>)>>,
    default: ArcSwapOption<HandlerLink<CX>>,
}

impl<CX: Clone + 'static> LanguageLink<CX> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            children: ArcSwap::from_pointee(Vec::new()),
            default: ArcSwapOption::from(None),
        })
    }

    fn child_for(&self, language: &Option<LanguageRange>) -> Arc<HandlerLink<CX>> {
        match language {
            None => {
                if let Some(existing) = self.default.load().as_ref() {
                    return existing.clone();
                }
                let fresh = HandlerLink::new();
                self.default.store(Some(fresh.clone()));
                fresh
            }
            Some(lang) => {
                if let Some((_, existing)) = self.children.load().iter().find(|(l, _)| l == lang) {
                    return existing.clone();
                }
                let fresh = HandlerLink::new();
                self.children.rcu(|cur| {
                    let mut next = Vec::clone(cur);
                    if !next.iter().any(|(l, _)| l == lang) {
                        next.push((lang.clone(), fresh.clone()));
                        next.sort_by(|a, b| b.0.specificity().cmp(&a.0.specificity()));
                    }
                    next
                });
                self.children.load().iter().find(|(l, _)| l == lang).unwrap().1.clone()
            }
        }
    }

    fn set_route(&self, spec: RouteSpec<CX>) {
        let language = spec.language.clone();
        self.child_for(&language).set_route(spec);
    }

    /// Absence of `Accept-Language` is treated as `*`; exhaustion without a
    /// match yields `RouteNotFound` rather than `NotAcceptable`, so that an
    /// ancestor Produces/Method link gets a chance to report its own error
    /// first (spec §4.7). Within a range, every covering child is tried in
    /// specificity order before moving to the next range (spec §4.6). Returns
    /// an [`Attempt`] rather than a plain `Result` so an ancestor Produces
    /// link, which may itself retry a sibling candidate, gets the real
    /// request body back when this whole sub-pipeline fails recoverably.
    async fn attempt(&self, req: Request<BoxBody>, ctx: CX) -> Attempt {
        let header_values: Vec<&str> = req
            .headers()
            .get_all(http::header::ACCEPT_LANGUAGE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let merged = crate::negotiation::merge_accept_language(header_values.into_iter());

        let snapshot = self.children.load();
        let default = self.default.load();

        let (parts, body) = req.into_parts();
        let mut pending_body = Some(body);

        for range in &merged {
            if range.is_any() {
                if let Some(link) = default.as_ref() {
                    let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
                    match link.attempt(candidate, ctx.clone()).await {
                        Attempt::Ok(resp) => return Attempt::Ok(resp),
                        Attempt::Recoverable(_, body_back) => pending_body = body_back,
                        Attempt::Terminal(e) => return Attempt::Terminal(e),
                    }
                }
                for (_, link) in snapshot.iter() {
                    let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
                    match link.attempt(candidate, ctx.clone()).await {
                        Attempt::Ok(resp) => return Attempt::Ok(resp),
                        Attempt::Recoverable(_, body_back) => pending_body = body_back,
                        Attempt::Terminal(e) => return Attempt::Terminal(e),
                    }
                }
                continue;
            }
            for (_, link) in snapshot.iter().filter(|(lang, _)| lang.covers(range)) {
                let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
                match link.attempt(candidate, ctx.clone()).await {
                    Attempt::Ok(resp) => return Attempt::Ok(resp),
                    Attempt::Recoverable(_, body_back) => pending_body = body_back,
                    Attempt::Terminal(e) => return Attempt::Terminal(e),
                }
            }
        }
        if let Some(link) = default.as_ref() {
            let candidate = request_from_parts(&parts, pending_body.take().unwrap_or_else(crate::body::empty_body));
            return link.attempt(candidate, ctx).await;
        }
        Attempt::Recoverable(RouterError::RouteNotFound, pending_body)
    }

    fn extract(
        &self,
        path: Option<String>,
        method: Option<Method>,
        consume: Option<MediaRange>,
        produce: Option<ContentType>,
    ) -> Vec<RouteDescriptor> {
        let mut out = Vec::new();
        for (lang, link) in self.children.load().iter() {
            out.extend(link.extract(path.clone(), method.clone(), consume.clone(), produce.clone(), Some(lang.clone())));
        }
        if let Some(default) = self.default.load().as_ref() {
            out.extend(default.extract(path.clone(), method.clone(), consume.clone(), produce.clone(), None));
        }
        out
    }
}

// ---------------------------------------------------------------------
// 4.8 Handler Routing Link (terminal)
// ---------------------------------------------------------------------

struct HandlerState<CX> {
    handler: Option<HandlerFn<CX>>,
    disabled: bool,
}

pub struct HandlerLink<CX> {
    state: ArcSwap<HandlerState<CX>>,
}

impl<CX: Clone + 'static> HandlerLink<CX> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: ArcSwap::from_pointee(HandlerState {
                handler: None,
                disabled: false,
            }),
        })
    }

    fn set_route(&self, spec: RouteSpec<CX>) {
        self.state.store(Arc::new(HandlerState {
            handler: Some(spec.handler),
            disabled: false,
        }));
    }

    pub fn enable(&self) {
        self.state.rcu(|cur| HandlerState {
            handler: cur.handler.clone(),
            disabled: false,
        });
    }

    pub fn disable(&self) {
        self.state.rcu(|cur| HandlerState {
            handler: cur.handler.clone(),
            disabled: true,
        });
    }

    pub fn remove(&self) {
        self.state.store(Arc::new(HandlerState {
            handler: None,
            disabled: false,
        }));
    }

    pub fn has_route(&self) -> bool {
        self.state.load().handler.is_some()
    }

    pub fn is_disabled(&self) -> bool {
        self.state.load().disabled
    }

    /// A `RouteNotFound`/`DisabledRoute` here is raised before the handler
    /// itself ever runs, so the request -- body included -- is handed back
    /// untouched for an ancestor Produces/Language link to retry with (spec
    /// §4.6/§4.7, §5 suspension point (a) "Reading the request body
    /// chunks"). Once the handler runs, it owns the request; an error it
    /// returns itself (including a literal `RouteNotFound`, spec §7) cannot
    /// hand the body back even when `is_recoverable()` is true.
    async fn attempt(&self, req: Request<BoxBody>, ctx: CX) -> Attempt {
        let state = self.state.load_full();
        let Some(handler) = state.handler.as_ref() else {
            tracing::trace!("handler link empty, no route registered");
            return Attempt::Recoverable(RouterError::RouteNotFound, Some(req.into_body()));
        };
        if state.disabled {
            tracing::debug!("dispatch hit a disabled route");
            return Attempt::Recoverable(RouterError::DisabledRoute, Some(req.into_body()));
        }
        match handler(req, ctx).await {
            Ok(resp) => Attempt::Ok(resp),
            Err(e) if e.is_recoverable() => Attempt::Recoverable(e, None),
            Err(e) => Attempt::Terminal(e),
        }
    }

    /// The Handler Link is the only leaf, so it is the one place that
    /// accumulates the full criterion tuple into a [`RouteDescriptor`];
    /// every ancestor link supplies only the dimension(s) it owns.
    fn extract(
        &self,
        path: Option<String>,
        method: Option<Method>,
        consume: Option<MediaRange>,
        produce: Option<ContentType>,
        language: Option<LanguageRange>,
    ) -> Vec<RouteDescriptor> {
        let state = self.state.load();
        if state.handler.is_none() {
            return Vec::new();
        }
        vec![RouteDescriptor {
            path: path.unwrap_or_default(),
            trailing_slash_tolerant: false,
            method,
            consume,
            produce,
            language,
            disabled: state.disabled,
        }]
    }
}

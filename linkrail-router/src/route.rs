//! The fluent registration API (spec §4.1): a `Router` owns the pipeline
//! root; `RouteBuilder` accumulates a criterion tuple and, on `handler()`,
//! threads it through the links via `PathLink::set_route`. `enable()`,
//! `disable()`, `remove()` and `find_routes()` operate on the already-built
//! pipeline instead, since they target a route already registered.
use std::{future::Future, sync::Arc};

use http::{Method, Request, Uri};

use crate::{
    body::BoxBody,
    error::RouterError,
    links::{HandlerFn, OriginalPath, PathLink, RouteDescriptor, RouteSpec},
    negotiation::{ContentType, LanguageRange, MediaRange},
};

/// Owns the pipeline root. Cheap to clone -- cloning shares the same
/// underlying links, matching the pipeline's read-copy-update discipline
/// (spec §5 "Shared mutation").
pub struct Router<CX> {
    root: Arc<PathLink<CX>>,
}

impl<CX: Clone + 'static> Default for Router<CX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<CX: Clone + 'static> Clone for Router<CX> {
    fn clone(&self) -> Self {
        Self { root: self.root.clone() }
    }
}

impl<CX: Clone + 'static> Router<CX> {
    pub fn new() -> Self {
        Self { root: PathLink::new() }
    }

    pub fn route(&self, path: impl Into<String>) -> RouteBuilder<CX> {
        RouteBuilder {
            root: self.root.clone(),
            path: path.into(),
            trailing_slash_tolerant: false,
            method: None,
            consume: None,
            produce: None,
            language: None,
        }
    }

    /// Dispatch a request against the pipeline's head link (spec §2
    /// "Dispatch calls `handle` on the head link").
    ///
    /// Path normalization (spec §6: percent-decoding of unreserved
    /// characters, `.`/`..` removal, empty-segment collapse) happens here,
    /// once, before the request ever reaches the Path Routing Link -- which
    /// matches literal paths "byte-exact after normalization" (spec §4.2).
    /// The original, as-received path is preserved as a request extension so
    /// a handler can still inspect it.
    pub async fn dispatch(
        &self,
        mut req: Request<BoxBody>,
        ctx: CX,
    ) -> Result<linkrail_core::http::ResponseWithContinue<BoxBody>, RouterError> {
        let original_path = req.uri().path().to_string();
        let normalized = linkrail_core::uri::normalize(&original_path)
            .map_err(|e| RouterError::BadRequest(e.to_string()))?;

        if normalized != original_path {
            let mut parts = req.uri().clone().into_parts();
            let path_and_query = match req.uri().query() {
                Some(q) => format!("{normalized}?{q}"),
                None => normalized,
            };
            parts.path_and_query = Some(
                path_and_query
                    .parse()
                    .map_err(|_| RouterError::BadRequest("malformed normalized path".to_string()))?,
            );
            *req.uri_mut() = Uri::from_parts(parts).map_err(|_| RouterError::BadRequest("malformed request URI".to_string()))?;
        }
        req.extensions_mut().insert(OriginalPath(original_path));

        self.root.handle(req, ctx).await
    }

    /// Depth-first walk of the whole pipeline, yielding every registered
    /// route's criterion tuple (spec §4.9).
    pub fn find_routes(&self) -> Vec<RouteDescriptor> {
        self.root.extract()
    }
}

/// A route under construction. Every `with_*` setter is optional; the
/// dimensions left unset register on each link's default next-link (spec
/// §4.4-§4.7 "An unspecified route ... is registered on the default
/// next-link").
pub struct RouteBuilder<CX> {
    root: Arc<PathLink<CX>>,
    path: String,
    trailing_slash_tolerant: bool,
    method: Option<Method>,
    consume: Option<MediaRange>,
    produce: Option<ContentType>,
    language: Option<LanguageRange>,
}

impl<CX: Clone + 'static> RouteBuilder<CX> {
    pub fn trailing_slash_tolerant(mut self) -> Self {
        self.trailing_slash_tolerant = true;
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn consumes(mut self, range: MediaRange) -> Self {
        self.consume = Some(range);
        self
    }

    pub fn produces(mut self, content_type: ContentType) -> Self {
        self.produce = Some(content_type);
        self
    }

    pub fn language(mut self, range: LanguageRange) -> Self {
        self.language = Some(range);
        self
    }

    /// Register the accumulated criteria with `handler`. Repeated
    /// registration with identical criteria replaces the handler in place
    /// (spec §4.1 "links dedupe on their own dimension key").
    pub fn handler<F, Fut>(self, handler: F)
    where
        F: Fn(Request<BoxBody>, CX) -> Fut + 'static,
        Fut: Future<Output = Result<linkrail_core::http::ResponseWithContinue<BoxBody>, RouterError>> + 'static,
    {
        let handler: HandlerFn<CX> = Arc::new(move |req, ctx| Box::pin(handler(req, ctx)));
        self.root.set_route(RouteSpec {
            path: self.path,
            trailing_slash_tolerant: self.trailing_slash_tolerant,
            method: self.method,
            consume: self.consume,
            produce: self.produce,
            language: self.language,
            handler,
        });
    }

    fn resolve(&self) -> Arc<crate::links::HandlerLink<CX>> {
        self.root.resolve_handler(
            &self.path,
            self.trailing_slash_tolerant,
            &self.method,
            &self.consume,
            &self.produce,
            &self.language,
        )
    }

    /// Re-enable a previously disabled route (spec §4.1/§4.8); a no-op if
    /// no route with this criterion tuple was ever registered.
    pub fn enable(self) {
        self.resolve().enable();
    }

    /// Mark a route disabled: `has_route()` still reports `true`, but
    /// dispatch against it raises `DisabledRoute` (spec §4.1/§4.8).
    pub fn disable(self) {
        self.resolve().disable();
    }

    /// Clear the handler entirely; after this, `has_route()` is `false`
    /// (spec invariant 2, "`removeRoute` followed by `getRoutes()` does
    /// not include the removed route").
    pub fn remove(self) {
        self.resolve().remove();
    }

    pub fn has_route(&self) -> bool {
        self.resolve().has_route()
    }

    pub fn is_disabled(&self) -> bool {
        self.resolve().is_disabled()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::executor::block_on;
    use http::{Request, StatusCode};

    use super::*;
    use crate::body::{collect, empty_body, once_body};

    fn get(router: &Router<()>, path: &str) -> Result<(http::Response<BoxBody>, bool), RouterError> {
        let req = Request::builder().method(Method::GET).uri(path).body(empty_body()).unwrap();
        block_on(router.dispatch(req, ()))
    }

    #[test]
    fn literal_route_dispatches() {
        let router: Router<()> = Router::new();
        router.route("/hello").method(Method::GET).handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(StatusCode::OK).body(once_body(Bytes::from_static(b"hi"))).unwrap(), false))
        });
        let (resp, _) = get(&router, "/hello").unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn unknown_method_yields_405_with_allow_header() {
        let router: Router<()> = Router::new();
        router.route("/hello").method(Method::GET).handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(StatusCode::OK).body(empty_body()).unwrap(), false))
        });
        let req = Request::builder().method(Method::POST).uri("/hello").body(empty_body()).unwrap();
        let err = block_on(router.dispatch(req, ())).unwrap_err();
        assert!(matches!(err, RouterError::MethodNotAllowed { ref allowed } if allowed == &vec!["GET".to_string()]));
    }

    #[test]
    fn unmatched_path_is_route_not_found() {
        let router: Router<()> = Router::new();
        let err = get(&router, "/missing").unwrap_err();
        assert!(matches!(err, RouterError::RouteNotFound));
    }

    #[test]
    fn path_pattern_binds_parameters() {
        let router: Router<()> = Router::new();
        router.route("/a/{p1}_{p2}").handler(|req, _cx| async move {
            let params = req.extensions().get::<crate::links::PathParams>().cloned().unwrap_or_default();
            let body = format!("{}:{}", params.get("p1").unwrap(), params.get("p2").unwrap());
            Ok((http::Response::builder().status(StatusCode::OK).body(once_body(Bytes::from(body))).unwrap(), false))
        });
        router.route("/a/{p}").handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(StatusCode::OK).body(once_body(Bytes::from_static(b"single"))).unwrap(), false))
        });
        let (resp, _) = get(&router, "/a/x_y").unwrap();
        let bytes = block_on(collect(resp.into_body())).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"x:y"));

        let (resp, _) = get(&router, "/a/z").unwrap();
        let bytes = block_on(collect(resp.into_body())).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"single"));
    }

    #[test]
    fn trailing_slash_tolerance_is_opt_in() {
        let router: Router<()> = Router::new();
        router.route("/hello/").trailing_slash_tolerant().handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(StatusCode::OK).body(empty_body()).unwrap(), false))
        });
        assert!(get(&router, "/hello/").is_ok());
        assert!(get(&router, "/hello").is_ok());

        let strict: Router<()> = Router::new();
        strict.route("/strict/").handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(StatusCode::OK).body(empty_body()).unwrap(), false))
        });
        assert!(get(&strict, "/strict/").is_ok());
        assert!(get(&strict, "/strict").is_err());
    }

    #[test]
    fn find_routes_reflects_disabled_state() {
        let router: Router<()> = Router::new();
        router.route("/x").method(Method::GET).handler(|_req, _cx| async move {
            Ok((http::Response::builder().status(StatusCode::OK).body(empty_body()).unwrap(), false))
        });
        let routes = router.find_routes();
        assert_eq!(routes.len(), 1);
        assert!(!routes[0].disabled);
    }
}

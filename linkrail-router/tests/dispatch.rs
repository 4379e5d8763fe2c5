//! End-to-end dispatch scenarios drawn from spec.md §8, exercised through
//! the public `Router` API rather than any single link in isolation.
use std::str::FromStr;

use bytes::Bytes;
use futures::executor::block_on;
use http::{HeaderValue, Method, Request, StatusCode};
use linkrail_router::{
    body::{collect, empty_body, once_body},
    negotiation::{ContentType, LanguageRange, MediaRange},
    Router, RouterError,
};

fn ok_body(text: &'static str) -> http::Response<linkrail_router::body::BoxBody> {
    http::Response::builder().status(StatusCode::OK).body(once_body(Bytes::from_static(text.as_bytes()))).unwrap()
}

fn ok_body_from(bytes: Bytes) -> http::Response<linkrail_router::body::BoxBody> {
    http::Response::builder().status(StatusCode::OK).body(once_body(bytes)).unwrap()
}

fn get_with_accept(router: &Router<()>, path: &str, accept: Option<&str>) -> Result<Bytes, RouterError> {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(accept) = accept {
        builder = builder.header(http::header::ACCEPT, HeaderValue::from_str(accept).unwrap());
    }
    let req = builder.body(empty_body()).unwrap();
    let (resp, _) = block_on(router.dispatch(req, ()))?;
    Ok(block_on(collect(resp.into_body())).unwrap())
}

/// Scenario 2a: two versioned `produce`s; an exact `Accept` picks the exact
/// match even though only one candidate is registered.
#[test]
fn content_negotiation_picks_exact_version() {
    let router: Router<()> = Router::new();
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=1").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v1"), false)) });
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=2").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v2"), false)) });

    let body = get_with_accept(&router, "/api", Some("application/json;version=2")).unwrap();
    assert_eq!(body, Bytes::from_static(b"v2"));
}

/// Scenario 2b: three routes share a path; an `Accept` with no `version`
/// parameter at all is satisfied by every registered produce, so the
/// most-specific (most parameters) one wins.
#[test]
fn content_negotiation_prefers_most_parameters_when_accept_is_unconstrained() {
    let router: Router<()> = Router::new();
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=1").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v1"), false)) });
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=2").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v2"), false)) });
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=2;p=1").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v2p1"), false)) });

    let body = get_with_accept(&router, "/api", Some("application/json")).unwrap();
    assert_eq!(body, Bytes::from_static(b"v2p1"));
}

/// Scenario 2c: only `version=*` children are registered; an `Accept`
/// requiring a `p` parameter neither one carries is unsatisfiable.
#[test]
fn content_negotiation_406_when_no_child_satisfies_required_param() {
    let router: Router<()> = Router::new();
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=1").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v1"), false)) });
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=2").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v2"), false)) });

    let err = get_with_accept(&router, "/api", Some("application/json;p=1")).unwrap_err();
    assert!(matches!(err, RouterError::NotAcceptable { .. }));
}

#[test]
fn consumes_link_415_when_content_type_unmatched() {
    let router: Router<()> = Router::new();
    router
        .route("/upload")
        .method(Method::POST)
        .consumes(MediaRange::from_str("application/json").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("ok"), false)) });

    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(empty_body())
        .unwrap();
    let err = block_on(router.dispatch(req, ())).unwrap_err();
    assert!(matches!(err, RouterError::UnsupportedMediaType));
}

#[test]
fn consumes_link_falls_back_to_default_when_no_content_type_sent() {
    let router: Router<()> = Router::new();
    router
        .route("/upload")
        .method(Method::POST)
        .handler(|_req, _cx| async move { Ok((ok_body("default"), false)) });

    let req = Request::builder().method(Method::POST).uri("/upload").body(empty_body()).unwrap();
    let (resp, _) = block_on(router.dispatch(req, ())).unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[test]
fn language_link_honors_accept_language_and_falls_back_to_default() {
    let router: Router<()> = Router::new();
    router
        .route("/greet")
        .language(LanguageRange {
            primary: "en".into(),
            sub: None,
            q_millis: 1000,
        })
        .handler(|_req, _cx| async move { Ok((ok_body("hello"), false)) });
    router
        .route("/greet")
        .language(LanguageRange {
            primary: "fr".into(),
            sub: None,
            q_millis: 1000,
        })
        .handler(|_req, _cx| async move { Ok((ok_body("bonjour"), false)) });

    let req = Request::builder()
        .method(Method::GET)
        .uri("/greet")
        .header(http::header::ACCEPT_LANGUAGE, "fr;q=1.0, en;q=0.5")
        .body(empty_body())
        .unwrap();
    let (resp, _) = block_on(router.dispatch(req, ())).unwrap();
    let body = block_on(collect(resp.into_body())).unwrap();
    assert_eq!(body, Bytes::from_static(b"bonjour"));
}

/// Path normalization (spec §6) runs before the Path Routing Link ever sees
/// the request, so a path containing dot-segments still reaches a literal
/// route registered on its normalized form.
#[test]
fn dot_segments_are_normalized_before_path_matching() {
    let router: Router<()> = Router::new();
    router.route("/a/c").method(Method::GET).handler(|_req, _cx| async move { Ok((ok_body("reached"), false)) });

    let req = Request::builder().method(Method::GET).uri("/a/./b/../c").body(empty_body()).unwrap();
    let (resp, _) = block_on(router.dispatch(req, ())).unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// A `produce`-bearing handler sits behind the Produces/Language retry loop
/// on every request, not just negotiated ones (spec §3 "Exchange carries the
/// request body", §5 suspension point (a)) -- a `POST` body must still reach
/// it intact.
#[test]
fn post_body_survives_content_negotiation_to_reach_handler() {
    let router: Router<()> = Router::new();
    router
        .route("/echo")
        .method(Method::POST)
        .produces(ContentType::from_str("text/plain").unwrap())
        .handler(|req, _cx| async move {
            let body = collect(req.into_body()).await.unwrap();
            Ok((ok_body_from(body), false))
        });

    let req = Request::builder()
        .method(Method::POST)
        .uri("/echo")
        .header(http::header::ACCEPT, "text/plain")
        .body(once_body(Bytes::from_static(b"payload")))
        .unwrap();
    let (resp, _) = block_on(router.dispatch(req, ())).unwrap();
    let body = block_on(collect(resp.into_body())).unwrap();
    assert_eq!(body, Bytes::from_static(b"payload"));
}

/// Within one `Accept` range, a disabled most-specific candidate must not
/// shadow an enabled, less-specific sibling that covers the same range
/// (spec §4.6 "iteration continues with the next-best candidate").
#[test]
fn disabled_most_specific_produces_candidate_falls_through_to_sibling() {
    let router: Router<()> = Router::new();
    router
        .route("/api")
        .produces(ContentType::from_str("application/json;version=2").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("v2"), false)) });
    router
        .route("/api")
        .produces(ContentType::from_str("application/json").unwrap())
        .handler(|_req, _cx| async move { Ok((ok_body("default"), false)) });

    router.route("/api").produces(ContentType::from_str("application/json;version=2").unwrap()).disable();

    let body = get_with_accept(&router, "/api", Some("application/json")).unwrap();
    assert_eq!(body, Bytes::from_static(b"default"));
}

#[test]
fn malformed_percent_escape_is_bad_request() {
    let router: Router<()> = Router::new();
    router.route("/a").method(Method::GET).handler(|_req, _cx| async move { Ok((ok_body("reached"), false)) });

    let req = Request::builder().method(Method::GET).uri("/a%2").body(empty_body()).unwrap();
    let err = block_on(router.dispatch(req, ())).unwrap_err();
    assert!(matches!(err, RouterError::BadRequest(_)));
}

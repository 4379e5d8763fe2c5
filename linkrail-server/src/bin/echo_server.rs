//! A minimal demonstration binary: registers a couple of routes and serves
//! them over TCP. Exercises `linkrail-server` end to end the way a host
//! application embedding the crate would.
use bytes::Bytes;
use http::{Method, StatusCode};
use linkrail_core::config::Config;
use linkrail_router::body::once_body;
use linkrail_server::{LinkrailServer, RequestContext};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config {
        port: 8080,
        ..Default::default()
    };

    LinkrailServer::<RequestContext>::new(config).run(
        1,
        |router| {
            router.route("/hello").method(Method::GET).handler(|_req, _ctx| async move {
                Ok((
                    http::Response::builder()
                        .status(StatusCode::OK)
                        .body(once_body(Bytes::from_static(b"hello from linkrail\n")))
                        .expect("static response is well-formed"),
                    true,
                ))
            });

            router.route("/whoami").method(Method::GET).handler(|_req, ctx: RequestContext| async move {
                let body = format!("you are {}\n", ctx.peer_addr);
                Ok((
                    http::Response::builder()
                        .status(StatusCode::OK)
                        .body(once_body(Bytes::from(body)))
                        .expect("response is well-formed"),
                    true,
                ))
            });
        },
        RequestContext::new,
    );
}

//! The embeddable entry point: wires a [`Router`] onto a TCP [`Listener`]
//! and an [`HttpCoreService`], and runs it thread-per-core via
//! [`crate::runtime::run_per_core`]. Mirrors the role the `monolake` binary
//! crate plays for monolake, but as a library a host application calls into
//! rather than a standalone process with its own config-file/CLI surface.
//!
//! A `Router`'s handler slots are boxed, non-`Send` futures (spec's RCU
//! discipline only promises a consistent snapshot *within* one thread's
//! concurrently-spawned tasks, not across OS threads) -- so unlike
//! `monolake`'s own `Server: Clone + Send` recipe-then-build-per-thread
//! pattern, the router itself cannot be built once and hopped across
//! worker threads. Each worker thread instead builds its own `Router` by
//! re-running the same `route_setup` closure, which is what actually needs
//! to be `Send + Clone`.
use std::{net::SocketAddr, rc::Rc};

use linkrail_core::config::Config;
use linkrail_router::Router;

use crate::{
    context::RequestContext, core_service::HttpCoreService, listener::Listener,
    routed::RoutedHandler, runtime::run_per_core, timeout::HttpServerTimeout,
};

/// Builds and runs a router-backed HTTP server. Generic over the
/// per-request context `CX` a caller's handlers expect; defaults to
/// [`RequestContext`] (just the peer address) for the common case.
pub struct LinkrailServer<CX = RequestContext> {
    config: Config,
    timeout: HttpServerTimeout,
    _ctx: std::marker::PhantomData<fn() -> CX>,
}

impl<CX> LinkrailServer<CX>
where
    CX: Clone + 'static,
{
    pub fn new(config: Config) -> Self {
        Self {
            config,
            timeout: HttpServerTimeout::default(),
            _ctx: std::marker::PhantomData,
        }
    }

    pub fn with_timeout(mut self, timeout: HttpServerTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the server to completion (it only returns once every worker
    /// thread's runtime exits, which in practice means the process is
    /// shutting down).
    ///
    /// `route_setup` is invoked once per worker thread against that
    /// thread's own fresh `Router`; `make_ctx` turns each accepted
    /// connection's peer address into that connection's `CX`.
    pub fn run<R, C>(self, workers: usize, route_setup: R, make_ctx: C)
    where
        R: Fn(&Router<CX>) + Clone + Send + 'static,
        C: Fn(SocketAddr) -> CX + Clone + Send + 'static,
    {
        let config = self.config;
        let timeout = self.timeout;

        run_per_core(workers, move || {
            let config = config.clone();
            let route_setup = route_setup.clone();
            let make_ctx = make_ctx.clone();
            async move {
                let router = Router::new();
                route_setup(&router);
                serve_on_this_thread(config, router, timeout, make_ctx).await
            }
        });
    }
}

async fn serve_on_this_thread<CX, C>(config: Config, router: Router<CX>, timeout: HttpServerTimeout, make_ctx: C)
where
    CX: Clone + 'static,
    C: Fn(SocketAddr) -> CX,
{
    let listener = match Listener::bind(&config) {
        Ok(l) => l,
        Err(err) => {
            tracing::error!("failed to bind {}:{}: {err}", config.host, config.port);
            return;
        }
    };
    let service = Rc::new(HttpCoreService::new(RoutedHandler::new(router), timeout));

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!("accept failed: {err}");
                continue;
            }
        };
        let service = service.clone();
        let ctx = make_ctx(peer_addr);
        monoio::spawn(async move { service.serve(stream, ctx).await });
    }
}

//! linkrail-server: a thin embeddable facade that wires a
//! `linkrail-router` pipeline onto `monoio`, thread-per-core. Mirrors the
//! role the `monolake` binary crate plays in its own workspace, except
//! exposed as a library a host application embeds rather than a standalone
//! gateway process.
pub mod context;
pub mod core_service;
pub mod facade;
pub mod h1;
pub mod listener;
pub mod routed;
pub mod runtime;
pub mod timeout;

pub use context::RequestContext;
pub use facade::LinkrailServer;
pub use routed::RoutedHandler;
pub use timeout::HttpServerTimeout;

pub use linkrail_core::config::Config;
pub use linkrail_router::Router;

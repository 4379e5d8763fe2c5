//! The per-request context (`CX`) threaded through a [`linkrail_router::Router`]
//! dispatch. Grounded on `monolake_core::context`'s `PeerAddr`/`RemoteAddr`
//! newtypes, collapsed into a single `Clone` struct since the pipeline only
//! requires `CX: Clone` and has no use for `certain_map`'s typed context
//! forking (the router itself owns no per-link context, only the handler
//! does).
use std::net::SocketAddr;

/// Connection-level facts available to every handler dispatched on a given
/// accepted connection. Cheap to clone: `peer_addr` is `Copy`, and a handler
/// that needs request-scoped state beyond this should carry it in its own
/// closure environment instead.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    /// The address of the accepted connection this request arrived on.
    pub peer_addr: SocketAddr,
}

impl RequestContext {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self { peer_addr }
    }
}

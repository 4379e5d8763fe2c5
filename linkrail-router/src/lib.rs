//! linkrail's router core: a fixed, declarative six-link dispatch pipeline
//! (`Path -> PathPattern -> Method -> Consumes -> Produces -> Language ->
//! Handler`), content negotiation, reactive response body assembly, and
//! Server-Sent-Events framing.
//!
//! `linkrail-core` supplies the collaborators this crate treats as external
//! (resource abstraction, byte streams, configuration, the handler seam);
//! this crate is where routes are registered, matched, and dispatched.
pub mod body;
pub mod error;
pub mod extractor;
pub mod links;
pub mod negotiation;
pub mod pattern;
pub mod route;
pub mod sse;

pub use error::RouterError;
pub use links::PathParams;
pub use route::{RouteBuilder, Router};

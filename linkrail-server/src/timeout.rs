//! Connection-lifetime timeouts, ported from
//! `monolake_services::http::core::HttpServerTimeout`: the core service
//! applies these around reading a request's headers/body and around idle
//! keepalive waits, independent of anything the router itself does.
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct HttpServerTimeout {
    /// How long an idle keepalive connection may wait for the next request
    /// before the core service closes it.
    pub keepalive_timeout: Option<Duration>,
    /// How long to wait for a request's header block once a connection has
    /// produced its first byte.
    pub read_header_timeout: Option<Duration>,
    /// How long to wait while reading a request's body.
    pub read_body_timeout: Option<Duration>,
}

impl Default for HttpServerTimeout {
    fn default() -> Self {
        Self {
            keepalive_timeout: Some(Duration::from_secs(75)),
            read_header_timeout: None,
            read_body_timeout: None,
        }
    }
}

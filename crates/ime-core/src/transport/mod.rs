//! Delivery of one encoded [`Command`](crate::protocol::Command) to the
//! engine and back.
//!
//! Two implementations: [`InProcessTransport`] calls a linked [`Engine`]
//! directly; [`StreamTransport`] opens one TCP connection per call. Which one
//! a client gets is decided once, by [`select`], from [`TransportSettings`].

mod in_process;
pub mod server;
mod stream;

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{info, warn};

use crate::engine::Engine;
use crate::settings::TransportSettings;

pub use in_process::InProcessTransport;
pub use server::StreamServer;
pub use stream::StreamTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    InProcess,
    Stream,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("peer closed the connection before a complete reply")]
    Closed,
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify a read/write failure: a short read means the peer hung up.
    pub(crate) fn from_io(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Closed
        } else {
            Self::Io(e)
        }
    }
}

/// Synchronous request/reply exchange. `&mut self` keeps one call in flight.
pub trait Transport: Send {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError>;

    fn kind(&self) -> TransportKind;
}

/// Resolve the transport once at startup.
///
/// Remote is used only when enabled, the host resolves, the port parses and
/// a probe connection succeeds. Anything else falls back to the in-process
/// engine built by `local`.
pub fn select<F>(settings: &TransportSettings, local: F) -> Box<dyn Transport>
where
    F: FnOnce() -> Box<dyn Engine>,
{
    match resolve_remote(settings) {
        Some(addr) => {
            info!(%addr, "using stream transport");
            Box::new(StreamTransport::new(
                addr,
                settings.connect_timeout(),
                settings.io_timeout(),
            ))
        }
        None => Box::new(InProcessTransport::new(local())),
    }
}

fn resolve_remote(settings: &TransportSettings) -> Option<SocketAddr> {
    if !settings.use_remote {
        return None;
    }
    let Some(host) = settings.host.as_deref().filter(|h| !h.trim().is_empty()) else {
        warn!("remote transport enabled without a host; using in-process engine");
        return None;
    };
    let Some(port) = settings.parsed_port() else {
        warn!(port = ?settings.port, "malformed port; using in-process engine");
        return None;
    };
    let addr = match (host, port).to_socket_addrs() {
        Ok(addrs) => first_resolved(host, addrs)?,
        Err(e) => {
            warn!(host, error = %e, "cannot resolve host; using in-process engine");
            return None;
        }
    };
    match TcpStream::connect_timeout(&addr, settings.connect_timeout()) {
        Ok(_) => Some(addr),
        Err(e) => {
            warn!(%addr, error = %e, "engine unreachable; using in-process engine");
            None
        }
    }
}

fn first_resolved(host: &str, mut addrs: impl Iterator<Item = SocketAddr>) -> Option<SocketAddr> {
    let addr = addrs.next();
    if addr.is_none() {
        warn!(host, "host resolved to no address; using in-process engine");
    }
    addr
}

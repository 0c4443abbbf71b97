//! Peer side of the stream wire format: serves an [`Engine`] over TCP,
//! one call per connection.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::protocol::{self, read_frame, write_frame};

pub struct StreamServer {
    listener: TcpListener,
    engine: Box<dyn Engine>,
}

impl StreamServer {
    pub fn bind(addr: impl ToSocketAddrs, engine: Box<dyn Engine>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, engine })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `limit` calls were answered (forever if
    /// `None`). Returns the number of answered calls. A failing connection
    /// is logged and does not stop the server.
    pub fn serve(mut self, limit: Option<usize>) -> io::Result<usize> {
        info!(addr = ?self.listener.local_addr().ok(), ?limit, "serving engine");
        let mut served = 0;
        while limit.map_or(true, |n| served < n) {
            let (stream, peer) = self.listener.accept()?;
            match self.handle(stream) {
                Ok(()) => served += 1,
                Err(e) => warn!(%peer, error = %e, "connection failed"),
            }
        }
        Ok(served)
    }

    fn handle(&mut self, mut stream: TcpStream) -> io::Result<()> {
        let request = read_frame(&mut stream)?;
        let mut command = protocol::decode(&request)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        command.output = self.engine.evaluate(&command.input);
        debug!(
            command = ?command.input.command_type(),
            error_code = ?command.output.error_code,
            "evaluated"
        );
        let reply = protocol::encode(&command)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_frame(&mut stream, &reply)
    }
}

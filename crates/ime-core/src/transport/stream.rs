use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use super::{Transport, TransportError, TransportKind};
use crate::protocol::{read_frame, write_frame};

/// One TCP connection per exchange: connect, write a frame, read a frame,
/// close. Session continuity lives in the payload, not the connection.
pub struct StreamTransport {
    addr: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl StreamTransport {
    pub fn new(addr: SocketAddr, connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
            io_timeout,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for StreamTransport {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut stream = TcpStream::connect_timeout(&self.addr, self.connect_timeout)
            .map_err(|source| TransportError::Connect {
                addr: self.addr,
                source,
            })?;
        stream.set_read_timeout(Some(self.io_timeout))?;
        stream.set_write_timeout(Some(self.io_timeout))?;
        stream.set_nodelay(true)?;

        write_frame(&mut stream, request).map_err(TransportError::from_io)?;
        let reply = read_frame(&mut stream).map_err(TransportError::from_io)?;
        // The peer may already have closed its side.
        let _ = stream.shutdown(Shutdown::Both);

        debug!(
            addr = %self.addr,
            sent = request.len(),
            received = reply.len(),
            "stream exchange"
        );
        Ok(reply)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::engine::MemoryEngine;
    use crate::protocol::{decode, encode, Command, Input, InputKind};
    use crate::transport::StreamServer;

    fn transport_for(addr: SocketAddr) -> StreamTransport {
        StreamTransport::new(addr, Duration::from_millis(500), Duration::from_secs(2))
    }

    fn get_config() -> Vec<u8> {
        encode(&Command::new(Input::new(InputKind::GetConfig))).unwrap()
    }

    #[test]
    fn test_exchange_against_server() {
        let server = StreamServer::bind("127.0.0.1:0", Box::new(MemoryEngine::new())).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || server.serve(Some(1)));

        let mut t = transport_for(addr);
        let reply = decode(&t.exchange(&get_config()).unwrap()).unwrap();
        assert!(reply.output.config.is_some());
        assert_eq!(handle.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_third_call_fails_after_peer_stops() {
        let server = StreamServer::bind("127.0.0.1:0", Box::new(MemoryEngine::new())).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || server.serve(Some(2)));

        let mut t = transport_for(addr);
        assert!(t.exchange(&get_config()).is_ok());
        assert!(t.exchange(&get_config()).is_ok());
        handle.join().unwrap().unwrap();

        assert!(matches!(
            t.exchange(&get_config()),
            Err(TransportError::Connect { .. })
        ));
    }

    #[test]
    fn test_peer_closing_mid_call_is_closed_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            // Read the request, then hang up without replying.
            let _ = read_frame(&mut conn);
        });

        let mut t = transport_for(addr);
        let err = t.exchange(&get_config()).unwrap_err();
        handle.join().unwrap();
        assert!(
            matches!(err, TransportError::Closed | TransportError::Io(_)),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_truncated_reply_is_closed_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            use std::io::Write;
            let (mut conn, _) = listener.accept().unwrap();
            let _ = read_frame(&mut conn);
            // Announce 100 bytes, deliver 3.
            conn.write_all(&100u32.to_be_bytes()).unwrap();
            conn.write_all(&[1, 2, 3]).unwrap();
        });

        let mut t = transport_for(addr);
        let err = t.exchange(&get_config()).unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, TransportError::Closed), "unexpected error: {err:?}");
    }
}

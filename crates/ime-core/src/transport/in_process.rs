use tracing::warn;

use super::{Transport, TransportError, TransportKind};
use crate::engine::Engine;
use crate::protocol::{self, Command, ErrorCode, Input, InputKind, Output};

/// Calls a linked engine directly. Never fails at the transport level:
/// an undecodable request is answered with `ErrorCode::InvalidCommand`.
pub struct InProcessTransport {
    engine: Box<dyn Engine>,
}

impl InProcessTransport {
    pub fn new(engine: Box<dyn Engine>) -> Self {
        Self { engine }
    }

    fn evaluate(&mut self, request: &[u8]) -> Command {
        match protocol::decode(request) {
            Ok(mut command) => {
                command.output = self.engine.evaluate(&command.input);
                command
            }
            Err(e) => {
                warn!(error = %e, "in-process engine received an undecodable command");
                Command {
                    input: Input::new(InputKind::NoOperation),
                    output: Output::with_error(ErrorCode::InvalidCommand),
                }
            }
        }
    }
}

impl Transport for InProcessTransport {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let command = self.evaluate(request);
        protocol::encode(&command)
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::InProcess
    }
}

//! Client-side ownership of the engine session.
//!
//! `SessionManager` injects the session id into every session-bound input,
//! creates the session on first use, and recovers once per call when the
//! engine reports that it no longer knows the id (e.g. it restarted).
//! Exactly one thread (the executor's worker) drives a manager.

mod request;
mod types;

#[cfg(test)]
mod tests;

use ime_core::protocol::{
    self, Capability, Command, ErrorCode, Input, InputKind, Output, Request, SessionId,
};
use ime_core::transport::{Transport, TransportKind};
use tracing::{debug, info, warn};

pub use types::{SessionError, SessionState};

pub struct SessionManager {
    transport: Box<dyn Transport>,
    state: SessionState,
    /// Baseline request re-applied whenever a session is (re)created.
    request: Request,
    capabilities: Vec<Capability>,
}

impl SessionManager {
    pub fn new(transport: Box<dyn Transport>, capabilities: Vec<Capability>) -> Self {
        Self {
            transport,
            state: SessionState::NoSession,
            request: Request::default(),
            capabilities,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.state.id()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Create a session unless one is ready, then push the negotiated request.
    pub fn ensure_session(&mut self) -> Result<SessionId, SessionError> {
        if let SessionState::Ready(id) = self.state {
            return Ok(id);
        }

        self.state = SessionState::Creating;
        let create = Input::new(InputKind::CreateSession {
            capabilities: self.capabilities.clone(),
        });
        let output = match self.exchange(&create) {
            Ok(output) => output,
            Err(e) => {
                self.state = SessionState::NoSession;
                return Err(e);
            }
        };
        let Some(id) = output.id.filter(|_| output.is_success()) else {
            self.state = SessionState::NoSession;
            warn!(error_code = ?output.error_code, "session creation refused");
            return Err(SessionError::CreateFailed(output.error_code));
        };

        self.state = SessionState::Ready(id);
        info!(id, "session created");
        self.push_request(id, Vec::new())?;
        Ok(id)
    }

    /// Evaluate one input, injecting the session id when the command needs
    /// one. An `ErrorCode::SessionFailure` answer triggers exactly one
    /// recreate-and-replay; a second one is returned as is.
    pub fn evaluate(&mut self, mut input: Input) -> Result<Command, SessionError> {
        match input.kind {
            InputKind::CreateSession { .. } => {
                let id = self.ensure_session()?;
                input.id = Some(id);
                let output = Output {
                    id: Some(id),
                    consumed: true,
                    ..Output::default()
                };
                return Ok(Command { input, output });
            }
            InputKind::DeleteSession => {
                input.id = self.session_id();
                let output = self.delete_session()?;
                return Ok(Command { input, output });
            }
            _ => {}
        }

        if !input.requires_session() {
            input.id = None;
            let output = self.exchange(&input)?;
            return Ok(Command { input, output });
        }

        input.id = Some(self.ensure_session()?);
        let output = self.exchange(&input)?;
        if output.error_code != ErrorCode::SessionFailure {
            return Ok(Command { input, output });
        }

        warn!(
            id = ?input.id,
            command = ?input.command_type(),
            "engine lost the session; recreating"
        );
        self.state = SessionState::NoSession;
        input.id = Some(self.ensure_session()?);
        let output = self.exchange(&input)?;
        if output.error_code == ErrorCode::SessionFailure {
            warn!(id = ?input.id, "session failure after recovery; giving up on this call");
        }
        Ok(Command { input, output })
    }

    /// One encode/exchange/decode round. A transport or codec failure drops
    /// the session: its state on the engine side is unknown.
    fn exchange(&mut self, input: &Input) -> Result<Output, SessionError> {
        let result = protocol::encode(&Command::new(input.clone()))
            .map_err(SessionError::from)
            .and_then(|request| self.transport.exchange(&request).map_err(SessionError::from))
            .and_then(|reply| protocol::decode(&reply).map_err(SessionError::from));

        match result {
            Ok(reply) => {
                debug!(
                    command = ?input.command_type(),
                    id = ?input.id,
                    error_code = ?reply.output.error_code,
                    "exchanged"
                );
                Ok(reply.output)
            }
            Err(e) => {
                warn!(command = ?input.command_type(), error = %e, "exchange failed");
                if self.state != SessionState::Creating {
                    self.state = SessionState::NoSession;
                }
                Err(e)
            }
        }
    }
}

use ime_core::protocol::{Input, InputKind, Output, Request, SessionId, TouchEvent};
use ime_core::transport::Transport;
use tracing::{debug, info, warn};

use crate::{SessionError, SessionManager, SessionState};

impl SessionManager {
    /// Merge `diff` into the baseline request and, if a session is ready,
    /// push the merged request to the engine. Without a session the
    /// baseline is applied at the next creation.
    pub fn update_request(
        &mut self,
        diff: &Request,
        touch_events: Vec<TouchEvent>,
    ) -> Result<(), SessionError> {
        self.request.merge_from(diff);
        match self.state {
            SessionState::Ready(id) => self.push_request(id, touch_events),
            SessionState::NoSession | SessionState::Creating => {
                debug!("request stored until the next session");
                Ok(())
            }
        }
    }

    pub(crate) fn push_request(
        &mut self,
        id: SessionId,
        touch_events: Vec<TouchEvent>,
    ) -> Result<(), SessionError> {
        let mut input = Input::new(InputKind::SetRequest {
            request: self.request.clone(),
        })
        .with_touch_events(touch_events);
        input.id = Some(id);

        let output = self.exchange(&input)?;
        if !output.is_success() {
            warn!(id, error_code = ?output.error_code, "engine rejected the request");
        }
        Ok(())
    }

    /// Best-effort teardown. The session is forgotten locally whatever the
    /// engine answers.
    pub fn delete_session(&mut self) -> Result<Output, SessionError> {
        let SessionState::Ready(id) = self.state else {
            return Ok(Output::default());
        };

        let mut input = Input::new(InputKind::DeleteSession);
        input.id = Some(id);
        let result = self.exchange(&input);
        self.state = SessionState::NoSession;
        match &result {
            Ok(output) if output.is_success() => info!(id, "session deleted"),
            Ok(output) => warn!(id, error_code = ?output.error_code, "session delete refused"),
            Err(e) => warn!(id, error = %e, "session delete failed"),
        }
        result
    }

    /// Swap the transport. The current session is deleted first; the next
    /// session-bound call creates one over the new transport.
    pub fn replace_transport(&mut self, transport: Box<dyn Transport>) {
        // Errors are already logged; the old peer may be gone.
        let _ = self.delete_session();
        info!(from = ?self.transport.kind(), to = ?transport.kind(), "transport replaced");
        self.transport = transport;
        self.state = SessionState::NoSession;
    }
}

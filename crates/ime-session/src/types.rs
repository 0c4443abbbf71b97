use ime_core::protocol::{CodecError, ErrorCode, SessionId};
use ime_core::transport::TransportError;

/// Session lifecycle as seen by the client.
///
/// `Creating` is only observable while a `CreateSession` exchange is in
/// flight; a failed creation returns to `NoSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Creating,
    Ready(SessionId),
}

impl SessionState {
    pub fn id(self) -> Option<SessionId> {
        match self {
            Self::Ready(id) => Some(id),
            Self::NoSession | Self::Creating => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("engine refused to create a session ({0:?})")]
    CreateFailed(ErrorCode),
}

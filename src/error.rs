use std::io;

use ime_session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("executor used before initialize()")]
    NotInitialized,
    #[error("worker thread has stopped")]
    WorkerStopped,
    #[error("synchronous evaluation from the worker thread would deadlock")]
    Reentrant,
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

//! Client-side execution engine for a session-oriented conversion engine.
//!
//! Front-ends talk to a [`SessionExecutor`]; one worker thread serializes
//! every engine call through an [`ime_session::SessionManager`], and results
//! come back either synchronously or through a [`CallbackQueue`].

pub mod context;
pub mod dispatcher;
mod error;
pub mod executor;
pub mod trace_init;
mod worker;

pub use context::{AsyncContext, EvaluationCallback, EvaluationContext, TriggeringEvent};
pub use dispatcher::{is_squashable, CallbackQueue};
pub use error::ClientError;
pub use executor::SessionExecutor;

pub use ime_core::{engine, protocol, settings, transport};
pub use ime_session::{SessionError, SessionState};

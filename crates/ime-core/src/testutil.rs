//! Transport double for tests in this workspace.
//!
//! [`Recorder`] owns a [`MemoryEngine`] and records every command that
//! reaches it. Faults can be scheduled per command type.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::engine::{Engine, MemoryEngine};
use crate::protocol::{self, CommandType, ErrorCode, InputKind, Output, SessionId};
use crate::transport::{Transport, TransportError, TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Answer with `ErrorCode::SessionFailure` without reaching the engine.
    SessionFailure,
    /// Fail the exchange as if the peer hung up.
    Disconnect,
}

#[derive(Default)]
struct RecorderState {
    engine: MemoryEngine,
    sent: Vec<(CommandType, Option<SessionId>)>,
    faults: Vec<(CommandType, Fault)>,
    key_codes: Vec<u32>,
    delay: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Shared handle; clones observe the same engine and log.
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<RecorderState>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(RecordingTransport {
            recorder: self.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Command types in the order they reached the transport.
    pub fn sent(&self) -> Vec<CommandType> {
        self.lock().sent.iter().map(|(t, _)| *t).collect()
    }

    pub fn sent_with_ids(&self) -> Vec<(CommandType, Option<SessionId>)> {
        self.lock().sent.clone()
    }

    /// Key codes of `SendKey` inputs in arrival order.
    pub fn key_codes(&self) -> Vec<u32> {
        self.lock().key_codes.clone()
    }

    /// Largest number of exchanges observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    pub fn clear(&self) {
        self.lock().sent.clear();
    }

    /// Apply `fault` to the next command of type `on`.
    pub fn inject(&self, on: CommandType, fault: Fault) {
        self.lock().faults.push((on, fault));
    }

    /// Simulate an engine restart.
    pub fn forget_sessions(&self) {
        self.lock().engine.forget_sessions();
    }

    /// Hold every exchange for `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    pub fn with_engine<R>(&self, f: impl FnOnce(&mut MemoryEngine) -> R) -> R {
        f(&mut self.lock().engine)
    }
}

struct RecordingTransport {
    recorder: Recorder,
}

impl Transport for RecordingTransport {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut command =
            protocol::decode(request).map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        let command_type = command.input.command_type();

        let (delay, fault) = {
            let mut state = self.recorder.lock();
            state.sent.push((command_type, command.input.id));
            if let InputKind::SendKey { key } = &command.input.kind {
                state.key_codes.extend(key.key_code);
            }
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            let fault = state
                .faults
                .iter()
                .position(|(t, _)| *t == command_type)
                .map(|i| state.faults.remove(i).1);
            (state.delay, fault)
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let output = {
            let mut state = self.recorder.lock();
            state.in_flight -= 1;
            match fault {
                Some(Fault::Disconnect) => return Err(TransportError::Closed),
                Some(Fault::SessionFailure) => Output::with_error(ErrorCode::SessionFailure),
                None => state.engine.evaluate(&command.input),
            }
        };
        command.output = output;
        protocol::encode(&command).map_err(|e| TransportError::Io(std::io::Error::other(e)))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::InProcess
    }
}

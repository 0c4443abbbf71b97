mod basic;

use ime_core::protocol::{Capability, Input, KeyEvent, SessionCommand};
use ime_core::testutil::Recorder;

use super::SessionManager;

pub(super) fn manager(recorder: &Recorder) -> SessionManager {
    SessionManager::new(
        recorder.transport(),
        vec![Capability::DeletePrecedingText, Capability::UndoCommit],
    )
}

// Helper: one SendKey per character
pub(super) fn type_string(session: &mut SessionManager, s: &str) {
    for ch in s.chars() {
        session
            .evaluate(Input::send_key(KeyEvent::character(ch)))
            .unwrap();
    }
}

pub(super) fn submit() -> Input {
    Input::send_command(SessionCommand::Submit)
}

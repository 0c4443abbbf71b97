use ime_core::protocol::{
    CommandType, Config, ErrorCode, Input, InputKind, KeyEvent, Request, ResultKind,
};
use ime_core::testutil::{Fault, Recorder};
use ime_core::transport::{TransportError, TransportKind};

use super::*;
use crate::{SessionError, SessionState};

// --- Session creation ---

#[test]
fn test_starts_without_session() {
    let recorder = Recorder::new();
    let session = manager(&recorder);
    assert_eq!(session.state(), SessionState::NoSession);
    assert_eq!(session.session_id(), None);
    assert_eq!(session.transport_kind(), TransportKind::InProcess);
    assert!(recorder.sent().is_empty());
}

#[test]
fn test_ensure_session_creates_once() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);

    let first = session.ensure_session().unwrap();
    let second = session.ensure_session().unwrap();
    assert_eq!(first, second);
    assert_eq!(session.state(), SessionState::Ready(first));
    assert_eq!(
        recorder.sent(),
        vec![CommandType::CreateSession, CommandType::SetRequest]
    );
}

#[test]
fn test_send_key_then_submit_sequence() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);

    let key = session
        .evaluate(Input::send_key(KeyEvent::character('a')))
        .unwrap();
    assert!(key.output.consumed);
    let commit = session.evaluate(submit()).unwrap();

    assert_eq!(
        recorder.sent(),
        vec![
            CommandType::CreateSession,
            CommandType::SetRequest,
            CommandType::SendKey,
            CommandType::SendCommand,
        ]
    );
    let result = commit.output.result.unwrap();
    assert_eq!(result.kind, ResultKind::String);
    assert_eq!(result.value, "a");
}

#[test]
fn test_session_id_injected_into_every_bound_command() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);

    type_string(&mut session, "abc");
    session.evaluate(submit()).unwrap();
    let id = session.session_id().unwrap();

    for (command, sent_id) in recorder.sent_with_ids() {
        if command.requires_session() {
            assert_eq!(sent_id, Some(id), "{command:?} sent without the session id");
        }
    }
}

#[test]
fn test_caller_supplied_id_is_overwritten() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);

    let mut input = Input::send_key(KeyEvent::character('x'));
    input.id = Some(9999);
    let command = session.evaluate(input).unwrap();
    assert_eq!(command.input.id, session.session_id());
    assert_eq!(command.output.error_code, ErrorCode::Success);
}

#[test]
fn test_exempt_commands_do_not_create_session() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);

    let command = session.evaluate(Input::new(InputKind::GetConfig)).unwrap();
    assert!(command.output.config.is_some());
    session
        .evaluate(Input::new(InputKind::SetConfig {
            config: Config::default(),
        }))
        .unwrap();

    assert_eq!(session.state(), SessionState::NoSession);
    assert_eq!(
        recorder.sent_with_ids(),
        vec![(CommandType::GetConfig, None), (CommandType::SetConfig, None)]
    );
}

#[test]
fn test_create_session_input_reuses_ready_session() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);
    let id = session.ensure_session().unwrap();
    recorder.clear();

    let command = session
        .evaluate(Input::new(InputKind::CreateSession {
            capabilities: Vec::new(),
        }))
        .unwrap();
    assert_eq!(command.output.id, Some(id));
    assert!(recorder.sent().is_empty());
}

#[test]
fn test_create_refused_returns_to_no_session() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);
    recorder.inject(CommandType::CreateSession, Fault::SessionFailure);

    let err = session.ensure_session().unwrap_err();
    assert!(matches!(
        err,
        crate::SessionError::CreateFailed(ErrorCode::SessionFailure)
    ));
    assert_eq!(session.state(), SessionState::NoSession);

    // The next attempt succeeds.
    assert!(session.ensure_session().is_ok());
}

// --- Request handling ---

#[test]
fn test_update_request_without_session_is_deferred() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);

    let diff = Request {
        candidate_page_size: Some(1),
        ..Request::default()
    };
    session.update_request(&diff, Vec::new()).unwrap();
    assert!(recorder.sent().is_empty());
    assert_eq!(session.request().candidate_page_size, Some(1));

    let id = session.ensure_session().unwrap();
    let applied = recorder.with_engine(|e| e.session_request(id).cloned());
    assert_eq!(applied.unwrap().candidate_page_size, Some(1));
}

#[test]
fn test_update_request_merges_into_baseline() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);
    let id = session.ensure_session().unwrap();

    session
        .update_request(
            &Request {
                mixed_conversion: Some(true),
                ..Request::default()
            },
            Vec::new(),
        )
        .unwrap();
    session
        .update_request(
            &Request {
                keyboard_name: Some("12keys".into()),
                ..Request::default()
            },
            Vec::new(),
        )
        .unwrap();

    let applied = recorder
        .with_engine(|e| e.session_request(id).cloned())
        .unwrap();
    assert_eq!(applied.mixed_conversion, Some(true));
    assert_eq!(applied.keyboard_name.as_deref(), Some("12keys"));
}

// --- Teardown ---

#[test]
fn test_delete_session_without_session_sends_nothing() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);
    let output = session.delete_session().unwrap();
    assert!(output.is_success());
    assert!(recorder.sent().is_empty());
}

#[test]
fn test_delete_session_then_next_call_recreates() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);
    let first = session.ensure_session().unwrap();

    session.delete_session().unwrap();
    assert_eq!(session.state(), SessionState::NoSession);
    assert_eq!(recorder.with_engine(|e| e.session_count()), 0);

    session
        .evaluate(Input::send_key(KeyEvent::character('a')))
        .unwrap();
    assert_ne!(session.session_id(), Some(first));
}

#[test]
fn test_delete_session_forgets_even_on_disconnect() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);
    session.ensure_session().unwrap();
    recorder.inject(CommandType::DeleteSession, Fault::Disconnect);

    assert!(session.delete_session().is_err());
    assert_eq!(session.state(), SessionState::NoSession);
}

#[test]
fn test_delete_session_command_reports_disconnect() {
    let recorder = Recorder::new();
    let mut session = manager(&recorder);
    session.ensure_session().unwrap();
    recorder.inject(CommandType::DeleteSession, Fault::Disconnect);

    let err = session
        .evaluate(Input::new(InputKind::DeleteSession))
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Transport(TransportError::Closed)
    ));
    assert_eq!(session.state(), SessionState::NoSession);
}

#[test]
fn test_replace_transport_deletes_on_old_peer() {
    let old = Recorder::new();
    let new = Recorder::new();
    let mut session = manager(&old);
    session.ensure_session().unwrap();

    session.replace_transport(new.transport());
    assert_eq!(old.with_engine(|e| e.session_count()), 0);
    assert_eq!(session.state(), SessionState::NoSession);

    session
        .evaluate(Input::send_key(KeyEvent::character('a')))
        .unwrap();
    assert_eq!(
        new.sent(),
        vec![
            CommandType::CreateSession,
            CommandType::SetRequest,
            CommandType::SendKey
        ]
    );
}

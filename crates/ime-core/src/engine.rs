//! Engine seam used by the in-process transport and the stream server.
//!
//! [`MemoryEngine`] is a small conversion engine without dictionaries: the
//! composition itself (and its upper-cased form) are the only candidates.
//! It keeps real session bookkeeping, so session loss and recovery can be
//! exercised end to end.

use std::collections::{BTreeMap, HashMap};

use crate::protocol::{
    CandidateList, CandidateWord, Capability, CommitResult, CompositionMode, Config,
    DeletionRange, DictionaryStatus, ErrorCode, Input, InputFieldType, InputKind, KeyEvent,
    Output, Request, ResultKind, SessionCommand, SessionId, SpecialKey, StorageEntry,
    StorageType, UserDictionaryCommand,
};

/// A conversion engine that evaluates one input at a time.
pub trait Engine: Send {
    fn evaluate(&mut self, input: &Input) -> Output;
}

struct EngineSession {
    capabilities: Vec<Capability>,
    request: Request,
    composition: Vec<char>,
    cursor: usize,
    focused: usize,
    mode: CompositionMode,
    field_type: InputFieldType,
    last_commit: Option<String>,
}

impl EngineSession {
    fn new(capabilities: Vec<Capability>) -> Self {
        Self {
            capabilities,
            request: Request::default(),
            composition: Vec::new(),
            cursor: 0,
            focused: 0,
            mode: CompositionMode::Hiragana,
            field_type: InputFieldType::Normal,
            last_commit: None,
        }
    }

    fn text(&self) -> String {
        self.composition.iter().collect()
    }

    fn candidates(&self) -> Vec<String> {
        let text = self.text();
        let upper = text.to_uppercase();
        if upper == text {
            vec![text]
        } else {
            vec![text, upper]
        }
    }

    fn clear(&mut self) {
        self.composition.clear();
        self.cursor = 0;
        self.focused = 0;
    }

    fn insert(&mut self, text: &str) {
        for ch in text.chars() {
            self.composition.insert(self.cursor, ch);
            self.cursor += 1;
        }
        self.focused = 0;
    }

    fn commit(&mut self, value: String) -> Output {
        self.clear();
        self.last_commit = Some(value.clone());
        Output {
            consumed: true,
            result: Some(CommitResult {
                kind: ResultKind::String,
                value,
            }),
            ..Output::default()
        }
    }

    fn composing_output(&self) -> Output {
        if self.composition.is_empty() || self.field_type == InputFieldType::Password {
            return Output {
                consumed: true,
                ..Output::default()
            };
        }
        let page_size = self.request.candidate_page_size.unwrap_or(9).max(1) as usize;
        let candidates = self
            .candidates()
            .into_iter()
            .take(page_size)
            .enumerate()
            .map(|(i, value)| CandidateWord {
                id: i as i32,
                value,
                annotation: None,
            })
            .collect();
        Output {
            consumed: true,
            candidate_list: Some(CandidateList {
                candidates,
                focused_index: Some(self.focused as u32),
            }),
            mode: Some(self.mode),
            ..Output::default()
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) -> Output {
        if let Some(mode) = key.mode {
            self.mode = mode;
        }
        if self.mode == CompositionMode::Direct {
            return Output::default();
        }
        match key.special_key {
            None => match key.text() {
                Some(text) => {
                    self.insert(&text);
                    self.composing_output()
                }
                None => Output::default(),
            },
            Some(_) if self.composition.is_empty() => Output::default(),
            Some(SpecialKey::Enter) => {
                let text = self.text();
                self.commit(text)
            }
            Some(SpecialKey::Space) => {
                self.focused = (self.focused + 1) % self.candidates().len();
                self.composing_output()
            }
            Some(SpecialKey::Backspace) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.composition.remove(self.cursor);
                }
                self.composing_output()
            }
            Some(SpecialKey::Escape) => {
                self.clear();
                self.composing_output()
            }
            Some(SpecialKey::Left) => {
                self.cursor = self.cursor.saturating_sub(1);
                self.composing_output()
            }
            Some(SpecialKey::Right) => {
                self.cursor = (self.cursor + 1).min(self.composition.len());
                self.composing_output()
            }
            Some(_) => self.composing_output(),
        }
    }

    fn handle_command(&mut self, command: &SessionCommand) -> Output {
        match command {
            SessionCommand::Submit => {
                if self.composition.is_empty() {
                    return Output::default();
                }
                let text = self.text();
                self.commit(text)
            }
            SessionCommand::SubmitCandidate { id, .. } => {
                let Some(value) = usize::try_from(*id)
                    .ok()
                    .and_then(|i| self.candidates().into_iter().nth(i))
                    .filter(|_| !self.composition.is_empty())
                else {
                    return Output::with_error(ErrorCode::InvalidCommand);
                };
                self.commit(value)
            }
            SessionCommand::SwitchInputMode { mode } => {
                self.mode = *mode;
                let mut out = self.composing_output();
                out.mode = Some(*mode);
                out
            }
            SessionCommand::ResetContext => {
                self.clear();
                self.last_commit = None;
                Output {
                    consumed: true,
                    ..Output::default()
                }
            }
            SessionCommand::MoveCursor { position } => {
                self.cursor = (*position as usize).min(self.composition.len());
                self.composing_output()
            }
            SessionCommand::ConvertNextPage | SessionCommand::ConvertPrevPage => {
                if self.composition.is_empty() {
                    return Output::default();
                }
                let n = self.candidates().len();
                self.focused = match command {
                    SessionCommand::ConvertNextPage => (self.focused + 1) % n,
                    _ => (self.focused + n - 1) % n,
                };
                self.composing_output()
            }
            SessionCommand::SwitchInputFieldType { field_type } => {
                self.field_type = *field_type;
                Output {
                    consumed: true,
                    ..Output::default()
                }
            }
            SessionCommand::UndoOrRewind => self.undo_or_rewind(),
            SessionCommand::ExpandSuggestion => self.composing_output(),
            SessionCommand::UsageEvent { .. } => Output {
                consumed: true,
                ..Output::default()
            },
        }
    }

    fn undo_or_rewind(&mut self) -> Output {
        if self.composition.is_empty() {
            let can_undo = self.capabilities.contains(&Capability::DeletePrecedingText)
                && self.capabilities.contains(&Capability::UndoCommit);
            if !can_undo {
                return Output::default();
            }
            let Some(last) = self.last_commit.take() else {
                return Output::default();
            };
            let length = last.chars().count() as u32;
            self.insert(&last);
            let mut out = self.composing_output();
            out.deletion_range = Some(DeletionRange {
                offset: -(length as i32),
                length,
            });
            return out;
        }
        self.composition.pop();
        self.cursor = self.cursor.min(self.composition.len());
        self.composing_output()
    }
}

/// In-memory engine; see the module docs.
#[derive(Default)]
pub struct MemoryEngine {
    next_id: SessionId,
    sessions: HashMap<SessionId, EngineSession>,
    config: Config,
    imposed: Config,
    storage: HashMap<StorageType, BTreeMap<String, Vec<Vec<u8>>>>,
    dictionaries: BTreeMap<String, Vec<(String, String)>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every session, as a restarted engine process would.
    pub fn forget_sessions(&mut self) {
        self.sessions.clear();
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Request last applied to a session, if it exists.
    pub fn session_request(&self, id: SessionId) -> Option<&Request> {
        self.sessions.get(&id).map(|s| &s.request)
    }

    fn effective_config(&self) -> Config {
        let mut config = self.config.clone();
        config.merge_from(&self.imposed);
        config
    }

    fn evaluate_global(&mut self, input: &Input) -> Option<Output> {
        let out = match &input.kind {
            InputKind::CreateSession { capabilities } => {
                self.next_id += 1;
                let id = self.next_id;
                self.sessions
                    .insert(id, EngineSession::new(capabilities.clone()));
                Output {
                    id: Some(id),
                    consumed: true,
                    ..Output::default()
                }
            }
            InputKind::SetConfig { config } => {
                self.config = config.clone();
                Output {
                    consumed: true,
                    config: Some(self.effective_config()),
                    ..Output::default()
                }
            }
            InputKind::SetImposedConfig { config } => {
                self.imposed = config.clone();
                Output {
                    consumed: true,
                    config: Some(self.effective_config()),
                    ..Output::default()
                }
            }
            InputKind::GetConfig => Output {
                consumed: true,
                config: Some(self.effective_config()),
                ..Output::default()
            },
            _ => return None,
        };
        Some(out)
    }

    fn evaluate_storage(&mut self, kind: &InputKind) -> Option<Output> {
        let out = match kind {
            InputKind::InsertToStorage { entry } => {
                self.storage
                    .entry(entry.storage)
                    .or_default()
                    .insert(entry.key.clone(), entry.values.clone());
                Output {
                    consumed: true,
                    ..Output::default()
                }
            }
            InputKind::ReadAllFromStorage { storage } => {
                let values = self
                    .storage
                    .get(storage)
                    .map(|m| m.values().flatten().cloned().collect())
                    .unwrap_or_default();
                Output {
                    consumed: true,
                    storage_entry: Some(StorageEntry {
                        storage: *storage,
                        key: String::new(),
                        values,
                    }),
                    ..Output::default()
                }
            }
            InputKind::ClearStorage { storage } => {
                self.storage.remove(storage);
                Output {
                    consumed: true,
                    ..Output::default()
                }
            }
            _ => return None,
        };
        Some(out)
    }

    fn evaluate_dictionary(&mut self, command: &UserDictionaryCommand) -> Output {
        let status = match command {
            UserDictionaryCommand::CreateDictionary { name } => {
                if self.dictionaries.contains_key(name) {
                    DictionaryStatus::DuplicateName
                } else {
                    self.dictionaries.insert(name.clone(), Vec::new());
                    DictionaryStatus::Ok
                }
            }
            UserDictionaryCommand::DeleteDictionary { name } => {
                match self.dictionaries.remove(name) {
                    Some(_) => DictionaryStatus::Ok,
                    None => DictionaryStatus::UnknownDictionary,
                }
            }
            UserDictionaryCommand::AddEntry {
                dictionary,
                reading,
                word,
            } => match self.dictionaries.get_mut(dictionary) {
                None => DictionaryStatus::UnknownDictionary,
                Some(entries) => {
                    let entry = (reading.clone(), word.clone());
                    if entries.contains(&entry) {
                        DictionaryStatus::DuplicateEntry
                    } else {
                        entries.push(entry);
                        DictionaryStatus::Ok
                    }
                }
            },
            UserDictionaryCommand::Save => DictionaryStatus::Ok,
        };
        Output {
            consumed: true,
            dictionary_status: Some(status),
            ..Output::default()
        }
    }
}

impl Engine for MemoryEngine {
    fn evaluate(&mut self, input: &Input) -> Output {
        if let Some(out) = self.evaluate_global(input) {
            return out;
        }

        let Some(id) = input.id.filter(|id| self.sessions.contains_key(id)) else {
            return Output::with_error(ErrorCode::SessionFailure);
        };

        if let Some(mut out) = self.evaluate_storage(&input.kind) {
            out.id = Some(id);
            return out;
        }

        let mut out = match &input.kind {
            InputKind::DeleteSession => {
                self.sessions.remove(&id);
                Output {
                    consumed: true,
                    ..Output::default()
                }
            }
            InputKind::SendUserDictionaryCommand { command } => self.evaluate_dictionary(command),
            InputKind::ClearUserHistory
            | InputKind::ClearUserPrediction
            | InputKind::ClearUnusedUserPrediction
            | InputKind::Reload
            | InputKind::SyncData
            | InputKind::NoOperation => Output {
                consumed: true,
                ..Output::default()
            },
            kind => {
                let Some(session) = self.sessions.get_mut(&id) else {
                    return Output::with_error(ErrorCode::SessionFailure);
                };
                match kind {
                    InputKind::SendKey { key } => session.handle_key(key),
                    InputKind::SendCommand { command } => session.handle_command(command),
                    InputKind::SetRequest { request } => {
                        session.request = request.clone();
                        Output {
                            consumed: true,
                            ..Output::default()
                        }
                    }
                    _ => Output::with_error(ErrorCode::Unsupported),
                }
            }
        };
        out.id = Some(id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(engine: &mut MemoryEngine, capabilities: Vec<Capability>) -> SessionId {
        engine
            .evaluate(&Input::new(InputKind::CreateSession { capabilities }))
            .id
            .unwrap()
    }

    fn in_session(id: SessionId, mut input: Input) -> Input {
        input.id = Some(id);
        input
    }

    #[test]
    fn test_type_and_submit() {
        let mut engine = MemoryEngine::new();
        let id = create(&mut engine, vec![]);

        let out = engine.evaluate(&in_session(id, Input::send_key(KeyEvent::character('a'))));
        assert!(out.consumed);
        assert!(out.result.is_none());
        let list = out.candidate_list.unwrap();
        assert_eq!(list.candidates[0].value, "a");
        assert_eq!(list.candidates[1].value, "A");

        let out = engine.evaluate(&in_session(id, Input::send_command(SessionCommand::Submit)));
        assert_eq!(out.result.unwrap().value, "a");
        assert!(out.candidate_list.is_none());
    }

    #[test]
    fn test_unknown_session_reports_session_failure() {
        let mut engine = MemoryEngine::new();
        let id = create(&mut engine, vec![]);
        engine.forget_sessions();
        let out = engine.evaluate(&in_session(id, Input::send_key(KeyEvent::character('a'))));
        assert_eq!(out.error_code, ErrorCode::SessionFailure);

        let out = engine.evaluate(&Input::send_key(KeyEvent::character('a')));
        assert_eq!(out.error_code, ErrorCode::SessionFailure);
    }

    #[test]
    fn test_config_does_not_need_session() {
        let mut engine = MemoryEngine::new();
        let config = Config {
            incognito_mode: Some(false),
            suggestions_size: Some(3),
            ..Config::default()
        };
        engine.evaluate(&Input::new(InputKind::SetConfig { config }));
        engine.evaluate(&Input::new(InputKind::SetImposedConfig {
            config: Config {
                incognito_mode: Some(true),
                ..Config::default()
            },
        }));
        let out = engine.evaluate(&Input::new(InputKind::GetConfig));
        let config = out.config.unwrap();
        assert_eq!(config.incognito_mode, Some(true));
        assert_eq!(config.suggestions_size, Some(3));
    }

    #[test]
    fn test_undo_commit_emits_deletion_range() {
        let mut engine = MemoryEngine::new();
        let id = create(
            &mut engine,
            vec![Capability::DeletePrecedingText, Capability::UndoCommit],
        );
        for ch in "ab".chars() {
            engine.evaluate(&in_session(id, Input::send_key(KeyEvent::character(ch))));
        }
        engine.evaluate(&in_session(id, Input::send_command(SessionCommand::Submit)));
        let out = engine.evaluate(&in_session(
            id,
            Input::send_command(SessionCommand::UndoOrRewind),
        ));
        assert_eq!(
            out.deletion_range,
            Some(DeletionRange {
                offset: -2,
                length: 2
            })
        );
        assert_eq!(out.candidate_list.unwrap().candidates[0].value, "ab");
    }

    #[test]
    fn test_storage_round() {
        let mut engine = MemoryEngine::new();
        let id = create(&mut engine, vec![]);
        engine.evaluate(&in_session(
            id,
            Input::new(InputKind::InsertToStorage {
                entry: StorageEntry {
                    storage: StorageType::EmojiHistory,
                    key: "smile".to_string(),
                    values: vec![b"x".to_vec()],
                },
            }),
        ));
        let out = engine.evaluate(&in_session(
            id,
            Input::new(InputKind::ReadAllFromStorage {
                storage: StorageType::EmojiHistory,
            }),
        ));
        assert_eq!(out.storage_entry.unwrap().values, vec![b"x".to_vec()]);

        engine.evaluate(&in_session(
            id,
            Input::new(InputKind::ClearStorage {
                storage: StorageType::EmojiHistory,
            }),
        ));
        let out = engine.evaluate(&in_session(
            id,
            Input::new(InputKind::ReadAllFromStorage {
                storage: StorageType::EmojiHistory,
            }),
        ));
        assert!(out.storage_entry.unwrap().values.is_empty());
    }

    #[test]
    fn test_user_dictionary_statuses() {
        let mut engine = MemoryEngine::new();
        let id = create(&mut engine, vec![]);
        let mut run = |command| {
            engine
                .evaluate(&in_session(
                    id,
                    Input::new(InputKind::SendUserDictionaryCommand { command }),
                ))
                .dictionary_status
                .unwrap()
        };
        let add = UserDictionaryCommand::AddEntry {
            dictionary: "user".to_string(),
            reading: "きょう".to_string(),
            word: "今日".to_string(),
        };
        assert_eq!(run(add.clone()), DictionaryStatus::UnknownDictionary);
        assert_eq!(
            run(UserDictionaryCommand::CreateDictionary {
                name: "user".to_string()
            }),
            DictionaryStatus::Ok
        );
        assert_eq!(run(add.clone()), DictionaryStatus::Ok);
        assert_eq!(run(add), DictionaryStatus::DuplicateEntry);
    }

    #[test]
    fn test_direct_mode_passes_keys_through() {
        let mut engine = MemoryEngine::new();
        let id = create(&mut engine, vec![]);
        engine.evaluate(&in_session(
            id,
            Input::send_command(SessionCommand::SwitchInputMode {
                mode: CompositionMode::Direct,
            }),
        ));
        let out = engine.evaluate(&in_session(id, Input::send_key(KeyEvent::character('a'))));
        assert!(!out.consumed);
    }
}

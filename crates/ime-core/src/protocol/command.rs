//! Command envelope exchanged with the conversion engine.
//!
//! A [`Command`] pairs the [`Input`] the client sends with the [`Output`] the
//! engine fills in. Request-side types use `Option` fields where the engine
//! distinguishes "unset" from a value, so partial updates can be merged.

use serde::{Deserialize, Serialize};

pub type SessionId = u64;

// ---------------------------------------------------------------------------
// Command kinds
// ---------------------------------------------------------------------------

/// Payload-free projection of [`InputKind`], used for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    CreateSession,
    DeleteSession,
    SendKey,
    SendCommand,
    SetRequest,
    SetConfig,
    SetImposedConfig,
    GetConfig,
    InsertToStorage,
    ReadAllFromStorage,
    ClearStorage,
    ClearUserHistory,
    ClearUserPrediction,
    ClearUnusedUserPrediction,
    Reload,
    SyncData,
    SendUserDictionaryCommand,
    NoOperation,
}

impl CommandType {
    /// Config commands are evaluated outside any session.
    pub fn is_session_exempt(self) -> bool {
        matches!(
            self,
            Self::SetConfig | Self::SetImposedConfig | Self::GetConfig
        )
    }

    /// Whether the current session id must be injected before sending.
    /// `CreateSession` is the one command that produces the id instead.
    pub fn requires_session(self) -> bool {
        !self.is_session_exempt() && self != Self::CreateSession
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Client can apply `Output::deletion_range` to the surrounding text.
    DeletePrecedingText,
    /// Client accepts `UndoOrRewind` results that restore a commit.
    UndoCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositionMode {
    Direct,
    Hiragana,
    FullKatakana,
    HalfAscii,
    FullAscii,
    HalfKatakana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialKey {
    Enter,
    Backspace,
    Delete,
    Escape,
    Space,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKey {
    Shift,
    Ctrl,
    Alt,
}

/// Key event as understood by the engine (already mapped from hardware codes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key_code: Option<u32>,
    pub key_string: Option<String>,
    pub special_key: Option<SpecialKey>,
    pub modifiers: Vec<ModifierKey>,
    pub mode: Option<CompositionMode>,
}

impl KeyEvent {
    pub fn character(ch: char) -> Self {
        Self {
            key_code: Some(u32::from(ch)),
            ..Self::default()
        }
    }

    pub fn special(key: SpecialKey) -> Self {
        Self {
            special_key: Some(key),
            ..Self::default()
        }
    }

    pub fn with_modifier(mut self, modifier: ModifierKey) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Text the key contributes to a composition, if any.
    pub fn text(&self) -> Option<String> {
        if let Some(s) = &self.key_string {
            return Some(s.clone());
        }
        self.key_code
            .and_then(char::from_u32)
            .map(|c| c.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchAction {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPosition {
    pub action: TouchAction,
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: u64,
}

/// One stroke on a software keyboard key, forwarded for touch-aware correction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub source_id: u32,
    pub stroke: Vec<TouchPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputFieldType {
    Normal,
    Password,
    Tel,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageEvent {
    KeyboardOpened,
    KeyboardClosed,
    CandidateWindowExpanded,
    LayoutAdjusted,
}

/// Commands that act on the current composition of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    Submit,
    SubmitCandidate { id: i32, row: Option<u32> },
    SwitchInputMode { mode: CompositionMode },
    ResetContext,
    MoveCursor { position: u32 },
    ConvertNextPage,
    ConvertPrevPage,
    SwitchInputFieldType { field_type: InputFieldType },
    UndoOrRewind,
    ExpandSuggestion,
    UsageEvent { event: UsageEvent },
}

// ---------------------------------------------------------------------------
// Request / config
// ---------------------------------------------------------------------------

/// Per-session feature flags negotiated with the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub mixed_conversion: Option<bool>,
    pub zero_query_suggestion: Option<bool>,
    pub update_input_mode_from_surrounding_text: Option<bool>,
    pub kana_modifier_insensitive_conversion: Option<bool>,
    pub auto_partial_suggestion: Option<bool>,
    pub keyboard_name: Option<String>,
    pub candidate_page_size: Option<u32>,
}

impl Request {
    /// Fields set in `other` override ours; unset fields leave ours intact.
    pub fn merge_from(&mut self, other: &Request) {
        merge_field(&mut self.mixed_conversion, &other.mixed_conversion);
        merge_field(&mut self.zero_query_suggestion, &other.zero_query_suggestion);
        merge_field(
            &mut self.update_input_mode_from_surrounding_text,
            &other.update_input_mode_from_surrounding_text,
        );
        merge_field(
            &mut self.kana_modifier_insensitive_conversion,
            &other.kana_modifier_insensitive_conversion,
        );
        merge_field(
            &mut self.auto_partial_suggestion,
            &other.auto_partial_suggestion,
        );
        merge_field(&mut self.keyboard_name, &other.keyboard_name);
        merge_field(&mut self.candidate_page_size, &other.candidate_page_size);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreeditMethod {
    Romaji,
    Kana,
}

/// Engine-wide configuration (not bound to a session).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub preedit_method: Option<PreeditMethod>,
    pub use_history_suggest: Option<bool>,
    pub use_dictionary_suggest: Option<bool>,
    pub suggestions_size: Option<u32>,
    pub incognito_mode: Option<bool>,
}

impl Config {
    pub fn merge_from(&mut self, other: &Config) {
        merge_field(&mut self.preedit_method, &other.preedit_method);
        merge_field(&mut self.use_history_suggest, &other.use_history_suggest);
        merge_field(
            &mut self.use_dictionary_suggest,
            &other.use_dictionary_suggest,
        );
        merge_field(&mut self.suggestions_size, &other.suggestions_size);
        merge_field(&mut self.incognito_mode, &other.incognito_mode);
    }
}

fn merge_field<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(v) = src {
        *dst = Some(v.clone());
    }
}

// ---------------------------------------------------------------------------
// Storage / user dictionary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    SymbolHistory,
    EmoticonHistory,
    EmojiHistory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub storage: StorageType,
    pub key: String,
    pub values: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserDictionaryCommand {
    CreateDictionary { name: String },
    DeleteDictionary { name: String },
    AddEntry {
        dictionary: String,
        reading: String,
        word: String,
    },
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DictionaryStatus {
    Ok,
    UnknownDictionary,
    DuplicateName,
    DuplicateEntry,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputKind {
    CreateSession { capabilities: Vec<Capability> },
    DeleteSession,
    SendKey { key: KeyEvent },
    SendCommand { command: SessionCommand },
    SetRequest { request: Request },
    SetConfig { config: Config },
    SetImposedConfig { config: Config },
    GetConfig,
    InsertToStorage { entry: StorageEntry },
    ReadAllFromStorage { storage: StorageType },
    ClearStorage { storage: StorageType },
    ClearUserHistory,
    ClearUserPrediction,
    ClearUnusedUserPrediction,
    Reload,
    SyncData,
    SendUserDictionaryCommand { command: UserDictionaryCommand },
    NoOperation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: Option<SessionId>,
    pub kind: InputKind,
    pub touch_events: Vec<TouchEvent>,
}

impl Input {
    pub fn new(kind: InputKind) -> Self {
        Self {
            id: None,
            kind,
            touch_events: Vec::new(),
        }
    }

    pub fn send_key(key: KeyEvent) -> Self {
        Self::new(InputKind::SendKey { key })
    }

    pub fn send_command(command: SessionCommand) -> Self {
        Self::new(InputKind::SendCommand { command })
    }

    pub fn with_touch_events(mut self, touch_events: Vec<TouchEvent>) -> Self {
        self.touch_events = touch_events;
        self
    }

    pub fn command_type(&self) -> CommandType {
        match &self.kind {
            InputKind::CreateSession { .. } => CommandType::CreateSession,
            InputKind::DeleteSession => CommandType::DeleteSession,
            InputKind::SendKey { .. } => CommandType::SendKey,
            InputKind::SendCommand { .. } => CommandType::SendCommand,
            InputKind::SetRequest { .. } => CommandType::SetRequest,
            InputKind::SetConfig { .. } => CommandType::SetConfig,
            InputKind::SetImposedConfig { .. } => CommandType::SetImposedConfig,
            InputKind::GetConfig => CommandType::GetConfig,
            InputKind::InsertToStorage { .. } => CommandType::InsertToStorage,
            InputKind::ReadAllFromStorage { .. } => CommandType::ReadAllFromStorage,
            InputKind::ClearStorage { .. } => CommandType::ClearStorage,
            InputKind::ClearUserHistory => CommandType::ClearUserHistory,
            InputKind::ClearUserPrediction => CommandType::ClearUserPrediction,
            InputKind::ClearUnusedUserPrediction => CommandType::ClearUnusedUserPrediction,
            InputKind::Reload => CommandType::Reload,
            InputKind::SyncData => CommandType::SyncData,
            InputKind::SendUserDictionaryCommand { .. } => {
                CommandType::SendUserDictionaryCommand
            }
            InputKind::NoOperation => CommandType::NoOperation,
        }
    }

    pub fn requires_session(&self) -> bool {
        self.command_type().requires_session()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[default]
    Success,
    /// The engine does not know the session id (e.g. it restarted).
    SessionFailure,
    InvalidCommand,
    StorageFailure,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    String,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub kind: ResultKind,
    pub value: String,
}

/// Surrounding-text range to delete, relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRange {
    pub offset: i32,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateWord {
    pub id: i32,
    pub value: String,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateList {
    pub candidates: Vec<CandidateWord>,
    pub focused_index: Option<u32>,
}

impl CandidateList {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub id: Option<SessionId>,
    pub consumed: bool,
    pub error_code: ErrorCode,
    pub result: Option<CommitResult>,
    pub deletion_range: Option<DeletionRange>,
    pub candidate_list: Option<CandidateList>,
    pub mode: Option<CompositionMode>,
    pub config: Option<Config>,
    pub storage_entry: Option<StorageEntry>,
    pub dictionary_status: Option<DictionaryStatus>,
}

impl Output {
    pub fn with_error(error_code: ErrorCode) -> Self {
        Self {
            error_code,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code == ErrorCode::Success
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub input: Input,
    pub output: Output,
}

impl Command {
    pub fn new(input: Input) -> Self {
        Self {
            input,
            output: Output::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_exempt_kinds() {
        assert!(!CommandType::SetConfig.requires_session());
        assert!(!CommandType::SetImposedConfig.requires_session());
        assert!(!CommandType::GetConfig.requires_session());
        assert!(!CommandType::CreateSession.requires_session());
        assert!(CommandType::SendKey.requires_session());
        assert!(CommandType::NoOperation.requires_session());
        assert!(CommandType::DeleteSession.requires_session());
    }

    #[test]
    fn test_request_merge_overrides_only_set_fields() {
        let mut base = Request {
            mixed_conversion: Some(true),
            keyboard_name: Some("qwerty".to_string()),
            ..Request::default()
        };
        let diff = Request {
            keyboard_name: Some("12keys".to_string()),
            candidate_page_size: Some(9),
            ..Request::default()
        };
        base.merge_from(&diff);
        assert_eq!(base.mixed_conversion, Some(true));
        assert_eq!(base.keyboard_name.as_deref(), Some("12keys"));
        assert_eq!(base.candidate_page_size, Some(9));
    }

    #[test]
    fn test_key_event_text() {
        assert_eq!(KeyEvent::character('a').text().as_deref(), Some("a"));
        assert_eq!(KeyEvent::special(SpecialKey::Enter).text(), None);
        let k = KeyEvent {
            key_string: Some("か".to_string()),
            key_code: Some(u32::from('k')),
            ..KeyEvent::default()
        };
        assert_eq!(k.text().as_deref(), Some("か"));
    }
}

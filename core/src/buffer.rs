//! Keystroke-driven buffer state machine.
//!
//! Consumes translated key input one event at a time, keeps the word under
//! composition, runs searches through a [`SuggestionProvider`] and returns
//! the resulting [`BufferAction`]s for the caller to carry out. The machine
//! itself performs no I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::candidate::{clamp_suggestion_count, selection_index, SuggestionList};
use crate::index::LanguageIndex;
use crate::input_buffer::InputBuffer;
use crate::ranker::Ranking;

/// Status text sent while the buffer is too short to search.
pub const TOO_FEW_CHARACTERS: &str = "too few characters";

/// One translated key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    Backspace,
    Tab,
    Enter,
    /// Escape and explicit newline markers.
    Newline,
    /// A digit pressed with the control modifier while suggestions showed.
    ControlDigit(u8),
    /// Printable text from layout-aware translation.
    Text(String),
}

impl KeyInput {
    /// Map the single-character control markers (`\b`, `\t`, `\r`, `\n`)
    /// and plain text to key input.
    pub fn from_marker(s: &str) -> Option<Self> {
        match s {
            "" => None,
            "\u{8}" => Some(KeyInput::Backspace),
            "\t" => Some(KeyInput::Tab),
            "\r" => Some(KeyInput::Enter),
            "\n" | "\u{1b}" => Some(KeyInput::Newline),
            other => Some(KeyInput::Text(other.to_string())),
        }
    }
}

/// Which suggestion to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Selection number, interpreted with the start-at-one setting.
    Index(usize),
    /// A literal word chosen by the presentation client.
    Word(String),
}

/// Effects requested by the state machine, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferAction {
    /// Show (or, when empty, clear) the suggestion surface.
    Suggest(SuggestionList),
    Close,
    Status(String),
    /// Some languages failed during the search.
    SearchFailed(String),
    /// Type `text` into the focused application.
    Inject {
        text: String,
        release_modifier: bool,
    },
}

/// Search backend used by the state machine.
pub trait SuggestionProvider {
    fn suggest(&self, prefix: &str, ignore_accent: bool, max_count: usize) -> Ranking;
}

impl SuggestionProvider for LanguageIndex {
    fn suggest(&self, prefix: &str, ignore_accent: bool, max_count: usize) -> Ranking {
        self.get_suggestions(prefix, ignore_accent, max_count)
    }
}

impl<T: SuggestionProvider + ?Sized> SuggestionProvider for Arc<T> {
    fn suggest(&self, prefix: &str, ignore_accent: bool, max_count: usize) -> Ranking {
        (**self).suggest(prefix, ignore_accent, max_count)
    }
}

/// Settings the state machine reads on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    pub max_suggestions: usize,
    pub start_at_one: bool,
    pub ignore_accent: bool,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            max_suggestions: 5,
            start_at_one: true,
            ignore_accent: false,
        }
    }
}

pub struct BufferStateMachine<P> {
    provider: P,
    buffer: InputBuffer,
    last: SuggestionList,
    showing: Arc<AtomicBool>,
    options: BufferOptions,
}

impl<P: SuggestionProvider> BufferStateMachine<P> {
    pub fn new(provider: P, options: BufferOptions) -> Self {
        Self {
            provider,
            buffer: InputBuffer::new(),
            last: SuggestionList::default(),
            showing: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    /// Flag shared with the capture hook, true while suggestions are shown.
    pub fn showing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.showing)
    }

    pub fn is_showing(&self) -> bool {
        self.showing.load(Ordering::Acquire)
    }

    fn set_showing(&self, showing: bool) {
        self.showing.store(showing, Ordering::Release);
    }

    pub fn buffer(&self) -> &str {
        self.buffer.text()
    }

    pub fn last_suggestions(&self) -> &SuggestionList {
        &self.last
    }

    pub fn options(&self) -> BufferOptions {
        self.options
    }

    pub fn set_options(&mut self, options: BufferOptions) {
        self.options = BufferOptions {
            max_suggestions: clamp_suggestion_count(options.max_suggestions),
            ..options
        };
    }

    /// Apply one key event.
    pub fn process_key(&mut self, key: KeyInput) -> Vec<BufferAction> {
        let mut actions = Vec::new();
        match key {
            KeyInput::Backspace => self.buffer.backspace(),
            KeyInput::Tab | KeyInput::Enter | KeyInput::Newline => self.boundary(&mut actions),
            KeyInput::Text(text) if text.is_empty() => return actions,
            KeyInput::Text(text) if text.chars().all(char::is_whitespace) => {
                self.boundary(&mut actions)
            }
            KeyInput::Text(text) => self.buffer.push_str(&text),
            KeyInput::ControlDigit(digit) => {
                self.accept(Selection::Index(digit as usize), true, &mut actions);
            }
        }
        debug!(buffer = self.buffer.text(), "buffer updated");
        self.after_mutation(&mut actions);
        actions
    }

    /// Accept a suggestion chosen by the presentation client.
    pub fn select(&mut self, selection: Selection) -> Vec<BufferAction> {
        let mut actions = Vec::new();
        self.accept(selection, false, &mut actions);
        self.after_mutation(&mut actions);
        actions
    }

    /// Forget the buffer and the last suggestions.
    pub fn reset(&mut self) -> Vec<BufferAction> {
        let mut actions = Vec::new();
        self.boundary(&mut actions);
        actions
    }

    fn boundary(&mut self, actions: &mut Vec<BufferAction>) {
        self.buffer.clear();
        self.last.clear();
        self.set_showing(false);
        actions.push(BufferAction::Close);
    }

    fn accept(&mut self, selection: Selection, via_control: bool, actions: &mut Vec<BufferAction>) {
        let word = match selection {
            Selection::Index(number) => {
                match self.last.resolve(number, self.options.start_at_one) {
                    Some(word) => Some(word.text.clone()),
                    None => {
                        warn!(
                            index = selection_index(number, self.options.start_at_one),
                            available = self.last.len(),
                            "invalid suggestion index"
                        );
                        None
                    }
                }
            }
            Selection::Word(word) => Some(word),
        };

        let injection = word.map(|word| {
            info!("accepted suggestion");
            debug!(word = %word, "accepted word");
            BufferAction::Inject {
                text: self.buffer.completion_for(&word),
                release_modifier: via_control,
            }
        });

        self.boundary(actions);
        if let Some(injection) = injection {
            actions.push(injection);
        }
    }

    fn after_mutation(&mut self, actions: &mut Vec<BufferAction>) {
        if self.buffer.char_len() > 1 && !self.buffer.is_blank() {
            let ranking = self.provider.suggest(
                self.buffer.text(),
                self.options.ignore_accent,
                self.options.max_suggestions,
            );
            for (language, error) in &ranking.failures {
                actions.push(BufferAction::SearchFailed(format!("{language}: {error}")));
            }
            self.last = ranking.suggestions;
            self.set_showing(!self.last.is_empty());
            actions.push(BufferAction::Suggest(self.last.clone()));
        } else {
            actions.push(BufferAction::Status(TOO_FEW_CHARACTERS.to_string()));
            if self.is_showing() {
                self.last.clear();
                self.set_showing(false);
                actions.push(BufferAction::Close);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Word;
    use crate::error::CoreError;
    use std::cell::RefCell;

    /// Provider returning words from a fixed list and recording prefixes.
    struct Fixed {
        words: Vec<Word>,
        queries: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Fixed {
        fn new(words: &[(&str, u64)]) -> Self {
            Fixed {
                words: words.iter().map(|(w, f)| Word::new(*w, *f)).collect(),
                queries: RefCell::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl SuggestionProvider for Fixed {
        fn suggest(&self, prefix: &str, _ignore_accent: bool, max_count: usize) -> Ranking {
            self.queries.borrow_mut().push(prefix.to_string());
            let mut ranking = Ranking {
                suggestions: SuggestionList::from_words(
                    self.words.iter().filter(|w| w.text.starts_with(prefix)).cloned(),
                    max_count,
                ),
                failures: Vec::new(),
            };
            if self.fail {
                ranking
                    .failures
                    .push(("broken".to_string(), CoreError::NotReady("broken".to_string())));
            }
            ranking
        }
    }

    fn machine(words: &[(&str, u64)]) -> BufferStateMachine<Fixed> {
        BufferStateMachine::new(Fixed::new(words), BufferOptions::default())
    }

    fn text(s: &str) -> KeyInput {
        KeyInput::Text(s.to_string())
    }

    #[test]
    fn enter_clears_buffer() {
        let mut m = machine(&[("cat", 50)]);
        for k in ["c", "a", "t"] {
            m.process_key(text(k));
        }
        assert_eq!(m.buffer(), "cat");
        let actions = m.process_key(KeyInput::Enter);
        assert_eq!(m.buffer(), "");
        assert_eq!(actions[0], BufferAction::Close);
        assert!(!m.is_showing());
    }

    #[test]
    fn backspace_on_single_char_empties() {
        let mut m = machine(&[]);
        m.process_key(text("c"));
        m.process_key(KeyInput::Backspace);
        assert_eq!(m.buffer(), "");
        m.process_key(KeyInput::Backspace);
        assert_eq!(m.buffer(), "");
    }

    #[test]
    fn search_runs_only_past_one_character() {
        let mut m = machine(&[("cat", 50), ("car", 5)]);
        let actions = m.process_key(text("c"));
        assert_eq!(
            actions,
            vec![BufferAction::Status(TOO_FEW_CHARACTERS.to_string())]
        );

        let actions = m.process_key(text("a"));
        match &actions[..] {
            [BufferAction::Suggest(list)] => assert_eq!(list.len(), 2),
            other => panic!("unexpected actions {other:?}"),
        }
        assert!(m.is_showing());
        assert_eq!(m.provider.queries.borrow().as_slice(), &["ca".to_string()]);
    }

    #[test]
    fn empty_result_is_still_emitted() {
        let mut m = machine(&[("cat", 50)]);
        m.process_key(text("x"));
        let actions = m.process_key(text("y"));
        assert_eq!(actions, vec![BufferAction::Suggest(SuggestionList::with_capacity(5))]);
        assert!(!m.is_showing());
    }

    #[test]
    fn shrinking_below_two_closes_open_list() {
        let mut m = machine(&[("cat", 50)]);
        m.process_key(text("c"));
        m.process_key(text("a"));
        let actions = m.process_key(KeyInput::Backspace);
        assert_eq!(
            actions,
            vec![
                BufferAction::Status(TOO_FEW_CHARACTERS.to_string()),
                BufferAction::Close
            ]
        );
    }

    #[test]
    fn control_digit_accepts_one_based() {
        let mut m = machine(&[("cat", 50), ("car", 5)]);
        m.process_key(text("c"));
        m.process_key(text("a"));
        let actions = m.process_key(KeyInput::ControlDigit(2));
        assert!(actions.contains(&BufferAction::Inject {
            text: "r".to_string(),
            release_modifier: true
        }));
        assert_eq!(m.buffer(), "");
        assert!(!m.is_showing());
    }

    #[test]
    fn zero_based_numbering() {
        let mut m = machine(&[("cat", 50), ("car", 5)]);
        m.set_options(BufferOptions {
            start_at_one: false,
            ..BufferOptions::default()
        });
        m.process_key(text("c"));
        m.process_key(text("a"));
        let actions = m.process_key(KeyInput::ControlDigit(0));
        assert!(actions.contains(&BufferAction::Inject {
            text: "t".to_string(),
            release_modifier: true
        }));
    }

    #[test]
    fn invalid_index_injects_nothing() {
        let mut m = machine(&[("cat", 50)]);
        m.process_key(text("c"));
        m.process_key(text("a"));
        let actions = m.process_key(KeyInput::ControlDigit(7));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, BufferAction::Inject { .. })));
        assert_eq!(m.buffer(), "");
    }

    #[test]
    fn literal_selection_bypasses_list() {
        let mut m = machine(&[]);
        m.process_key(text("h"));
        m.process_key(text("á"));
        let actions = m.select(Selection::Word("ház".to_string()));
        assert!(actions.contains(&BufferAction::Inject {
            text: "z".to_string(),
            release_modifier: false
        }));
    }

    #[test]
    fn space_is_a_boundary() {
        let mut m = machine(&[]);
        m.process_key(text("a"));
        m.process_key(text("b"));
        m.process_key(text(" "));
        assert_eq!(m.buffer(), "");
    }

    #[test]
    fn failures_are_reported() {
        let mut m = machine(&[("cat", 1)]);
        m.provider.fail = true;
        m.process_key(text("c"));
        let actions = m.process_key(text("a"));
        assert!(matches!(actions[0], BufferAction::SearchFailed(_)));
        assert!(matches!(actions[1], BufferAction::Suggest(_)));
    }

    #[test]
    fn markers_map_to_keys() {
        assert_eq!(KeyInput::from_marker("\u{8}"), Some(KeyInput::Backspace));
        assert_eq!(KeyInput::from_marker("\r"), Some(KeyInput::Enter));
        assert_eq!(KeyInput::from_marker("\n"), Some(KeyInput::Newline));
        assert_eq!(KeyInput::from_marker(""), None);
        assert_eq!(KeyInput::from_marker("é"), Some(KeyInput::Text("é".into())));
    }
}

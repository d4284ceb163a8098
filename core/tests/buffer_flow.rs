// core/tests/buffer_flow.rs
//
// Integration tests driving the buffer state machine against a real
// language index.

use std::sync::Arc;

use quicktype_core::{
    BufferAction, BufferOptions, BufferStateMachine, KeyInput, LanguageDefinition, LanguageIndex,
    StorageKind, WordSource,
};

fn index(dir: &std::path::Path) -> Arc<LanguageIndex> {
    let index = LanguageIndex::new(dir);
    index
        .load(
            LanguageDefinition {
                name: "pets".to_string(),
                priority: 1,
                accents: None,
                storage: StorageKind::Hybrid,
                frequency_threshold: 10,
                source: WordSource::Embedded {
                    name: "pets",
                    data: "word,freq\ncat,50\ncar,5\ncattle,20\n",
                },
                builtin: false,
            },
            false,
        )
        .unwrap();
    Arc::new(index)
}

fn keys(s: &str) -> Vec<KeyInput> {
    s.chars()
        .filter_map(|c| KeyInput::from_marker(&c.to_string()))
        .collect()
}

#[test]
fn typing_cat_then_enter_empties_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let mut machine = BufferStateMachine::new(index(dir.path()), BufferOptions::default());

    for key in keys("cat\r") {
        machine.process_key(key);
    }
    assert_eq!(machine.buffer(), "");
}

#[test]
fn single_char_backspace_never_underflows() {
    let dir = tempfile::tempdir().unwrap();
    let mut machine = BufferStateMachine::new(index(dir.path()), BufferOptions::default());
    for key in keys("c\u{8}\u{8}\u{8}") {
        machine.process_key(key);
    }
    assert_eq!(machine.buffer(), "");
}

#[test]
fn accept_injects_remaining_characters() {
    let dir = tempfile::tempdir().unwrap();
    let mut machine = BufferStateMachine::new(index(dir.path()), BufferOptions::default());
    let mut last = Vec::new();
    for key in keys("cat") {
        last = machine.process_key(key);
    }
    match last.last() {
        Some(BufferAction::Suggest(list)) => {
            let texts: Vec<&str> = list.words().iter().map(|w| w.text.as_str()).collect();
            assert_eq!(texts, vec!["cat", "cattle"]);
        }
        other => panic!("expected suggestions, got {other:?}"),
    }

    let actions = machine.process_key(KeyInput::ControlDigit(2));
    assert!(actions.contains(&BufferAction::Inject {
        text: "tle".to_string(),
        release_modifier: true,
    }));
    assert!(!machine.is_showing());
}

// core/tests/ranking_merge.rs
//
// Integration tests for merging suggestions across loaded languages.

use quicktype_core::{LanguageDefinition, LanguageIndex, StorageKind, WordSource};

fn definition(name: &'static str, priority: i32, data: &'static str) -> LanguageDefinition {
    LanguageDefinition {
        name: name.to_string(),
        priority,
        accents: None,
        storage: StorageKind::Hybrid,
        frequency_threshold: 10,
        source: WordSource::Embedded { name, data },
        builtin: false,
    }
}

#[test]
fn duplicate_word_is_attributed_to_higher_priority_language() {
    let dir = tempfile::tempdir().unwrap();
    let index = LanguageIndex::new(dir.path());
    index
        .load(definition("ten", 10, "word,freq\ncat,12\n"), false)
        .unwrap();
    index
        .load(definition("five", 5, "word,freq\ncat,80\ncattle,40\n"), false)
        .unwrap();

    let ranking = index.get_suggestions("cat", false, 5);
    let words = ranking.suggestions.words();
    assert_eq!(words.iter().filter(|w| w.text == "cat").count(), 1);
    assert_eq!(words[0].text, "cat");
    assert_eq!(words[0].frequency, 12);
    assert_eq!(words[1].text, "cattle");
}

#[test]
fn max_count_caps_the_merge() {
    let dir = tempfile::tempdir().unwrap();
    let index = LanguageIndex::new(dir.path());
    index
        .load(definition("a", 2, "word,freq\nab,50\nabc,40\nabd,30\n"), false)
        .unwrap();
    index
        .load(definition("b", 1, "word,freq\nabe,90\n"), false)
        .unwrap();

    let ranking = index.get_suggestions("ab", false, 2);
    assert_eq!(ranking.suggestions.len(), 2);
    assert!(!ranking.suggestions.contains("abe"));
}

#[test]
fn memory_only_and_hybrid_mix() {
    let dir = tempfile::tempdir().unwrap();
    let index = LanguageIndex::new(dir.path());
    let mut memory = definition("mem", 1, "word,freq\nzebra,2\n");
    memory.storage = StorageKind::MemoryOnly;
    index.load(memory, false).unwrap();
    index
        .load(definition("hyb", 3, "word,freq\nzeal,7\n"), false)
        .unwrap();

    let ranking = index.get_suggestions("ze", false, 5);
    let texts: Vec<&str> = ranking
        .suggestions
        .words()
        .iter()
        .map(|w| w.text.as_str())
        .collect();
    assert_eq!(texts, vec!["zeal", "zebra"]);
}

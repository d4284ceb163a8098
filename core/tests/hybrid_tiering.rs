// core/tests/hybrid_tiering.rs
//
// Integration tests for the two-tier index.
//
// Tests cover:
// - hot/cold split at the frequency threshold
// - memory-first search topped up from the store
// - built-in languages loading from their embedded wordlists

use quicktype_core::{
    BuiltinLanguage, HybridIndex, Language, MemoryTrie, Word, WordSource,
};

#[test]
fn threshold_ten_keeps_only_cat_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let index = HybridIndex::open(
        "pets",
        &dir.path().join("pets.redb"),
        10,
        WordSource::Embedded {
            name: "pets",
            data: "word,freq\ncat,50\ncar,5\n",
        },
        false,
    )
    .unwrap();

    assert!(index.is_hot("cat"));
    assert!(!index.is_hot("car"));
    assert_eq!(index.hot_len(), 1);

    let words = index.search_by_prefix("ca", false, 5, None).unwrap();
    assert_eq!(words, vec![Word::new("cat", 50), Word::new("car", 5)]);
}

#[test]
fn memory_trie_results_are_prefixed_and_sorted() {
    let mut trie = MemoryTrie::new();
    let corpus = [
        ("house", 40),
        ("horse", 12),
        ("hose", 12),
        ("home", 90),
        ("hot", 3),
        ("cat", 1),
    ];
    for (w, f) in corpus {
        trie.insert(w, f);
    }
    trie.insert("hot", 30);

    for prefix in ["h", "ho", "hou", "x", ""] {
        let words = trie.search_by_prefix(prefix, false, usize::MAX, None);
        assert!(words.iter().all(|w| w.text.starts_with(prefix)));
        assert!(words.windows(2).all(|p| p[0].frequency >= p[1].frequency));
    }
    let hot: Vec<_> = trie
        .search_by_prefix("hot", false, usize::MAX, None)
        .into_iter()
        .collect();
    assert_eq!(hot, vec![Word::new("hot", 30)]);
}

#[test]
fn builtin_languages_load_from_embedded_lists() {
    let dir = tempfile::tempdir().unwrap();
    for builtin in BuiltinLanguage::ALL {
        let language = Language::load(builtin.definition(1), dir.path(), false).unwrap();
        assert_eq!(language.name(), builtin.name());
        assert!(language.store_path().unwrap().exists());
    }

    let english = Language::load(BuiltinLanguage::English.definition(1), dir.path(), false).unwrap();
    let words = english.search("th", false, 3).unwrap();
    assert_eq!(words.first().map(|w| w.text.as_str()), Some("the"));
}

#[test]
fn hungarian_accent_folding_finds_all_variants() {
    let dir = tempfile::tempdir().unwrap();
    let hungarian =
        Language::load(BuiltinLanguage::Hungarian.definition(1), dir.path(), false).unwrap();

    let words = hungarian.search("or", true, 10).unwrap();
    let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
    assert!(texts.contains(&"orvos"));
    assert!(texts.contains(&"ország"));
    assert!(texts.contains(&"óra"));
    assert!(texts.contains(&"örök"));

    let exact = hungarian.search("or", false, 10).unwrap();
    assert!(exact.iter().all(|w| w.text.starts_with("or")));
}

/// In-memory prefix tree mapping words to frequencies (the "hot tier").
use std::collections::BTreeMap;

use crate::accent::AccentMap;
use crate::candidate::Word;

/// A node of the prefix tree.
///
/// Children are kept in a `BTreeMap` so enumeration order, and therefore the
/// tie-break between equal frequencies, is the same on every run.
#[derive(Debug, Default)]
pub struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    is_end: bool,
    /// Valid only when `is_end` is true.
    frequency: u64,
}

impl TrieNode {
    pub fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            is_end: false,
            frequency: 0,
        }
    }

    fn child(&self, ch: char) -> Option<&TrieNode> {
        self.children.get(&ch)
    }

    /// Push every terminal descendant of `self` (including itself) onto `out`.
    /// `word` holds the path from the root to `self` and is restored on return.
    fn collect(&self, word: &mut String, out: &mut Vec<Word>) {
        if self.is_end {
            out.push(Word::new(word.clone(), self.frequency));
        }
        for (ch, child) in self.children.iter() {
            word.push(*ch);
            child.collect(word, out);
            word.pop();
        }
    }

    /// Walk `rest` trying each accent alternative, then collect below every
    /// node reached. `matched` accumulates the characters actually followed.
    fn collect_folded(
        &self,
        rest: &[char],
        accents: &AccentMap,
        matched: &mut String,
        out: &mut Vec<Word>,
    ) {
        let Some((&ch, tail)) = rest.split_first() else {
            self.collect(matched, out);
            return;
        };
        for alt in accents.alternatives(ch) {
            if let Some(child) = self.child(alt) {
                matched.push(alt);
                child.collect_folded(tail, accents, matched, out);
                matched.pop();
            }
        }
    }
}

/// Prefix tree owning its whole node graph.
///
/// # Example
/// ```
/// use quicktype_core::trie::MemoryTrie;
///
/// let mut trie = MemoryTrie::new();
/// trie.insert("cat", 50);
/// trie.insert("car", 5);
///
/// let words = trie.search_by_prefix("ca", false, 5, None);
/// assert_eq!(words[0].text, "cat");
/// assert_eq!(words.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MemoryTrie {
    root: TrieNode,
    len: usize,
}

impl MemoryTrie {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            len: 0,
        }
    }

    /// Insert a word, overwriting the frequency if it is already present.
    pub fn insert(&mut self, word: &str, frequency: u64) {
        let mut node = &mut self.root;
        for ch in word.chars() {
            node = node.children.entry(ch).or_default();
        }
        if !node.is_end {
            self.len += 1;
        }
        node.is_end = true;
        node.frequency = frequency;
    }

    /// Frequency of an exact word, if present.
    pub fn frequency(&self, word: &str) -> Option<u64> {
        let mut node = &self.root;
        for ch in word.chars() {
            node = node.child(ch)?;
        }
        node.is_end.then_some(node.frequency)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.frequency(word).is_some()
    }

    /// Number of distinct words stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.root = TrieNode::new();
        self.len = 0;
    }

    /// Return up to `amount` words starting with `prefix`, highest frequency
    /// first.
    ///
    /// With `ignore_accent` and an accent map, each prefix character also
    /// matches its accented alternatives and the returned words carry the
    /// characters actually matched. Equal frequencies keep traversal order.
    pub fn search_by_prefix(
        &self,
        prefix: &str,
        ignore_accent: bool,
        amount: usize,
        accents: Option<&AccentMap>,
    ) -> Vec<Word> {
        let mut result = Vec::new();
        if amount == 0 {
            return result;
        }

        match accents {
            Some(accents) if ignore_accent => {
                let chars: Vec<char> = prefix.chars().collect();
                let mut matched = String::with_capacity(prefix.len());
                self.root
                    .collect_folded(&chars, accents, &mut matched, &mut result);
            }
            _ => {
                let mut node = &self.root;
                for ch in prefix.chars() {
                    match node.child(ch) {
                        Some(child) => node = child,
                        None => return result,
                    }
                }
                let mut word = prefix.to_string();
                node.collect(&mut word, &mut result);
            }
        }

        result.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        result.truncate(amount);
        result
    }
}

//! Suggestion types.
//!
//! This module provides:
//! - `Word`: a single indexed word with its frequency
//! - `SuggestionList`: the bounded, deduplicated list sent to the presentation client

use serde::{Deserialize, Serialize};

/// Smallest and largest number of suggestions a list may hold.
pub const MIN_SUGGESTIONS: usize = 1;
pub const MAX_SUGGESTIONS: usize = 10;

/// A single word with its frequency. Higher frequency ranks first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub frequency: u64,
}

impl Word {
    pub fn new<T: Into<String>>(text: T, frequency: u64) -> Self {
        Word {
            text: text.into(),
            frequency,
        }
    }
}

/// Clamp a requested suggestion count into `[MIN_SUGGESTIONS, MAX_SUGGESTIONS]`.
pub fn clamp_suggestion_count(requested: usize) -> usize {
    requested.clamp(MIN_SUGGESTIONS, MAX_SUGGESTIONS)
}

/// An ordered, deduplicated (by text), length-bounded list of words.
///
/// The list is only meaningful until the next buffer mutation; the buffer
/// state machine replaces it wholesale on every search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionList {
    words: Vec<Word>,
    capacity: usize,
}

impl SuggestionList {
    /// Create an empty list bounded to `capacity` (clamped to 1..=10).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::new(),
            capacity: clamp_suggestion_count(capacity),
        }
    }

    /// Build a list from ranked words, keeping the first occurrence of each
    /// text and stopping at capacity.
    pub fn from_words<I: IntoIterator<Item = Word>>(words: I, capacity: usize) -> Self {
        let mut list = Self::with_capacity(capacity);
        for word in words {
            if list.is_full() {
                break;
            }
            list.push(word);
        }
        list
    }

    /// Append a word. Returns false if the list is full or already holds
    /// a word with the same text.
    pub fn push(&mut self, word: Word) -> bool {
        if self.is_full() || self.contains(&word.text) {
            return false;
        }
        self.words.push(word);
        true
    }

    pub fn contains(&self, text: &str) -> bool {
        self.words.iter().any(|w| w.text == text)
    }

    pub fn is_full(&self) -> bool {
        self.words.len() >= self.capacity
    }

    /// Number of additional words that still fit.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.words.len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn into_words(self) -> Vec<Word> {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Resolve a selection number into a word.
    ///
    /// With `start_at_one` the number is 1-based and `0` wraps to the tenth
    /// position (index 9), matching the digit row layout.
    pub fn resolve(&self, number: usize, start_at_one: bool) -> Option<&Word> {
        self.words.get(selection_index(number, start_at_one))
    }
}

/// Map a pressed digit / selection number to a 0-based list index.
pub fn selection_index(number: usize, start_at_one: bool) -> usize {
    if !start_at_one {
        return number;
    }
    match number {
        0 => MAX_SUGGESTIONS - 1,
        n => n - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(SuggestionList::with_capacity(0).capacity(), 1);
        assert_eq!(SuggestionList::with_capacity(42).capacity(), 10);
        assert_eq!(SuggestionList::with_capacity(5).capacity(), 5);
    }

    #[test]
    fn from_words_dedupes_and_bounds() {
        let list = SuggestionList::from_words(
            vec![
                Word::new("cat", 50),
                Word::new("cat", 7),
                Word::new("car", 5),
                Word::new("cab", 3),
            ],
            2,
        );
        assert_eq!(list.words(), &[Word::new("cat", 50), Word::new("car", 5)]);
        assert!(list.is_full());
        assert_eq!(list.remaining(), 0);
    }

    #[test]
    fn one_based_selection_wraps_zero_to_last() {
        assert_eq!(selection_index(1, true), 0);
        assert_eq!(selection_index(0, true), 9);
        assert_eq!(selection_index(0, false), 0);
        assert_eq!(selection_index(3, false), 3);
    }

    #[test]
    fn resolve_out_of_range_is_none() {
        let list = SuggestionList::from_words(vec![Word::new("alpha", 1)], 5);
        assert_eq!(list.resolve(1, true).map(|w| w.text.as_str()), Some("alpha"));
        assert!(list.resolve(2, true).is_none());
        assert!(list.resolve(0, true).is_none());
    }
}

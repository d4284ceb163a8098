//! The word currently being typed.
//!
//! The buffer is append-only between word boundaries: characters are pushed
//! at the end, backspace drops the last character, and any boundary clears
//! it. Lengths are counted in characters, not bytes.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    text: String,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self {
            text: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when empty or made only of whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    /// Backspace: a buffer of one character or less becomes empty, a longer
    /// one loses its last character.
    pub fn backspace(&mut self) {
        if self.char_len() <= 1 {
            self.text.clear();
        } else {
            self.text.pop();
        }
    }

    /// The part of `word` still to be typed: `word` with the first occurrence
    /// of the buffer removed.
    pub fn completion_for(&self, word: &str) -> String {
        crate::utils::remove_first(word, &self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_backspace() {
        let mut buf = InputBuffer::new();
        buf.push_str("há");
        buf.push_str("z");
        assert_eq!(buf.text(), "ház");
        assert_eq!(buf.char_len(), 3);

        buf.backspace();
        assert_eq!(buf.text(), "há");
        buf.backspace();
        buf.backspace();
        assert!(buf.is_empty());
        buf.backspace();
        assert!(buf.is_empty());
    }

    #[test]
    fn blank_detection() {
        let mut buf = InputBuffer::new();
        assert!(buf.is_blank());
        buf.push_str("  ");
        assert!(buf.is_blank());
        buf.push_str("a");
        assert!(!buf.is_blank());
    }

    #[test]
    fn completion_strips_typed_prefix() {
        let mut buf = InputBuffer::new();
        buf.push_str("ca");
        assert_eq!(buf.completion_for("cat"), "t");
        assert_eq!(buf.completion_for("banana"), "banana");
        buf.clear();
        buf.push_str("an");
        // first occurrence only, wherever it sits
        assert_eq!(buf.completion_for("banana"), "bana");
    }
}

//! quicktype-core
//!
//! Prediction core of the typing assistant: prefix indices, the multi-language
//! ranking merge, the keystroke buffer state machine, user settings and the
//! message model spoken with the presentation client.
//!
//! This crate has no async runtime and performs no OS interaction; the
//! `quicktype-service` crate wires it to the keyboard hook, text injection
//! and the IPC transport.
//!
//! Public API:
//! - `MemoryTrie` - in-memory prefix tree (hot tier)
//! - `PersistentStore` - redb-backed word table (cold tier, source of truth)
//! - `HybridIndex` - memory tier in front of a persistent store
//! - `LanguageIndex` - loaded languages and `get_suggestions`
//! - `BufferStateMachine` - word-under-composition tracking and accept logic
//! - `SettingsStore` - persisted user settings
//! - `IpcMessage` - wire messages

pub mod accent;
pub use accent::{hungarian_accents, AccentMap};
pub mod candidate;
pub use candidate::{clamp_suggestion_count, SuggestionList, Word};
pub mod error;
pub use error::{CoreError, Result};
pub mod trie;
pub use trie::{MemoryTrie, TrieNode};
pub mod source;
pub use source::{LinePattern, WordSource};
pub mod store;
pub use store::PersistentStore;
pub mod hybrid;
pub use hybrid::{HybridIndex, DEFAULT_FREQUENCY_THRESHOLD};
pub mod language;
pub use language::{
    BuiltinLanguage, CustomLanguageDefinition, Language, LanguageDefinition, StorageKind,
};
pub mod ranker;
pub use ranker::{Ranking, SuggestionSource};
pub mod index;
pub use index::LanguageIndex;
pub mod input_buffer;
pub use input_buffer::InputBuffer;
pub mod buffer;
pub use buffer::{
    BufferAction, BufferOptions, BufferStateMachine, KeyInput, Selection, SuggestionProvider,
};
pub mod settings;
pub use settings::{AppSettings, SettingsChanges, SettingsPatch, SettingsStore};
pub mod protocol;
pub use protocol::{CaretRect, IpcMessage, MessageBody};

pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }

    /// Remove the first occurrence of `needle` from `haystack`.
    pub fn remove_first(haystack: &str, needle: &str) -> String {
        if needle.is_empty() {
            return haystack.to_string();
        }
        match haystack.find(needle) {
            Some(at) => {
                let mut out = String::with_capacity(haystack.len() - needle.len());
                out.push_str(&haystack[..at]);
                out.push_str(&haystack[at + needle.len()..]);
                out
            }
            None => haystack.to_string(),
        }
    }

}

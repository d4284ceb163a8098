//! Language definitions and loaded language instances.
//!
//! A [`LanguageDefinition`] describes where a language's words come from and
//! how they are indexed; loading it yields a [`Language`] whose backend is
//! either a [`HybridIndex`] or a memory-only trie.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accent::{hungarian_accents, AccentMap};
use crate::candidate::Word;
use crate::error::{CoreError, Result};
use crate::hybrid::{HybridIndex, DEFAULT_FREQUENCY_THRESHOLD};
use crate::source::{LinePattern, WordSource};
use crate::store::PersistentStore;
use crate::trie::MemoryTrie;

const ENGLISH_WORDS: &str = include_str!("../data/english.csv");
const HUNGARIAN_WORDS: &str = include_str!("../data/hungarian.csv");

/// The two languages shipped with the service. Their names are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinLanguage {
    English,
    Hungarian,
}

impl BuiltinLanguage {
    pub const ALL: [BuiltinLanguage; 2] = [BuiltinLanguage::English, BuiltinLanguage::Hungarian];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinLanguage::English => "English",
            BuiltinLanguage::Hungarian => "Hungarian",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn is_reserved(name: &str) -> bool {
        Self::from_name(name).is_some()
    }

    /// Definition of this built-in at the given priority.
    pub fn definition(self, priority: i32) -> LanguageDefinition {
        let (data, accents) = match self {
            BuiltinLanguage::English => (ENGLISH_WORDS, None),
            BuiltinLanguage::Hungarian => (HUNGARIAN_WORDS, Some(hungarian_accents())),
        };
        LanguageDefinition {
            name: self.name().to_string(),
            priority,
            accents,
            storage: StorageKind::Hybrid,
            frequency_threshold: DEFAULT_FREQUENCY_THRESHOLD,
            source: WordSource::Embedded {
                name: self.name(),
                data,
            },
            builtin: true,
        }
    }
}

impl fmt::Display for BuiltinLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a language's words are indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Hybrid,
    MemoryOnly,
}

fn default_threshold() -> Option<u64> {
    Some(DEFAULT_FREQUENCY_THRESHOLD)
}

/// A user-defined language as persisted in settings and sent over IPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomLanguageDefinition {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub has_accents: bool,
    #[serde(default)]
    pub accent_map: AccentMap,
    #[serde(default)]
    pub storage: StorageKind,
    /// Required for hybrid storage.
    #[serde(default = "default_threshold")]
    pub frequency_threshold: Option<u64>,
    pub file_path: PathBuf,
    pub line_pattern: String,
    #[serde(default)]
    pub loaded: bool,
}

impl CustomLanguageDefinition {
    /// Whether both definitions index the same words the same way. Priority,
    /// threshold and the loaded flag can change without a rebuild.
    pub fn same_source(&self, other: &CustomLanguageDefinition) -> bool {
        self.file_path == other.file_path
            && self.line_pattern == other.line_pattern
            && self.storage == other.storage
            && self.has_accents == other.has_accents
            && self.accent_map == other.accent_map
    }

    /// Check the definition and compile it into a loadable form.
    pub fn to_definition(&self) -> Result<LanguageDefinition> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidDefinition("name must not be empty".into()));
        }
        if BuiltinLanguage::is_reserved(name) {
            return Err(CoreError::ReservedName(name.to_string()));
        }
        let frequency_threshold = match (self.storage, self.frequency_threshold) {
            (StorageKind::Hybrid, None) => {
                return Err(CoreError::InvalidDefinition(format!(
                    "'{name}' uses hybrid storage but has no frequency threshold"
                )))
            }
            (_, t) => t.unwrap_or(DEFAULT_FREQUENCY_THRESHOLD),
        };
        let pattern = LinePattern::parse(&self.line_pattern)?;

        let accents = (self.has_accents && !self.accent_map.is_empty())
            .then(|| self.accent_map.clone());

        Ok(LanguageDefinition {
            name: name.to_string(),
            priority: self.priority,
            accents,
            storage: self.storage,
            frequency_threshold,
            source: WordSource::File {
                path: self.file_path.clone(),
                pattern,
            },
            builtin: false,
        })
    }
}

/// Everything needed to load one language.
#[derive(Debug, Clone)]
pub struct LanguageDefinition {
    pub name: String,
    pub priority: i32,
    /// Present only for languages with accents.
    pub accents: Option<AccentMap>,
    pub storage: StorageKind,
    pub frequency_threshold: u64,
    pub source: WordSource,
    pub builtin: bool,
}

/// Pure in-memory backend, reloaded from its source on recreate.
#[derive(Debug)]
pub struct MemoryOnlyIndex {
    trie: RwLock<MemoryTrie>,
    source: WordSource,
}

impl MemoryOnlyIndex {
    pub fn load(source: WordSource) -> Result<Self> {
        let index = MemoryOnlyIndex {
            trie: RwLock::new(MemoryTrie::new()),
            source,
        };
        index.reload()?;
        Ok(index)
    }

    /// Replace the trie with the source's current contents.
    pub fn reload(&self) -> Result<()> {
        let mut fresh = MemoryTrie::new();
        for (word, frequency) in self.source.read_entries()? {
            fresh.insert(&word, frequency);
        }
        *self.trie.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }

    pub fn insert(&self, word: &str, frequency: u64) {
        self.trie
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(word, frequency);
    }

    pub fn len(&self) -> usize {
        self.trie.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn search_by_prefix(
        &self,
        prefix: &str,
        ignore_accent: bool,
        amount: usize,
        accents: Option<&AccentMap>,
    ) -> Vec<Word> {
        self.trie
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .search_by_prefix(prefix, ignore_accent, amount, accents)
    }
}

/// Storage behind a loaded language.
#[derive(Debug)]
pub enum Backend {
    Hybrid(HybridIndex),
    MemoryOnly(MemoryOnlyIndex),
}

/// A loaded, searchable language.
#[derive(Debug)]
pub struct Language {
    name: String,
    priority: AtomicI32,
    accents: Option<AccentMap>,
    builtin: bool,
    backend: Backend,
}

impl Language {
    /// Build the backend for `definition`. Hybrid stores live under
    /// `data_dir/languages/`.
    pub fn load(definition: LanguageDefinition, data_dir: &Path, force_rebuild: bool) -> Result<Self> {
        let LanguageDefinition {
            name,
            priority,
            accents,
            storage,
            frequency_threshold,
            source,
            builtin,
        } = definition;

        let backend = match storage {
            StorageKind::Hybrid => {
                let path = PersistentStore::path_for(data_dir, &name);
                Backend::Hybrid(HybridIndex::open(
                    &name,
                    &path,
                    frequency_threshold,
                    source,
                    force_rebuild,
                )?)
            }
            StorageKind::MemoryOnly => Backend::MemoryOnly(MemoryOnlyIndex::load(source)?),
        };
        info!(language = %name, priority, ?storage, "language loaded");

        Ok(Language {
            name,
            priority: AtomicI32::new(priority),
            accents,
            builtin,
            backend,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::Relaxed)
    }

    pub fn set_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn has_accents(&self) -> bool {
        self.accents.is_some()
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self.backend {
            Backend::Hybrid(_) => StorageKind::Hybrid,
            Backend::MemoryOnly(_) => StorageKind::MemoryOnly,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Prefix search. Accent folding applies only to languages with accents.
    pub fn search(&self, prefix: &str, ignore_accent: bool, amount: usize) -> Result<Vec<Word>> {
        let accents = self.accents.as_ref();
        match &self.backend {
            Backend::Hybrid(index) => index.search_by_prefix(prefix, ignore_accent, amount, accents),
            Backend::MemoryOnly(index) => {
                Ok(index.search_by_prefix(prefix, ignore_accent, amount, accents))
            }
        }
    }

    pub fn insert(&self, word: &str, frequency: u64) -> Result<()> {
        match &self.backend {
            Backend::Hybrid(index) => index.insert(word, frequency),
            Backend::MemoryOnly(index) => {
                index.insert(word, frequency);
                Ok(())
            }
        }
    }

    /// Change the hot/cold split. Memory-only languages have no split.
    pub fn set_frequency_threshold(&self, threshold: u64) -> Result<()> {
        match &self.backend {
            Backend::Hybrid(index) => index.change_frequency_threshold(threshold),
            Backend::MemoryOnly(_) => Ok(()),
        }
    }

    /// Rebuild the language from its original source.
    pub fn recreate(&self) -> Result<()> {
        match &self.backend {
            Backend::Hybrid(index) => index.recreate_database(),
            Backend::MemoryOnly(index) => index.reload(),
        }
    }

    /// Location of the persistent store, if any.
    pub fn store_path(&self) -> Option<PathBuf> {
        match &self.backend {
            Backend::Hybrid(index) => Some(index.store().path().to_path_buf()),
            Backend::MemoryOnly(_) => None,
        }
    }

    /// Release the backend, deleting a persistent store file.
    pub fn destroy(self) -> Result<()> {
        match self.backend {
            Backend::Hybrid(index) => index.destroy(),
            Backend::MemoryOnly(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(name: &str) -> CustomLanguageDefinition {
        CustomLanguageDefinition {
            name: name.to_string(),
            priority: 1,
            has_accents: false,
            accent_map: AccentMap::new(),
            storage: StorageKind::Hybrid,
            frequency_threshold: Some(10),
            file_path: PathBuf::from("words.txt"),
            line_pattern: "{word},{frequency}".to_string(),
            loaded: true,
        }
    }

    #[test]
    fn builtin_names_are_reserved() {
        assert!(BuiltinLanguage::is_reserved("English"));
        assert!(BuiltinLanguage::is_reserved("hungarian"));
        assert!(!BuiltinLanguage::is_reserved("German"));
        assert!(matches!(
            custom("Hungarian").to_definition(),
            Err(CoreError::ReservedName(_))
        ));
    }

    #[test]
    fn hybrid_requires_threshold() {
        let mut def = custom("Klingon");
        def.frequency_threshold = None;
        assert!(matches!(
            def.to_definition(),
            Err(CoreError::InvalidDefinition(_))
        ));
        def.storage = StorageKind::MemoryOnly;
        assert!(def.to_definition().is_ok());
    }

    #[test]
    fn bad_pattern_fails_definition() {
        let mut def = custom("Klingon");
        def.line_pattern = "{word}".to_string();
        assert!(matches!(
            def.to_definition(),
            Err(CoreError::InvalidPattern(_))
        ));
    }

    #[test]
    fn same_source_ignores_ranking_fields() {
        let base = custom("Klingon");
        let mut other = base.clone();
        other.priority = 7;
        other.frequency_threshold = Some(3);
        other.loaded = false;
        assert!(base.same_source(&other));

        other.file_path = PathBuf::from("other.txt");
        assert!(!base.same_source(&other));
        let mut other = base.clone();
        other.has_accents = true;
        assert!(!base.same_source(&other));
    }

    #[test]
    fn older_documents_default_threshold() {
        let json = r#"{"name":"Dothraki","file_path":"d.txt","line_pattern":"{word} {frequency}"}"#;
        let def: CustomLanguageDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.frequency_threshold, Some(10));
        assert_eq!(def.storage, StorageKind::Hybrid);
        assert!(!def.loaded);
    }

    #[test]
    fn builtin_hungarian_has_accents() {
        let def = BuiltinLanguage::Hungarian.definition(3);
        assert!(def.accents.is_some());
        assert!(def.builtin);
        assert!(BuiltinLanguage::English.definition(1).accents.is_none());
    }

    #[test]
    fn memory_only_language_recreates_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "kutya,20\nkert,4\n").unwrap();

        let mut def = custom("Test");
        def.storage = StorageKind::MemoryOnly;
        def.file_path = path.clone();
        let lang = Language::load(def.to_definition().unwrap(), dir.path(), false).unwrap();
        assert_eq!(lang.search("k", false, 5).unwrap().len(), 2);

        std::fs::write(&path, "kutya,20\nkert,4\nkecske,9\n").unwrap();
        lang.recreate().unwrap();
        assert_eq!(lang.search("k", false, 5).unwrap().len(), 3);
        assert_eq!(lang.store_path(), None);
    }

    #[test]
    fn hybrid_language_destroy_removes_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "kutya,20\nkert,4\n").unwrap();

        let mut def = custom("Test");
        def.file_path = path;
        let lang = Language::load(def.to_definition().unwrap(), dir.path(), false).unwrap();
        let store = lang.store_path().unwrap();
        assert!(store.exists());
        lang.destroy().unwrap();
        assert!(!store.exists());
    }
}

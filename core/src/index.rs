//! The set of loaded languages.
//!
//! Searches take a cheap snapshot of the loaded set and never wait on
//! language loading; mutations (load, unload, priority, threshold, recreate,
//! delete) are serialized by one admin lock.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::language::{BuiltinLanguage, Language, LanguageDefinition};
use crate::ranker::{by_priority, rank, Ranking};
use crate::store::PersistentStore;

#[derive(Debug)]
pub struct LanguageIndex {
    data_dir: PathBuf,
    languages: RwLock<Vec<Arc<Language>>>,
    admin: Mutex<()>,
}

impl LanguageIndex {
    /// Create an empty index whose hybrid stores live under `data_dir`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            languages: RwLock::new(Vec::new()),
            admin: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Loaded languages in descending priority order.
    pub fn snapshot(&self) -> Vec<Arc<Language>> {
        let mut langs = self
            .languages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        by_priority(&mut langs);
        langs
    }

    pub fn loaded_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|l| l.name().to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Language>> {
        self.languages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|l| l.name() == name)
            .cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.languages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require(&self, name: &str) -> Result<Arc<Language>> {
        self.get(name)
            .ok_or_else(|| CoreError::UnknownLanguage(name.to_string()))
    }

    fn insert_loaded(&self, language: Language) {
        let mut langs = self.languages.write().unwrap_or_else(PoisonError::into_inner);
        langs.retain(|l| l.name() != language.name());
        langs.push(Arc::new(language));
    }

    /// Load one language. An already loaded language only takes the new
    /// priority.
    pub fn load(&self, definition: LanguageDefinition, force_rebuild: bool) -> Result<()> {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = self.get(&definition.name) {
            existing.set_priority(definition.priority);
            return Ok(());
        }
        let language = Language::load(definition, &self.data_dir, force_rebuild)?;
        self.insert_loaded(language);
        Ok(())
    }

    /// Load several languages concurrently. A failing language does not stop
    /// the others; one result is returned per definition, in input order.
    pub fn load_many(
        &self,
        definitions: Vec<LanguageDefinition>,
        force_rebuild: bool,
    ) -> Vec<(String, Result<()>)> {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);

        let mut pending = Vec::new();
        let mut results: Vec<(String, Option<Result<()>>)> = Vec::new();
        for definition in definitions {
            let name = definition.name.clone();
            if let Some(existing) = self.get(&name) {
                existing.set_priority(definition.priority);
                results.push((name, Some(Ok(()))));
            } else {
                pending.push((results.len(), definition));
                results.push((name, None));
            }
        }

        let loaded: Vec<(usize, Result<Language>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = pending
                .into_iter()
                .map(|(slot, definition)| {
                    let data_dir = self.data_dir.as_path();
                    let handle = scope.spawn(move || {
                        Language::load(definition, data_dir, force_rebuild)
                    });
                    (slot, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(slot, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(CoreError::InvalidDefinition("language loader panicked".into()))
                    });
                    (slot, result)
                })
                .collect()
        });

        for (slot, result) in loaded {
            let outcome = match result {
                Ok(language) => {
                    self.insert_loaded(language);
                    Ok(())
                }
                Err(e) => {
                    warn!(language = %results[slot].0, error = %e, "language failed to load");
                    Err(e)
                }
            };
            results[slot].1 = Some(outcome);
        }

        results
            .into_iter()
            .map(|(name, r)| (name, r.unwrap_or(Ok(()))))
            .collect()
    }

    /// Remove a language from the loaded set. Returns whether it was loaded.
    pub fn unload(&self, name: &str) -> bool {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        self.take(name).is_some()
    }

    fn take(&self, name: &str) -> Option<Arc<Language>> {
        let mut langs = self.languages.write().unwrap_or_else(PoisonError::into_inner);
        let pos = langs.iter().position(|l| l.name() == name)?;
        info!(language = name, "language unloaded");
        Some(langs.remove(pos))
    }

    /// Unload every language whose name is not in `keep`; returns the
    /// unloaded names.
    pub fn retain(&self, keep: &HashSet<String>) -> Vec<String> {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        let mut langs = self.languages.write().unwrap_or_else(PoisonError::into_inner);
        let mut dropped = Vec::new();
        langs.retain(|l| {
            let kept = keep.contains(l.name());
            if !kept {
                dropped.push(l.name().to_string());
            }
            kept
        });
        if !dropped.is_empty() {
            info!(languages = ?dropped, "languages unloaded");
        }
        dropped
    }

    pub fn set_priority(&self, name: &str, priority: i32) -> Result<()> {
        self.require(name)?.set_priority(priority);
        Ok(())
    }

    /// Apply `(name, priority)` pairs; names that are not loaded are skipped.
    pub fn set_priorities(&self, priorities: &[(String, i32)]) {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        for (name, priority) in priorities {
            if let Some(language) = self.get(name) {
                language.set_priority(*priority);
            }
        }
    }

    pub fn set_frequency_threshold(&self, name: &str, threshold: u64) -> Result<()> {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        self.require(name)?.set_frequency_threshold(threshold)
    }

    /// Rebuild a loaded language from its original source.
    pub fn recreate(&self, name: &str) -> Result<()> {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        self.require(name)?.recreate()
    }

    /// Unload a custom language and delete its persistent store.
    pub fn delete_custom(&self, name: &str) -> Result<()> {
        if BuiltinLanguage::is_reserved(name) {
            return Err(CoreError::ReservedName(name.to_string()));
        }
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        let path = PersistentStore::path_for(&self.data_dir, name);

        if let Some(language) = self.take(name) {
            match Arc::try_unwrap(language) {
                Ok(language) => return language.destroy(),
                // a search still holds it; the file goes once we drop ours
                Err(shared) => drop(shared),
            }
        }
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(CoreError::io(path, e)),
            _ => Ok(()),
        }
    }

    /// Merge suggestions for `prefix` across all loaded languages.
    pub fn get_suggestions(&self, prefix: &str, ignore_accent: bool, max_count: usize) -> Ranking {
        let languages = self.snapshot();
        rank(&languages, prefix, ignore_accent, max_count)
    }

    /// Drop every loaded language, closing their stores.
    pub fn clear(&self) {
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        self.languages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::StorageKind;
    use crate::source::WordSource;

    fn embedded(name: &'static str, priority: i32, data: &'static str) -> LanguageDefinition {
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
    fn load_unload_and_names_in_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanguageIndex::new(dir.path());
        index.load(embedded("low", 1, "word,freq\nalpha,3\n"), false).unwrap();
        index.load(embedded("high", 9, "word,freq\nalps,30\n"), false).unwrap();
        assert_eq!(index.loaded_names(), vec!["high", "low"]);

        index.set_priority("low", 20).unwrap();
        assert_eq!(index.loaded_names(), vec!["low", "high"]);

        assert!(index.unload("low"));
        assert!(!index.unload("low"));
        assert_eq!(index.loaded_names(), vec!["high"]);
    }

    #[test]
    fn load_many_reports_each_language() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanguageIndex::new(dir.path());
        let mut broken = embedded("broken", 1, "");
        broken.source = WordSource::File {
            path: dir.path().join("missing.txt"),
            pattern: crate::source::LinePattern::parse("{word},{frequency}").unwrap(),
        };

        let results = index.load_many(
            vec![
                embedded("a", 2, "word,freq\nkutya,4\n"),
                broken,
                embedded("b", 1, "word,freq\nkert,40\n"),
            ],
            false,
        );
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(CoreError::Io { .. })));
        assert!(results[2].1.is_ok());
        assert_eq!(index.loaded_names(), vec!["a", "b"]);
    }

    #[test]
    fn retain_unloads_everything_else() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanguageIndex::new(dir.path());
        index.load(embedded("a", 1, "word,freq\nx1,1\n"), false).unwrap();
        index.load(embedded("b", 1, "word,freq\nx2,1\n"), false).unwrap();
        let keep: HashSet<String> = ["b".to_string()].into_iter().collect();
        assert_eq!(index.retain(&keep), vec!["a"]);
        assert_eq!(index.loaded_names(), vec!["b"]);
    }

    #[test]
    fn operations_on_unknown_language_fail() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanguageIndex::new(dir.path());
        assert!(matches!(
            index.set_frequency_threshold("nope", 3),
            Err(CoreError::UnknownLanguage(_))
        ));
        assert!(matches!(index.recreate("nope"), Err(CoreError::UnknownLanguage(_))));
    }

    #[test]
    fn delete_custom_removes_store() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanguageIndex::new(dir.path());
        index.load(embedded("mine", 1, "word,freq\nszó,12\n"), false).unwrap();
        let path = PersistentStore::path_for(dir.path(), "mine");
        assert!(path.exists());

        index.delete_custom("mine").unwrap();
        assert!(!index.is_loaded("mine"));
        assert!(!path.exists());
        assert!(matches!(
            index.delete_custom("English"),
            Err(CoreError::ReservedName(_))
        ));
    }

    #[test]
    fn suggestions_merge_across_languages() {
        let dir = tempfile::tempdir().unwrap();
        let index = LanguageIndex::new(dir.path());
        index
            .load(embedded("high", 10, "word,freq\ncat,20\ncap,15\n"), false)
            .unwrap();
        index
            .load(embedded("low", 5, "word,freq\ncat,90\ncab,30\n"), false)
            .unwrap();

        let ranking = index.get_suggestions("ca", false, 5);
        assert!(ranking.is_complete());
        let texts: Vec<(&str, u64)> = ranking
            .suggestions
            .words()
            .iter()
            .map(|w| (w.text.as_str(), w.frequency))
            .collect();
        assert_eq!(texts, vec![("cat", 20), ("cap", 15), ("cab", 30)]);
    }
}

//! Two-tier prefix index: a memory trie in front of a persistent store.
//!
//! Rows with frequency strictly above the threshold form the hot tier and are
//! mirrored in memory. The store always holds every row; searches consult the
//! trie first and only fall back to the store's cold rows for the remainder.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::accent::AccentMap;
use crate::candidate::Word;
use crate::error::{CoreError, Result};
use crate::source::WordSource;
use crate::store::PersistentStore;
use crate::trie::MemoryTrie;

/// Default hot/cold split for built-in and legacy custom languages.
pub const DEFAULT_FREQUENCY_THRESHOLD: u64 = 10;

#[derive(Debug)]
struct HotTier {
    trie: MemoryTrie,
    threshold: u64,
}

impl HotTier {
    fn is_hot(&self, frequency: u64) -> bool {
        frequency > self.threshold
    }
}

#[derive(Debug)]
pub struct HybridIndex {
    name: String,
    source: WordSource,
    store: PersistentStore,
    hot: RwLock<HotTier>,
    /// Serializes store mutations (insert, recreate, threshold rebuild).
    mutation: Mutex<()>,
    ready: AtomicBool,
}

impl HybridIndex {
    /// Open the store at `path`, populating it from `source` when it is empty
    /// or `force_rebuild` is set, then fill the hot tier.
    pub fn open(
        name: &str,
        path: &Path,
        threshold: u64,
        source: WordSource,
        force_rebuild: bool,
    ) -> Result<Self> {
        let store = PersistentStore::open(path)?;
        let index = HybridIndex {
            name: name.to_string(),
            source,
            store,
            hot: RwLock::new(HotTier {
                trie: MemoryTrie::new(),
                threshold,
            }),
            mutation: Mutex::new(()),
            ready: AtomicBool::new(false),
        };

        if force_rebuild || index.store.is_empty()? {
            info!(language = name, source = %index.source, "populating persistent store");
            let entries = index.source.read_entries()?;
            index.store.bulk_load(entries)?;
        }

        {
            let mut hot = index.hot.write().unwrap_or_else(PoisonError::into_inner);
            index.fill_from_store(&mut hot)?;
        }
        index.ready.store(true, Ordering::Release);
        Ok(index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn frequency_threshold(&self) -> u64 {
        self.hot.read().unwrap_or_else(PoisonError::into_inner).threshold
    }

    /// Number of words held in the memory tier.
    pub fn hot_len(&self) -> usize {
        self.hot.read().unwrap_or_else(PoisonError::into_inner).trie.len()
    }

    /// Whether `word` currently sits in the memory tier.
    pub fn is_hot(&self, word: &str) -> bool {
        self.hot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .trie
            .contains_word(word)
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CoreError::NotReady(self.name.clone()))
        }
    }

    /// Search the memory tier, then top up from the store's cold rows.
    pub fn search_by_prefix(
        &self,
        prefix: &str,
        ignore_accent: bool,
        amount: usize,
        accents: Option<&AccentMap>,
    ) -> Result<Vec<Word>> {
        self.ensure_ready()?;
        let hot = self.hot.read().unwrap_or_else(PoisonError::into_inner);

        let mut result = hot.trie.search_by_prefix(prefix, ignore_accent, amount, accents);
        if result.len() >= amount {
            return Ok(result);
        }

        let prefixes = match accents {
            Some(map) if ignore_accent => self.store.existing_variants(prefix, map)?,
            _ => vec![prefix.to_string()],
        };
        let found: HashSet<String> = result.iter().map(|w| w.text.clone()).collect();
        let cold = self.store.query_by_prefix(
            &prefixes,
            &found,
            Some(hot.threshold),
            amount - result.len(),
        )?;
        result.extend(cold);
        Ok(result)
    }

    /// Write a word to the store; mirror it in memory when it is hot.
    /// An already stored word is left untouched.
    pub fn insert(&self, word: &str, frequency: u64) -> Result<()> {
        self.ensure_ready()?;
        let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.store.insert(word, frequency)? {
            return Ok(());
        }
        let mut hot = self.hot.write().unwrap_or_else(PoisonError::into_inner);
        if hot.is_hot(frequency) {
            hot.trie.insert(word, frequency);
        }
        Ok(())
    }

    /// Rebuild the memory tier under a new threshold. No-op if unchanged.
    /// Searches on this index wait for the rebuild to finish.
    pub fn change_frequency_threshold(&self, threshold: u64) -> Result<()> {
        let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
        let mut hot = self.hot.write().unwrap_or_else(PoisonError::into_inner);
        if hot.threshold == threshold {
            return Ok(());
        }
        debug!(language = %self.name, from = hot.threshold, to = threshold, "changing frequency threshold");
        hot.threshold = threshold;
        self.fill_from_store(&mut hot)
    }

    /// Drop and repopulate the store from the original source, then rebuild
    /// the memory tier. Searches fail with `NotReady` meanwhile.
    ///
    /// An unreadable source leaves the index as it was. A failed load rolls
    /// back with its transaction and the index stays searchable.
    pub fn recreate_database(&self) -> Result<()> {
        let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
        info!(language = %self.name, source = %self.source, "recreating persistent store");
        let entries = self.source.read_entries()?;

        self.ready.store(false, Ordering::Release);
        let rebuilt = self.store.bulk_load(entries).map_err(CoreError::from).and_then(|_| {
            let mut hot = self.hot.write().unwrap_or_else(PoisonError::into_inner);
            self.fill_from_store(&mut hot)
        });
        self.ready.store(true, Ordering::Release);
        rebuilt
    }

    fn fill_from_store(&self, hot: &mut HotTier) -> Result<()> {
        let rows = self.store.rows_above(hot.threshold)?;
        hot.trie.clear();
        for (word, frequency) in rows {
            hot.trie.insert(&word, frequency);
        }
        debug!(language = %self.name, words = hot.trie.len(), "memory tier filled");
        Ok(())
    }

    /// Close the store and delete its file.
    pub fn destroy(self) -> Result<()> {
        let path = self.store.path().to_path_buf();
        self.store.destroy().map_err(|e| CoreError::io(path, e))
    }
}

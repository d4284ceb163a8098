//! Durable word -> frequency table backed by `redb`.
//!
//! One database file per language, holding a single `words` table keyed by
//! the NFC-normalized word. The store is the source of truth for hybrid
//! languages; the memory tier is rebuilt from it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use redb::{ReadableTable, ReadableTableMetadata};
use tracing::{debug, info, warn};

use crate::accent::AccentMap;
use crate::candidate::Word;

/// Counts reported by a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Persistent word table for one language.
pub struct PersistentStore {
    db: redb::Database,
    path: PathBuf,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("path", &self.path)
            .finish()
    }
}

impl PersistentStore {
    const TABLE_DEF: redb::TableDefinition<'static, &'static str, u64> =
        redb::TableDefinition::new("words");

    /// Create or open the database at `path` and make sure the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, redb::Error> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(redb::Error::Io)?;
        }
        let db = redb::Database::create(path.as_ref())?;
        let store = PersistentStore {
            db,
            path: path.as_ref().to_path_buf(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// File location of the database for `language` under `data_dir`.
    pub fn path_for(data_dir: &Path, language: &str) -> PathBuf {
        let file: String = language
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        data_dir.join("languages").join(format!("{file}.redb"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table if absent. Idempotent.
    pub fn ensure_schema(&self) -> Result<(), redb::Error> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.open_table(Self::TABLE_DEF)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Number of stored words.
    pub fn len(&self) -> Result<u64, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::TABLE_DEF)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, redb::Error> {
        Ok(self.len()? == 0)
    }

    /// Clear the table and repopulate it from `entries` in one transaction.
    /// Repeated words keep their first frequency.
    pub fn bulk_load<I>(&self, entries: I) -> Result<LoadReport, redb::Error>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut report = LoadReport::default();
        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(Self::TABLE_DEF)?;
            let mut table = write_txn.open_table(Self::TABLE_DEF)?;
            for (word, frequency) in entries {
                if table.get(word.as_str())?.is_some() {
                    debug!(word = %word, frequency, "duplicate entry skipped");
                    report.duplicates += 1;
                    continue;
                }
                table.insert(word.as_str(), &frequency)?;
                report.inserted += 1;
            }
        }
        write_txn.commit()?;
        info!(
            path = %self.path.display(),
            inserted = report.inserted,
            duplicates = report.duplicates,
            "bulk load finished"
        );
        Ok(report)
    }

    /// Insert a single word. An existing row is kept; returns whether the
    /// word was newly written.
    pub fn insert(&self, word: &str, frequency: u64) -> Result<bool, redb::Error> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(Self::TABLE_DEF)?;
            let existing = table.get(word)?.map(|v| v.value());
            match existing {
                Some(kept) => {
                    warn!(word, frequency, kept, "word already stored, keeping existing row");
                    false
                }
                None => {
                    table.insert(word, &frequency)?;
                    true
                }
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    pub fn frequency(&self, word: &str) -> Result<Option<u64>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::TABLE_DEF)?;
        Ok(table.get(word)?.map(|v| v.value()))
    }

    /// Every row with frequency strictly above `threshold`.
    pub fn rows_above(&self, threshold: u64) -> Result<Vec<(String, u64)>, redb::Error> {
        let mut out = Vec::new();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::TABLE_DEF)?;
        for item in table.iter()? {
            let (k, v) = item?;
            let freq = v.value();
            if freq > threshold {
                out.push((k.value().to_string(), freq));
            }
        }
        Ok(out)
    }

    /// Accent variants of `prefix` that begin at least one stored word.
    ///
    /// Variants are grown one character at a time and a branch is dropped as
    /// soon as no key starts with it, so long folded prefixes stay cheap.
    pub fn existing_variants(
        &self,
        prefix: &str,
        accents: &AccentMap,
    ) -> Result<Vec<String>, redb::Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::TABLE_DEF)?;
        accents.expand_prefix_with(prefix, |candidate| -> Result<bool, redb::Error> {
            let found = match table.range(candidate..)?.next() {
                Some(item) => item?.0.value().starts_with(candidate),
                None => false,
            };
            Ok(found)
        })
    }

    /// Words starting with any of `prefixes`, highest frequency first.
    ///
    /// Rows whose text is in `exclude` are skipped, and when `cold_ceiling`
    /// is set only rows with frequency at or below it are considered.
    pub fn query_by_prefix(
        &self,
        prefixes: &[String],
        exclude: &HashSet<String>,
        cold_ceiling: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Word>, redb::Error> {
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::TABLE_DEF)?;
        let mut seen: HashSet<String> = HashSet::new();

        for prefix in prefixes {
            for item in table.range(prefix.as_str()..)? {
                let (k, v) = item?;
                let key = k.value();
                if !key.starts_with(prefix.as_str()) {
                    break;
                }
                let freq = v.value();
                if cold_ceiling.is_some_and(|c| freq > c) {
                    continue;
                }
                if exclude.contains(key) || !seen.insert(key.to_string()) {
                    continue;
                }
                out.push(Word::new(key, freq));
            }
        }

        out.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        out.truncate(limit);
        Ok(out)
    }

    /// Drop the table and recreate it empty.
    pub fn clear(&self) -> Result<(), redb::Error> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(Self::TABLE_DEF)?;
            write_txn.open_table(Self::TABLE_DEF)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Close the database and remove its file.
    pub fn destroy(self) -> std::io::Result<()> {
        let path = self.path.clone();
        drop(self.db);
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, PersistentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::open(dir.path().join("words.redb")).unwrap();
        (dir, store)
    }

    fn entries(items: &[(&str, u64)]) -> Vec<(String, u64)> {
        items.iter().map(|(w, f)| (w.to_string(), *f)).collect()
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let (_dir, store) = store();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn bulk_load_skips_duplicates_first_wins() {
        let (_dir, store) = store();
        let report = store
            .bulk_load(entries(&[("cat", 50), ("car", 5), ("cat", 7)]))
            .unwrap();
        assert_eq!(report, LoadReport { inserted: 2, duplicates: 1 });
        assert_eq!(store.frequency("cat").unwrap(), Some(50));
    }

    #[test]
    fn bulk_load_replaces_previous_contents() {
        let (_dir, store) = store();
        store.bulk_load(entries(&[("old", 1)])).unwrap();
        store.bulk_load(entries(&[("new", 2)])).unwrap();
        assert_eq!(store.frequency("old").unwrap(), None);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn insert_keeps_existing_row() {
        let (_dir, store) = store();
        assert!(store.insert("cat", 50).unwrap());
        assert!(!store.insert("cat", 1).unwrap());
        assert_eq!(store.frequency("cat").unwrap(), Some(50));
    }

    #[test]
    fn prefix_query_orders_and_limits() {
        let (_dir, store) = store();
        store
            .bulk_load(entries(&[("cab", 3), ("car", 5), ("cart", 9), ("dog", 99), ("c", 1)]))
            .unwrap();

        let words = store
            .query_by_prefix(&["ca".to_string()], &HashSet::new(), None, 2)
            .unwrap();
        assert_eq!(words, vec![Word::new("cart", 9), Word::new("car", 5)]);
    }

    #[test]
    fn prefix_query_respects_exclusions_and_ceiling() {
        let (_dir, store) = store();
        store
            .bulk_load(entries(&[("cat", 50), ("car", 5), ("cab", 3)]))
            .unwrap();

        let exclude: HashSet<String> = ["car".to_string()].into_iter().collect();
        let words = store
            .query_by_prefix(&["ca".to_string()], &exclude, Some(10), 10)
            .unwrap();
        assert_eq!(words, vec![Word::new("cab", 3)]);
    }

    #[test]
    fn prefix_query_over_variants() {
        let (_dir, store) = store();
        store
            .bulk_load(entries(&[("olaj", 4), ("óra", 6), ("ablak", 8)]))
            .unwrap();
        let words = store
            .query_by_prefix(&["o".to_string(), "ó".to_string()], &HashSet::new(), None, 10)
            .unwrap();
        assert_eq!(words, vec![Word::new("óra", 6), Word::new("olaj", 4)]);
    }

    #[test]
    fn existing_variants_follow_stored_keys() {
        let (_dir, store) = store();
        store
            .bulk_load(entries(&[("különböző", 1), ("kulcs", 3), ("ablak", 8)]))
            .unwrap();
        let accents = crate::accent::hungarian_accents();

        let variants = store.existing_variants("kulonbozo", &accents).unwrap();
        assert_eq!(variants, vec!["különböző".to_string()]);
        let variants = store.existing_variants("ku", &accents).unwrap();
        assert_eq!(variants, vec!["ku".to_string(), "kü".to_string()]);
        assert!(store.existing_variants("zz", &accents).unwrap().is_empty());
    }

    #[test]
    fn rows_above_threshold() {
        let (_dir, store) = store();
        store
            .bulk_load(entries(&[("cat", 50), ("car", 5), ("ten", 10)]))
            .unwrap();
        assert_eq!(store.rows_above(10).unwrap(), entries(&[("cat", 50)]));
    }

    #[test]
    fn reopen_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.redb");
        {
            let store = PersistentStore::open(&path).unwrap();
            store.insert("tartós", 3).unwrap();
        }
        let store = PersistentStore::open(&path).unwrap();
        assert_eq!(store.frequency("tartós").unwrap(), Some(3));
    }

    #[test]
    fn destroy_removes_file() {
        let (dir, store) = store();
        let path = store.path().to_path_buf();
        store.destroy().unwrap();
        assert!(!path.exists());
        drop(dir);
    }

    #[test]
    fn path_for_sanitizes_name() {
        let path = PersistentStore::path_for(Path::new("/data"), "my/lang ü");
        assert_eq!(path, Path::new("/data/languages/my_lang_ü.redb"));
    }
}

//! User settings: the persisted document, partial updates, and the mapping
//! from settings to loaded languages.
//!
//! The document is pretty-printed JSON, replaced atomically on every write.
//! An unreadable or corrupt document falls back to defaults, which are then
//! written back.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::buffer::BufferOptions;
use crate::candidate::clamp_suggestion_count;
use crate::error::{CoreError, Result};
use crate::index::LanguageIndex;
use crate::language::{BuiltinLanguage, CustomLanguageDefinition, StorageKind};

/// A built-in language marked as loaded, with its ranking priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinLanguageSetting {
    pub name: BuiltinLanguage,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Clamped to 1..=10.
    pub max_suggestions: usize,
    /// Number suggestions from one (0 selects the tenth).
    pub start_at_one: bool,
    pub ignore_accent: bool,
    /// Persisted for the launcher; the service does not act on it.
    pub autostart: bool,
    pub builtin_languages: Vec<BuiltinLanguageSetting>,
    pub custom_languages: Vec<CustomLanguageDefinition>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_suggestions: 5,
            start_at_one: true,
            ignore_accent: false,
            autostart: false,
            builtin_languages: vec![
                BuiltinLanguageSetting {
                    name: BuiltinLanguage::English,
                    priority: 2,
                },
                BuiltinLanguageSetting {
                    name: BuiltinLanguage::Hungarian,
                    priority: 1,
                },
            ],
            custom_languages: Vec::new(),
        }
    }
}

/// Partial settings: every present field replaces the stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_suggestions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at_one: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_accent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin_languages: Option<Vec<BuiltinLanguageSetting>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_languages: Option<Vec<CustomLanguageDefinition>>,
}

impl From<&AppSettings> for SettingsPatch {
    fn from(s: &AppSettings) -> Self {
        SettingsPatch {
            max_suggestions: Some(s.max_suggestions),
            start_at_one: Some(s.start_at_one),
            ignore_accent: Some(s.ignore_accent),
            autostart: Some(s.autostart),
            builtin_languages: Some(s.builtin_languages.clone()),
            custom_languages: Some(s.custom_languages.clone()),
        }
    }
}

/// What an applied patch actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChanges {
    pub buffer_options: bool,
    pub autostart: bool,
    pub languages: bool,
}

impl SettingsChanges {
    pub fn any(&self) -> bool {
        self.buffer_options || self.autostart || self.languages
    }
}

impl AppSettings {
    /// Clamp ranges and drop repeated built-in entries (first wins).
    pub fn normalized(mut self) -> Self {
        self.max_suggestions = clamp_suggestion_count(self.max_suggestions);
        let mut seen = HashSet::new();
        self.builtin_languages.retain(|b| seen.insert(b.name));
        self
    }

    pub fn buffer_options(&self) -> BufferOptions {
        BufferOptions {
            max_suggestions: self.max_suggestions,
            start_at_one: self.start_at_one,
            ignore_accent: self.ignore_accent,
        }
    }

    /// Merge `patch` field by field.
    pub fn apply(&mut self, patch: SettingsPatch) -> SettingsChanges {
        let mut changes = SettingsChanges::default();

        if let Some(max) = patch.max_suggestions {
            let max = clamp_suggestion_count(max);
            changes.buffer_options |= max != self.max_suggestions;
            self.max_suggestions = max;
        }
        if let Some(start_at_one) = patch.start_at_one {
            changes.buffer_options |= start_at_one != self.start_at_one;
            self.start_at_one = start_at_one;
        }
        if let Some(ignore_accent) = patch.ignore_accent {
            changes.buffer_options |= ignore_accent != self.ignore_accent;
            self.ignore_accent = ignore_accent;
        }
        if let Some(autostart) = patch.autostart {
            changes.autostart = autostart != self.autostart;
            self.autostart = autostart;
        }
        if let Some(mut builtins) = patch.builtin_languages {
            let mut seen = HashSet::new();
            builtins.retain(|b| seen.insert(b.name));
            changes.languages |= builtins != self.builtin_languages;
            self.builtin_languages = builtins;
        }
        if let Some(custom) = patch.custom_languages {
            changes.languages |= custom != self.custom_languages;
            self.custom_languages = custom;
        }
        changes
    }

    /// Names of every language these settings want loaded.
    pub fn wanted_languages(&self) -> HashSet<String> {
        self.builtin_languages
            .iter()
            .map(|b| b.name.name().to_string())
            .chain(
                self.custom_languages
                    .iter()
                    .filter(|c| c.loaded)
                    .map(|c| c.name.trim().to_string()),
            )
            .collect()
    }

    pub fn custom_language(&self, name: &str) -> Option<&CustomLanguageDefinition> {
        self.custom_languages.iter().find(|c| c.name.trim() == name)
    }
}

/// Bring the loaded set in line with `settings`: unload what is no longer
/// wanted, reprioritize and re-threshold what stays, load what is new.
/// Returns the languages that failed.
pub fn sync_languages(
    index: &LanguageIndex,
    settings: &AppSettings,
    force_rebuild: bool,
) -> Vec<(String, CoreError)> {
    let mut failures = Vec::new();
    index.retain(&settings.wanted_languages());

    let mut to_load = Vec::new();
    for builtin in &settings.builtin_languages {
        to_load.push(builtin.name.definition(builtin.priority));
    }
    for custom in settings.custom_languages.iter().filter(|c| c.loaded) {
        match custom.to_definition() {
            Ok(definition) => {
                if let (Some(language), StorageKind::Hybrid) =
                    (index.get(&definition.name), definition.storage)
                {
                    if let Err(e) = language.set_frequency_threshold(definition.frequency_threshold) {
                        failures.push((definition.name.clone(), e));
                    }
                }
                to_load.push(definition);
            }
            Err(e) => {
                warn!(language = %custom.name, error = %e, "invalid custom language");
                failures.push((custom.name.clone(), e));
            }
        }
    }

    for (name, result) in index.load_many(to_load, force_rebuild) {
        if let Err(e) = result {
            failures.push((name, e));
        }
    }
    failures
}

/// Discard custom languages that `settings` dropped or redefined since
/// `previous`. Each one is unloaded and its store deleted, so a redefined
/// language is rebuilt from its new source by the next sync.
pub fn retire_custom_languages(
    index: &LanguageIndex,
    previous: &AppSettings,
    settings: &AppSettings,
) -> Vec<(String, CoreError)> {
    let mut failures = Vec::new();
    let mut seen = HashSet::new();
    for old in &previous.custom_languages {
        let name = old.name.trim();
        if name.is_empty() || BuiltinLanguage::is_reserved(name) || !seen.insert(name) {
            continue;
        }
        let reason = match settings.custom_language(name) {
            None => "removed",
            Some(new) if !new.same_source(old) => "redefined",
            Some(_) => continue,
        };
        info!(language = name, reason, "discarding custom language store");
        if let Err(e) = index.delete_custom(name) {
            warn!(language = name, error = %e, "failed to discard custom language store");
            failures.push((name.to_string(), e));
        }
    }
    failures
}

/// Apply a settings change to the index: retire custom languages that went
/// away or changed source, then sync the loaded set.
pub fn resync_languages(
    index: &LanguageIndex,
    previous: &AppSettings,
    settings: &AppSettings,
) -> Vec<(String, CoreError)> {
    let mut failures = retire_custom_languages(index, previous, settings);
    failures.extend(sync_languages(index, settings, false));
    failures
}

/// The settings document on disk plus its in-memory copy.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: AppSettings,
}

impl SettingsStore {
    /// Load settings from `path`. A missing, empty or corrupt document is
    /// replaced by defaults, which are persisted immediately.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let loaded = match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                match serde_json::from_str::<AppSettings>(&content) {
                    Ok(settings) => Some(settings.normalized()),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "settings document is corrupt, using defaults");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings document is unreadable, using defaults");
                None
            }
        };

        let store = match loaded {
            Some(current) => SettingsStore { path, current },
            None => {
                let store = SettingsStore {
                    path,
                    current: AppSettings::default(),
                };
                store.save()?;
                store
            }
        };
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &AppSettings {
        &self.current
    }

    /// Write the current settings atomically (temp file + rename).
    pub fn save(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;

        let json = serde_json::to_string_pretty(&self.current)
            .map_err(|e| CoreError::Settings(e.to_string()))?;
        let mut temp = NamedTempFile::new_in(parent).map_err(|e| CoreError::io(parent, e))?;
        let temp_path = temp.path().to_path_buf();
        temp.write_all(json.as_bytes())
            .map_err(|e| CoreError::io(temp_path, e))?;
        temp.persist(&self.path)
            .map_err(|e| CoreError::io(&self.path, e.error))?;
        Ok(())
    }

    /// Merge a patch and persist when anything changed.
    pub fn update(&mut self, patch: SettingsPatch) -> Result<SettingsChanges> {
        let changes = self.current.apply(patch);
        if changes.any() {
            self.save()?;
            info!(?changes, "settings updated");
        }
        Ok(changes)
    }

    /// Restore defaults and persist them.
    pub fn reset(&mut self) -> Result<SettingsChanges> {
        let changes = self.current.apply(SettingsPatch::from(&AppSettings::default()));
        self.save()?;
        info!("settings reset to defaults");
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_merges_only_present_fields() {
        let mut settings = AppSettings::default();
        let changes = settings.apply(SettingsPatch {
            max_suggestions: Some(42),
            ignore_accent: Some(true),
            ..SettingsPatch::default()
        });
        assert_eq!(settings.max_suggestions, 10);
        assert!(settings.ignore_accent);
        assert!(settings.start_at_one);
        assert!(changes.buffer_options);
        assert!(!changes.languages);
    }

    #[test]
    fn unchanged_patch_reports_nothing() {
        let mut settings = AppSettings::default();
        let patch = SettingsPatch::from(&settings);
        assert!(!settings.apply(patch).any());
    }

    #[test]
    fn normalized_clamps_and_dedupes() {
        let settings = AppSettings {
            max_suggestions: 0,
            builtin_languages: vec![
                BuiltinLanguageSetting {
                    name: BuiltinLanguage::English,
                    priority: 3,
                },
                BuiltinLanguageSetting {
                    name: BuiltinLanguage::English,
                    priority: 9,
                },
            ],
            ..AppSettings::default()
        }
        .normalized();
        assert_eq!(settings.max_suggestions, 1);
        assert_eq!(settings.builtin_languages.len(), 1);
        assert_eq!(settings.builtin_languages[0].priority, 3);
    }

    #[test]
    fn corrupt_document_falls_back_and_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.settings(), &AppSettings::default());
        let rewritten: AppSettings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten, AppSettings::default());
    }

    #[test]
    fn missing_document_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        SettingsStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn wanted_languages_include_loaded_customs_only() {
        let mut settings = AppSettings::default();
        let custom = CustomLanguageDefinition {
            name: "Mine".into(),
            priority: 0,
            has_accents: false,
            accent_map: Default::default(),
            storage: StorageKind::MemoryOnly,
            frequency_threshold: None,
            file_path: "mine.txt".into(),
            line_pattern: "{word},{frequency}".into(),
            loaded: false,
        };
        settings.custom_languages.push(custom.clone());
        assert!(!settings.wanted_languages().contains("Mine"));
        settings.custom_languages[0].loaded = true;
        let wanted = settings.wanted_languages();
        assert!(wanted.contains("Mine"));
        assert!(wanted.contains("English"));
    }
}

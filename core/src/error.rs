//! Error type shared by every core component.

use std::path::PathBuf;

/// Errors produced by the index, store, language and settings layers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The language exists but its backing index is not ready (not loaded,
    /// or unloaded while a search was in flight).
    #[error("language '{0}' is not ready")]
    NotReady(String),

    /// No loaded language carries this name.
    #[error("language '{0}' is not loaded")]
    UnknownLanguage(String),

    /// A custom definition tried to use a built-in language name.
    #[error("'{0}' is reserved for a built-in language")]
    ReservedName(String),

    /// The definition itself is inconsistent (e.g. hybrid without threshold).
    #[error("invalid language definition: {0}")]
    InvalidDefinition(String),

    /// The line pattern is missing a placeholder or separator.
    #[error("invalid line pattern: {0}")]
    InvalidPattern(String),

    /// A source line could not be turned into a word entry.
    #[error("invalid source at line {line}: {reason}")]
    InvalidSource { line: usize, reason: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("settings error: {0}")]
    Settings(String),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

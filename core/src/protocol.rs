//! Messages exchanged with the presentation client.
//!
//! Each message is one line of JSON: a `type` discriminant, the message's
//! payload fields and an optional `error` string.

use serde::{Deserialize, Serialize};

use crate::candidate::Word;
use crate::language::CustomLanguageDefinition;
use crate::settings::SettingsPatch;

/// Screen rectangle of the caret in the focused application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl CaretRect {
    pub fn is_degenerate(&self) -> bool {
        self.left == 0 && self.top == 0 && self.width == 0 && self.height == 0
    }

    /// `None` for an all-zero rectangle.
    pub fn non_degenerate(self) -> Option<Self> {
        (!self.is_degenerate()).then_some(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcMessage {
    #[serde(flatten)]
    pub body: MessageBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// Informational, service to client.
    Status { text: String },
    Suggestion {
        words: Vec<Word>,
        #[serde(default)]
        caret: Option<CaretRect>,
    },
    /// Client to service; `index` is a selection number, `word` a literal.
    Selection {
        #[serde(default)]
        index: Option<usize>,
        #[serde(default)]
        word: Option<String>,
    },
    Close,
    Settings { settings: SettingsPatch },
    SettingsRequest {
        #[serde(default)]
        reset: bool,
    },
    RecreateLanguageDatabase { language: CustomLanguageDefinition },
    ServiceShutdown,
}

impl IpcMessage {
    pub fn new(body: MessageBody) -> Self {
        Self { body, error: None }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(MessageBody::Status { text: text.into() })
    }

    pub fn close() -> Self {
        Self::new(MessageBody::Close)
    }

    pub fn suggestion(words: Vec<Word>, caret: Option<CaretRect>) -> Self {
        Self::new(MessageBody::Suggestion { words, caret })
    }

    pub fn settings(settings: SettingsPatch) -> Self {
        Self::new(MessageBody::Settings { settings })
    }

    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Short name of the message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self.body {
            MessageBody::Status { .. } => "status",
            MessageBody::Suggestion { .. } => "suggestion",
            MessageBody::Selection { .. } => "selection",
            MessageBody::Close => "close",
            MessageBody::Settings { .. } => "settings",
            MessageBody::SettingsRequest { .. } => "settings_request",
            MessageBody::RecreateLanguageDatabase { .. } => "recreate_language_database",
            MessageBody::ServiceShutdown => "service_shutdown",
        }
    }

    /// Serialize to a single line, without the trailing newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

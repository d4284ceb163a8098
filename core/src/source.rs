//! Line-oriented word sources.
//!
//! A source is either a wordlist embedded in the binary (CSV with a
//! `word,freq` header) or a user file read through a [`LinePattern`]
//! such as `"{word};{frequency}"`.

use std::fmt;
use std::path::PathBuf;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::utils::normalize;

const WORD: &str = "{word}";
const FREQUENCY: &str = "{frequency}";
/// Positional spellings accepted for older definitions: `{0}` word, `{1}` frequency.
const LEGACY_WORD: &str = "{0}";
const LEGACY_FREQUENCY: &str = "{1}";
/// Shape of the embedded wordlists.
pub const CSV_PATTERN: &str = "{word},{frequency}";

/// Compiled line pattern with one word and one frequency placeholder.
#[derive(Debug, Clone)]
pub struct LinePattern {
    raw: String,
    regex: Regex,
    word_first: bool,
}

/// Result of matching one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Entry(String, u64),
    /// Line does not have the pattern's shape.
    NoMatch,
    /// Shape matched but the frequency field is not a non-negative integer.
    BadFrequency(String),
}

impl LinePattern {
    /// Compile a pattern. Both placeholders must be present exactly once and
    /// be separated by non-empty literal text.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.replace(LEGACY_WORD, WORD).replace(LEGACY_FREQUENCY, FREQUENCY);

        if normalized.matches(WORD).count() != 1 || normalized.matches(FREQUENCY).count() != 1 {
            return Err(CoreError::InvalidPattern(format!(
                "'{raw}' must contain {WORD} and {FREQUENCY} exactly once"
            )));
        }

        let word_at = normalized.find(WORD).unwrap_or_default();
        let freq_at = normalized.find(FREQUENCY).unwrap_or_default();
        let word_first = word_at < freq_at;

        let (first, second) = if word_first {
            (WORD, FREQUENCY)
        } else {
            (FREQUENCY, WORD)
        };
        let first_at = word_at.min(freq_at);
        let second_at = word_at.max(freq_at);

        let prefix = &normalized[..first_at];
        let separator = &normalized[first_at + first.len()..second_at];
        let suffix = &normalized[second_at + second.len()..];

        if separator.is_empty() {
            return Err(CoreError::InvalidPattern(format!(
                "'{raw}' needs a separator between placeholders"
            )));
        }

        let expr = format!(
            "^{}(.+?){}(.+){}$",
            regex::escape(prefix),
            regex::escape(separator),
            regex::escape(suffix)
        );
        let regex = Regex::new(&expr).map_err(|e| CoreError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            regex,
            word_first,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn parse_line(&self, line: &str) -> LineOutcome {
        let Some(caps) = self.regex.captures(line) else {
            return LineOutcome::NoMatch;
        };
        let (Some(a), Some(b)) = (caps.get(1), caps.get(2)) else {
            return LineOutcome::NoMatch;
        };
        let (word, freq) = if self.word_first {
            (a.as_str(), b.as_str())
        } else {
            (b.as_str(), a.as_str())
        };

        let word = normalize(word);
        if word.is_empty() {
            return LineOutcome::NoMatch;
        }
        match freq.trim().parse::<u64>() {
            Ok(f) => LineOutcome::Entry(word, f),
            Err(_) => LineOutcome::BadFrequency(freq.to_string()),
        }
    }
}

/// Where a language's words come from.
#[derive(Debug, Clone)]
pub enum WordSource {
    /// Wordlist compiled into the binary; the first line is a header.
    Embedded {
        name: &'static str,
        data: &'static str,
    },
    /// User-supplied file.
    File { path: PathBuf, pattern: LinePattern },
}

impl WordSource {
    /// Read every entry. Malformed lines are skipped and logged; an
    /// unreadable file or a file with no usable line is an error.
    pub fn read_entries(&self) -> Result<Vec<(String, u64)>> {
        match self {
            WordSource::Embedded { name, data } => {
                let pattern = LinePattern::parse(CSV_PATTERN)?;
                Ok(parse_lines(name, data.lines().skip(1), &pattern, 2))
            }
            WordSource::File { path, pattern } => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
                let origin = path.display().to_string();
                let entries = parse_lines(&origin, content.lines(), pattern, 1);
                if entries.is_empty() && content.lines().next().is_some() {
                    return Err(CoreError::InvalidSource {
                        line: 1,
                        reason: format!(
                            "no line of {origin} matches pattern '{}'",
                            pattern.as_str()
                        ),
                    });
                }
                Ok(entries)
            }
        }
    }
}

impl fmt::Display for WordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordSource::Embedded { name, .. } => write!(f, "embedded:{name}"),
            WordSource::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

fn parse_lines<'a, I>(origin: &str, lines: I, pattern: &LinePattern, first_line: usize) -> Vec<(String, u64)>
where
    I: Iterator<Item = &'a str>,
{
    let mut entries = Vec::new();
    for (i, line) in lines.enumerate() {
        let line_no = first_line + i;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match pattern.parse_line(line) {
            LineOutcome::Entry(word, freq) => entries.push((word, freq)),
            LineOutcome::NoMatch => {
                debug!(source = origin, line = line_no, "line does not match pattern");
            }
            LineOutcome::BadFrequency(raw) => {
                warn!(source = origin, line = line_no, frequency = %raw, "skipping line with invalid frequency");
            }
        }
    }
    entries
}

//! Multi-language suggestion merge.
//!
//! Languages are consulted in descending priority, each asked only for the
//! remaining budget. The first occurrence of a word wins, so a
//! higher-priority language keeps its frequency when two languages collide.

use std::sync::Arc;

use tracing::warn;

use crate::candidate::{SuggestionList, Word};
use crate::error::{CoreError, Result};
use crate::language::Language;

/// Anything that can answer a prefix query at a priority.
pub trait SuggestionSource {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn search(&self, prefix: &str, ignore_accent: bool, amount: usize) -> Result<Vec<Word>>;
}

impl SuggestionSource for Language {
    fn name(&self) -> &str {
        Language::name(self)
    }

    fn priority(&self) -> i32 {
        Language::priority(self)
    }

    fn search(&self, prefix: &str, ignore_accent: bool, amount: usize) -> Result<Vec<Word>> {
        Language::search(self, prefix, ignore_accent, amount)
    }
}

impl<T: SuggestionSource + ?Sized> SuggestionSource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn priority(&self) -> i32 {
        (**self).priority()
    }

    fn search(&self, prefix: &str, ignore_accent: bool, amount: usize) -> Result<Vec<Word>> {
        (**self).search(prefix, ignore_accent, amount)
    }
}

/// Merged suggestions plus the per-language failures met on the way.
#[derive(Debug, Default)]
pub struct Ranking {
    pub suggestions: SuggestionList,
    pub failures: Vec<(String, CoreError)>,
}

impl Ranking {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sort sources by descending priority, keeping relative order for ties.
pub fn by_priority<S: SuggestionSource>(sources: &mut [S]) {
    sources.sort_by_key(|s| std::cmp::Reverse(s.priority()));
}

/// Query `sources` (already in priority order) and merge their results into
/// a list of at most `max_count` words.
pub fn rank<S: SuggestionSource>(
    sources: &[S],
    prefix: &str,
    ignore_accent: bool,
    max_count: usize,
) -> Ranking {
    let mut ranking = Ranking {
        suggestions: SuggestionList::with_capacity(max_count),
        failures: Vec::new(),
    };

    for source in sources {
        let remaining = ranking.suggestions.remaining();
        if remaining == 0 {
            break;
        }
        match source.search(prefix, ignore_accent, remaining) {
            Ok(words) => {
                for word in words {
                    ranking.suggestions.push(word);
                }
            }
            Err(e) => {
                warn!(language = source.name(), error = %e, "search failed");
                ranking.failures.push((source.name().to_string(), e));
            }
        }
    }
    ranking
}

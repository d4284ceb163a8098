//! Accent folding for prefix matching.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps a base letter to the accented letters that should match it.
///
/// Folding is one-directional: typing `o` matches `ó`, `ö` and `ő`, but typing
/// `ő` only matches `ő`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccentMap {
    map: BTreeMap<char, Vec<char>>,
}

impl AccentMap {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Build an `AccentMap` from textual rules like `"o=óöő"`.
    ///
    /// The left side must be a single character; every character on the right
    /// side becomes an alternative. Malformed rules are ignored.
    pub fn from_rules(rules: &[String]) -> Self {
        let mut am = AccentMap::new();
        for rule in rules.iter() {
            let Some((base, accented)) = rule.split_once('=') else {
                continue;
            };
            let mut base_chars = base.trim().chars();
            let (Some(base), None) = (base_chars.next(), base_chars.next()) else {
                continue;
            };
            for alt in accented.trim().chars() {
                am.add_rule(base, alt);
            }
        }
        am
    }

    /// Add one folding rule `base -> accented`.
    pub fn add_rule(&mut self, base: char, accented: char) {
        if base == accented {
            return;
        }
        let alts = self.map.entry(base).or_default();
        if !alts.contains(&accented) {
            alts.push(accented);
        }
    }

    /// Characters that match `ch`, the literal character always first.
    pub fn alternatives(&self, ch: char) -> Vec<char> {
        let mut out = vec![ch];
        if let Some(alts) = self.map.get(&ch) {
            for alt in alts.iter() {
                if !out.contains(alt) {
                    out.push(*alt);
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Expand a prefix into its accent variants, one character at a time.
    ///
    /// A partial variant is extended only while `keep` accepts it, so a
    /// predicate backed by real data prunes dead branches early. The literal
    /// prefix comes first when it survives.
    pub fn expand_prefix_with<E, F>(&self, prefix: &str, mut keep: F) -> Result<Vec<String>, E>
    where
        F: FnMut(&str) -> Result<bool, E>,
    {
        let mut results: Vec<String> = vec![String::new()];

        for ch in prefix.chars() {
            let alts = self.alternatives(ch);
            let mut next: Vec<String> = Vec::with_capacity(results.len() * alts.len());
            for r in results.iter() {
                for alt in alts.iter() {
                    let mut nr = r.clone();
                    nr.push(*alt);
                    if keep(&nr)? {
                        next.push(nr);
                    }
                }
            }
            if next.is_empty() {
                return Ok(next);
            }
            results = next;
        }

        Ok(results)
    }
}

/// Accent map for Hungarian vowels.
pub fn hungarian_accents() -> AccentMap {
    AccentMap::from_rules(&[
        "a=á".to_string(),
        "e=é".to_string(),
        "i=í".to_string(),
        "o=óöő".to_string(),
        "u=úüű".to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternatives_put_literal_first() {
        let am = hungarian_accents();
        assert_eq!(am.alternatives('o'), vec!['o', 'ó', 'ö', 'ő']);
        assert_eq!(am.alternatives('x'), vec!['x']);
        assert_eq!(am.alternatives('ő'), vec!['ő']);
    }

    #[test]
    fn malformed_rules_are_ignored() {
        let am = AccentMap::from_rules(&["oo=ó".to_string(), "nonsense".to_string()]);
        assert!(am.is_empty());
    }

    fn expand_all(am: &AccentMap, prefix: &str) -> Vec<String> {
        am.expand_prefix_with(prefix, |_| Ok::<_, std::convert::Infallible>(true))
            .unwrap()
    }

    #[test]
    fn expand_prefix_enumerates_variants() {
        let am = AccentMap::from_rules(&["o=ó".to_string(), "a=á".to_string()]);
        assert_eq!(expand_all(&am, "ka"), vec!["ka".to_string(), "ká".to_string()]);

        let variants = expand_all(&am, "oa");
        assert_eq!(variants.len(), 4);
        assert_eq!(variants[0], "oa");
    }

    #[test]
    fn expand_prefix_is_not_capped() {
        let am = hungarian_accents();
        assert_eq!(expand_all(&am, "ouou").len(), 256);
    }

    #[test]
    fn expand_prefix_prunes_rejected_branches() {
        let am = hungarian_accents();
        let words = ["különböző", "kulcs"];
        let mut asked = 0;
        let variants = am
            .expand_prefix_with("kulonbozo", |candidate| {
                asked += 1;
                Ok::<_, std::convert::Infallible>(words.iter().any(|w| w.starts_with(candidate)))
            })
            .unwrap();
        assert_eq!(variants, vec!["különböző".to_string()]);
        assert!(asked < 64);

        let none = am
            .expand_prefix_with("xo", |_| Ok::<_, std::convert::Infallible>(false))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn serializes_as_plain_map() {
        let am = AccentMap::from_rules(&["o=ó".to_string()]);
        let json = serde_json::to_string(&am).unwrap();
        assert_eq!(json, r#"{"o":["ó"]}"#);
        let back: AccentMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, am);
    }
}

use crate::error::{AppError, Result};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Compiled, ordered list of key selection patterns.
///
/// A pattern selects a key when it matches anywhere inside it. The
/// selected entry is renamed to the text of the pattern's last capturing
/// group, or to the whole match when the pattern has no groups.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile patterns, failing on the first invalid one
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|e| AppError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Select and rename entries of `data`.
    ///
    /// Every key is tested against every pattern, in pattern order. When two
    /// matches produce the same key the later one wins.
    pub fn select(&self, data: &HashMap<String, String>) -> HashMap<String, String> {
        let mut selected = HashMap::new();

        for (key, value) in data {
            for pattern in &self.patterns {
                match derive_key(pattern, key) {
                    Some(new_key) => {
                        debug!(key = %key, pattern = %pattern, result = %new_key, "Key matched pattern");
                        selected.insert(new_key, value.clone());
                    }
                    None => {
                        debug!(key = %key, pattern = %pattern, "Key did not match pattern");
                    }
                }
            }
        }

        selected
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Compile `patterns` and select from `data` in one step
pub fn select<S: AsRef<str>>(
    data: &HashMap<String, String>,
    patterns: &[S],
) -> Result<HashMap<String, String>> {
    Ok(PatternSet::compile(patterns)?.select(data))
}

fn derive_key(pattern: &Regex, key: &str) -> Option<String> {
    let captures = pattern.captures(key)?;
    // group 0 is the whole match, so with no groups this picks it
    let last_group = pattern.captures_len() - 1;

    Some(
        captures
            .get(last_group)
            .map_or("", |m| m.as_str())
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_capture_group_renames_key() {
        let selected = select(&data(&[("hello/world", "value")]), &["hello/(.*)"]).unwrap();
        assert_eq!(selected, data(&[("world", "value")]));
    }

    #[test]
    fn test_last_group_wins() {
        let selected = select(&data(&[("some.host.io/path", "value")]), &["(.*)/(path)"]).unwrap();
        assert_eq!(selected, data(&[("path", "value")]));
    }

    #[test]
    fn test_no_group_uses_whole_match() {
        let selected =
            select(&data(&[("some.host.io/path", "value")]), &["some.host.io/.*"]).unwrap();
        assert_eq!(selected, data(&[("some.host.io/path", "value")]));
    }

    #[test]
    fn test_unanchored_partial_match() {
        // only the matched part becomes the key
        let selected = select(&data(&[("some.host.io/path", "value")]), &["host"]).unwrap();
        assert_eq!(selected, data(&[("host", "value")]));

        let selected = select(&data(&[("some.host.io/path", "value")]), &["^other"]).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_non_participating_last_group_gives_empty_key() {
        let selected = select(&data(&[("tier", "gold")]), &["(tier)|(zone)"]).unwrap();
        assert_eq!(selected, data(&[("", "gold")]));
    }

    #[test]
    fn test_each_pattern_contributes() {
        let selected = select(
            &data(&[("monitoring.example.io/tier", "backend")]),
            &["monitoring.example.io/(tier)", "monitoring.example.io/.*"],
        )
        .unwrap();

        assert_eq!(
            selected,
            data(&[
                ("tier", "backend"),
                ("monitoring.example.io/tier", "backend")
            ])
        );
    }

    #[test]
    fn test_empty_patterns_select_nothing() {
        let set = PatternSet::compile::<&str>(&[]).unwrap();
        assert!(set.is_empty());
        assert!(set.select(&data(&[("app", "web")])).is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = select(&data(&[("app", "web")]), &["app", "(unclosed"]).unwrap_err();
        match err {
            AppError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {}", other),
        }
    }
}

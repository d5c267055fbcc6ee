//! Whole-document name counting.
//!
//! One automaton over every entity name, one overlapping scan over the raw
//! XML. The raw count is a cheap upper-bound signal: a name that appears
//! only as often as its own definition serializes is a strong unused hint,
//! whatever the structured scan missed.

use std::collections::HashMap;

use aho_corasick::{AhoCorasick, BuildError};

/// Names shorter than this are skipped: one- and two-character names match
/// all over the export and the count carries no signal.
pub const MIN_COUNTED_NAME_LEN: usize = 3;

/// Multi-pattern counter over literal entity names.
pub struct OccurrenceCounter {
    automaton: Option<AhoCorasick>,
    names: Vec<String>,
}

impl OccurrenceCounter {
    /// Build the automaton over all names of counting length. Names below
    /// [`MIN_COUNTED_NAME_LEN`] are dropped and will report a count of
    /// zero. Fails only when the pattern set exceeds the automaton's
    /// construction limits; silently counting everything as zero would
    /// misclassify every entity as unused.
    pub fn new<I, S>(names: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|name| name.chars().count() >= MIN_COUNTED_NAME_LEN)
            .collect();
        let automaton = if names.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(&names)?)
        };
        Ok(OccurrenceCounter { automaton, names })
    }

    /// Count occurrences of every pattern in a single overlapping pass.
    /// Names that never match are present in the result with a zero count.
    pub fn count(&self, haystack: &str) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> = self
            .names
            .iter()
            .map(|name| (name.clone(), 0))
            .collect();
        if let Some(automaton) = &self.automaton {
            for matched in automaton.find_overlapping_iter(haystack) {
                if let Some(count) = counts.get_mut(&self.names[matched.pattern().as_usize()]) {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Number of patterns in the automaton.
    pub fn pattern_count(&self) -> usize {
        self.names.len()
    }
}

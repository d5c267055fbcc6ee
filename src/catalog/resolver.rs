//! Table-occurrence name resolution.

use std::collections::HashMap;

/// Maps table occurrence names to their base table names. Unknown names
/// resolve to themselves, so callers can feed any candidate string through
/// without a prior membership check.
#[derive(Debug, Default)]
pub struct OccurrenceMap {
    map: HashMap<String, String>,
}

impl OccurrenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an occurrence. A later registration overwrites an earlier
    /// one; when a name is defined twice the later definition owns it.
    pub fn insert(&mut self, occurrence: &str, base_table: &str) {
        self.map
            .insert(occurrence.to_string(), base_table.to_string());
    }

    /// Resolve a name to its base table, or return the input unchanged.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.map.get(name).map(String::as_str).unwrap_or(name)
    }

    /// True when the name is a registered occurrence.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// True when the name is an occurrence pointing at a differently named
    /// base table.
    pub fn is_alias(&self, name: &str) -> bool {
        self.map.get(name).is_some_and(|base| base != name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map
            .iter()
            .map(|(occurrence, base)| (occurrence.as_str(), base.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

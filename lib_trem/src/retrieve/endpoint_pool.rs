//! # Endpoint Pool
//!
//! Round-robin over a fixed, ordered table of named nodes. Nodes can be
//! excluded at runtime; `next` skips them and gives up after one full lap,
//! so an all-excluded pool answers `None` instead of spinning.

use std::collections::HashSet;

use crate::error::{Result, TremError};

/// A cyclable registry of named endpoints.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    entries: Vec<(String, String)>,
    excluded: HashSet<String>,
    cursor: Option<usize>,
}

impl EndpointPool {
    /// Builds a pool from a static `(name, url)` table.
    pub fn new(table: &[(&str, &str)]) -> Result<Self> {
        Self::from_entries(
            table
                .iter()
                .map(|(name, url)| (name.to_string(), url.to_string()))
                .collect(),
        )
    }

    /// Builds a pool from owned entries.
    pub fn from_entries(entries: Vec<(String, String)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(TremError::EmptyPool);
        }
        Ok(Self {
            entries,
            excluded: HashSet::new(),
            cursor: None,
        })
    }

    /// Replaces the exclusion set.
    pub fn update_exclusions<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = names.into_iter().map(Into::into).collect();
    }

    /// Next non-excluded `(name, url)` after the last one returned.
    pub fn next(&mut self) -> Option<(String, String)> {
        let len = self.entries.len();
        for _ in 0..len {
            let idx = self.cursor.map_or(0, |c| (c + 1) % len);
            self.cursor = Some(idx);
            let (name, url) = &self.entries[idx];
            if !self.excluded.contains(name) {
                return Some((name.clone(), url.clone()));
            }
        }
        None
    }

    /// URL of a named node.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url.as_str())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an empty pool cannot be built.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[(&str, &str)] = &[("a", "http://a"), ("b", "http://b"), ("c", "http://c")];

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(EndpointPool::new(&[]), Err(TremError::EmptyPool)));
    }

    #[test]
    fn cycles_in_order() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        let names: Vec<String> = (0..4).filter_map(|_| pool.next()).map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b", "c", "a"]);
    }

    #[test]
    fn skips_excluded_and_resumes_after_last_index() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        assert_eq!(pool.next().unwrap().0, "a");
        pool.update_exclusions(["b"]);
        assert_eq!(pool.next().unwrap().0, "c");
        assert_eq!(pool.next().unwrap().0, "a");
    }

    #[test]
    fn single_survivor_is_always_found() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        pool.update_exclusions(["a", "c"]);
        for _ in 0..5 {
            assert_eq!(pool.next(), Some(("b".to_string(), "http://b".to_string())));
        }
    }

    #[test]
    fn all_excluded_returns_none() {
        let mut pool = EndpointPool::new(TABLE).unwrap();
        pool.update_exclusions(["a", "b", "c"]);
        assert_eq!(pool.next(), None);
    }
}

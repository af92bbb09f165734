//! Sorted secondary-key collections.
//!
//! A `KeyCollection` is the backing store of one index group: a vector of
//! `(secondary_key, primary_key)` pairs kept ordered by the full pair, so
//! duplicate secondary keys tie-break on the primary key and every pair has
//! exactly one position. Bulk loads push unsorted and call [`KeyCollection::sort`]
//! once; incremental maintenance goes through [`KeyChange`] and keeps the
//! order intact pair by pair.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use tabula_core::{Error, Result};

use crate::search;

/// An index-level mutation, already projected onto key pairs.
#[derive(Clone, Debug)]
pub enum KeyChange<S, K> {
    /// Insert a pair; an existing equal pair is an error.
    Insert((S, K)),
    /// Insert a pair, overwriting an existing equal pair.
    InsertOrReplace((S, K)),
    /// Replace `previous` with `pair`, re-positioning when the key changed.
    Replace {
        previous: (S, K),
        pair: (S, K),
    },
    /// Remove a pair; an absent pair is an error.
    Remove((S, K)),
    /// Remove every pair, keeping capacity.
    Clear,
}

/// A sorted collection of `(secondary_key, primary_key)` pairs.
pub struct KeyCollection<S, K> {
    name: String,
    pairs: Vec<(S, K)>,
}

impl<S, K> KeyCollection<S, K>
where
    S: Ord + Clone + Debug,
    K: Ord + Clone + Debug,
{
    /// Creates an empty collection. `name` appears in error messages.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: Vec::new(),
        }
    }

    /// Creates an empty collection with room for `capacity` pairs.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            pairs: Vec::with_capacity(capacity),
        }
    }

    /// Returns the collection name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true when the collection holds no pairs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the pair at `index`, if in range.
    #[inline]
    pub fn pair(&self, index: usize) -> Option<&(S, K)> {
        self.pairs.get(index)
    }

    /// Returns the backing pairs in sorted order.
    #[inline]
    pub fn pairs(&self) -> &[(S, K)] {
        &self.pairs
    }

    /// Appends a pair without maintaining order; callers must [`sort`]
    /// before querying.
    ///
    /// [`sort`]: KeyCollection::sort
    pub fn push_unsorted(&mut self, pair: (S, K)) {
        self.pairs.push(pair);
    }

    /// Sorts the collection by the full pair.
    pub fn sort(&mut self) {
        self.pairs.sort_unstable();
    }

    /// Applies one index-level mutation, keeping the collection sorted.
    pub fn apply(&mut self, change: KeyChange<S, K>) -> Result<()> {
        match change {
            KeyChange::Insert(pair) => match self.position_of(&pair) {
                Ok(_) => Err(Error::duplicate_key(&self.name, format!("{:?}", pair))),
                Err(at) => {
                    self.pairs.insert(at, pair);
                    Ok(())
                }
            },
            KeyChange::InsertOrReplace(pair) => {
                match self.position_of(&pair) {
                    Ok(at) => self.pairs[at] = pair,
                    Err(at) => self.pairs.insert(at, pair),
                }
                Ok(())
            }
            KeyChange::Replace { previous, pair } => {
                let at = self.position_of(&previous).map_err(|_| {
                    Error::key_not_found(&self.name, format!("{:?}", previous))
                })?;
                if previous == pair {
                    return Ok(());
                }
                // The key changed, so the pair moves to its new position.
                self.pairs.remove(at);
                match self.position_of(&pair) {
                    Ok(_) => Err(Error::duplicate_key(&self.name, format!("{:?}", pair))),
                    Err(to) => {
                        self.pairs.insert(to, pair);
                        Ok(())
                    }
                }
            }
            KeyChange::Remove(pair) => {
                let at = self
                    .position_of(&pair)
                    .map_err(|_| Error::key_not_found(&self.name, format!("{:?}", pair)))?;
                self.pairs.remove(at);
                Ok(())
            }
            KeyChange::Clear => {
                self.pairs.clear();
                Ok(())
            }
        }
    }

    fn position_of(&self, pair: &(S, K)) -> core::result::Result<usize, usize> {
        self.pairs.binary_search_by(|p| p.cmp(pair))
    }

    #[inline]
    fn by_key<'a>(&self, key: &'a S) -> impl FnMut(&(S, K)) -> Ordering + 'a
    where
        S: 'a,
    {
        move |(s, _)| s.cmp(key)
    }

    /// Finds the primary key of any pair matching `key`.
    pub fn find_unique(&self, key: &S) -> Option<&K> {
        let at = search::find_first(&self.pairs, self.by_key(key))?;
        Some(&self.pairs[at].1)
    }

    /// Finds the raw position of an exact match, or of the nearest neighbor
    /// on the requested side.
    pub fn find_closest(&self, key: &S, select_lower: bool) -> Option<usize> {
        search::find_closest(&self.pairs, self.by_key(key), select_lower)
    }

    /// Finds the inclusive window of pairs matching `key` exactly.
    pub fn find_many(&self, key: &S) -> Option<(usize, usize)> {
        let lo = search::lower_bound(&self.pairs, self.by_key(key))?;
        let hi = search::upper_bound(&self.pairs, self.by_key(key))?;
        Some((lo, hi))
    }

    /// Finds the window of the run containing the closest match to `key`.
    pub fn find_many_closest(&self, key: &S, select_lower: bool) -> Option<(usize, usize)> {
        let at = self.find_closest(key, select_lower)?;
        let run_key = self.pairs[at].0.clone();
        self.find_many(&run_key)
    }

    /// Finds the inclusive window `[min, max]` over unique keys, snapping
    /// each edge inward to its nearest present key.
    pub fn find_unique_range(&self, min: &S, max: &S) -> Option<(usize, usize)> {
        let lo = self.find_closest(min, false)?;
        let hi = self.find_closest(max, true)?;
        (lo <= hi).then_some((lo, hi))
    }

    /// Finds the inclusive window `[min, max]` over duplicate runs.
    pub fn find_many_range(&self, min: &S, max: &S) -> Option<(usize, usize)> {
        if min > max {
            return None;
        }
        let lo = search::lower_bound_closest(&self.pairs, self.by_key(min));
        if lo >= self.pairs.len() {
            return None;
        }
        let hi = search::upper_bound_closest(&self.pairs, self.by_key(max))?;
        (lo <= hi).then_some((lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn ages(pairs: &[(i32, i32)]) -> KeyCollection<i32, i32> {
        let mut keys = KeyCollection::with_capacity("sample.age", pairs.len());
        for pair in pairs {
            keys.push_unsorted(pair.clone());
        }
        keys.sort();
        keys
    }

    #[test]
    fn test_sort_tie_breaks_on_primary_key() {
        let keys = ages(&[(30, 5), (30, 1), (10, 3), (30, 2)]);
        let expect = vec![(10, 3), (30, 1), (30, 2), (30, 5)];
        assert_eq!(keys.pairs(), expect.as_slice());
    }

    #[test]
    fn test_insert_keeps_order_and_rejects_duplicates() {
        let mut keys = ages(&[(10, 1), (30, 2)]);
        keys.apply(KeyChange::Insert((20, 3))).unwrap();
        keys.apply(KeyChange::Insert((30, 1))).unwrap();
        assert_eq!(keys.pairs(), &[(10, 1), (20, 3), (30, 1), (30, 2)]);

        let err = keys.apply(KeyChange::Insert((20, 3))).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_remove_missing_is_an_error() {
        let mut keys = ages(&[(10, 1), (30, 2)]);
        keys.apply(KeyChange::Remove((10, 1))).unwrap();
        assert_eq!(keys.pairs(), &[(30, 2)]);

        let err = keys.apply(KeyChange::Remove((10, 1))).unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));
    }

    #[test]
    fn test_replace_repositions_changed_key() {
        let mut keys = ages(&[(10, 1), (20, 2), (30, 3)]);
        keys.apply(KeyChange::Replace {
            previous: (20, 2),
            pair: (40, 2),
        })
        .unwrap();
        assert_eq!(keys.pairs(), &[(10, 1), (30, 3), (40, 2)]);

        // Unchanged pair is a no-op.
        keys.apply(KeyChange::Replace {
            previous: (40, 2),
            pair: (40, 2),
        })
        .unwrap();
        assert_eq!(keys.len(), 3);

        let err = keys
            .apply(KeyChange::Replace {
                previous: (99, 9),
                pair: (1, 9),
            })
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));
    }

    #[test]
    fn test_insert_or_replace() {
        let mut keys = ages(&[(10, 1)]);
        keys.apply(KeyChange::InsertOrReplace((10, 1))).unwrap();
        keys.apply(KeyChange::InsertOrReplace((20, 2))).unwrap();
        assert_eq!(keys.pairs(), &[(10, 1), (20, 2)]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut keys = ages(&[(10, 1), (20, 2), (30, 3)]);
        let capacity = keys.pairs.capacity();
        keys.apply(KeyChange::Clear).unwrap();
        assert!(keys.is_empty());
        assert_eq!(keys.pairs.capacity(), capacity);
    }

    #[test]
    fn test_find_many_window_is_the_equal_run() {
        let keys = ages(&[(30, 5), (30, 1), (10, 3), (30, 2), (40, 4)]);
        assert_eq!(keys.find_many(&30), Some((1, 3)));
        assert_eq!(keys.find_many(&10), Some((0, 0)));
        assert_eq!(keys.find_many(&25), None);
    }

    #[test]
    fn test_find_unique() {
        let keys = ages(&[(10, 1), (20, 2), (30, 3)]);
        assert_eq!(keys.find_unique(&20), Some(&2));
        assert_eq!(keys.find_unique(&25), None);
    }

    #[test]
    fn test_find_many_range_inclusive() {
        let keys = ages(&[(59, 1), (89, 2), (79, 3)]);
        // Probes between present keys snap inward.
        assert_eq!(keys.find_many_range(&60, &90), Some((1, 2)));
        assert_eq!(keys.find_many_range(&0, &200), Some((0, 2)));
        assert_eq!(keys.find_many_range(&90, &200), None);
        assert_eq!(keys.find_many_range(&0, &50), None);
        assert_eq!(keys.find_many_range(&90, &60), None);
        // Window between two keys with nothing inside.
        assert_eq!(keys.find_many_range(&60, &70), None);
    }

    #[test]
    fn test_find_unique_range() {
        let keys = ages(&[(10, 1), (20, 2), (30, 3), (40, 4)]);
        assert_eq!(keys.find_unique_range(&15, &35), Some((1, 2)));
        assert_eq!(keys.find_unique_range(&10, &40), Some((0, 3)));
        assert_eq!(keys.find_unique_range(&41, &99), None);
        assert_eq!(keys.find_unique_range(&22, &28), None);
    }

    #[test]
    fn test_find_many_closest_expands_run() {
        let keys = ages(&[(30, 1), (30, 2), (10, 3), (50, 4)]);
        assert_eq!(keys.find_many_closest(&35, true), Some((1, 2)));
        assert_eq!(keys.find_many_closest(&35, false), Some((3, 3)));
        assert_eq!(keys.find_many_closest(&5, true), None);
    }
}

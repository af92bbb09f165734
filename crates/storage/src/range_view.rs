//! Zero-copy range views over a table's sorted key collections.
//!
//! A `RangeView` is an inclusive `[left, right]` window over one
//! `KeyCollection` plus the table's primary map, with a direction flag and
//! the table version stamped at creation. Views never copy data: indexed
//! access resolves the key pair at the requested position and looks the
//! record up in the primary map. Any mutation of the table bumps the shared
//! version, after which every accessor of an older view reports a stale
//! view error.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use tabula_core::{Error, Result};
use tabula_index::{search, KeyCollection};

use crate::lock;

/// A read-only window over a sorted key group of a table.
pub struct RangeView<S, K, V> {
    table: String,
    keys: Arc<Mutex<KeyCollection<S, K>>>,
    rows: Rc<RefCell<HashMap<K, V>>>,
    version: Rc<Cell<u64>>,
    stamp: u64,
    left: usize,
    right: usize,
    has_value: bool,
    ascendant: bool,
}

impl<S, K, V> core::fmt::Debug for RangeView<S, K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RangeView")
            .field("table", &self.table)
            .field("left", &self.left)
            .field("right", &self.right)
            .finish_non_exhaustive()
    }
}

impl<S, K, V> Clone for RangeView<S, K, V> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            keys: self.keys.clone(),
            rows: self.rows.clone(),
            version: self.version.clone(),
            stamp: self.stamp,
            left: self.left,
            right: self.right,
            has_value: self.has_value,
            ascendant: self.ascendant,
        }
    }
}

impl<S, K, V> RangeView<S, K, V>
where
    S: Ord + Clone + Debug,
    K: Ord + Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub(crate) fn new(
        table: String,
        keys: Arc<Mutex<KeyCollection<S, K>>>,
        rows: Rc<RefCell<HashMap<K, V>>>,
        version: Rc<Cell<u64>>,
        window: Option<(usize, usize)>,
        ascendant: bool,
    ) -> Self {
        let stamp = version.get();
        let (left, right, has_value) = match window {
            Some((left, right)) if left <= right => (left, right, true),
            _ => (0, 0, false),
        };
        Self {
            table,
            keys,
            rows,
            version,
            stamp,
            left,
            right,
            has_value,
            ascendant,
        }
    }

    fn check(&self) -> Result<()> {
        if self.stamp != self.version.get() {
            return Err(Error::stale_view(&self.table));
        }
        Ok(())
    }

    #[inline]
    fn count_unchecked(&self) -> usize {
        if self.has_value {
            self.right - self.left + 1
        } else {
            0
        }
    }

    #[inline]
    fn backing_index(&self, index: usize) -> usize {
        if self.ascendant {
            self.left + index
        } else {
            self.right - index
        }
    }

    /// Returns the number of records in the view.
    pub fn len(&self) -> Result<usize> {
        self.check()?;
        Ok(self.count_unchecked())
    }

    /// Returns true when the view holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns true when the view holds at least one record.
    pub fn any(&self) -> Result<bool> {
        Ok(self.len()? != 0)
    }

    /// Returns whether the view iterates in ascending key order.
    #[inline]
    pub fn is_ascendant(&self) -> bool {
        self.ascendant
    }

    /// Returns the record at `index`, honoring the view direction.
    pub fn get(&self, index: usize) -> Result<V> {
        self.check()?;
        let len = self.count_unchecked();
        if index >= len {
            return Err(Error::index_out_of_range(index, len));
        }
        let at = self.backing_index(index);
        let key = {
            let keys = lock(&self.keys);
            keys.pair(at)
                .map(|(_, k)| k.clone())
                .ok_or_else(|| Error::index_out_of_range(at, keys.len()))?
        };
        self.rows
            .borrow()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::key_not_found(&self.table, format!("{:?}", key)))
    }

    /// Returns the `(secondary_key, primary_key)` pair at `index`.
    pub fn keys_at(&self, index: usize) -> Result<(S, K)> {
        self.check()?;
        let len = self.count_unchecked();
        if index >= len {
            return Err(Error::index_out_of_range(index, len));
        }
        let at = self.backing_index(index);
        let keys = lock(&self.keys);
        keys.pair(at)
            .cloned()
            .ok_or_else(|| Error::index_out_of_range(at, keys.len()))
    }

    /// Returns the first record of the view.
    pub fn first(&self) -> Result<V> {
        self.get(0)
    }

    /// Returns the last record of the view.
    pub fn last(&self) -> Result<V> {
        let len = self.len()?;
        if len == 0 {
            return Err(Error::index_out_of_range(0, 0));
        }
        self.get(len - 1)
    }

    /// Returns true when some record in the view carries `key`.
    pub fn contains_key(&self, key: &S) -> Result<bool> {
        Ok(self.index_of_first(key)?.is_some())
    }

    /// Finds the view-relative position (in backing order) of the first
    /// record carrying `key`.
    pub fn index_of_first(&self, key: &S) -> Result<Option<usize>> {
        self.check()?;
        if !self.has_value {
            return Ok(None);
        }
        let keys = lock(&self.keys);
        let window = &keys.pairs()[self.left..=self.right];
        Ok(search::lower_bound(window, |(s, _)| s.cmp(key)))
    }

    /// Finds the view-relative position (in backing order) of the last
    /// record carrying `key`.
    pub fn index_of_last(&self, key: &S) -> Result<Option<usize>> {
        self.check()?;
        if !self.has_value {
            return Ok(None);
        }
        let keys = lock(&self.keys);
        let window = &keys.pairs()[self.left..=self.right];
        Ok(search::upper_bound(window, |(s, _)| s.cmp(key)))
    }

    /// Derives a sub-view of `count` records starting at `start`, keeping
    /// this view's direction. Positions are in backing order.
    pub fn slice(&self, start: usize, count: usize) -> Result<Self> {
        self.slice_dir(start, count, self.ascendant)
    }

    /// Derives a sub-view with an explicit direction.
    pub fn slice_dir(&self, start: usize, count: usize, ascendant: bool) -> Result<Self> {
        self.check()?;
        let len = self.count_unchecked();
        if count == 0 {
            let mut view = self.clone();
            view.has_value = false;
            view.left = 0;
            view.right = 0;
            view.ascendant = ascendant;
            return Ok(view);
        }
        if start >= len || count > len - start {
            return Err(Error::index_out_of_range(start + count - 1, len));
        }
        let mut view = self.clone();
        view.left = self.left + start;
        view.right = self.left + start + count - 1;
        view.ascendant = ascendant;
        Ok(view)
    }

    /// Returns the same window iterated in the opposite direction.
    pub fn reverse(&self) -> Self {
        let mut view = self.clone();
        view.ascendant = !self.ascendant;
        view
    }

    /// Copies the view into a vector, honoring the direction.
    pub fn to_vec(&self) -> Result<Vec<V>> {
        let len = self.len()?;
        let mut out = Vec::with_capacity(len);
        for index in 0..len {
            out.push(self.get(index)?);
        }
        Ok(out)
    }

    /// Returns an iterator yielding `Result<V>`; the iterator fuses after
    /// the first error (a concurrent mutation surfaces as one stale-view
    /// error).
    pub fn iter(&self) -> RangeIter<S, K, V> {
        RangeIter {
            view: self.clone(),
            index: 0,
            done: false,
        }
    }
}

impl<'a, S, K, V> IntoIterator for &'a RangeView<S, K, V>
where
    S: Ord + Clone + Debug,
    K: Ord + Eq + Hash + Clone + Debug,
    V: Clone,
{
    type Item = Result<V>;
    type IntoIter = RangeIter<S, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a range view.
pub struct RangeIter<S, K, V> {
    view: RangeView<S, K, V>,
    index: usize,
    done: bool,
}

impl<S, K, V> Iterator for RangeIter<S, K, V>
where
    S: Ord + Clone + Debug,
    K: Ord + Eq + Hash + Clone + Debug,
    V: Clone,
{
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let len = match self.view.len() {
            Ok(len) => len,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if self.index >= len {
            self.done = true;
            return None;
        }
        let item = self.view.get(self.index);
        self.index += 1;
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

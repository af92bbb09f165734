//! Table construction: index registration and bulk loading.
//!
//! A `TableBuilder` names the table, registers its index groups and seeds
//! it with records. Registration hands back typed handles (`IndexKey`,
//! `UniqueKey`) that later address the matching slot in queries; handles
//! are cheap copies carrying no data beyond the slot position.

use std::hash::Hash;
use std::marker::PhantomData;

use hashbrown::HashMap;
use tabula_core::{Error, Record, Result};

use crate::slot::{KeySlot, Slot};
use crate::table::Table;
use crate::unique::{UniqueKeyMap, UniqueSlot};
use crate::SecondaryKey;

/// Handle of one secondary index of a table.
pub struct IndexKey<R, S> {
    slot: usize,
    _marker: PhantomData<fn(&R) -> S>,
}

impl<R, S> Clone for IndexKey<R, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, S> Copy for IndexKey<R, S> {}

impl<R, S> IndexKey<R, S> {
    pub(crate) fn new(slot: usize) -> Self {
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    /// The primary-key order every table has at slot 0.
    pub(crate) fn primary() -> Self {
        Self::new(0)
    }

    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }
}

/// Handle of one unique secondary index of a table.
pub struct UniqueKey<R, S> {
    slot: usize,
    unique: usize,
    _marker: PhantomData<fn(&R) -> S>,
}

impl<R, S> Clone for UniqueKey<R, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, S> Copy for UniqueKey<R, S> {}

impl<R, S> UniqueKey<R, S> {
    #[inline]
    pub(crate) fn unique(&self) -> usize {
        self.unique
    }

    /// The sorted order of this unique group, for range and closest
    /// queries.
    pub fn index(&self) -> IndexKey<R, S> {
        IndexKey::new(self.slot)
    }
}

/// When index maintenance happens relative to the mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortMode {
    /// Every mutation updates every slot before returning.
    Inline,
    /// Mutations queue per-slot changes; readers or background sort
    /// workers drain them.
    Deferred,
}

type SlotSpec<R> = Box<dyn FnOnce(bool) -> Box<dyn Slot<R>>>;

/// Builder for [`Table`].
pub struct TableBuilder<R: Record> {
    name: String,
    slot_specs: Vec<SlotSpec<R>>,
    uniques: Vec<Box<dyn UniqueSlot<R>>>,
    mode: Option<SortMode>,
    deferred_threshold: usize,
}

impl<R: Record> TableBuilder<R> {
    /// Starts a table with the primary-key order as slot 0.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let primary = format!("{}.primary", name);
        let mut builder = Self {
            name,
            slot_specs: Vec::new(),
            uniques: Vec::new(),
            mode: None,
            deferred_threshold: usize::MAX,
        };
        builder.push_slot::<R::Key, _>(primary, |r: &R| r.primary_key());
        builder
    }

    /// Registers a secondary index over `selector`.
    pub fn index<S, F>(&mut self, name: &str, selector: F) -> IndexKey<R, S>
    where
        S: SecondaryKey,
        F: Fn(&R) -> S + Send + Sync + 'static,
    {
        let full = format!("{}.{}", self.name, name);
        let at = self.push_slot(full, selector);
        IndexKey::new(at)
    }

    /// Registers a unique secondary index over `selector`: a hash map for
    /// O(1) lookups plus a sorted slot for range queries.
    pub fn unique_index<S, F>(&mut self, name: &str, selector: F) -> UniqueKey<R, S>
    where
        S: SecondaryKey + Hash,
        F: Fn(&R) -> S + Clone + Send + Sync + 'static,
    {
        let full = format!("{}.{}", self.name, name);
        let slot = self.push_slot(full.clone(), selector.clone());
        let unique = self.uniques.len();
        self.uniques.push(Box::new(UniqueKeyMap::new(full, selector)));
        UniqueKey {
            slot,
            unique,
            _marker: PhantomData,
        }
    }

    /// Forces the sort mode instead of deciding by threshold.
    pub fn sort_mode(&mut self, mode: SortMode) -> &mut Self {
        self.mode = Some(mode);
        self
    }

    /// Defers index maintenance when the table has more than `threshold`
    /// key groups. Defaults to never.
    pub fn deferred_threshold(&mut self, threshold: usize) -> &mut Self {
        self.deferred_threshold = threshold;
        self
    }

    /// Bulk-loads `records` and sorts every slot once. Duplicate primary
    /// or unique keys in the seed are errors.
    pub fn build(self, records: Vec<R>) -> Result<Table<R>> {
        let deferred = match self.mode {
            Some(SortMode::Deferred) => true,
            Some(SortMode::Inline) => false,
            None => self.slot_specs.len() > self.deferred_threshold,
        };
        let slots: Vec<Box<dyn Slot<R>>> =
            self.slot_specs.into_iter().map(|spec| spec(deferred)).collect();

        let mut rows = HashMap::with_capacity(records.len());
        for record in &records {
            let key = record.primary_key();
            if rows.contains_key(&key) {
                return Err(Error::duplicate_key(&self.name, format!("{:?}", key)));
            }
            for unique in &self.uniques {
                unique.load(record)?;
            }
            for slot in &slots {
                slot.load(record);
            }
            rows.insert(key, record.clone());
        }
        for slot in &slots {
            slot.sort();
        }

        Ok(Table::assemble(self.name, rows, slots, self.uniques))
    }

    fn push_slot<S, F>(&mut self, name: String, selector: F) -> usize
    where
        S: SecondaryKey,
        F: Fn(&R) -> S + Send + Sync + 'static,
    {
        let at = self.slot_specs.len();
        self.slot_specs.push(Box::new(move |deferred| {
            Box::new(KeySlot::new(name, selector, deferred)) as Box<dyn Slot<R>>
        }));
        at
    }
}

//! Read-optimized, multi-indexed tables.
//!
//! A `Table` owns the primary map, one sorted slot per index group, one
//! hash map per unique group, and a rollback log of inverse operations.
//! Every successful mutation bumps a shared version counter, invalidating
//! the range views handed out before it. Mutations fan out in a fixed
//! order: unique-map collision handling (displaced records removed
//! outright), unique-map update, slot maintenance, change callback.

use std::cell::{Cell, RefCell};
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use hashbrown::HashMap;
use tabula_core::{Change, Error, Operation, Record, Result};

use crate::builder::{IndexKey, UniqueKey};
use crate::range_view::RangeView;
use crate::slot::{KeySlot, Slot, SortTask};
use crate::unique::{UniqueKeyMap, UniqueSlot};
use crate::SecondaryKey;

type ChangeCallback<R> = Box<dyn Fn(&Change<R>)>;

/// An in-memory table of records indexed by primary and secondary keys.
pub struct Table<R: Record> {
    name: String,
    rows: Rc<RefCell<HashMap<R::Key, R>>>,
    version: Rc<Cell<u64>>,
    slots: Vec<Box<dyn Slot<R>>>,
    uniques: Vec<Box<dyn UniqueSlot<R>>>,
    rollback_log: RefCell<Vec<Operation<R>>>,
    is_rolling_back: Cell<bool>,
    on_change: RefCell<Option<ChangeCallback<R>>>,
}

impl<R: Record> core::fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<R: Record> Table<R> {
    pub(crate) fn assemble(
        name: String,
        rows: HashMap<R::Key, R>,
        slots: Vec<Box<dyn Slot<R>>>,
        uniques: Vec<Box<dyn UniqueSlot<R>>>,
    ) -> Self {
        Self {
            name,
            rows: Rc::new(RefCell::new(rows)),
            version: Rc::new(Cell::new(0)),
            slots,
            uniques,
            rollback_log: RefCell::new(Vec::new()),
            is_rolling_back: Cell::new(false),
            on_change: RefCell::new(None),
        }
    }

    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    /// Returns true when the table holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }

    /// Returns the current version; bumped once per applied mutation.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Registers the callback invoked for every applied change.
    pub fn set_on_change(&self, callback: impl Fn(&Change<R>) + 'static) {
        *self.on_change.borrow_mut() = Some(Box::new(callback));
    }

    /// Returns the sort tasks of every deferred slot.
    pub fn sort_tasks(&self) -> Vec<Arc<dyn SortTask>> {
        self.slots.iter().filter_map(|s| s.sort_task()).collect()
    }

    /// Handle of the primary-key order, usable with the index queries.
    pub fn primary_index(&self) -> IndexKey<R, R::Key> {
        IndexKey::primary()
    }

    // ---- point reads -----------------------------------------------------

    /// Returns the record under `key`; an absent key is an error.
    pub fn get(&self, key: &R::Key) -> Result<R> {
        self.try_get(key)
            .ok_or_else(|| Error::key_not_found(&self.name, format!("{:?}", key)))
    }

    /// Returns the record under `key`, if present.
    pub fn try_get(&self, key: &R::Key) -> Option<R> {
        self.rows.borrow().get(key).cloned()
    }

    /// Returns true when `key` is present.
    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.rows.borrow().contains_key(key)
    }

    /// O(1) lookup through a unique index; an absent key is an error.
    pub fn get_by<S>(&self, index: &UniqueKey<R, S>, key: &S) -> Result<R>
    where
        S: SecondaryKey + Hash,
    {
        self.try_get_by(index, key)?
            .ok_or_else(|| Error::key_not_found(&self.name, format!("{:?}", key)))
    }

    /// O(1) lookup through a unique index.
    pub fn try_get_by<S>(&self, index: &UniqueKey<R, S>, key: &S) -> Result<Option<R>>
    where
        S: SecondaryKey + Hash,
    {
        let unique = self.typed_unique::<S>(index.unique())?;
        match unique.get(key) {
            Some(pk) => Ok(self.rows.borrow().get(&pk).cloned()),
            None => Ok(None),
        }
    }

    // ---- indexed reads ---------------------------------------------------

    /// Returns every record sorted by primary key.
    pub fn get_all_sorted(&self, ascendant: bool) -> Result<RangeView<R::Key, R::Key, R>> {
        self.get_all_sorted_by(&self.primary_index(), ascendant)
    }

    /// Returns every record sorted by the index's secondary key.
    pub fn get_all_sorted_by<S>(
        &self,
        index: &IndexKey<R, S>,
        ascendant: bool,
    ) -> Result<RangeView<S, R::Key, R>>
    where
        S: SecondaryKey,
    {
        let slot = self.ready_slot::<S>(index)?;
        let window = slot.with_keys(|keys| {
            (!keys.is_empty()).then(|| (0, keys.len() - 1))
        });
        Ok(self.view_over(slot, window, ascendant))
    }

    /// Binary-search lookup of a single record by secondary key.
    pub fn find_unique<S>(&self, index: &IndexKey<R, S>, key: &S) -> Result<R>
    where
        S: SecondaryKey,
    {
        self.try_find_unique(index, key)?
            .ok_or_else(|| Error::key_not_found(&self.name, format!("{:?}", key)))
    }

    /// Binary-search lookup of a single record by secondary key.
    pub fn try_find_unique<S>(&self, index: &IndexKey<R, S>, key: &S) -> Result<Option<R>>
    where
        S: SecondaryKey,
    {
        let slot = self.ready_slot::<S>(index)?;
        let pk = slot.with_keys(|keys| keys.find_unique(key).cloned());
        Ok(pk.and_then(|pk| self.rows.borrow().get(&pk).cloned()))
    }

    /// Returns the run of records matching `key` exactly.
    pub fn find_many<S>(
        &self,
        index: &IndexKey<R, S>,
        key: &S,
        ascendant: bool,
    ) -> Result<RangeView<S, R::Key, R>>
    where
        S: SecondaryKey,
    {
        let slot = self.ready_slot::<S>(index)?;
        let window = slot.with_keys(|keys| keys.find_many(key));
        Ok(self.view_over(slot, window, ascendant))
    }

    /// Returns every record with a secondary key in `[min, max]`, edges
    /// snapped inward to present keys.
    pub fn find_range<S>(
        &self,
        index: &IndexKey<R, S>,
        min: &S,
        max: &S,
        ascendant: bool,
    ) -> Result<RangeView<S, R::Key, R>>
    where
        S: SecondaryKey,
    {
        let slot = self.ready_slot::<S>(index)?;
        let window = slot.with_keys(|keys| keys.find_many_range(min, max));
        Ok(self.view_over(slot, window, ascendant))
    }

    /// Range query over an index whose keys are unique per record.
    pub fn find_unique_range<S>(
        &self,
        index: &IndexKey<R, S>,
        min: &S,
        max: &S,
        ascendant: bool,
    ) -> Result<RangeView<S, R::Key, R>>
    where
        S: SecondaryKey,
    {
        let slot = self.ready_slot::<S>(index)?;
        let window = slot.with_keys(|keys| keys.find_unique_range(min, max));
        Ok(self.view_over(slot, window, ascendant))
    }

    /// Returns the record matching `key`, or its nearest neighbor on the
    /// requested side.
    pub fn find_closest<S>(
        &self,
        index: &IndexKey<R, S>,
        key: &S,
        select_lower: bool,
    ) -> Result<Option<R>>
    where
        S: SecondaryKey,
    {
        let slot = self.ready_slot::<S>(index)?;
        let pk = slot.with_keys(|keys| {
            keys.find_closest(key, select_lower)
                .and_then(|at| keys.pair(at).map(|(_, k)| k.clone()))
        });
        Ok(pk.and_then(|pk| self.rows.borrow().get(&pk).cloned()))
    }

    /// Returns the whole run of records sharing the closest key.
    pub fn find_many_closest<S>(
        &self,
        index: &IndexKey<R, S>,
        key: &S,
        select_lower: bool,
        ascendant: bool,
    ) -> Result<RangeView<S, R::Key, R>>
    where
        S: SecondaryKey,
    {
        let slot = self.ready_slot::<S>(index)?;
        let window = slot.with_keys(|keys| keys.find_many_closest(key, select_lower));
        Ok(self.view_over(slot, window, ascendant))
    }

    // ---- mutations -------------------------------------------------------

    /// Returns true when no unique index claims any of the record's keys.
    pub fn can_insert(&self, record: &R) -> bool {
        self.uniques.iter().all(|u| u.can_insert(record))
    }

    /// Applies one operation. `Ok(true)` means the table changed and the
    /// version was bumped.
    pub fn execute(&self, operation: Operation<R>) -> Result<bool> {
        let changed = self.apply_operation(operation)?;
        if changed {
            self.bump();
        }
        Ok(changed)
    }

    /// Inserts a record. A unique-key collision fails soft; a duplicate
    /// primary key is an error.
    pub fn insert(&self, value: R) -> Result<bool> {
        self.execute(Operation::Insert(value))
    }

    /// Replaces the record sharing the value's primary key; an absent key
    /// is an error, an equal stored value a soft no-op.
    pub fn replace(&self, value: R) -> Result<bool> {
        self.execute(Operation::Replace(value))
    }

    /// Inserts, or replaces the record sharing the value's primary key.
    pub fn insert_or_replace(&self, value: R) -> Result<bool> {
        self.execute(Operation::InsertOrReplace(value))
    }

    /// Removes the record under `key`; an absent key fails soft.
    pub fn remove(&self, key: &R::Key) -> Result<bool> {
        let changed = self.remove_internal(key)?;
        if changed {
            self.bump();
        }
        Ok(changed)
    }

    /// Removes every record, logging one inverse insert per row.
    pub fn clear(&self) -> Result<bool> {
        self.execute(Operation::Clear)
    }

    /// Replays the rollback log last-in-first-out, restoring the state at
    /// the last `clear_rollback`.
    pub fn rollback(&self) -> Result<()> {
        if self.is_rolling_back.get() {
            return Ok(());
        }
        self.is_rolling_back.set(true);
        let mut replayed = false;
        let result = loop {
            let inverse = self.rollback_log.borrow_mut().pop();
            match inverse {
                None => break Ok(()),
                Some(op) => {
                    replayed = true;
                    if let Err(e) = self.apply_operation(op) {
                        break Err(e);
                    }
                }
            }
        };
        self.is_rolling_back.set(false);
        if replayed {
            self.bump();
        }
        result
    }

    /// Drops the rollback log; applied mutations become permanent.
    pub fn clear_rollback(&self) {
        self.rollback_log.borrow_mut().clear();
    }

    // ---- internals -------------------------------------------------------

    fn bump(&self) {
        self.version.set(self.version.get().wrapping_add(1));
    }

    fn apply_operation(&self, operation: Operation<R>) -> Result<bool> {
        match operation {
            Operation::Insert(value) => self.insert_internal(value),
            Operation::Replace(value) => self.replace_internal(value),
            Operation::InsertOrReplace(value) => self.insert_or_replace_internal(value),
            Operation::Remove(value) => self.remove_internal(&value.primary_key()),
            Operation::Clear => self.clear_internal(),
        }
    }

    fn insert_internal(&self, value: R) -> Result<bool> {
        if !self.can_insert(&value) {
            return Ok(false);
        }
        let key = value.primary_key();
        {
            let mut rows = self.rows.borrow_mut();
            if rows.contains_key(&key) {
                return Err(Error::duplicate_key(&self.name, format!("{:?}", key)));
            }
            rows.insert(key, value.clone());
        }
        self.on_operation(Change::Insert {
            value: value.clone(),
        })?;
        self.push_rollback(Operation::Remove(value));
        Ok(true)
    }

    fn replace_internal(&self, value: R) -> Result<bool> {
        let key = value.primary_key();
        let previous = self
            .rows
            .borrow()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::key_not_found(&self.name, format!("{:?}", key)))?;
        if previous == value {
            return Ok(false);
        }
        self.rows.borrow_mut().insert(key, value.clone());
        self.on_operation(Change::Replace {
            previous: previous.clone(),
            value,
        })?;
        self.push_rollback(Operation::Replace(previous));
        Ok(true)
    }

    fn insert_or_replace_internal(&self, value: R) -> Result<bool> {
        let key = value.primary_key();
        let previous = self.rows.borrow().get(&key).cloned();
        self.rows.borrow_mut().insert(key, value.clone());
        match previous {
            Some(previous) => {
                self.on_operation(Change::InsertOrReplace {
                    previous: Some(previous.clone()),
                    value,
                })?;
                self.push_rollback(Operation::Replace(previous));
            }
            None => {
                self.on_operation(Change::InsertOrReplace {
                    previous: None,
                    value: value.clone(),
                })?;
                self.push_rollback(Operation::Remove(value));
            }
        }
        Ok(true)
    }

    fn remove_internal(&self, key: &R::Key) -> Result<bool> {
        let Some(previous) = self.rows.borrow_mut().remove(key) else {
            return Ok(false);
        };
        self.on_operation(Change::Remove {
            value: previous.clone(),
        })?;
        self.push_rollback(Operation::Insert(previous));
        Ok(true)
    }

    fn clear_internal(&self) -> Result<bool> {
        if self.rows.borrow().is_empty() {
            return Ok(false);
        }
        self.on_operation(Change::Clear)?;
        if !self.is_rolling_back.get() {
            let rows = self.rows.borrow();
            let mut log = self.rollback_log.borrow_mut();
            for value in rows.values() {
                log.push(Operation::Insert(value.clone()));
            }
        }
        self.rows.borrow_mut().clear();
        Ok(true)
    }

    /// Fans an applied change out to unique maps, slots and the callback.
    /// Records displaced by a unique-key collision are removed outright
    /// first, with their own change events and rollback entries.
    fn on_operation(&self, change: Change<R>) -> Result<()> {
        let mut displaced = Vec::new();
        for unique in &self.uniques {
            if let Some(pk) = unique.displaced_by(&change) {
                displaced.push(pk);
            }
        }
        for pk in &displaced {
            self.remove_internal(pk)?;
        }
        for unique in &self.uniques {
            unique.apply(&change);
        }
        for slot in &self.slots {
            slot.apply(&change)?;
        }
        if let Some(callback) = self.on_change.borrow().as_ref() {
            callback(&change);
        }
        Ok(())
    }

    fn push_rollback(&self, inverse: Operation<R>) {
        if !self.is_rolling_back.get() {
            self.rollback_log.borrow_mut().push(inverse);
        }
    }

    fn typed_slot<S: SecondaryKey>(&self, at: usize) -> Result<&KeySlot<R, S>> {
        let slot = self
            .slots
            .get(at)
            .ok_or_else(|| Error::index_not_found(&self.name, format!("slot {}", at)))?;
        slot.as_any()
            .downcast_ref::<KeySlot<R, S>>()
            .ok_or_else(|| Error::index_not_found(&self.name, slot.name()))
    }

    fn ready_slot<S: SecondaryKey>(&self, index: &IndexKey<R, S>) -> Result<&KeySlot<R, S>> {
        let slot = self.typed_slot::<S>(index.slot())?;
        slot.ensure_ready()?;
        Ok(slot)
    }

    fn typed_unique<S: SecondaryKey + Hash>(&self, at: usize) -> Result<&UniqueKeyMap<R, S>> {
        let unique = self
            .uniques
            .get(at)
            .ok_or_else(|| Error::index_not_found(&self.name, format!("unique {}", at)))?;
        unique
            .as_any()
            .downcast_ref::<UniqueKeyMap<R, S>>()
            .ok_or_else(|| Error::index_not_found(&self.name, unique.name()))
    }

    fn view_over<S: SecondaryKey>(
        &self,
        slot: &KeySlot<R, S>,
        window: Option<(usize, usize)>,
        ascendant: bool,
    ) -> RangeView<S, R::Key, R> {
        RangeView::new(
            self.name.clone(),
            slot.keys_handle(),
            self.rows.clone(),
            self.version.clone(),
            window,
            ascendant,
        )
    }
}

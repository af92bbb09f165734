//! Unique secondary key maps.
//!
//! A unique index group keeps, next to its sorted slot, a hash map from the
//! secondary key to the owning primary key for O(1) point lookups and
//! uniqueness enforcement. Maps are maintained inline (never deferred).
//! On the replace paths a collision does not fail: the record that held the
//! key is reported as displaced and the table removes it outright before
//! the new mapping lands.

use std::any::Any;
use std::cell::RefCell;
use std::hash::Hash;

use hashbrown::HashMap;
use tabula_core::{Change, Error, Record, Result};

use crate::SecondaryKey;

/// Type-erased unique map interface the table drives.
pub(crate) trait UniqueSlot<R: Record> {
    fn name(&self) -> &str;

    /// Returns true when the record's unique key is unclaimed.
    fn can_insert(&self, record: &R) -> bool;

    /// Returns the primary key of the record this change would displace.
    fn displaced_by(&self, change: &Change<R>) -> Option<R::Key>;

    /// Applies the change to the map. Runs after displaced records were
    /// removed, so no collision remains possible.
    fn apply(&self, change: &Change<R>);

    /// Bulk-load: maps the record's key; a duplicate seed key is an error.
    fn load(&self, record: &R) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// A concrete unique map over secondary key type `S`.
pub(crate) struct UniqueKeyMap<R: Record, S> {
    name: String,
    selector: Box<dyn Fn(&R) -> S + Send + Sync>,
    map: RefCell<HashMap<S, R::Key>>,
}

impl<R: Record, S: SecondaryKey + Hash> UniqueKeyMap<R, S> {
    pub(crate) fn new<F>(name: String, selector: F) -> Self
    where
        F: Fn(&R) -> S + Send + Sync + 'static,
    {
        Self {
            name,
            selector: Box::new(selector),
            map: RefCell::new(HashMap::new()),
        }
    }

    /// O(1) point lookup of the primary key holding `key`.
    pub(crate) fn get(&self, key: &S) -> Option<R::Key> {
        self.map.borrow().get(key).cloned()
    }

    fn key_of(&self, record: &R) -> S {
        (self.selector)(record)
    }

    /// The primary key currently mapped to `key`, when it is not `own`.
    fn other_holder(&self, key: &S, own: &R::Key) -> Option<R::Key> {
        self.map
            .borrow()
            .get(key)
            .filter(|held| *held != own)
            .cloned()
    }
}

impl<R: Record, S: SecondaryKey + Hash> UniqueSlot<R> for UniqueKeyMap<R, S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_insert(&self, record: &R) -> bool {
        !self.map.borrow().contains_key(&self.key_of(record))
    }

    fn displaced_by(&self, change: &Change<R>) -> Option<R::Key> {
        match change {
            // Insert passed can_insert, so the key is unclaimed.
            Change::Insert { .. } | Change::Remove { .. } | Change::Clear => None,
            Change::Replace { value, .. }
            | Change::InsertOrReplace { value, .. } => {
                self.other_holder(&self.key_of(value), &value.primary_key())
            }
        }
    }

    fn apply(&self, change: &Change<R>) {
        match change {
            Change::Insert { value } => {
                self.map
                    .borrow_mut()
                    .insert(self.key_of(value), value.primary_key());
            }
            Change::Replace { previous, value }
            | Change::InsertOrReplace {
                previous: Some(previous),
                value,
            } => {
                let old_key = self.key_of(previous);
                let new_key = self.key_of(value);
                let mut map = self.map.borrow_mut();
                if old_key != new_key {
                    map.remove(&old_key);
                }
                map.insert(new_key, value.primary_key());
            }
            Change::InsertOrReplace {
                previous: None,
                value,
            } => {
                self.map
                    .borrow_mut()
                    .insert(self.key_of(value), value.primary_key());
            }
            Change::Remove { value } => {
                self.map.borrow_mut().remove(&self.key_of(value));
            }
            Change::Clear => {
                self.map.borrow_mut().clear();
            }
        }
    }

    fn load(&self, record: &R) -> Result<()> {
        let key = self.key_of(record);
        let mut map = self.map.borrow_mut();
        if map.contains_key(&key) {
            return Err(Error::duplicate_key(&self.name, format!("{:?}", key)));
        }
        map.insert(key, record.primary_key());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

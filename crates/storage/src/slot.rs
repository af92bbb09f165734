//! Index slots: the per-key-group maintenance machinery of a table.
//!
//! Each secondary index of a table is one slot wrapping a shared
//! `KeyCollection`. In inline mode a slot applies every change as it
//! happens; in deferred mode changes queue up and are drained either by the
//! next reader (`ensure_ready`) or by a background sort worker claiming the
//! slot through its `SortTask`.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tabula_core::{Change, Error, Record, Result};
use tabula_index::{KeyChange, KeyCollection};

use crate::lock;
use crate::SecondaryKey;

/// A unit of deferred index maintenance, claimable by a sort worker.
pub trait SortTask: Send + Sync {
    /// Applies every queued change to the backing key collection.
    fn drain(&self);

    /// Returns true while changes are queued.
    fn has_pending(&self) -> bool;
}

/// Type-erased slot interface the table drives.
pub(crate) trait Slot<R: Record> {
    fn name(&self) -> &str;

    /// Routes an applied change into the slot (inline) or its queue
    /// (deferred).
    fn apply(&self, change: &Change<R>) -> Result<()>;

    /// Drains queued changes and surfaces any parked maintenance error.
    fn ensure_ready(&self) -> Result<()>;

    /// Bulk-load: appends the record's key pair without sorting.
    fn load(&self, record: &R);

    /// Bulk-load: sorts the backing collection once.
    fn sort(&self);

    /// Returns the slot's sort task when it maintains a deferred queue.
    fn sort_task(&self) -> Option<Arc<dyn SortTask>>;

    fn as_any(&self) -> &dyn Any;
}

struct PendingQueue<R: Record> {
    changes: Mutex<VecDeque<Change<R>>>,
    failed: Mutex<Option<Error>>,
}

struct SlotCore<R: Record, S> {
    name: String,
    selector: Arc<dyn Fn(&R) -> S + Send + Sync>,
    keys: Arc<Mutex<KeyCollection<S, R::Key>>>,
    pending: Option<PendingQueue<R>>,
}

impl<R: Record, S: SecondaryKey> SlotCore<R, S> {
    fn pair(&self, record: &R) -> (S, R::Key) {
        ((self.selector)(record), record.primary_key())
    }

    fn key_change(&self, change: &Change<R>) -> KeyChange<S, R::Key> {
        match change {
            Change::Insert { value } => KeyChange::Insert(self.pair(value)),
            Change::Replace { previous, value } => KeyChange::Replace {
                previous: self.pair(previous),
                pair: self.pair(value),
            },
            Change::InsertOrReplace {
                previous: Some(previous),
                value,
            } => KeyChange::Replace {
                previous: self.pair(previous),
                pair: self.pair(value),
            },
            Change::InsertOrReplace {
                previous: None,
                value,
            } => KeyChange::InsertOrReplace(self.pair(value)),
            Change::Remove { value } => KeyChange::Remove(self.pair(value)),
            Change::Clear => KeyChange::Clear,
        }
    }

    /// Applies queued changes under the slot lock; a failure parks the
    /// error for the next reader.
    fn drain_queue(&self) {
        let Some(pending) = &self.pending else {
            return;
        };
        let mut keys = lock(&self.keys);
        let mut queue = lock(&pending.changes);
        while let Some(change) = queue.pop_front() {
            if let Err(e) = keys.apply(self.key_change(&change)) {
                *lock(&pending.failed) = Some(e);
            }
        }
    }
}

impl<R: Record, S: SecondaryKey> SortTask for SlotCore<R, S> {
    fn drain(&self) {
        self.drain_queue();
    }

    fn has_pending(&self) -> bool {
        match &self.pending {
            Some(pending) => !lock(&pending.changes).is_empty(),
            None => false,
        }
    }
}

/// A concrete slot over secondary key type `S`.
pub(crate) struct KeySlot<R: Record, S> {
    core: Arc<SlotCore<R, S>>,
}

impl<R: Record, S: SecondaryKey> KeySlot<R, S> {
    pub(crate) fn new<F>(name: String, selector: F, deferred: bool) -> Self
    where
        F: Fn(&R) -> S + Send + Sync + 'static,
    {
        let pending = deferred.then(|| PendingQueue {
            changes: Mutex::new(VecDeque::new()),
            failed: Mutex::new(None),
        });
        Self {
            core: Arc::new(SlotCore {
                name: name.clone(),
                selector: Arc::new(selector),
                keys: Arc::new(Mutex::new(KeyCollection::new(name))),
                pending,
            }),
        }
    }

    /// Shared handle to the backing collection, for range views.
    pub(crate) fn keys_handle(&self) -> Arc<Mutex<KeyCollection<S, R::Key>>> {
        self.core.keys.clone()
    }

    /// Runs `f` on the ready (fully drained) key collection.
    pub(crate) fn with_keys<T>(&self, f: impl FnOnce(&KeyCollection<S, R::Key>) -> T) -> T {
        f(&lock(&self.core.keys))
    }
}

impl<R: Record, S: SecondaryKey> Slot<R> for KeySlot<R, S> {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn apply(&self, change: &Change<R>) -> Result<()> {
        match &self.core.pending {
            Some(pending) => {
                let mut queue = lock(&pending.changes);
                if matches!(change, Change::Clear) {
                    // Clearing supersedes everything queued before it.
                    queue.clear();
                }
                queue.push_back(change.clone());
                Ok(())
            }
            None => lock(&self.core.keys).apply(self.core.key_change(change)),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        let Some(pending) = &self.core.pending else {
            return Ok(());
        };
        self.core.drain_queue();
        match lock(&pending.failed).take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn load(&self, record: &R) {
        lock(&self.core.keys).push_unsorted(self.core.pair(record));
    }

    fn sort(&self) {
        lock(&self.core.keys).sort();
    }

    fn sort_task(&self) -> Option<Arc<dyn SortTask>> {
        self.core
            .pending
            .is_some()
            .then(|| self.core.clone() as Arc<dyn SortTask>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

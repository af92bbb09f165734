//! The write facade of a database.
//!
//! All mutations go through a [`Transaction`] borrowed from the database.
//! The facade re-checks the transaction state on every call, so a handle
//! that outlives its commit or rollback turns into an error source rather
//! than a backdoor.

use tabula_core::{Operation, Record, Result};

use crate::database::Database;

/// A handle for mutating tables inside an open transaction.
pub struct Transaction<'db> {
    db: &'db Database,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Applies one operation to the table registered for `R`.
    ///
    /// Returns whether the table changed. Soft failures (a unique-index
    /// collision on insert, removing an absent key, clearing an empty
    /// table) report `Ok(false)`.
    pub fn execute<R: Record>(&self, operation: Operation<R>) -> Result<bool> {
        self.db.assert_can_execute()?;
        let entry = self.db.entry::<R>()?;
        let changed = entry.table.execute(operation)?;
        self.db.poke_scheduler();
        Ok(changed)
    }

    pub fn insert<R: Record>(&self, value: R) -> Result<bool> {
        self.execute(Operation::Insert(value))
    }

    pub fn replace<R: Record>(&self, value: R) -> Result<bool> {
        self.execute(Operation::Replace(value))
    }

    pub fn insert_or_replace<R: Record>(&self, value: R) -> Result<bool> {
        self.execute(Operation::InsertOrReplace(value))
    }

    /// Removes the record sharing `value`'s primary key. Absent keys
    /// report `Ok(false)`.
    pub fn remove<R: Record>(&self, value: R) -> Result<bool> {
        self.execute(Operation::Remove(value))
    }

    /// Removes the record stored under `key`. Absent keys report
    /// `Ok(false)`.
    pub fn remove_by_key<R: Record>(&self, key: &R::Key) -> Result<bool> {
        self.db.assert_can_execute()?;
        let entry = self.db.entry::<R>()?;
        let changed = entry.table.remove(key)?;
        self.db.poke_scheduler();
        Ok(changed)
    }

    /// Empties the table registered for `R`.
    pub fn clear<R: Record>(&self) -> Result<bool> {
        self.execute(Operation::<R>::Clear)
    }

    /// Empties every registered table.
    pub fn clear_all(&self) -> Result<()> {
        self.db.assert_can_execute()?;
        for entry in self.db.entries() {
            entry.clear_table()?;
        }
        self.db.poke_scheduler();
        Ok(())
    }

    /// Inserts every value, returning how many were applied. Unique-index
    /// collisions are skipped; a duplicate primary key aborts the batch.
    pub fn insert_many<R, I>(&self, values: I) -> Result<usize>
    where
        R: Record,
        I: IntoIterator<Item = R>,
    {
        self.execute_many(values.into_iter().map(Operation::Insert))
    }

    /// Replaces every value, returning how many changed the table. A key
    /// with no current record aborts the batch.
    pub fn replace_many<R, I>(&self, values: I) -> Result<usize>
    where
        R: Record,
        I: IntoIterator<Item = R>,
    {
        self.execute_many(values.into_iter().map(Operation::Replace))
    }

    pub fn insert_or_replace_many<R, I>(&self, values: I) -> Result<usize>
    where
        R: Record,
        I: IntoIterator<Item = R>,
    {
        self.execute_many(values.into_iter().map(Operation::InsertOrReplace))
    }

    /// Removes every key, returning how many records were actually
    /// removed. Absent keys are skipped.
    pub fn remove_many<R, I>(&self, keys: I) -> Result<usize>
    where
        R: Record,
        I: IntoIterator<Item = R::Key>,
    {
        self.db.assert_can_execute()?;
        let entry = self.db.entry::<R>()?;
        let mut applied = 0;
        for key in keys {
            if entry.table.remove(&key)? {
                applied += 1;
            }
        }
        self.db.poke_scheduler();
        Ok(applied)
    }

    fn execute_many<R, I>(&self, operations: I) -> Result<usize>
    where
        R: Record,
        I: IntoIterator<Item = Operation<R>>,
    {
        self.db.assert_can_execute()?;
        let entry = self.db.entry::<R>()?;
        let mut applied = 0;
        for operation in operations {
            if entry.table.execute(operation)? {
                applied += 1;
            }
        }
        self.db.poke_scheduler();
        Ok(applied)
    }
}

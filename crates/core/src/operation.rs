//! Mutation vocabulary shared by tables, index maintenance and observers.
//!
//! `Operation` is the caller-facing request; `Change` is the applied
//! mutation, carrying the displaced value where one exists so that index
//! slots and rollback logs can undo or remap it.

/// Discriminant of an operation, independent of its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Replace,
    InsertOrReplace,
    Remove,
    Clear,
}

/// A requested mutation against a table.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation<V> {
    /// Insert a new value; fails on an existing primary key.
    Insert(V),
    /// Replace the value stored under the same primary key.
    Replace(V),
    /// Insert, or replace if the primary key already exists.
    InsertOrReplace(V),
    /// Remove the value with this value's primary key.
    Remove(V),
    /// Remove every value.
    Clear,
}

impl<V> Operation<V> {
    /// Returns the kind of this operation.
    #[inline]
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert(_) => OperationKind::Insert,
            Operation::Replace(_) => OperationKind::Replace,
            Operation::InsertOrReplace(_) => OperationKind::InsertOrReplace,
            Operation::Remove(_) => OperationKind::Remove,
            Operation::Clear => OperationKind::Clear,
        }
    }

    /// Returns the carried value, if any (`Clear` carries none).
    #[inline]
    pub fn value(&self) -> Option<&V> {
        match self {
            Operation::Insert(v)
            | Operation::Replace(v)
            | Operation::InsertOrReplace(v)
            | Operation::Remove(v) => Some(v),
            Operation::Clear => None,
        }
    }
}

/// An applied mutation, with the displaced value where one exists.
#[derive(Clone, Debug, PartialEq)]
pub enum Change<V> {
    Insert {
        value: V,
    },
    Replace {
        previous: V,
        value: V,
    },
    InsertOrReplace {
        previous: Option<V>,
        value: V,
    },
    Remove {
        value: V,
    },
    Clear,
}

impl<V> Change<V> {
    /// Returns the kind of this change.
    #[inline]
    pub fn kind(&self) -> OperationKind {
        match self {
            Change::Insert { .. } => OperationKind::Insert,
            Change::Replace { .. } => OperationKind::Replace,
            Change::InsertOrReplace { .. } => OperationKind::InsertOrReplace,
            Change::Remove { .. } => OperationKind::Remove,
            Change::Clear => OperationKind::Clear,
        }
    }

    /// Returns the value written by this change, if any.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        match self {
            Change::Insert { value }
            | Change::Replace { value, .. }
            | Change::InsertOrReplace { value, .. }
            | Change::Remove { value } => Some(value),
            Change::Clear => None,
        }
    }

    /// Returns the value displaced by this change, if any.
    #[inline]
    pub fn previous(&self) -> Option<&V> {
        match self {
            Change::Replace { previous, .. } => Some(previous),
            Change::InsertOrReplace { previous, .. } => previous.as_ref(),
            _ => None,
        }
    }

    /// Converts this change into the operation observers receive.
    pub fn operation(&self) -> Operation<V>
    where
        V: Clone,
    {
        match self {
            Change::Insert { value } => Operation::Insert(value.clone()),
            Change::Replace { value, .. } => Operation::Replace(value.clone()),
            Change::InsertOrReplace { value, .. } => Operation::InsertOrReplace(value.clone()),
            Change::Remove { value } => Operation::Remove(value.clone()),
            Change::Clear => Operation::Clear,
        }
    }
}

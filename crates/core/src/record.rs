//! The record trait binding a stored value to its primary key.

use core::fmt;
use core::hash::Hash;

/// A value stored in a table, projected onto a primary key.
///
/// `Clone` because tables hand out owned copies of read-optimized data.
/// `PartialEq` backs the replace-with-equal-value fast path. `Send + Sync`
/// let secondary-key stores be drained by background sort workers.
pub trait Record: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The primary key type.
    type Key: Clone + Ord + Eq + Hash + fmt::Debug + Send + 'static;

    /// Returns the primary key of this record.
    fn primary_key(&self) -> Self::Key;

    /// A short name used in error and validation messages.
    fn element_name() -> &'static str {
        core::any::type_name::<Self>()
    }
}

//! Tabula Storage - tables, index slots and range views.
//!
//! This crate implements the storage layer of the tabula engine:
//!
//! - `Table`: primary map plus sorted secondary-key slots, unique-key
//!   maps, a rollback log and a version counter
//! - `TableBuilder` / `IndexKey` / `UniqueKey`: index registration and
//!   bulk loading with typed handles
//! - `RangeView`: zero-copy windows over a sorted key group, invalidated
//!   by any later mutation of their table
//! - `SortTask`: the unit of deferred index maintenance claimed by
//!   background sort workers
//!
//! # Example
//!
//! ```rust
//! use tabula_core::Record;
//! use tabula_storage::TableBuilder;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Sample {
//!     id: i32,
//!     age: i32,
//! }
//!
//! impl Record for Sample {
//!     type Key = i32;
//!     fn primary_key(&self) -> i32 {
//!         self.id
//!     }
//! }
//!
//! let mut builder = TableBuilder::new("sample");
//! let by_age = builder.index("age", |s: &Sample| s.age);
//! let table = builder
//!     .build(vec![
//!         Sample { id: 1, age: 59 },
//!         Sample { id: 2, age: 89 },
//!         Sample { id: 3, age: 79 },
//!     ])
//!     .unwrap();
//!
//! let in_range = table.find_range(&by_age, &60, &90, true).unwrap();
//! let ids: Vec<i32> = in_range
//!     .to_vec()
//!     .unwrap()
//!     .into_iter()
//!     .map(|s| s.id)
//!     .collect();
//! assert_eq!(ids, [3, 2]);
//! ```

use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard};

mod builder;
mod range_view;
mod slot;
mod table;
mod unique;

pub use builder::{IndexKey, SortMode, TableBuilder, UniqueKey};
pub use range_view::{RangeIter, RangeView};
pub use slot::SortTask;
pub use table::Table;

/// Bounds every secondary key type carries.
pub trait SecondaryKey: Ord + Clone + Debug + Send + 'static {}

impl<T: Ord + Clone + Debug + Send + 'static> SecondaryKey for T {}

/// Locks a mutex, recovering the guard when a sort worker panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

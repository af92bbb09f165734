//! Tabula Index - sorted key collections for the tabula table engine.
//!
//! This crate provides the read-optimized index layer:
//!
//! - `search`: binary search primitives over sorted slices, with explicit
//!   handling of duplicate runs and nearest-neighbor probes
//! - `KeyCollection`: a sorted `(secondary_key, primary_key)` store,
//!   tie-broken on the primary key, maintained incrementally through
//!   `KeyChange`
//!
//! # Example
//!
//! ```rust
//! use tabula_index::{KeyChange, KeyCollection};
//!
//! let mut ages: KeyCollection<i32, i32> = KeyCollection::new("sample.age");
//! for (age, id) in [(59, 1), (89, 2), (79, 3)] {
//!     ages.push_unsorted((age, id));
//! }
//! ages.sort();
//!
//! // Inclusive range [60, 90] snaps inward to present keys.
//! assert_eq!(ages.find_many_range(&60, &90), Some((1, 2)));
//!
//! ages.apply(KeyChange::Insert((65, 4))).unwrap();
//! assert_eq!(ages.find_many_range(&60, &90), Some((1, 3)));
//! ```

#![no_std]

extern crate alloc;

mod key_collection;
pub mod search;

pub use key_collection::{KeyChange, KeyCollection};

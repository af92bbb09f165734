//! Database container, transactions and validation for the tabula table
//! engine.
//!
//! A [`Database`] bundles one [`tabula_storage::Table`] per record type
//! behind a single transaction scope. Reads go straight to the tables;
//! writes go through a [`Transaction`] and can be rolled back as a unit
//! across every table touched. Observers subscribed to a table's
//! [`tabula_reactive::TableObserver`] see the committed operations in the
//! order they happened, across tables.
//!
//! ```
//! use tabula_core::Record;
//! use tabula_database::DatabaseBuilder;
//! use tabula_storage::TableBuilder;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct User {
//!     id: u32,
//!     age: u8,
//! }
//!
//! impl Record for User {
//!     type Key = u32;
//!     fn primary_key(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let table = TableBuilder::<User>::new("users").build(vec![]).unwrap();
//! let db = DatabaseBuilder::new().register(table).unwrap().build();
//!
//! db.transaction(|tx| {
//!     tx.insert(User { id: 1, age: 20 })?;
//!     tx.insert(User { id: 2, age: 30 })?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! assert_eq!(db.table::<User>().unwrap().len(), 2);
//! ```

mod database;
mod schedule;
mod transaction;
mod validation;

pub use database::{Database, DatabaseBuilder};
pub use transaction::Transaction;
pub use validation::{FailedItem, ValidateResult, Validator};

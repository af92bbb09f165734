//! Tabula Core - shared types for the tabula in-memory table engine.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - `Record`: binds a stored value to its primary key
//! - `Operation` / `Change`: the mutation vocabulary flowing through
//!   tables, index maintenance, rollback logs and commit observers
//! - `Error` / `Result`: error types for engine operations
//!
//! # Example
//!
//! ```rust
//! use tabula_core::{Operation, OperationKind, Record};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct User {
//!     id: i32,
//!     age: i32,
//! }
//!
//! impl Record for User {
//!     type Key = i32;
//!     fn primary_key(&self) -> i32 {
//!         self.id
//!     }
//! }
//!
//! let op = Operation::Insert(User { id: 1, age: 30 });
//! assert_eq!(op.kind(), OperationKind::Insert);
//! ```

#![no_std]

extern crate alloc;

mod error;
mod operation;
mod record;

pub use error::{Error, Result};
pub use operation::{Change, Operation, OperationKind};
pub use record::Record;

//! Tabula Reactive - commit observers for the tabula table engine.
//!
//! Mutations applied inside a transaction are buffered per table and
//! published to subscribers only when the transaction commits, in the
//! chronological order the mutations happened across tables.
//!
//! # Core Concepts
//!
//! - `TableObserver`: per-table queue of applied operations, published
//!   front-first at commit
//! - `SubscriptionManager` / `SubscriptionId`: callback registry for one
//!   published stream
//!
//! # Example
//!
//! ```rust
//! use tabula_core::Operation;
//! use tabula_reactive::TableObserver;
//!
//! let observer: TableObserver<i32> = TableObserver::new();
//! observer.subscribe(|op| {
//!     if let Operation::Insert(v) = op {
//!         assert_eq!(*v, 42);
//!     }
//! });
//!
//! observer.enqueue(Operation::Insert(42));
//! observer.publish_next().unwrap();
//! ```

#![no_std]

extern crate alloc;

mod observer;
mod subscription;

pub use observer::TableObserver;
pub use subscription::{Subscription, SubscriptionId, SubscriptionManager, ValueCallback};

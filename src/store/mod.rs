//! store
//!
//! Abstraction for the relational engine and the object store.
//!
//! # Architecture
//!
//! The datastore reaches storage only through the traits defined here:
//!
//! - Queries are expressed as an [`EntryPredicate`] or a [`VisibilityMode`],
//!   never as SQL text
//! - Engine failures are reported as [`StoreError`] and wrapped at the
//!   datastore boundary
//! - Rows are raw column text; decoding belongs to the caller
//!
//! # Modules
//!
//! - `traits`: `StorageEngine` and `ObjectStore` traits and row types
//! - [`memory`]: In-memory implementation for tests and embedding
//!
//! [`EntryPredicate`]: crate::core::filter::EntryPredicate

pub mod memory;
mod traits;

pub use memory::{FailOn, MemoryStore, MockOperation};
pub use traits::*;

//! taxii-datastore - Collection catalog and query core for a threat-intelligence sharing server
//!
//! Stores versioned intelligence objects in named, access-controlled
//! collections and answers filtered, range-limited queries against them,
//! producing object lists, manifests and bundles.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`core`] - Domain types, filters, range resolution and configuration
//! - [`store`] - Storage engine and object store traits, plus an in-memory implementation
//! - [`datastore`] - Catalog, queries, bundle assembly and record linkage
//! - [`resources`] - Resource shapes handed to the transport layer
//!
//! # Correctness Invariants
//!
//! 1. Malformed filters are rejected before the storage engine is touched
//! 2. No partial result is ever returned alongside an error
//! 3. Query responses are ordered by added time, bundles by their entries
//! 4. Row cursors are released on every exit path

pub mod core;
pub mod datastore;
pub mod resources;
pub mod store;

//! core
//!
//! Core domain types, filters, and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: CollectionId, ObjectId, Timestamp
//! - [`filter`] - Raw query filters and the entry predicate
//! - [`range`] - Range window resolution
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Filters and ranges are validated before any storage call
//! - Range resolution is pure and deterministic

pub mod config;
pub mod filter;
pub mod range;
pub mod types;

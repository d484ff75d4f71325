//! # nestsync Store
//!
//! In-memory persistence collaborator for nestsync.
//!
//! [`MemoryStore`] implements [`nestsync_core::Store`] over JSON rows held
//! behind a `parking_lot` lock. It is meant for tests, benchmarks and
//! prototyping:
//! - Auto-increment or UUID keys per table
//! - Pivot tables for many-to-many relations
//! - A journal of every write, for asserting what a sync did
//! - Snapshot transactions that roll back on error

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod journal;
mod memory;

pub use error::{StoreError, StoreResult};
pub use journal::StoreEvent;
pub use memory::{KeyStrategy, MemoryStore};

//! # nestsync Testkit
//!
//! Test utilities for nestsync.
//!
//! This crate provides:
//! - A blog schema covering every relation kind
//! - Store fixtures and pre-populated scenarios
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nestsync_testkit::prelude::*;
//!
//! #[test]
//! fn test_sync_comments() {
//!     let blog = scenarios::post_with_comments(3);
//!     let mut post = blog.load("posts", 1);
//!     blog.with_engine(|engine| {
//!         engine.save_and_sync(&mut post, &node(json!({"comments": [{"id": 1}]})))
//!     })
//!     .expect("sync failed");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;

/// Installs a `RUST_LOG`-filtered subscriber writing to the test output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

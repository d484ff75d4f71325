//! # nestsync Validate
//!
//! Reference validation collaborator for nestsync.
//!
//! [`RuleValidator`] evaluates the flat, dot-keyed rule sets the sync engine
//! generates:
//! - `*` wildcards fan out over submitted sequences
//! - Failures are keyed by concrete paths (`comments.1.body`)
//! - Conditional rules read sibling fields through the same wildcards
//! - `exists` rules query a [`nestsync_core::Store`]
//! - Custom messages with `:attribute` placeholders

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod paths;
mod validator;

pub use messages::{default_template, render};
pub use paths::{expand, lookup, substitute, Expanded};
pub use validator::RuleValidator;

//! # LinkDB Testkit
//!
//! Test utilities for LinkDB.
//!
//! This crate provides:
//! - Test fixtures for in-memory and file-backed stores
//! - Property-based generators for list operations using proptest
//! - A reference model that replays operations and checks a list against it
//! - A crash-simulating storage backend for recovery tests
//!
//! ## Usage
//!
//! ```rust
//! use linkdb_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     let list = linkdb_core::LinkedList::open(store, "test").unwrap();
//!     list.push_back("a").unwrap();
//!     assert_eq!(list.len().unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use model::*;

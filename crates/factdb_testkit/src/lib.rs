//! # FactDB Testkit
//!
//! Test utilities for FactDB.
//!
//! This crate provides:
//! - [`TestStore`] fixtures over memory or a temporary directory
//! - A small people schema used across the integration tests
//! - Property-based generators for values, datoms and keys
//! - [`FaultyBackend`] for injecting commit failures
//!
//! The integration suites live in `tests/`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use factdb_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn names_are_stored() {
//!     let store = TestStore::memory();
//!     let people = People::register(&store).await;
//!     let alice = people.person(&store, "Alice").await;
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;

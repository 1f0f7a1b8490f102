//! # bilisync testkit
//!
//! Test utilities shared by the bilisync crates.
//!
//! This crate provides:
//! - Store fixtures, in memory or in a temporary directory that can be
//!   reopened
//! - Builders for history records, folders and favorite resources
//! - Property-based strategies using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bilisync_testkit::prelude::*;
//!
//! #[test]
//! fn stores_history() {
//!     let store = TestStore::memory();
//!     store.put_history_many(&history_run(1, 10, 1_700_000_000)).unwrap();
//!     assert_eq!(store.history_count(), 10);
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
}

pub use fixtures::*;
pub use generators::*;

//! # bilisync storage
//!
//! Byte store backends underneath the bilisync record log.
//!
//! Backends are **opaque append-only byte stores**. They know nothing about
//! history records, favorites or log frames; `bilisync_core` owns the
//! on-disk format.
//!
//! ## Design Principles
//!
//! - Backends only read, append, flush and truncate
//! - Must be `Send + Sync` so the store can be shared between sync tasks
//! - The record log is the only writer
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway stores, with optional
//!   fault injection
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use bilisync_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

//! # LinkDB Storage
//!
//! Byte-level storage for the LinkDB commit log.
//!
//! A backend is an **opaque, append-only byte store**. It knows nothing
//! about log records, namespaces or linked lists; the store in
//! `linkdb_core` owns every byte it writes here.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral stores
//! - [`FileBackend`] - For persistent stores on the local file system
//!
//! ## Example
//!
//! ```rust
//! use linkdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//!
//! backend.replace(b"compacted").unwrap();
//! assert_eq!(backend.size().unwrap(), 9);
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

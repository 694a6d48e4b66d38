//! # LinkDB Core
//!
//! Embedded storage engine for LinkDB.
//!
//! This crate provides:
//! - An ordered, namespaced key-value [`Store`] with snapshot reads and
//!   serialized, atomic write transactions
//! - A checksummed append-only commit log for durability, with torn-tail
//!   recovery and compaction
//! - Persistent doubly linked lists ([`LinkedList`]) built on top of the
//!   store, one namespace per list
//!
//! ## Example
//!
//! ```rust
//! use linkdb_core::{KvRead, LinkedList, Store};
//!
//! let dir = tempfile::tempdir().unwrap();
//! {
//!     let store = Store::open(dir.path()).unwrap();
//!     let queue = LinkedList::open(&store, "queue").unwrap();
//!     let first = queue.push_back("first").unwrap();
//!     queue.push_front("zeroth").unwrap();
//!     assert_eq!(first.prev().unwrap().unwrap().value(), b"zeroth");
//!
//!     // lists are ordinary namespaces underneath
//!     let tx = store.begin_read().unwrap();
//!     assert!(tx.namespace_exists("queue"));
//! }
//!
//! // the directory lock is released once every handle is dropped
//! let store = Store::open(dir.path()).unwrap();
//! let queue = LinkedList::load(&store, "queue").unwrap();
//! assert_eq!(queue.values().unwrap(), ["zeroth", "first"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
pub mod list;
pub mod log;
pub mod store;
mod types;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use linkdb_codec::NodeKey;
pub use list::{ChainStats, Item, Iter, LinkedList, ListError, ListMeta, ListResult, NodeRecord};
pub use store::{Direction, Entry, KvRead, ReadTxn, Store, WriteTxn};
pub use types::{SequenceNumber, TransactionId};

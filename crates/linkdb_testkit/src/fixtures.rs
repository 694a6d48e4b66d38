//! Test fixtures and store helpers.

use linkdb_core::{Config, LinkedList, Store};
use std::path::Path;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// Keeps the directory of a file-backed store alive.
    dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: Store::open_in_memory().expect("Failed to open in-memory store"),
            dir: None,
        }
    }

    /// Creates a file-backed test store in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with_config(Config::default())
    }

    /// Creates a file-backed test store with a custom configuration.
    pub fn file_with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store =
            Store::open_with_config(dir.path(), config).expect("Failed to open file store");
        Self {
            store,
            dir: Some(dir),
        }
    }

    /// Returns the store directory if file-backed, `None` if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Closes the store and opens the same directory again, replaying the
    /// commit log.
    ///
    /// Every other clone of the store must be dropped first, or the
    /// directory lock is still held.
    ///
    /// # Panics
    ///
    /// Panics for an in-memory store.
    pub fn reopen(self) -> Self {
        let config = self.store.config().clone();
        let dir = self.dir.expect("Only file stores can be reopened");
        self.store.close().expect("Failed to close store");
        drop(self.store);

        let store =
            Store::open_with_config(dir.path(), config).expect("Failed to reopen file store");
        Self {
            store,
            dir: Some(dir),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Opens `name` and appends `values` in order.
    pub fn list_with(store: &Store, name: &str, values: &[&str]) -> LinkedList {
        let list = LinkedList::open(store, name).expect("Failed to open list");
        for value in values {
            list.push_back(value.as_bytes().to_vec())
                .expect("Failed to push value");
        }
        list
    }

    /// Creates a store holding one list of `count` numbered elements.
    pub fn populated_list(count: usize) -> (TestStore, LinkedList) {
        let test_store = TestStore::memory();
        let list = LinkedList::open(&test_store, "test").expect("Failed to open list");
        for i in 0..count {
            list.push_back(format!("item-{i}"))
                .expect("Failed to push value");
        }
        (test_store, list)
    }
}

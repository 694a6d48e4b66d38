//! Crash recovery testing for LinkDB.
//!
//! [`CrashableBackend`] keeps the log bytes in memory and can be told to
//! "crash" after a number of appended bytes: the append that crosses the
//! threshold writes only its leading part, and every later write fails.
//! Handles share state, so a test can keep one handle while the store owns
//! another and then recover from the bytes that made it out.
//!
//! ## Usage
//!
//! ```rust
//! use linkdb_testkit::crash::{run_until_crash, recover_list, CrashableBackend};
//!
//! let backend = CrashableBackend::new();
//! backend.crash_after(300);
//!
//! let values: Vec<Vec<u8>> = (0..50u8).map(|i| vec![i; 8]).collect();
//! let acknowledged = run_until_crash(&backend, "l", &values);
//! assert!(backend.has_crashed());
//!
//! assert_eq!(recover_list(&backend, "l").unwrap(), acknowledged);
//! ```

use bytes::Bytes;
use linkdb_core::{Config, LinkedList, ListError, ListResult, Store};
use linkdb_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::Arc;

struct CrashState {
    inner: InMemoryBackend,
    crash_after: usize,
    written: usize,
    crashed: bool,
}

/// An in-memory backend that can simulate a crash mid-append.
#[derive(Clone)]
pub struct CrashableBackend {
    state: Arc<Mutex<CrashState>>,
}

impl CrashableBackend {
    /// Creates an empty backend that never crashes until told to.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CrashState {
                inner: InMemoryBackend::new(),
                crash_after: usize::MAX,
                written: 0,
                crashed: false,
            })),
        }
    }

    /// Crashes once `bytes` more bytes have been appended.
    pub fn crash_after(&self, bytes: usize) {
        let mut state = self.state.lock();
        state.crash_after = state.written.saturating_add(bytes);
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.state.lock().crashed
    }

    /// Returns every byte that reached the backend.
    pub fn image(&self) -> Vec<u8> {
        self.state.lock().inner.data()
    }

    fn crashed_error(what: &str) -> StorageError {
        StorageError::Io(std::io::Error::other(format!("simulated crash during {what}")))
    }
}

impl Default for CrashableBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.state.lock().inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(Self::crashed_error("append"));
        }

        let room = state.crash_after.saturating_sub(state.written);
        if data.len() > room {
            state.crashed = true;
            if room > 0 {
                state.inner.append(&data[..room])?;
                state.written += room;
            }
            return Err(Self::crashed_error("partial append"));
        }

        state.written += data.len();
        state.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(Self::crashed_error("flush"));
        }
        state.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(Self::crashed_error("sync"));
        }
        state.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.state.lock().inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(Self::crashed_error("truncate"));
        }
        state.inner.truncate(new_size)
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.crashed {
            return Err(Self::crashed_error("replace"));
        }
        state.inner.replace(data)
    }
}

/// Opens a store over `backend` and appends `values` to list `name` until
/// a write fails.
///
/// Returns the values whose commits were acknowledged.
pub fn run_until_crash(backend: &CrashableBackend, name: &str, values: &[Vec<u8>]) -> Vec<Bytes> {
    let mut acknowledged = Vec::new();
    let Ok(store) = Store::open_with_backend(Config::default(), Box::new(backend.clone())) else {
        return acknowledged;
    };
    let Ok(list) = LinkedList::open(&store, name) else {
        return acknowledged;
    };
    for value in values {
        match list.push_back(value.clone()) {
            Ok(item) => acknowledged.push(item.bytes()),
            Err(_) => break,
        }
    }
    acknowledged
}

/// Opens a fresh store over the bytes `backend` holds and reads list
/// `name` back, verifying its chain.
///
/// A list whose creation never committed reads as empty.
///
/// # Errors
///
/// Returns an error if recovery or verification fails.
pub fn recover_list(backend: &CrashableBackend, name: &str) -> ListResult<Vec<Bytes>> {
    let image = InMemoryBackend::with_data(backend.image());
    let store = Store::open_with_backend(Config::default(), Box::new(image))?;
    let list = match LinkedList::load(&store, name) {
        Ok(list) => list,
        Err(ListError::ListNotFound { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    list.verify()?;
    list.values()
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdb_core::CoreError;

    fn values(count: u8) -> Vec<Vec<u8>> {
        (0..count).map(|i| vec![i; 1 + usize::from(i % 7)]).collect()
    }

    #[test]
    fn partial_append_leaves_torn_bytes() {
        let mut backend = CrashableBackend::new();
        backend.append(b"0123").unwrap();
        backend.crash_after(2);

        assert!(backend.append(b"4567").is_err());
        assert!(backend.has_crashed());
        assert_eq!(backend.image(), b"012345");
        assert!(backend.truncate(4).is_err());
    }

    #[test]
    fn acknowledged_commits_survive_any_crash_point() {
        let values = values(12);

        let full = CrashableBackend::new();
        run_until_crash(&full, "l", &values);
        let log_len = full.image().len();

        for crash_at in (0..=log_len).step_by(7) {
            let backend = CrashableBackend::new();
            backend.crash_after(crash_at);
            let acknowledged = run_until_crash(&backend, "l", &values);

            let recovered = recover_list(&backend, "l").unwrap();
            assert_eq!(recovered, acknowledged, "crash after {crash_at} bytes");
        }
    }

    #[test]
    fn torn_commit_is_discarded_on_recovery() {
        let backend = CrashableBackend::new();
        let store = Store::open_with_backend(Config::default(), Box::new(backend.clone())).unwrap();
        let list = LinkedList::open(&store, "l").unwrap();
        list.push_back("kept").unwrap();

        let before = backend.image().len();
        backend.crash_after(3);
        assert!(list.push_back("lost").is_err());
        assert_eq!(backend.image().len(), before + 3);

        let recovered = recover_list(&backend, "l").unwrap();
        assert_eq!(recovered, ["kept"]);
    }

    #[test]
    fn flipped_bit_is_refused() {
        let backend = CrashableBackend::new();
        run_until_crash(&backend, "l", &values(4));

        // inside the first record's payload
        let mut image = backend.image();
        image[12] ^= 0x40;

        let result = Store::open_with_backend(
            Config::default(),
            Box::new(InMemoryBackend::with_data(image)),
        );
        let err = result.unwrap_err();
        assert!(err.is_corruption(), "{err:?}");
        assert!(matches!(err, CoreError::ChecksumMismatch { offset: 0, .. }));
    }
}

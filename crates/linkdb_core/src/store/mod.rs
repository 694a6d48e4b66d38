//! Transactional ordered key-value store.
//!
//! Data is grouped into named namespaces, each an ordered map from byte
//! keys to byte values plus a monotonically increasing sequence counter.
//!
//! ## Transactions
//!
//! - Any number of [`ReadTxn`]s run concurrently, each on a frozen snapshot
//! - One [`WriteTxn`] at a time holds the writer lock
//! - A commit appends one log record, then publishes a new snapshot
//!
//! ## Closure API
//!
//! [`Store::view`] and [`Store::update`] run a closure inside a transaction.
//! `update` commits when the closure returns `Ok` and rolls back on `Err`:
//!
//! ```rust
//! use linkdb_core::{CoreError, KvRead, Store};
//!
//! let store = Store::open_in_memory().unwrap();
//! store
//!     .update(|tx| {
//!         tx.create_namespace("users")?;
//!         tx.put("users", b"alice", &b"admin"[..])?;
//!         Ok::<_, CoreError>(())
//!     })
//!     .unwrap();
//!
//! let role = store.view(|tx| tx.get("users", b"alice")).unwrap();
//! assert_eq!(role.as_deref(), Some(&b"admin"[..]));
//! ```

mod snapshot;
mod txn;

pub use txn::{Direction, Entry, KvRead, ReadTxn, WriteTxn};

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::log::{CommitLog, LogRecord};
use crate::types::{SequenceNumber, TransactionId};
use linkdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use snapshot::Snapshot;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub(crate) struct StoreInner {
    id: Uuid,
    pub(crate) config: Config,
    pub(crate) log: CommitLog,
    pub(crate) current: RwLock<Arc<Snapshot>>,
    write_lock: Mutex<()>,
    next_txid: AtomicU64,
    open: AtomicBool,
    dir: Option<StoreDir>,
}

/// Handle to an open store.
///
/// Cloning is cheap; clones share the same state. The directory lock is
/// released when the last clone is dropped.
///
/// # Thread Safety
///
/// `Store` is `Send + Sync`. Write transactions serialize on an internal
/// mutex; read transactions never block writers.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens or creates a persistent store in the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseLocked` if another handle has the directory open,
    /// or a corruption error if the commit log fails validation.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a persistent store with explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::open`]. Additionally fails with `InvalidFormat` when
    /// `error_if_exists` is set and the store already holds data.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let path = path.as_ref();
        let dir = StoreDir::open(path, config.create_if_missing)?;
        if config.error_if_exists && dir.has_data() {
            return Err(CoreError::invalid_format(format!(
                "store already exists: {}",
                path.display()
            )));
        }

        let backend = FileBackend::open(&dir.log_path())?;
        info!(path = %path.display(), "opening store");
        Self::open_inner(config, Box::new(backend), Some(dir))
    }

    /// Opens a store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other openers.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    /// Opens a store over a caller-supplied log backend.
    ///
    /// The backend's existing content is replayed first.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the log fails validation.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        Self::open_inner(config, backend, None)
    }

    fn open_inner(
        config: Config,
        backend: Box<dyn StorageBackend>,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let log = CommitLog::new(backend, config.sync_on_commit);
        let records = log.recover()?;

        let mut state = Snapshot::default();
        for record in &records {
            if let LogRecord::Checkpoint { .. } = record {
                state = Snapshot::default();
            }
            state.apply(record.ops())?;
            state.sequence = record.sequence();
        }

        info!(
            records = records.len(),
            namespaces = state.namespaces.len(),
            sequence = %state.sequence,
            "recovered commit log"
        );

        let store = Self {
            inner: Arc::new(StoreInner {
                id: Uuid::new_v4(),
                config,
                log,
                current: RwLock::new(Arc::new(state)),
                write_lock: Mutex::new(()),
                next_txid: AtomicU64::new(1),
                open: AtomicBool::new(true),
                dir,
            }),
        };

        if store.inner.config.compact_on_open && records.len() > 1 {
            store.compact()?;
        }
        Ok(store)
    }

    /// Returns the identity of this open store.
    ///
    /// A fresh ID is drawn every time a store is opened.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns the store directory, or `None` for memory-backed stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.dir.as_ref().map(StoreDir::path)
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the sequence number of the latest commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.inner.current.read().sequence
    }

    /// Returns the names of all namespaces in the latest committed state.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        self.inner.current.read().namespaces.keys().cloned().collect()
    }

    /// Returns true until [`Self::close`] is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Starts a read transaction on the latest committed snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after [`Self::close`].
    pub fn begin_read(&self) -> CoreResult<ReadTxn> {
        self.ensure_open()?;
        Ok(ReadTxn::new(Arc::clone(&self.inner.current.read())))
    }

    /// Starts the write transaction, waiting for any current writer.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after [`Self::close`].
    pub fn begin_write(&self) -> CoreResult<WriteTxn<'_>> {
        self.ensure_open()?;
        let guard = self.inner.write_lock.lock();
        // close may have won the race while we waited
        self.ensure_open()?;

        let id = TransactionId::new(self.inner.next_txid.fetch_add(1, Ordering::Relaxed));
        let base = Arc::clone(&self.inner.current.read());
        Ok(WriteTxn::new(&self.inner, guard, id, base))
    }

    /// Runs `f` in a read transaction.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or `DatabaseClosed`.
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTxn) -> Result<T, E>,
        E: From<CoreError>,
    {
        let txn = self.begin_read()?;
        f(&txn)
    }

    /// Runs `f` in a write transaction, committing if it returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the closure's error after rolling back, or the commit error.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut txn = self.begin_write()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.rollback();
                Err(e)
            }
        }
    }

    /// Rewrites the commit log as a single checkpoint of the current state.
    ///
    /// Waits for the writer lock, so no commit interleaves.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be written. The previous
    /// log stays intact in that case.
    pub fn compact(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let _guard = self.inner.write_lock.lock();

        let snapshot = Arc::clone(&self.inner.current.read());
        let before = self.inner.log.size()?;
        let record = LogRecord::Checkpoint {
            sequence: snapshot.sequence,
            ops: snapshot.to_ops(),
        };
        self.inner.log.rewrite(&record)?;

        info!(
            sequence = %snapshot.sequence,
            before,
            after = self.inner.log.size()?,
            "compacted commit log"
        );
        Ok(())
    }

    /// Flushes the log and marks the store closed.
    ///
    /// Later operations on any clone fail with `DatabaseClosed`. Closing
    /// twice is a no-op. The directory lock is released once every clone
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> CoreResult<()> {
        let _guard = self.inner.write_lock.lock();
        if !self.inner.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.log.sync()?;
        debug!(id = %self.inner.id, "store closed");
        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("path", &self.path())
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use linkdb_storage::InMemoryBackend;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn with_ns(store: &Store, ns: &str) {
        store
            .update(|tx| tx.create_namespace(ns))
            .unwrap();
    }

    #[test]
    fn put_get_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");
        store
            .update(|tx| tx.put("a", b"k", &b"v"[..]))
            .unwrap();

        let value = store.view(|tx| tx.get("a", b"k")).unwrap();
        assert_eq!(value.as_deref(), Some(&b"v"[..]));
        assert_eq!(store.committed_seq(), SequenceNumber::new(2));
    }

    #[test]
    fn missing_namespace_is_an_error() {
        let store = Store::open_in_memory().unwrap();
        let err = store.view(|tx| tx.get("nope", b"k")).unwrap_err();
        assert!(matches!(err, CoreError::NamespaceNotFound { .. }));

        let err = store.update(|tx| tx.put("nope", b"k", &b"v"[..])).unwrap_err();
        assert!(matches!(err, CoreError::NamespaceNotFound { .. }));
    }

    #[test]
    fn error_in_update_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");

        let result: CoreResult<()> = store.update(|tx| {
            tx.put("a", b"k", &b"v"[..])?;
            Err(CoreError::invalid_operation("abort"))
        });
        assert!(result.is_err());
        assert_eq!(store.view(|tx| tx.get("a", b"k")).unwrap(), None);
        assert_eq!(store.committed_seq(), SequenceNumber::new(1));
    }

    #[test]
    fn dropped_write_txn_discards_changes() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");
        {
            let mut tx = store.begin_write().unwrap();
            tx.put("a", b"k", &b"v"[..]).unwrap();
        }
        assert_eq!(store.view(|tx| tx.count("a")).unwrap(), 0);
    }

    #[test]
    fn write_txn_reads_its_own_writes() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");
        store
            .update(|tx| {
                tx.put("a", b"b", &b"2"[..])?;
                tx.put("a", b"d", &b"4"[..])
            })
            .unwrap();

        let mut tx = store.begin_write().unwrap();
        tx.put("a", b"a", &b"1"[..]).unwrap();
        tx.put("a", b"c", &b"3"[..]).unwrap();
        assert!(tx.delete("a", b"d").unwrap());
        assert!(!tx.delete("a", b"zz").unwrap());

        assert_eq!(tx.count("a").unwrap(), 3);
        assert_eq!(tx.first("a").unwrap().unwrap().0, b"a");
        assert_eq!(tx.last("a").unwrap().unwrap().0, b"c");
        assert_eq!(tx.first_after("a", b"a").unwrap().unwrap().0, b"b");
        assert_eq!(tx.first_after("a", b"b").unwrap().unwrap().0, b"c");
        assert_eq!(tx.first_after("a", b"c").unwrap(), None);

        let keys: Vec<_> = tx.scan("a").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");
        store.update(|tx| tx.put("a", b"k", &b"old"[..])).unwrap();

        let reader = store.begin_read().unwrap();
        store.update(|tx| tx.put("a", b"k", &b"new"[..])).unwrap();

        assert_eq!(reader.get("a", b"k").unwrap().as_deref(), Some(&b"old"[..]));
        let fresh = store.begin_read().unwrap();
        assert_eq!(fresh.get("a", b"k").unwrap().as_deref(), Some(&b"new"[..]));
        assert!(fresh.sequence_number() > reader.sequence_number());
    }

    #[test]
    fn sequence_starts_at_one_and_survives_deletes() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");

        let (s1, s2) = store
            .update(|tx| Ok::<_, CoreError>((tx.next_sequence("a")?, tx.next_sequence("a")?)))
            .unwrap();
        assert_eq!((s1, s2), (1, 2));

        store.update(|tx| tx.next_sequence("a").map(drop)).unwrap();
        assert_eq!(store.view(|tx| tx.sequence("a")).unwrap(), 3);
    }

    #[test]
    fn drop_and_recreate_resets_namespace() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");
        store
            .update(|tx| {
                tx.put("a", b"k", &b"v"[..])?;
                tx.next_sequence("a").map(drop)
            })
            .unwrap();

        store
            .update(|tx| {
                tx.drop_namespace("a")?;
                assert!(!tx.namespace_exists("a"));
                tx.create_namespace("a")?;
                assert_eq!(tx.get("a", b"k")?, None);
                assert_eq!(tx.sequence("a")?, 0);
                Ok::<_, CoreError>(())
            })
            .unwrap();

        assert_eq!(store.view(|tx| tx.count("a")).unwrap(), 0);
        assert_eq!(store.namespaces(), vec!["a".to_string()]);
    }

    #[test]
    fn value_size_limit() {
        let backend = Box::new(InMemoryBackend::new());
        let store = Store::open_with_backend(Config::new().max_value_size(4), backend).unwrap();
        with_ns(&store, "a");

        let err = store.update(|tx| tx.put("a", b"k", &b"12345"[..])).unwrap_err();
        assert!(matches!(err, CoreError::ValueTooLarge { size: 5, max: 4 }));
        store.update(|tx| tx.put("a", b"k", &b"1234"[..])).unwrap();
    }

    #[test]
    fn empty_commit_skips_log() {
        let store = Store::open_in_memory().unwrap();
        let before = store.inner.log.size().unwrap();
        store.update(|_| Ok::<_, CoreError>(())).unwrap();
        assert_eq!(store.inner.log.size().unwrap(), before);
        assert_eq!(store.committed_seq(), SequenceNumber::new(0));
    }

    #[test]
    fn closed_store_rejects_transactions() {
        let store = Store::open_in_memory().unwrap();
        let clone = store.clone();
        store.close().unwrap();
        store.close().unwrap();

        assert!(!clone.is_open());
        assert!(matches!(clone.begin_read(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(clone.begin_write(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(clone.compact(), Err(CoreError::DatabaseClosed)));
    }

    #[test]
    fn reopen_replays_commits() {
        let dir = tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            with_ns(&store, "a");
            store.update(|tx| tx.put("a", b"k", &b"v"[..])).unwrap();
            store.update(|tx| tx.next_sequence("a").map(drop)).unwrap();
        }

        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.committed_seq(), SequenceNumber::new(3));
        assert_eq!(
            store.view(|tx| tx.get("a", b"k")).unwrap().as_deref(),
            Some(&b"v"[..])
        );
        assert_eq!(store.view(|tx| tx.sequence("a")).unwrap(), 1);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = Store::open(dir.path()).unwrap();
        assert!(matches!(
            Store::open(dir.path()),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn error_if_exists() {
        let dir = tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            with_ns(&store, "a");
        }
        let result = Store::open_with_config(dir.path(), Config::new().error_if_exists(true));
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn compaction_preserves_state() {
        let dir = tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            with_ns(&store, "a");
            for i in 0u8..20 {
                store.update(|tx| tx.put("a", &[i], vec![i; 16])).unwrap();
            }
            for i in 0u8..10 {
                store.update(|tx| tx.delete("a", &[i])).unwrap();
            }
            let before = store.inner.log.size().unwrap();
            store.compact().unwrap();
            assert!(store.inner.log.size().unwrap() < before);

            // commits after a checkpoint append normally
            store.update(|tx| tx.put("a", b"after", &b"x"[..])).unwrap();
        }

        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.view(|tx| tx.count("a")).unwrap(), 11);
        assert_eq!(store.committed_seq(), SequenceNumber::new(32));
    }

    #[test]
    fn compact_on_open() {
        let dir = tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            with_ns(&store, "a");
            store.update(|tx| tx.put("a", b"k", &b"v"[..])).unwrap();
        }
        let store =
            Store::open_with_config(dir.path(), Config::new().compact_on_open(true)).unwrap();
        let records = store.inner.log.recover().unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], LogRecord::Checkpoint { .. }));
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let store = Store::open_in_memory().unwrap();
        with_ns(&store, "a");

        std::thread::scope(|s| {
            let writer = store.clone();
            s.spawn(move || {
                for i in 0u32..50 {
                    writer
                        .update(|tx| tx.put("a", &i.to_be_bytes(), &b"v"[..]))
                        .unwrap();
                }
            });
            for _ in 0..4 {
                let reader = store.clone();
                s.spawn(move || {
                    for _ in 0..50 {
                        let tx = reader.begin_read().unwrap();
                        let count = tx.count("a").unwrap();
                        assert_eq!(tx.scan("a").unwrap().len(), count);
                    }
                });
            }
        });

        assert_eq!(store.view(|tx| tx.count("a")).unwrap(), 50);
    }

    #[derive(Debug, Clone)]
    enum KvOp {
        Put(u8, Vec<u8>),
        Delete(u8),
    }

    fn kv_op() -> impl Strategy<Value = KvOp> {
        prop_oneof![
            3 => (0u8..16, prop::collection::vec(any::<u8>(), 0..8))
                .prop_map(|(k, v)| KvOp::Put(k, v)),
            1 => (0u8..16).prop_map(KvOp::Delete),
        ]
    }

    fn entries(model: &BTreeMap<Vec<u8>, Bytes>) -> Vec<Entry> {
        model.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn overlay_commits_and_replay_match_a_map(
            batches in prop::collection::vec(prop::collection::vec(kv_op(), 0..10), 1..8)
        ) {
            let dir = tempdir().unwrap();
            let mut model: BTreeMap<Vec<u8>, Bytes> = BTreeMap::new();
            {
                let store = Store::open(dir.path()).unwrap();
                with_ns(&store, "a");
                for batch in &batches {
                    store
                        .update(|tx| {
                            for op in batch {
                                match op {
                                    KvOp::Put(k, v) => {
                                        tx.put("a", &[*k], v.clone())?;
                                        model.insert(vec![*k], Bytes::from(v.clone()));
                                    }
                                    KvOp::Delete(k) => {
                                        let existed = tx.delete("a", &[*k])?;
                                        assert_eq!(existed, model.remove(&vec![*k]).is_some());
                                    }
                                }
                                // the overlay is visible to its own transaction
                                assert_eq!(tx.scan("a")?, entries(&model));
                                assert_eq!(tx.count("a")?, model.len());
                            }
                            Ok::<_, CoreError>(())
                        })
                        .unwrap();
                    prop_assert_eq!(store.view(|tx| tx.scan("a")).unwrap(), entries(&model));
                }
            }

            let store = Store::open(dir.path()).unwrap();
            prop_assert_eq!(store.view(|tx| tx.scan("a")).unwrap(), entries(&model));
            prop_assert_eq!(
                store.view(|tx| tx.last("a")).unwrap(),
                model.iter().next_back().map(|(k, v)| (k.clone(), v.clone()))
            );
        }
    }
}

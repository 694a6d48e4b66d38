//! Read and write transactions.

use super::snapshot::{NamespaceData, Snapshot};
use super::StoreInner;
use crate::error::{CoreError, CoreResult};
use crate::log::{LogOp, LogRecord};
use crate::types::{SequenceNumber, TransactionId};
use bytes::Bytes;
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tracing::trace;

/// A key and its value as returned by cursor reads.
pub type Entry = (Vec<u8>, Bytes);

/// Read access shared by both transaction kinds.
///
/// Every method sees one consistent state: the snapshot a [`ReadTxn`] was
/// opened on, or a [`WriteTxn`]'s base snapshot overlaid with its own
/// uncommitted writes.
pub trait KvRead {
    /// Returns true if the namespace exists.
    fn namespace_exists(&self, namespace: &str) -> bool;

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn get(&self, namespace: &str, key: &[u8]) -> CoreResult<Option<Bytes>>;

    /// Returns the entry with the smallest key.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn first(&self, namespace: &str) -> CoreResult<Option<Entry>> {
        self.seek(namespace, Bound::Unbounded, Direction::Forward)
    }

    /// Returns the entry with the largest key.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn last(&self, namespace: &str) -> CoreResult<Option<Entry>> {
        self.seek(namespace, Bound::Unbounded, Direction::Backward)
    }

    /// Returns the entry with the smallest key strictly greater than `key`.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn first_after(&self, namespace: &str, key: &[u8]) -> CoreResult<Option<Entry>> {
        self.seek(namespace, Bound::Excluded(key), Direction::Forward)
    }

    /// Returns the nearest entry past `from` in the given direction.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn seek(
        &self,
        namespace: &str,
        from: Bound<&[u8]>,
        direction: Direction,
    ) -> CoreResult<Option<Entry>>;

    /// Returns every entry in key order.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn scan(&self, namespace: &str) -> CoreResult<Vec<Entry>>;

    /// Returns the number of keys in the namespace.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn count(&self, namespace: &str) -> CoreResult<usize>;

    /// Returns the namespace's sequence counter.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    fn sequence(&self, namespace: &str) -> CoreResult<u64>;
}

/// Cursor direction for [`KvRead::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward larger keys.
    Forward,
    /// Toward smaller keys.
    Backward,
}

fn range_of<'k>(from: Bound<&'k [u8]>, direction: Direction) -> (Bound<&'k [u8]>, Bound<&'k [u8]>) {
    match direction {
        Direction::Forward => (from, Bound::Unbounded),
        Direction::Backward => (Bound::Unbounded, from),
    }
}

/// A read-only transaction over one committed snapshot.
///
/// The snapshot is owned, so a `ReadTxn` is `'static` and can outlive the
/// borrow of the store that opened it. Later commits are invisible to it.
#[derive(Debug, Clone)]
pub struct ReadTxn {
    snapshot: Arc<Snapshot>,
}

impl ReadTxn {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// Returns the commit sequence this transaction reads at.
    #[must_use]
    pub fn sequence_number(&self) -> SequenceNumber {
        self.snapshot.sequence
    }

    fn data(&self, namespace: &str) -> CoreResult<&NamespaceData> {
        self.snapshot
            .namespace(namespace)
            .ok_or_else(|| CoreError::namespace_not_found(namespace))
    }
}

impl KvRead for ReadTxn {
    fn namespace_exists(&self, namespace: &str) -> bool {
        self.snapshot.namespace(namespace).is_some()
    }

    fn get(&self, namespace: &str, key: &[u8]) -> CoreResult<Option<Bytes>> {
        Ok(self.data(namespace)?.entries.get(key).cloned())
    }

    fn seek(
        &self,
        namespace: &str,
        from: Bound<&[u8]>,
        direction: Direction,
    ) -> CoreResult<Option<Entry>> {
        let mut range = self
            .data(namespace)?
            .entries
            .range::<[u8], _>(range_of(from, direction));
        let found = match direction {
            Direction::Forward => range.next(),
            Direction::Backward => range.next_back(),
        };
        Ok(found.map(|(k, v)| (k.clone(), v.clone())))
    }

    fn scan(&self, namespace: &str) -> CoreResult<Vec<Entry>> {
        Ok(self
            .data(namespace)?
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn count(&self, namespace: &str) -> CoreResult<usize> {
        Ok(self.data(namespace)?.entries.len())
    }

    fn sequence(&self, namespace: &str) -> CoreResult<u64> {
        Ok(self.data(namespace)?.sequence)
    }
}

/// Uncommitted changes to one namespace.
#[derive(Debug, Default)]
struct PendingNamespace {
    /// Whether the namespace exists from this transaction's point of view.
    exists: bool,
    /// Whether the base snapshot's entries are hidden (dropped or recreated).
    shadows_base: bool,
    /// `None` marks a delete.
    writes: BTreeMap<Vec<u8>, Option<Bytes>>,
    sequence: Option<u64>,
}

/// The single write transaction of a store.
///
/// Holds the store's writer lock for its whole life, so at most one exists
/// at a time. Changes stay private until [`Self::commit`]; dropping the
/// transaction without committing discards them.
pub struct WriteTxn<'s> {
    inner: &'s StoreInner,
    _guard: MutexGuard<'s, ()>,
    id: TransactionId,
    base: Arc<Snapshot>,
    pending: BTreeMap<String, PendingNamespace>,
}

impl<'s> WriteTxn<'s> {
    pub(crate) fn new(
        inner: &'s StoreInner,
        guard: MutexGuard<'s, ()>,
        id: TransactionId,
        base: Arc<Snapshot>,
    ) -> Self {
        Self {
            inner,
            _guard: guard,
            id,
            base,
            pending: BTreeMap::new(),
        }
    }

    /// Returns this transaction's ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Creates a namespace. Creating an existing namespace is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty name.
    pub fn create_namespace(&mut self, namespace: &str) -> CoreResult<()> {
        if namespace.is_empty() {
            return Err(CoreError::invalid_argument("namespace name is empty"));
        }
        if self.namespace_exists(namespace) {
            return Ok(());
        }
        self.pending.insert(
            namespace.to_owned(),
            PendingNamespace {
                exists: true,
                shadows_base: true,
                writes: BTreeMap::new(),
                sequence: Some(0),
            },
        );
        Ok(())
    }

    /// Drops a namespace with all of its keys and its sequence counter.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    pub fn drop_namespace(&mut self, namespace: &str) -> CoreResult<()> {
        if !self.namespace_exists(namespace) {
            return Err(CoreError::namespace_not_found(namespace));
        }
        self.pending.insert(
            namespace.to_owned(),
            PendingNamespace {
                exists: false,
                shadows_base: true,
                writes: BTreeMap::new(),
                sequence: None,
            },
        );
        Ok(())
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist, or
    /// `ValueTooLarge` if the value exceeds the configured limit.
    pub fn put(&mut self, namespace: &str, key: &[u8], value: impl Into<Bytes>) -> CoreResult<()> {
        let value = value.into();
        let max = self.inner.config.max_value_size;
        if value.len() > max {
            return Err(CoreError::ValueTooLarge {
                size: value.len(),
                max,
            });
        }
        self.pending_mut(namespace)?
            .writes
            .insert(key.to_vec(), Some(value));
        Ok(())
    }

    /// Removes `key`. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist.
    pub fn delete(&mut self, namespace: &str, key: &[u8]) -> CoreResult<bool> {
        let existed = self.get(namespace, key)?.is_some();
        if existed {
            self.pending_mut(namespace)?.writes.insert(key.to_vec(), None);
        }
        Ok(existed)
    }

    /// Increments and returns the namespace's sequence counter.
    ///
    /// The first call on a fresh namespace returns 1.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotFound` if the namespace doesn't exist, or
    /// `InvalidOperation` if the counter would overflow.
    pub fn next_sequence(&mut self, namespace: &str) -> CoreResult<u64> {
        let next = self
            .sequence(namespace)?
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_operation("namespace sequence exhausted"))?;
        self.pending_mut(namespace)?.sequence = Some(next);
        Ok(next)
    }

    /// Makes every change durable and visible, then releases the writer lock.
    ///
    /// A transaction without changes commits without touching the log and
    /// returns the current sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the log append fails. Nothing is published in
    /// that case.
    pub fn commit(self) -> CoreResult<SequenceNumber> {
        let WriteTxn {
            inner,
            _guard,
            id,
            base,
            pending,
        } = self;

        let ops = Self::collect_ops(&base, pending);
        if ops.is_empty() {
            trace!(txid = %id, "empty commit");
            return Ok(base.sequence);
        }

        let sequence = base.sequence.next();
        let record = LogRecord::Commit { sequence, ops };
        inner.log.append(&record)?;

        // release our reference so make_mut can reuse untouched namespaces
        drop(base);
        {
            let mut current = inner.current.write();
            let next = Arc::make_mut(&mut current);
            next.apply(record.ops())?;
            next.sequence = sequence;
        }

        trace!(txid = %id, %sequence, ops = record.ops().len(), "committed");
        Ok(sequence)
    }

    /// Discards every change and releases the writer lock.
    pub fn rollback(self) {
        trace!(txid = %self.id, "rolled back");
    }

    fn collect_ops(base: &Snapshot, pending: BTreeMap<String, PendingNamespace>) -> Vec<LogOp> {
        let mut ops = Vec::new();
        for (name, change) in pending {
            if change.shadows_base {
                if base.namespace(&name).is_some() {
                    ops.push(LogOp::DropNamespace {
                        namespace: name.clone(),
                    });
                }
                if change.exists {
                    ops.push(LogOp::CreateNamespace {
                        namespace: name.clone(),
                    });
                }
            }
            if !change.exists {
                continue;
            }
            for (key, value) in change.writes {
                ops.push(match value {
                    Some(value) => LogOp::Put {
                        namespace: name.clone(),
                        key: Bytes::from(key),
                        value,
                    },
                    None => LogOp::Delete {
                        namespace: name.clone(),
                        key: Bytes::from(key),
                    },
                });
            }
            if let Some(value) = change.sequence {
                ops.push(LogOp::SetSequence {
                    namespace: name.clone(),
                    value,
                });
            }
        }
        ops
    }

    fn pending_mut(&mut self, namespace: &str) -> CoreResult<&mut PendingNamespace> {
        if !self.namespace_exists(namespace) {
            return Err(CoreError::namespace_not_found(namespace));
        }
        Ok(self
            .pending
            .entry(namespace.to_owned())
            .or_insert_with(|| PendingNamespace {
                exists: true,
                ..PendingNamespace::default()
            }))
    }

    /// Returns the base entries still visible to this transaction.
    fn visible_base(&self, namespace: &str) -> Option<&NamespaceData> {
        match self.pending.get(namespace) {
            Some(change) if change.shadows_base => None,
            _ => self.base.namespace(namespace),
        }
    }

    fn require_exists(&self, namespace: &str) -> CoreResult<()> {
        if self.namespace_exists(namespace) {
            Ok(())
        } else {
            Err(CoreError::namespace_not_found(namespace))
        }
    }
}

impl KvRead for WriteTxn<'_> {
    fn namespace_exists(&self, namespace: &str) -> bool {
        match self.pending.get(namespace) {
            Some(change) => change.exists,
            None => self.base.namespace(namespace).is_some(),
        }
    }

    fn get(&self, namespace: &str, key: &[u8]) -> CoreResult<Option<Bytes>> {
        self.require_exists(namespace)?;
        if let Some(written) = self.pending.get(namespace).and_then(|p| p.writes.get(key)) {
            return Ok(written.clone());
        }
        Ok(self
            .visible_base(namespace)
            .and_then(|data| data.entries.get(key).cloned()))
    }

    fn seek(
        &self,
        namespace: &str,
        from: Bound<&[u8]>,
        direction: Direction,
    ) -> CoreResult<Option<Entry>> {
        self.require_exists(namespace)?;
        let range = range_of(from, direction);
        let empty = BTreeMap::new();
        let writes = self.pending.get(namespace).map_or(&empty, |p| &p.writes);

        // first base entry not overridden by a pending write
        let from_base = self.visible_base(namespace).and_then(|data| {
            let mut iter = data.entries.range::<[u8], _>(range);
            match direction {
                Direction::Forward => iter.find(|(k, _)| !writes.contains_key(*k)),
                Direction::Backward => iter.rfind(|(k, _)| !writes.contains_key(*k)),
            }
        });

        let mut pending_iter = writes.range::<[u8], _>(range);
        let from_pending = match direction {
            Direction::Forward => pending_iter.find(|(_, v)| v.is_some()),
            Direction::Backward => pending_iter.rfind(|(_, v)| v.is_some()),
        }
        .and_then(|(k, v)| v.as_ref().map(|v| (k, v)));

        let chosen = match (from_base, from_pending) {
            (Some(b), Some(p)) => {
                let base_wins = match direction {
                    Direction::Forward => b.0 < p.0,
                    Direction::Backward => b.0 > p.0,
                };
                Some(if base_wins { b } else { p })
            }
            (b, p) => b.or(p),
        };
        Ok(chosen.map(|(k, v)| (k.clone(), v.clone())))
    }

    fn scan(&self, namespace: &str) -> CoreResult<Vec<Entry>> {
        self.require_exists(namespace)?;
        let mut merged: BTreeMap<&[u8], &Bytes> = self
            .visible_base(namespace)
            .map(|data| {
                data.entries
                    .iter()
                    .map(|(k, v)| (k.as_slice(), v))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(change) = self.pending.get(namespace) {
            for (key, value) in &change.writes {
                match value {
                    Some(value) => {
                        merged.insert(key.as_slice(), value);
                    }
                    None => {
                        merged.remove(key.as_slice());
                    }
                }
            }
        }
        Ok(merged
            .into_iter()
            .map(|(k, v)| (k.to_vec(), v.clone()))
            .collect())
    }

    fn count(&self, namespace: &str) -> CoreResult<usize> {
        self.require_exists(namespace)?;
        let base = self.visible_base(namespace);
        let mut count = base.map_or(0, |data| data.entries.len());
        if let Some(change) = self.pending.get(namespace) {
            for (key, value) in &change.writes {
                let in_base = base.is_some_and(|data| data.entries.contains_key(key));
                match (in_base, value.is_some()) {
                    (false, true) => count += 1,
                    (true, false) => count -= 1,
                    _ => {}
                }
            }
        }
        Ok(count)
    }

    fn sequence(&self, namespace: &str) -> CoreResult<u64> {
        self.require_exists(namespace)?;
        if let Some(seq) = self.pending.get(namespace).and_then(|p| p.sequence) {
            return Ok(seq);
        }
        Ok(self.visible_base(namespace).map_or(0, |data| data.sequence))
    }
}

impl std::fmt::Debug for WriteTxn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTxn")
            .field("id", &self.id)
            .field("base", &self.base.sequence)
            .field("pending_namespaces", &self.pending.len())
            .finish_non_exhaustive()
    }
}

//! Immutable committed state.

use crate::error::{CoreError, CoreResult};
use crate::log::LogOp;
use crate::types::SequenceNumber;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Keys and sequence counter of one namespace.
#[derive(Debug, Clone, Default)]
pub(crate) struct NamespaceData {
    pub(crate) entries: BTreeMap<Vec<u8>, Bytes>,
    pub(crate) sequence: u64,
}

/// Committed state as of one sequence number.
///
/// Snapshots are shared behind `Arc` and never mutated once published. A
/// commit copies only the namespaces it touches.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub(crate) namespaces: BTreeMap<String, Arc<NamespaceData>>,
    pub(crate) sequence: SequenceNumber,
}

impl Snapshot {
    pub(crate) fn namespace(&self, name: &str) -> Option<&NamespaceData> {
        self.namespaces.get(name).map(Arc::as_ref)
    }

    /// Applies log operations in order.
    pub(crate) fn apply(&mut self, ops: &[LogOp]) -> CoreResult<()> {
        for op in ops {
            match op {
                LogOp::CreateNamespace { namespace } => {
                    self.namespaces.entry(namespace.clone()).or_default();
                }
                LogOp::DropNamespace { namespace } => {
                    self.namespaces.remove(namespace);
                }
                LogOp::Put {
                    namespace,
                    key,
                    value,
                } => {
                    self.namespace_mut(namespace)?
                        .entries
                        .insert(key.to_vec(), value.clone());
                }
                LogOp::Delete { namespace, key } => {
                    self.namespace_mut(namespace)?.entries.remove(key.as_ref());
                }
                LogOp::SetSequence { namespace, value } => {
                    self.namespace_mut(namespace)?.sequence = *value;
                }
            }
        }
        Ok(())
    }

    /// Describes the snapshot as operations that rebuild it from empty.
    pub(crate) fn to_ops(&self) -> Vec<LogOp> {
        let mut ops = Vec::new();
        for (name, data) in &self.namespaces {
            ops.push(LogOp::CreateNamespace {
                namespace: name.clone(),
            });
            if data.sequence != 0 {
                ops.push(LogOp::SetSequence {
                    namespace: name.clone(),
                    value: data.sequence,
                });
            }
            for (key, value) in &data.entries {
                ops.push(LogOp::Put {
                    namespace: name.clone(),
                    key: Bytes::copy_from_slice(key),
                    value: value.clone(),
                });
            }
        }
        ops
    }

    fn namespace_mut(&mut self, name: &str) -> CoreResult<&mut NamespaceData> {
        self.namespaces
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| CoreError::namespace_not_found(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(ns: &str, key: &[u8], value: &'static [u8]) -> LogOp {
        LogOp::Put {
            namespace: ns.into(),
            key: Bytes::copy_from_slice(key),
            value: Bytes::from_static(value),
        }
    }

    #[test]
    fn apply_builds_state() {
        let mut snapshot = Snapshot::default();
        snapshot
            .apply(&[
                LogOp::CreateNamespace {
                    namespace: "a".into(),
                },
                put("a", b"k1", b"v1"),
                put("a", b"k2", b"v2"),
                LogOp::Delete {
                    namespace: "a".into(),
                    key: Bytes::from_static(b"k1"),
                },
                LogOp::SetSequence {
                    namespace: "a".into(),
                    value: 9,
                },
            ])
            .unwrap();

        let ns = snapshot.namespace("a").unwrap();
        assert_eq!(ns.entries.len(), 1);
        assert_eq!(ns.entries[b"k2".as_slice()], Bytes::from_static(b"v2"));
        assert_eq!(ns.sequence, 9);
    }

    #[test]
    fn put_into_missing_namespace_fails() {
        let mut snapshot = Snapshot::default();
        let err = snapshot.apply(&[put("ghost", b"k", b"v")]).unwrap_err();
        assert!(matches!(err, CoreError::NamespaceNotFound { .. }));
    }

    #[test]
    fn create_is_idempotent() {
        let mut snapshot = Snapshot::default();
        let create = LogOp::CreateNamespace {
            namespace: "a".into(),
        };
        snapshot.apply(&[create.clone(), put("a", b"k", b"v")]).unwrap();
        snapshot.apply(&[create]).unwrap();
        assert_eq!(snapshot.namespace("a").unwrap().entries.len(), 1);
    }

    #[test]
    fn shared_namespaces_are_copied_on_write() {
        let mut base = Snapshot::default();
        base.apply(&[
            LogOp::CreateNamespace {
                namespace: "a".into(),
            },
            put("a", b"k", b"old"),
        ])
        .unwrap();

        let mut next = base.clone();
        next.apply(&[put("a", b"k", b"new")]).unwrap();

        assert_eq!(
            base.namespace("a").unwrap().entries[b"k".as_slice()],
            Bytes::from_static(b"old")
        );
        assert_eq!(
            next.namespace("a").unwrap().entries[b"k".as_slice()],
            Bytes::from_static(b"new")
        );
    }

    #[test]
    fn ops_rebuild_identical_state() {
        let mut original = Snapshot::default();
        original
            .apply(&[
                LogOp::CreateNamespace {
                    namespace: "a".into(),
                },
                LogOp::CreateNamespace {
                    namespace: "b".into(),
                },
                put("a", b"x", b"1"),
                LogOp::SetSequence {
                    namespace: "b".into(),
                    value: 4,
                },
            ])
            .unwrap();

        let mut rebuilt = Snapshot::default();
        rebuilt.apply(&original.to_ops()).unwrap();

        assert_eq!(rebuilt.namespaces.len(), 2);
        assert_eq!(rebuilt.namespace("a").unwrap().entries.len(), 1);
        assert_eq!(rebuilt.namespace("b").unwrap().sequence, 4);
    }
}

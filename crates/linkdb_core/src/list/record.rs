//! Persisted list records and typed reads over a transaction.

use super::error::{ListError, ListResult};
use crate::error::CoreError;
use crate::store::{KvRead, WriteTxn};
use bytes::Bytes;
use linkdb_codec::{from_cbor, Decode, Encode, NodeKey};
use serde::{Deserialize, Serialize};

/// Store key of the list metadata record.
///
/// One byte long, so it sorts before every 8-byte node key and cannot
/// collide with one.
pub(crate) const META_KEY: &[u8] = &[0x00];

/// One element of a list as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Element payload.
    pub value: Bytes,
    /// Predecessor, `None` at the head.
    pub prev: Option<NodeKey>,
    /// Successor, `None` at the tail.
    pub next: Option<NodeKey>,
}

impl NodeRecord {
    /// Creates an unlinked node.
    #[must_use]
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            prev: None,
            next: None,
        }
    }
}

/// Head and tail of a list. Both are `None` exactly when the list is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    /// First node.
    pub head: Option<NodeKey>,
    /// Last node.
    pub tail: Option<NodeKey>,
}

fn not_found_as_list(list: &str) -> impl FnOnce(CoreError) -> ListError + '_ {
    move |e| match e {
        CoreError::NamespaceNotFound { .. } => ListError::ListNotFound {
            name: list.to_owned(),
        },
        other => other.into(),
    }
}

/// Reads and decodes a node. `Ok(None)` if the key is absent.
pub(crate) fn load_node<T: KvRead + ?Sized>(
    tx: &T,
    list: &str,
    key: NodeKey,
) -> ListResult<Option<NodeRecord>> {
    let Some(raw) = tx
        .get(list, &key.to_bytes())
        .map_err(not_found_as_list(list))?
    else {
        return Ok(None);
    };
    NodeRecord::decode(&raw)
        .map(Some)
        .map_err(|source| ListError::CorruptNode { key, source })
}

/// Like [`load_node`], failing with `NotFound` if the key is absent.
pub(crate) fn require_node<T: KvRead + ?Sized>(
    tx: &T,
    list: &str,
    key: NodeKey,
) -> ListResult<NodeRecord> {
    load_node(tx, list, key)?.ok_or(ListError::NotFound { key })
}

/// Reads the list metadata.
pub(crate) fn load_meta<T: KvRead + ?Sized>(tx: &T, list: &str) -> ListResult<ListMeta> {
    let raw = tx
        .get(list, META_KEY)
        .map_err(not_found_as_list(list))?
        .ok_or_else(|| ListError::corrupt_metadata(list, "metadata record missing"))?;
    from_cbor(&raw).map_err(|e| ListError::corrupt_metadata(list, e.to_string()))
}

/// Decodes a raw store key as a node key.
pub(crate) fn node_key_of(list: &str, raw: &[u8]) -> ListResult<NodeKey> {
    NodeKey::from_slice(raw)
        .map_err(|e| ListError::broken_chain(list, format!("stray key in list: {e}")))
}

pub(crate) fn store_node(
    tx: &mut WriteTxn<'_>,
    list: &str,
    key: NodeKey,
    node: &NodeRecord,
) -> ListResult<()> {
    tx.put(list, &key.to_bytes(), node.encode()?)?;
    Ok(())
}

pub(crate) fn store_meta(tx: &mut WriteTxn<'_>, list: &str, meta: &ListMeta) -> ListResult<()> {
    tx.put(list, META_KEY, meta.encode()?)?;
    Ok(())
}

//! Structural checks of a stored list.

use super::error::{ListError, ListResult};
use super::record::{load_meta, node_key_of, ListMeta, NodeRecord, META_KEY};
use super::LinkedList;
use crate::store::KvRead;
use linkdb_codec::{from_cbor, NodeKey};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Summary of a list that passed [`LinkedList::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStats {
    /// Number of nodes reachable from the head.
    pub len: usize,
    /// First node.
    pub head: Option<NodeKey>,
    /// Last node.
    pub tail: Option<NodeKey>,
}

impl LinkedList {
    /// Checks the stored chain against the metadata in one snapshot.
    ///
    /// A sound list has `head.prev` and `tail.next` unset, each `next` link
    /// mirrored by a `prev` link, no cycles, and no node outside the chain.
    ///
    /// # Errors
    ///
    /// Returns `BrokenChain` naming the first defect found, `CorruptNode`
    /// or `CorruptMetadata` for undecodable records.
    pub fn verify(&self) -> ListResult<ChainStats> {
        let name = self.name();
        let result = self.store().view(|tx| {
            let meta = load_meta(tx, name)?;
            let mut nodes = HashMap::new();
            for (raw, value) in tx.scan(name)? {
                if raw == META_KEY {
                    continue;
                }
                let key = node_key_of(name, &raw)?;
                let node: NodeRecord =
                    from_cbor(&value).map_err(|source| ListError::CorruptNode { key, source })?;
                nodes.insert(key, node);
            }
            check_chain(name, meta, &nodes)
        });

        if let Err(e) = &result {
            if e.is_corruption() {
                warn!(list = name, error = %e, "list failed verification");
            }
        }
        result.map_err(|e| e.during("verify"))
    }
}

fn check_chain(
    list: &str,
    meta: ListMeta,
    nodes: &HashMap<NodeKey, NodeRecord>,
) -> ListResult<ChainStats> {
    let broken = |message: String| ListError::broken_chain(list, message);

    let head = match (meta.head, meta.tail) {
        (None, None) if nodes.is_empty() => {
            return Ok(ChainStats {
                len: 0,
                head: None,
                tail: None,
            })
        }
        (None, None) => {
            return Err(broken(format!(
                "metadata marks the list empty but {} nodes exist",
                nodes.len()
            )))
        }
        (Some(head), Some(_)) => head,
        _ => return Err(broken("only one of head and tail is set".to_owned())),
    };

    let mut seen = HashSet::with_capacity(nodes.len());
    let mut prev: Option<NodeKey> = None;
    let mut cursor = Some(head);
    while let Some(key) = cursor {
        if !seen.insert(key) {
            return Err(broken(format!("cycle through node {key}")));
        }
        let node = nodes.get(&key).ok_or_else(|| match prev {
            Some(p) => broken(format!("node {p} links to missing node {key}")),
            None => broken(format!("head {key} is missing")),
        })?;
        if node.prev != prev {
            return Err(broken(format!(
                "node {key} has prev {:?}, expected {:?}",
                node.prev, prev
            )));
        }
        prev = Some(key);
        cursor = node.next;
    }

    if prev != meta.tail {
        return Err(broken(format!(
            "chain ends at {prev:?} but metadata names tail {:?}",
            meta.tail
        )));
    }
    if seen.len() != nodes.len() {
        return Err(broken(format!(
            "{} nodes are unreachable from the head",
            nodes.len() - seen.len()
        )));
    }

    Ok(ChainStats {
        len: seen.len(),
        head: meta.head,
        tail: meta.tail,
    })
}

//! Link surgery inside a single write transaction.
//!
//! Every method reads its nodes through the transaction, so it sees the
//! writes made earlier in the same transaction. A failed call leaves
//! partial writes in the overlay; the caller's transaction is rolled back
//! by returning the error from `Store::update`.

use super::error::{ListError, ListResult};
use super::record::{
    load_meta, load_node, node_key_of, require_node, store_meta, store_node, ListMeta, NodeRecord,
    META_KEY,
};
use crate::store::{KvRead, WriteTxn};
use bytes::Bytes;
use linkdb_codec::NodeKey;

/// A list-scoped view over a write transaction.
pub(crate) struct Splicer<'t, 's> {
    tx: &'t mut WriteTxn<'s>,
    list: &'t str,
}

impl<'t, 's> Splicer<'t, 's> {
    pub(crate) fn new(tx: &'t mut WriteTxn<'s>, list: &'t str) -> Self {
        Self { tx, list }
    }

    fn meta(&self) -> ListResult<ListMeta> {
        load_meta(&*self.tx, self.list)
    }

    fn set_meta(&mut self, meta: &ListMeta) -> ListResult<()> {
        store_meta(self.tx, self.list, meta)
    }

    fn node(&self, key: NodeKey) -> ListResult<NodeRecord> {
        require_node(&*self.tx, self.list, key)
    }

    /// Loads a node the chain says must exist.
    fn linked(&self, from: NodeKey, key: NodeKey) -> ListResult<NodeRecord> {
        load_node(&*self.tx, self.list, key)?.ok_or_else(|| {
            ListError::broken_chain(self.list, format!("node {from} links to missing node {key}"))
        })
    }

    fn put(&mut self, key: NodeKey, node: &NodeRecord) -> ListResult<()> {
        store_node(self.tx, self.list, key, node)
    }

    fn mint_key(&mut self) -> ListResult<NodeKey> {
        Ok(NodeKey::from_sequence(self.tx.next_sequence(self.list)?))
    }

    fn invalid_mark(&self) -> ListError {
        ListError::InvalidMark {
            list: self.list.to_owned(),
        }
    }

    /// Appends a node after the tail.
    pub(crate) fn push_back(&mut self, value: Bytes) -> ListResult<NodeKey> {
        let mut meta = self.meta()?;
        let key = self.mint_key()?;
        let mut node = NodeRecord::new(value);

        match meta.tail {
            Some(tail_key) => {
                let mut tail = self.linked(tail_key, tail_key)?;
                tail.next = Some(key);
                self.put(tail_key, &tail)?;
                node.prev = Some(tail_key);
            }
            None => meta.head = Some(key),
        }
        meta.tail = Some(key);

        self.put(key, &node)?;
        self.set_meta(&meta)?;
        Ok(key)
    }

    /// Prepends a node before the head.
    pub(crate) fn push_front(&mut self, value: Bytes) -> ListResult<NodeKey> {
        let mut meta = self.meta()?;
        let key = self.mint_key()?;
        let mut node = NodeRecord::new(value);

        match meta.head {
            Some(head_key) => {
                let mut head = self.linked(head_key, head_key)?;
                head.prev = Some(key);
                self.put(head_key, &head)?;
                node.next = Some(head_key);
            }
            None => meta.tail = Some(key),
        }
        meta.head = Some(key);

        self.put(key, &node)?;
        self.set_meta(&meta)?;
        Ok(key)
    }

    /// Inserts a node right after `mark`.
    pub(crate) fn insert_after(&mut self, mark: NodeKey, value: Bytes) -> ListResult<NodeKey> {
        let mut anchor = load_node(&*self.tx, self.list, mark)?.ok_or_else(|| self.invalid_mark())?;
        if self.meta()?.tail == Some(mark) {
            return self.push_back(value);
        }

        let next_key = anchor.next.ok_or_else(|| {
            ListError::broken_chain(self.list, format!("node {mark} has no successor but is not the tail"))
        })?;
        let mut next = self.linked(mark, next_key)?;
        let key = self.mint_key()?;

        self.put(
            key,
            &NodeRecord {
                value,
                prev: Some(mark),
                next: Some(next_key),
            },
        )?;
        anchor.next = Some(key);
        self.put(mark, &anchor)?;
        next.prev = Some(key);
        self.put(next_key, &next)?;
        Ok(key)
    }

    /// Inserts a node right before `mark`.
    pub(crate) fn insert_before(&mut self, mark: NodeKey, value: Bytes) -> ListResult<NodeKey> {
        let mut anchor = load_node(&*self.tx, self.list, mark)?.ok_or_else(|| self.invalid_mark())?;
        if self.meta()?.head == Some(mark) {
            return self.push_front(value);
        }

        let prev_key = anchor.prev.ok_or_else(|| {
            ListError::broken_chain(self.list, format!("node {mark} has no predecessor but is not the head"))
        })?;
        let mut prev = self.linked(mark, prev_key)?;
        let key = self.mint_key()?;

        self.put(
            key,
            &NodeRecord {
                value,
                prev: Some(prev_key),
                next: Some(mark),
            },
        )?;
        anchor.prev = Some(key);
        self.put(mark, &anchor)?;
        prev.next = Some(key);
        self.put(prev_key, &prev)?;
        Ok(key)
    }

    /// Detaches `node` from its neighbours, adjusting `meta` at the ends.
    fn unlink(&mut self, key: NodeKey, node: &NodeRecord, meta: &mut ListMeta) -> ListResult<()> {
        match node.prev {
            Some(prev_key) => {
                let mut prev = self.linked(key, prev_key)?;
                prev.next = node.next;
                self.put(prev_key, &prev)?;
            }
            None => meta.head = node.next,
        }
        match node.next {
            Some(next_key) => {
                let mut next = self.linked(key, next_key)?;
                next.prev = node.prev;
                self.put(next_key, &next)?;
            }
            None => meta.tail = node.prev,
        }
        Ok(())
    }

    /// Deletes a node, returning its last record.
    pub(crate) fn remove(&mut self, key: NodeKey) -> ListResult<NodeRecord> {
        let node = self.node(key)?;
        let mut meta = self.meta()?;
        let before = meta;

        self.unlink(key, &node, &mut meta)?;
        self.tx.delete(self.list, &key.to_bytes())?;
        if meta != before {
            self.set_meta(&meta)?;
        }
        Ok(node)
    }

    /// Replaces a node's value, keeping its links.
    pub(crate) fn update(&mut self, key: NodeKey, value: Bytes) -> ListResult<()> {
        let mut node = self.node(key)?;
        node.value = value;
        self.put(key, &node)
    }

    /// Makes `key` the head.
    pub(crate) fn move_to_front(&mut self, key: NodeKey) -> ListResult<()> {
        let mut meta = self.meta()?;
        let head_key = meta.head.ok_or(ListError::EmptyList)?;
        let mut node = self.node(key)?;
        if head_key == key {
            return Ok(());
        }

        // key is not the head, so the head survives the unlink
        self.unlink(key, &node, &mut meta)?;
        let mut head = self.linked(key, head_key)?;
        head.prev = Some(key);
        self.put(head_key, &head)?;

        node.prev = None;
        node.next = Some(head_key);
        self.put(key, &node)?;

        meta.head = Some(key);
        self.set_meta(&meta)
    }

    /// Makes `key` the tail.
    pub(crate) fn move_to_back(&mut self, key: NodeKey) -> ListResult<()> {
        let mut meta = self.meta()?;
        let tail_key = meta.tail.ok_or(ListError::EmptyList)?;
        let mut node = self.node(key)?;
        if tail_key == key {
            return Ok(());
        }

        self.unlink(key, &node, &mut meta)?;
        let mut tail = self.linked(key, tail_key)?;
        tail.next = Some(key);
        self.put(tail_key, &tail)?;

        node.next = None;
        node.prev = Some(tail_key);
        self.put(key, &node)?;

        meta.tail = Some(key);
        self.set_meta(&meta)
    }

    /// Deletes every node and resets the metadata. The sequence is kept.
    pub(crate) fn clear(&mut self) -> ListResult<usize> {
        let entries = self.tx.scan(self.list)?;
        let mut removed = 0;
        for (raw, _) in entries {
            if raw.as_slice() == META_KEY {
                continue;
            }
            let key = node_key_of(self.list, &raw)?;
            self.tx.delete(self.list, &key.to_bytes())?;
            removed += 1;
        }
        self.set_meta(&ListMeta::default())?;
        Ok(removed)
    }

    /// Rebuilds missing metadata from the node links.
    ///
    /// Starts at the smallest node key, walks `prev` links to the head and
    /// `next` links to the tail. Returns `None` if the list has no nodes.
    pub(crate) fn rebuild_meta(&mut self) -> ListResult<Option<ListMeta>> {
        let Some((raw, _)) = self.tx.first_after(self.list, META_KEY)? else {
            return Ok(None);
        };
        let start = node_key_of(self.list, &raw)?;
        let limit = self.tx.count(self.list)?;

        let mut head = start;
        let mut steps = 0;
        while let Some(prev) = self.node(head)?.prev {
            head = prev;
            steps += 1;
            if steps > limit {
                return Err(ListError::broken_chain(self.list, "cycle in prev links"));
            }
        }

        let mut tail = start;
        steps = 0;
        while let Some(next) = self.node(tail)?.next {
            tail = next;
            steps += 1;
            if steps > limit {
                return Err(ListError::broken_chain(self.list, "cycle in next links"));
            }
        }

        let meta = ListMeta {
            head: Some(head),
            tail: Some(tail),
        };
        self.set_meta(&meta)?;
        Ok(Some(meta))
    }
}

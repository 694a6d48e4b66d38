//! Snapshot iteration over a list.

use super::error::{ListError, ListResult};
use super::record::{load_node, ListMeta};
use super::{Item, LinkedList};
use crate::store::ReadTxn;
use linkdb_codec::NodeKey;

/// Double-ended iterator over the elements of a list.
///
/// Holds its own read transaction, so it sees one consistent snapshot no
/// matter what commits happen while it is alive. Forward and backward
/// cursors meet in the middle and never yield an element twice.
///
/// Yields `Err` once and then stops if a node is missing or corrupt, or
/// if the links would yield more elements than the list holds.
pub struct Iter {
    list: LinkedList,
    tx: ReadTxn,
    front: Option<NodeKey>,
    back: Option<NodeKey>,
    remaining: usize,
    done: bool,
}

impl Iter {
    /// `nodes` bounds how many elements a sound chain can yield.
    pub(crate) fn new(list: LinkedList, tx: ReadTxn, meta: ListMeta, nodes: usize) -> Self {
        Self {
            list,
            tx,
            front: meta.head,
            back: meta.tail,
            remaining: nodes,
            done: meta.head.is_none(),
        }
    }

    fn visit(
        &mut self,
        key: NodeKey,
        advance: impl FnOnce(&mut Self, Option<NodeKey>, Option<NodeKey>),
    ) -> Option<ListResult<Item>> {
        if self.remaining == 0 {
            self.done = true;
            return Some(Err(ListError::broken_chain(
                self.list.name(),
                "cycle in links",
            )));
        }
        self.remaining -= 1;

        match load_node(&self.tx, self.list.name(), key) {
            Ok(Some(node)) => {
                if self.front == self.back {
                    self.done = true;
                } else {
                    advance(self, node.prev, node.next);
                }
                Some(Ok(Item::new(self.list.clone(), key, node.value)))
            }
            Ok(None) => {
                self.done = true;
                Some(Err(ListError::broken_chain(
                    self.list.name(),
                    format!("iteration reached missing node {key}"),
                )))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Iterator for Iter {
    type Item = ListResult<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = self.front?;
        self.visit(key, |it, _, next| {
            it.front = next;
            if next.is_none() {
                it.done = true;
            }
        })
    }
}

impl DoubleEndedIterator for Iter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = self.back?;
        self.visit(key, |it, prev, _| {
            it.back = prev;
            if prev.is_none() {
                it.done = true;
            }
        })
    }
}

impl std::iter::FusedIterator for Iter {}

impl std::fmt::Debug for Iter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iter")
            .field("list", &self.list.name())
            .field("front", &self.front)
            .field("back", &self.back)
            .field("remaining", &self.remaining)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::record::NodeRecord;
    use crate::store::{KvRead, Store};
    use bytes::Bytes;
    use linkdb_codec::{from_cbor, to_cbor};

    fn list_of(values: &[&'static str]) -> LinkedList {
        let store = Store::open_in_memory().unwrap();
        let list = LinkedList::open(&store, "l").unwrap();
        for v in values {
            list.push_back(*v).unwrap();
        }
        list
    }

    fn collect(iter: impl Iterator<Item = ListResult<Item>>) -> Vec<Bytes> {
        iter.map(|item| item.unwrap().bytes()).collect()
    }

    #[test]
    fn forward_and_backward() {
        let list = list_of(&["a", "b", "c", "d"]);
        assert_eq!(collect(list.iter().unwrap()), ["a", "b", "c", "d"]);
        assert_eq!(collect(list.iter().unwrap().rev()), ["d", "c", "b", "a"]);
    }

    #[test]
    fn empty_list_yields_nothing() {
        let list = list_of(&[]);
        assert!(list.iter().unwrap().next().is_none());
        assert!(list.iter().unwrap().next_back().is_none());
    }

    #[test]
    fn cursors_meet_in_the_middle() {
        for len in 1..=5 {
            let values: Vec<&'static str> = ["1", "2", "3", "4", "5"][..len].to_vec();
            let list = list_of(&values);

            let mut iter = list.iter().unwrap();
            let mut seen = Vec::new();
            let mut from_front = true;
            loop {
                let step = if from_front { iter.next() } else { iter.next_back() };
                match step {
                    Some(item) => seen.push(item.unwrap().bytes()),
                    None => break,
                }
                from_front = !from_front;
            }
            assert_eq!(seen.len(), len, "len {len}");
            assert!(iter.next().is_none());
            assert!(iter.next_back().is_none());
        }
    }

    #[test]
    fn iterator_keeps_its_snapshot() {
        let list = list_of(&["a", "b"]);
        let iter = list.iter().unwrap();
        list.push_back("c").unwrap();
        list.front().unwrap().unwrap().remove().unwrap();

        assert_eq!(collect(iter), ["a", "b"]);
        assert_eq!(collect(list.iter().unwrap()), ["b", "c"]);
    }

    fn relink(list: &LinkedList, key: NodeKey, f: impl FnOnce(&mut NodeRecord)) {
        list.store()
            .update(|tx| {
                let raw = tx.get(list.name(), &key.to_bytes())?.unwrap();
                let mut node: NodeRecord = from_cbor(&raw)?;
                f(&mut node);
                tx.put(list.name(), &key.to_bytes(), to_cbor(&node)?)?;
                Ok::<_, crate::error::CoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn cyclic_next_links_end_in_broken_chain() {
        let list = list_of(&["a", "b", "c"]);
        let a = list.front().unwrap().unwrap();
        let b = a.next().unwrap().unwrap();
        relink(&list, b.key(), |node| node.next = Some(a.key()));

        let err = list.values().unwrap_err();
        assert!(matches!(err, ListError::BrokenChain { .. }), "{err:?}");

        let results: Vec<_> = list.iter().unwrap().take(100).collect();
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(Result::is_ok));
        assert!(results[3].is_err());
    }

    #[test]
    fn cyclic_prev_links_end_in_broken_chain() {
        let list = list_of(&["a", "b", "c"]);
        let c = list.back().unwrap().unwrap();
        let b = c.prev().unwrap().unwrap();
        relink(&list, b.key(), |node| node.prev = Some(c.key()));

        let results: Vec<_> = list.iter().unwrap().rev().take(100).collect();
        assert_eq!(results.len(), 4);
        assert!(matches!(
            results.last(),
            Some(Err(ListError::BrokenChain { .. }))
        ));
    }
}

//! Linear searches over a list.

use super::error::{ListError, ListResult};
use super::record::{load_meta, load_node, require_node};
use super::{Item, LinkedList};
use crate::store::KvRead;
use linkdb_codec::NodeKey;

#[derive(Clone, Copy)]
enum Start<'a> {
    Head,
    After(&'a Item),
}

impl LinkedList {
    /// Returns the first element equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyList` if the list has no elements.
    pub fn get(&self, value: impl AsRef<[u8]>) -> ListResult<Option<Item>> {
        self.search("get", Start::Head, value.as_ref(), bytes_eq)
    }

    /// Returns the first element for which `matches(query, value)` holds.
    ///
    /// # Errors
    ///
    /// Returns `EmptyList` if the list has no elements.
    pub fn get_func<Q, F>(&self, query: &Q, matches: F) -> ListResult<Option<Item>>
    where
        Q: ?Sized,
        F: FnMut(&Q, &[u8]) -> bool,
    {
        self.search("get_func", Start::Head, query, matches)
    }

    /// Returns the first element after `mark` equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMark` if `mark` is not a live element of this list,
    /// or `EmptyList` if the list has no elements.
    pub fn get_next(&self, value: impl AsRef<[u8]>, mark: &Item) -> ListResult<Option<Item>> {
        self.search("get_next", Start::After(mark), value.as_ref(), bytes_eq)
    }

    /// Returns the first element after `mark` for which
    /// `matches(query, value)` holds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMark` if `mark` is not a live element of this list,
    /// or `EmptyList` if the list has no elements.
    pub fn get_next_func<Q, F>(&self, query: &Q, mark: &Item, matches: F) -> ListResult<Option<Item>>
    where
        Q: ?Sized,
        F: FnMut(&Q, &[u8]) -> bool,
    {
        self.search("get_next_func", Start::After(mark), query, matches)
    }

    fn search<Q, F>(
        &self,
        op: &'static str,
        start: Start<'_>,
        query: &Q,
        mut matches: F,
    ) -> ListResult<Option<Item>>
    where
        Q: ?Sized,
        F: FnMut(&Q, &[u8]) -> bool,
    {
        let name = self.name();
        if let Start::After(mark) = start {
            if !self.owns(mark) {
                return Err(ListError::InvalidMark {
                    list: name.to_owned(),
                });
            }
        }

        self.store()
            .view(|tx| {
                let head = load_meta(tx, name)?.head.ok_or(ListError::EmptyList)?;
                let mut cursor: Option<NodeKey> = match start {
                    Start::Head => Some(head),
                    Start::After(mark) => {
                        load_node(tx, name, mark.key())?
                            .ok_or_else(|| ListError::InvalidMark {
                                list: name.to_owned(),
                            })?
                            .next
                    }
                };

                // a sound chain has at most `count` nodes
                let mut budget = tx.count(name)?;
                while let Some(key) = cursor {
                    if budget == 0 {
                        return Err(ListError::broken_chain(name, "cycle in next links"));
                    }
                    budget -= 1;

                    let node = require_node(tx, name, key)?;
                    if matches(query, &node.value) {
                        return Ok(Some(self.item(key, node.value)));
                    }
                    cursor = node.next;
                }
                Ok(None)
            })
            .map_err(|e| e.during(op))
    }
}

fn bytes_eq(query: &[u8], value: &[u8]) -> bool {
    query == value
}

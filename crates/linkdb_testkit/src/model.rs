//! Reference model for list behavior.
//!
//! [`ListModel`] drives a real [`LinkedList`] and a plain vector side by
//! side. After any operation, [`ListModel::check`] asserts that
//! the stored chain matches the vector in both directions and passes
//! structural verification.

use crate::generators::ListOp;
use bytes::Bytes;
use linkdb_core::{Item, LinkedList, ListResult};

/// A list paired with the sequence it is expected to hold.
pub struct ListModel {
    list: LinkedList,
    items: Vec<Item>,
    expected: Vec<Bytes>,
}

impl ListModel {
    /// Starts modelling `list`, which must be empty.
    pub fn new(list: LinkedList) -> Self {
        Self {
            list,
            items: Vec::new(),
            expected: Vec::new(),
        }
    }

    /// Returns the list under test.
    pub fn list(&self) -> &LinkedList {
        &self.list
    }

    /// Returns the values the list should hold.
    pub fn expected(&self) -> &[Bytes] {
        &self.expected
    }

    /// Applies one operation to both the list and the model.
    ///
    /// Positional operations on an empty list do nothing.
    ///
    /// # Errors
    ///
    /// Returns the list error if the real operation fails. The model is
    /// left unchanged in that case.
    pub fn apply(&mut self, op: &ListOp) -> ListResult<()> {
        let len = self.items.len();
        match op {
            ListOp::PushBack(value) => {
                let item = self.list.push_back(value.clone())?;
                self.insert(len, item);
            }
            ListOp::PushFront(value) => {
                let item = self.list.push_front(value.clone())?;
                self.insert(0, item);
            }
            ListOp::InsertBefore { at, value } if len > 0 => {
                let at = at % len;
                let item = self.list.insert_before(value.clone(), &self.items[at])?;
                self.insert(at, item);
            }
            ListOp::InsertAfter { at, value } if len > 0 => {
                let at = at % len;
                let item = self.list.insert_after(value.clone(), &self.items[at])?;
                self.insert(at + 1, item);
            }
            ListOp::MoveToFront(at) if len > 0 => {
                let at = at % len;
                self.list.move_to_front(&self.items[at])?;
                let item = self.take(at);
                self.insert(0, item);
            }
            ListOp::MoveToBack(at) if len > 0 => {
                let at = at % len;
                self.list.move_to_back(&self.items[at])?;
                let item = self.take(at);
                self.insert(len - 1, item);
            }
            ListOp::Remove(at) if len > 0 => {
                let at = at % len;
                self.items[at].remove()?;
                self.take(at);
            }
            ListOp::Update { at, value } if len > 0 => {
                let at = at % len;
                self.items[at].update(value.clone())?;
                self.expected[at] = Bytes::from(value.clone());
            }
            ListOp::Clear => {
                self.list.clear()?;
                self.items.clear();
                self.expected.clear();
            }
            _ => {}
        }
        Ok(())
    }

    /// Applies every operation in order.
    ///
    /// # Errors
    ///
    /// Returns the first list error.
    pub fn apply_all<'a>(&mut self, ops: impl IntoIterator<Item = &'a ListOp>) -> ListResult<()> {
        ops.into_iter().try_for_each(|op| self.apply(op))
    }

    /// Asserts that the list matches the model.
    ///
    /// # Panics
    ///
    /// Panics on any mismatch or if the list fails verification.
    pub fn check(&self) {
        let forward = self.list.values().expect("Failed to read list");
        assert_eq!(forward, self.expected, "forward order differs");

        let mut backward: Vec<Bytes> = self
            .list
            .iter()
            .expect("Failed to iterate list")
            .rev()
            .map(|item| item.expect("Failed to read element").bytes())
            .collect();
        backward.reverse();
        assert_eq!(backward, self.expected, "backward order differs");

        assert_eq!(self.list.len().expect("Failed to count"), self.expected.len());
        assert_eq!(self.list.is_empty().expect("Failed to count"), self.expected.is_empty());

        let stats = self.list.verify().expect("List failed verification");
        assert_eq!(stats.len, self.expected.len());
        assert_eq!(stats.head, self.items.first().map(Item::key));
        assert_eq!(stats.tail, self.items.last().map(Item::key));
    }

    fn insert(&mut self, at: usize, item: Item) {
        self.expected.insert(at, item.bytes());
        self.items.insert(at, item);
    }

    fn take(&mut self, at: usize) -> Item {
        self.expected.remove(at);
        self.items.remove(at)
    }
}

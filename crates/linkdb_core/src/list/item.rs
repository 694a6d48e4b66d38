//! List element handles.

use super::error::{ListError, ListResult};
use super::record::{load_node, NodeRecord};
use super::LinkedList;
use bytes::Bytes;
use linkdb_codec::NodeKey;

/// A handle to one element of a list.
///
/// An item remembers its node key and the value it had when the handle was
/// made. It does not pin the node: once the element is removed, `next`,
/// `prev`, `update` and `remove` fail with [`ListError::NotFound`].
///
/// [`Item::update`] takes `&mut self` because it refreshes this handle's
/// cached value. Clones made earlier keep the old value until re-read.
#[derive(Clone)]
pub struct Item {
    list: LinkedList,
    key: NodeKey,
    value: Bytes,
}

impl Item {
    pub(crate) fn new(list: LinkedList, key: NodeKey, value: Bytes) -> Self {
        Self { list, key, value }
    }

    /// Returns the element's node key.
    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Returns the cached value.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns the cached value as shared bytes.
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.value.clone()
    }

    /// Returns the list this item belongs to.
    #[must_use]
    pub fn list(&self) -> &LinkedList {
        &self.list
    }

    /// Returns the following element, or `None` at the tail.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if this element was removed, or `CorruptNode` if
    /// a node does not decode.
    pub fn next(&self) -> ListResult<Option<Item>> {
        self.step(|node| node.next).map_err(|e| e.during("next"))
    }

    /// Returns the preceding element, or `None` at the head.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if this element was removed, or `CorruptNode` if
    /// a node does not decode.
    pub fn prev(&self) -> ListResult<Option<Item>> {
        self.step(|node| node.prev).map_err(|e| e.during("prev"))
    }

    fn step(
        &self,
        link: impl FnOnce(&NodeRecord) -> Option<NodeKey>,
    ) -> ListResult<Option<Item>> {
        let name = self.list.name();
        self.list.store().view(|tx| {
            let node = load_node(tx, name, self.key)?.ok_or(ListError::NotFound { key: self.key })?;
            let Some(neighbour) = link(&node) else {
                return Ok(None);
            };
            Ok(load_node(tx, name, neighbour)?
                .map(|n| Item::new(self.list.clone(), neighbour, n.value)))
        })
    }

    /// Replaces the element's value, keeping its position.
    ///
    /// The cached value is refreshed on success.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if this element was removed, or
    /// `InvalidArgument` if the value exceeds the store's size limit.
    pub fn update(&mut self, value: impl Into<Bytes>) -> ListResult<()> {
        let value = self.list.check_value(value.into())?;
        let key = self.key;
        self.list
            .splice("update", |s| s.update(key, value.clone()))?;
        self.value = value;
        Ok(())
    }

    /// Removes the element from its list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the element was already removed.
    pub fn remove(&self) -> ListResult<()> {
        self.list
            .splice("remove", |s| s.remove(self.key).map(drop))
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value && self.list == other.list
    }
}

impl Eq for Item {}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("list", &self.list.name())
            .field("key", &self.key)
            .field("len", &self.value.len())
            .finish()
    }
}

//! Persistent doubly linked lists.
//!
//! A list lives in its own store namespace. Each element is a node record
//! under an 8-byte key drawn from the namespace sequence; a metadata record
//! under the reserved key `0x00` names the head and tail. Order is defined
//! only by the `prev`/`next` links, never by key order.
//!
//! Every mutating operation runs in one write transaction, so a failure
//! leaves the list exactly as it was.
//!
//! ```rust
//! use linkdb_core::{LinkedList, Store};
//!
//! let store = Store::open_in_memory().unwrap();
//! let list = LinkedList::open(&store, "tasks").unwrap();
//!
//! list.push_back("A").unwrap();
//! list.push_back("B").unwrap();
//! let c = list.push_back("C").unwrap();
//!
//! let x = list.insert_before("X", &c).unwrap();
//! list.move_to_front(&x).unwrap();
//!
//! assert_eq!(list.values().unwrap(), ["X", "A", "B", "C"]);
//! ```

mod error;
mod item;
mod iter;
mod record;
mod search;
mod splice;
mod verify;

pub use error::{ListError, ListResult};
pub use item::Item;
pub use iter::Iter;
pub use record::{ListMeta, NodeRecord};
pub use verify::ChainStats;

use crate::store::{KvRead, Store};
use bytes::Bytes;
use linkdb_codec::NodeKey;
use record::{load_meta, require_node, store_meta, META_KEY};
use splice::Splicer;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle to one named list in a store.
///
/// Cloning is cheap. Handles hold no list state; every call reads the
/// current committed state.
#[derive(Clone)]
pub struct LinkedList {
    store: Store,
    name: Arc<str>,
}

impl LinkedList {
    /// Opens the list `name`, creating it if it does not exist.
    ///
    /// If the namespace holds nodes but no metadata, head and tail are
    /// rebuilt from the node links and persisted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty name, or a store error.
    pub fn open(store: &Store, name: &str) -> ListResult<Self> {
        if name.is_empty() {
            return Err(ListError::invalid_argument("list name is empty"));
        }

        store
            .update(|tx| {
                let created = !tx.namespace_exists(name);
                tx.create_namespace(name)?;
                if tx.get(name, META_KEY)?.is_some() {
                    return Ok(());
                }
                if created {
                    debug!(list = name, "created list");
                    return store_meta(tx, name, &ListMeta::default());
                }
                let rebuilt = Splicer::new(tx, name).rebuild_meta()?;
                match rebuilt {
                    Some(meta) => warn!(
                        list = name,
                        head = ?meta.head,
                        tail = ?meta.tail,
                        "rebuilt missing list metadata from node links"
                    ),
                    None => store_meta(tx, name, &ListMeta::default())?,
                }
                Ok(())
            })
            .map_err(|e: ListError| e.during("open"))?;

        Ok(Self::handle(store, name))
    }

    /// Loads an existing list.
    ///
    /// # Errors
    ///
    /// Returns `ListNotFound` if no list with this name exists.
    pub fn load(store: &Store, name: &str) -> ListResult<Self> {
        store
            .view(|tx| load_meta(tx, name).map(drop))
            .map_err(|e| e.during("load"))?;
        Ok(Self::handle(store, name))
    }

    fn handle(store: &Store, name: &str) -> Self {
        Self {
            store: store.clone(),
            name: Arc::from(name),
        }
    }

    /// Returns the list name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the store holding this list.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the first element, or `None` if the list is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is gone or its data is corrupt.
    pub fn front(&self) -> ListResult<Option<Item>> {
        self.boundary(|meta| meta.head).map_err(|e| e.during("front"))
    }

    /// Returns the last element, or `None` if the list is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is gone or its data is corrupt.
    pub fn back(&self) -> ListResult<Option<Item>> {
        self.boundary(|meta| meta.tail).map_err(|e| e.during("back"))
    }

    fn boundary(&self, pick: impl FnOnce(&ListMeta) -> Option<NodeKey>) -> ListResult<Option<Item>> {
        self.store.view(|tx| {
            let Some(key) = pick(&load_meta(tx, &self.name)?) else {
                return Ok(None);
            };
            let node = require_node(tx, &self.name, key)?;
            Ok(Some(self.item(key, node.value)))
        })
    }

    /// Returns the number of elements.
    ///
    /// # Errors
    ///
    /// Returns `ListNotFound` if the list was destroyed.
    pub fn len(&self) -> ListResult<usize> {
        self.store
            .view(|tx| {
                load_meta(tx, &self.name)?;
                // every key but the metadata record is a node
                Ok(tx.count(&self.name)?.saturating_sub(1))
            })
            .map_err(|e: ListError| e.during("len"))
    }

    /// Returns true if the list has no elements.
    ///
    /// # Errors
    ///
    /// Returns `ListNotFound` if the list was destroyed.
    pub fn is_empty(&self) -> ListResult<bool> {
        self.store
            .view(|tx| Ok(load_meta(tx, &self.name)?.head.is_none()))
            .map_err(|e: ListError| e.during("is_empty"))
    }

    /// Returns an iterator over the elements of one snapshot.
    ///
    /// The iterator is double-ended: `next` walks from the head and
    /// `next_back` from the tail. Commits made after this call are not
    /// visible to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is gone or its metadata is corrupt.
    pub fn iter(&self) -> ListResult<Iter> {
        let tx = self
            .store
            .begin_read()
            .map_err(|e| ListError::from(e).during("iter"))?;
        let meta = load_meta(&tx, &self.name).map_err(|e| e.during("iter"))?;
        // every key but the metadata key is a node
        let nodes = tx
            .count(&self.name)
            .map_err(|e| ListError::from(e).during("iter"))?
            .saturating_sub(1);
        Ok(Iter::new(self.clone(), tx, meta, nodes))
    }

    /// Collects every value in list order.
    ///
    /// # Errors
    ///
    /// Returns the first error met while walking the chain.
    pub fn values(&self) -> ListResult<Vec<Bytes>> {
        self.iter()?
            .map(|item| item.map(|item| item.bytes()))
            .collect()
    }

    /// Appends a value at the back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the value exceeds the store's size limit.
    pub fn push_back(&self, value: impl Into<Bytes>) -> ListResult<Item> {
        let value = self.check_value(value.into())?;
        self.splice("push_back", |s| s.push_back(value.clone()))
            .map(|key| self.item(key, value))
    }

    /// Prepends a value at the front.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the value exceeds the store's size limit.
    pub fn push_front(&self, value: impl Into<Bytes>) -> ListResult<Item> {
        let value = self.check_value(value.into())?;
        self.splice("push_front", |s| s.push_front(value.clone()))
            .map(|key| self.item(key, value))
    }

    /// Inserts a value right before `mark`.
    ///
    /// Inserting before the head is a `push_front`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMark` if `mark` is not a live element of this list.
    pub fn insert_before(&self, value: impl Into<Bytes>, mark: &Item) -> ListResult<Item> {
        self.check_mark(mark)?;
        let value = self.check_value(value.into())?;
        self.splice("insert_before", |s| s.insert_before(mark.key(), value.clone()))
            .map(|key| self.item(key, value))
    }

    /// Inserts a value right after `mark`.
    ///
    /// Inserting after the tail is a `push_back`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMark` if `mark` is not a live element of this list.
    pub fn insert_after(&self, value: impl Into<Bytes>, mark: &Item) -> ListResult<Item> {
        self.check_mark(mark)?;
        let value = self.check_value(value.into())?;
        self.splice("insert_after", |s| s.insert_after(mark.key(), value.clone()))
            .map(|key| self.item(key, value))
    }

    /// Moves `item` to the front. A no-op if it is already the head.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMove` for an item of another list, `EmptyList` if the
    /// list is empty, or `NotFound` if the item was removed.
    pub fn move_to_front(&self, item: &Item) -> ListResult<()> {
        self.check_move(item)?;
        self.splice("move_to_front", |s| s.move_to_front(item.key()))
    }

    /// Moves `item` to the back. A no-op if it is already the tail.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMove` for an item of another list, `EmptyList` if the
    /// list is empty, or `NotFound` if the item was removed.
    pub fn move_to_back(&self, item: &Item) -> ListResult<()> {
        self.check_move(item)?;
        self.splice("move_to_back", |s| s.move_to_back(item.key()))
    }

    /// Removes every element. Keys of removed elements are never reissued.
    ///
    /// Returns the number of removed elements.
    ///
    /// # Errors
    ///
    /// Returns `ListNotFound` if the list was destroyed.
    pub fn clear(&self) -> ListResult<usize> {
        let removed = self.splice("clear", |s| s.clear())?;
        debug!(list = %self.name, removed, "cleared list");
        Ok(removed)
    }

    /// Deletes the list and all of its elements.
    ///
    /// # Errors
    ///
    /// Returns `ListNotFound` if the list was already destroyed.
    pub fn destroy(self) -> ListResult<()> {
        self.store
            .update(|tx| {
                load_meta(&*tx, &self.name)?;
                tx.drop_namespace(&self.name)?;
                Ok(())
            })
            .map_err(|e: ListError| e.during("destroy"))?;
        debug!(list = %self.name, "destroyed list");
        Ok(())
    }

    pub(crate) fn splice<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Splicer<'_, '_>) -> ListResult<T>,
    ) -> ListResult<T> {
        self.store
            .update(|tx| {
                load_meta(&*tx, &self.name)?;
                f(&mut Splicer::new(tx, &self.name))
            })
            .map_err(|e| e.during(op))
    }

    pub(crate) fn item(&self, key: NodeKey, value: Bytes) -> Item {
        Item::new(self.clone(), key, value)
    }

    /// Returns true if `item` came from this list in this open store.
    pub(crate) fn owns(&self, item: &Item) -> bool {
        self == item.list()
    }

    fn check_mark(&self, mark: &Item) -> ListResult<()> {
        if self.owns(mark) {
            Ok(())
        } else {
            Err(ListError::InvalidMark {
                list: self.name.to_string(),
            })
        }
    }

    fn check_move(&self, item: &Item) -> ListResult<()> {
        if self.owns(item) {
            Ok(())
        } else {
            Err(ListError::InvalidMove {
                from: item.list().name().to_owned(),
                to: self.name.to_string(),
            })
        }
    }

    fn check_value(&self, value: Bytes) -> ListResult<Bytes> {
        let max = self.store.config().max_value_size;
        if value.len() > max {
            return Err(ListError::invalid_argument(format!(
                "value of {} bytes exceeds the limit of {max} bytes",
                value.len()
            )));
        }
        Ok(value)
    }
}

impl PartialEq for LinkedList {
    fn eq(&self, other: &Self) -> bool {
        self.store.id() == other.store.id() && self.name == other.name
    }
}

impl Eq for LinkedList {}

impl std::fmt::Debug for LinkedList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedList")
            .field("name", &self.name)
            .field("store", &self.store.id())
            .finish()
    }
}

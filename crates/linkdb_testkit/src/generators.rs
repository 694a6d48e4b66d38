//! Property-based test generators using proptest.
//!
//! Operations that take a position carry a raw index; it is reduced modulo
//! the current list length when applied, so every generated sequence is
//! valid against any list.

use proptest::prelude::*;

/// One mutation of a list, addressed by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOp {
    /// Append a value.
    PushBack(Vec<u8>),
    /// Prepend a value.
    PushFront(Vec<u8>),
    /// Insert a value before the element at `at`.
    InsertBefore {
        /// Position of the mark.
        at: usize,
        /// Inserted value.
        value: Vec<u8>,
    },
    /// Insert a value after the element at `at`.
    InsertAfter {
        /// Position of the mark.
        at: usize,
        /// Inserted value.
        value: Vec<u8>,
    },
    /// Move the element at the given position to the front.
    MoveToFront(usize),
    /// Move the element at the given position to the back.
    MoveToBack(usize),
    /// Remove the element at the given position.
    Remove(usize),
    /// Replace the value of the element at `at`.
    Update {
        /// Position of the element.
        at: usize,
        /// New value.
        value: Vec<u8>,
    },
    /// Remove every element.
    Clear,
}

/// Strategy for generating element values.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..48)
}

/// Strategy for generating valid list names.
pub fn list_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,23}").expect("Invalid regex")
}

/// Strategy for generating a single list operation.
pub fn list_op_strategy() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        4 => value_strategy().prop_map(ListOp::PushBack),
        3 => value_strategy().prop_map(ListOp::PushFront),
        2 => (any::<usize>(), value_strategy())
            .prop_map(|(at, value)| ListOp::InsertBefore { at, value }),
        2 => (any::<usize>(), value_strategy())
            .prop_map(|(at, value)| ListOp::InsertAfter { at, value }),
        2 => any::<usize>().prop_map(ListOp::MoveToFront),
        2 => any::<usize>().prop_map(ListOp::MoveToBack),
        3 => any::<usize>().prop_map(ListOp::Remove),
        1 => (any::<usize>(), value_strategy()).prop_map(|(at, value)| ListOp::Update { at, value }),
        1 => Just(ListOp::Clear),
    ]
}

/// Strategy for generating a sequence of list operations.
pub fn list_ops_strategy(min_ops: usize, max_ops: usize) -> impl Strategy<Value = Vec<ListOp>> {
    prop::collection::vec(list_op_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 128,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 200,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn list_names_are_usable(name in list_name_strategy()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().next().is_some_and(|c| c.is_ascii_lowercase()));
        }

        #[test]
        fn op_sequences_respect_bounds(ops in list_ops_strategy(1, 20)) {
            prop_assert!(!ops.is_empty());
            prop_assert!(ops.len() < 20);
        }
    }
}

//! Node key codec.

use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a list node.
///
/// A node key wraps the value drawn from its list's sequence and is stored
/// as 8 big-endian bytes, so keys minted later sort after keys minted
/// earlier under plain byte comparison. Keys are:
/// - Unique within a list (the sequence never repeats)
/// - Immutable once assigned
/// - Unrelated to the node's position in the list
///
/// Inside records a key is serialized as its integer value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(u64);

impl NodeKey {
    /// Width of an encoded key in bytes.
    pub const LEN: usize = 8;

    /// Creates a key from a sequence value.
    #[inline]
    #[must_use]
    pub const fn from_sequence(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the sequence value behind this key.
    #[inline]
    #[must_use]
    pub const fn sequence(self) -> u64 {
        self.0
    }

    /// Returns the 8-byte big-endian store key.
    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::LEN] {
        self.0.to_be_bytes()
    }

    /// Decodes a store key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyLength`] unless `bytes` is exactly
    /// [`Self::LEN`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> CodecResult<Self> {
        let array: [u8; Self::LEN] = bytes.try_into().map_err(|_| CodecError::InvalidKeyLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(u64::from_be_bytes(array)))
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({:016x})", self.0)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<NodeKey> for [u8; NodeKey::LEN] {
    fn from(key: NodeKey) -> Self {
        key.to_bytes()
    }
}

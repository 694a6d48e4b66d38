//! # LinkDB Codec
//!
//! Byte encodings shared by the LinkDB store and list engine:
//!
//! - [`NodeKey`]: the fixed-width, order-preserving key minted for every
//!   list node from its list's sequence
//! - [`to_cbor`] / [`from_cbor`]: CBOR encoding of records (list nodes,
//!   list metadata, commit log operations) through `serde` and `ciborium`
//!
//! ## Usage
//!
//! ```
//! use linkdb_codec::{from_cbor, to_cbor, NodeKey};
//!
//! let key = NodeKey::from_sequence(42);
//! assert_eq!(key.to_bytes(), 42u64.to_be_bytes());
//!
//! let bytes = to_cbor(&Some(key)).unwrap();
//! let decoded: Option<NodeKey> = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded, Some(key));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod key;

pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use key::NodeKey;

/// Types that can be written as a CBOR record.
pub trait Encode {
    /// Encode this value to CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Types that can be read back from a CBOR record.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T: serde::Serialize> Encode for T {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }
}

impl<T: serde::de::DeserializeOwned> Decode for T {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

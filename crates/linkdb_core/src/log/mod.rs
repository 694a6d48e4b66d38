//! Commit log for durability and crash recovery.
//!
//! Every committed write transaction becomes one framed record in the
//! commit log before its changes are published. On open the log is
//! replayed from the start to rebuild the in-memory state.
//!
//! ## Record Format
//!
//! ```text
//! | magic "LDBL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The CRC covers everything before it. The
//! payload is a CBOR map holding the commit sequence and its operations.
//!
//! ## Recovery Policy
//!
//! ### Tolerated (treated as end of log)
//!
//! - Fewer bytes left than a header
//! - A header whose declared payload runs past the end of the log
//!
//! The torn bytes are cut off so the next append starts on a record
//! boundary.
//!
//! ### Fatal (open fails)
//!
//! - Bad magic
//! - A version newer than this build understands
//! - An unknown record type
//! - A CRC mismatch on a complete record
//! - A payload that does not decode

mod reader;
mod record;
mod writer;

pub use reader::LogReader;
pub use record::{LogOp, LogRecord, RecordType, LOG_MAGIC, LOG_VERSION};
pub use writer::CommitLog;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

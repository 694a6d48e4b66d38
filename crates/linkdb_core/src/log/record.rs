//! Commit log record types and framing.

use super::{CRC_SIZE, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;
use bytes::Bytes;
use linkdb_codec::{from_cbor, to_cbor};
use serde::{Deserialize, Serialize};

/// Magic bytes opening every log record.
pub const LOG_MAGIC: [u8; 4] = *b"LDBL";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// Type of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Operations of one committed write transaction.
    Commit = 1,
    /// Full image of the store written by compaction.
    Checkpoint = 2,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Commit),
            2 => Some(Self::Checkpoint),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single state change inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOp {
    /// Create an empty namespace.
    CreateNamespace {
        /// Namespace name.
        namespace: String,
    },
    /// Drop a namespace with all of its keys.
    DropNamespace {
        /// Namespace name.
        namespace: String,
    },
    /// Insert or overwrite a key.
    Put {
        /// Namespace name.
        namespace: String,
        /// Key bytes.
        key: Bytes,
        /// Value bytes.
        value: Bytes,
    },
    /// Remove a key.
    Delete {
        /// Namespace name.
        namespace: String,
        /// Key bytes.
        key: Bytes,
    },
    /// Set the namespace's sequence counter.
    SetSequence {
        /// Namespace name.
        namespace: String,
        /// New counter value.
        value: u64,
    },
}

/// A decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Changes of one commit, applied on top of the current state.
    Commit {
        /// Commit sequence number.
        sequence: SequenceNumber,
        /// Operations in the order they apply.
        ops: Vec<LogOp>,
    },
    /// A full image replacing all prior state.
    Checkpoint {
        /// Sequence number of the last commit folded into the image.
        sequence: SequenceNumber,
        /// Operations rebuilding the image from empty.
        ops: Vec<LogOp>,
    },
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    sequence: u64,
    ops: &'a [LogOp],
}

#[derive(Deserialize)]
struct Payload {
    sequence: u64,
    ops: Vec<LogOp>,
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Commit { .. } => RecordType::Commit,
            Self::Checkpoint { .. } => RecordType::Checkpoint,
        }
    }

    /// Returns the sequence number carried by the record.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Commit { sequence, .. } | Self::Checkpoint { sequence, .. } => *sequence,
        }
    }

    /// Returns the record's operations.
    #[must_use]
    pub fn ops(&self) -> &[LogOp] {
        match self {
            Self::Commit { ops, .. } | Self::Checkpoint { ops, .. } => ops,
        }
    }

    /// Encodes the record into a complete frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or exceeds 4 GiB.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = to_cbor(&PayloadRef {
            sequence: self.sequence().as_u64(),
            ops: self.ops(),
        })?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("log record payload too large"))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.push(self.record_type().as_byte());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Decodes a payload of the given type.
    pub(crate) fn decode_payload(
        record_type: RecordType,
        payload: &[u8],
        offset: u64,
    ) -> CoreResult<Self> {
        let Payload { sequence, ops } = from_cbor::<Payload>(payload).map_err(|e| {
            CoreError::log_corruption(offset, format!("undecodable payload: {e}"))
        })?;
        let sequence = SequenceNumber::new(sequence);
        Ok(match record_type {
            RecordType::Commit => Self::Commit { sequence, ops },
            RecordType::Checkpoint => Self::Checkpoint { sequence, ops },
        })
    }
}

/// Parsed fixed-size record header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub(crate) record_type: RecordType,
    pub(crate) payload_len: usize,
}

impl Header {
    /// Validates a header read at `offset`.
    pub(crate) fn parse(bytes: &[u8], offset: u64) -> CoreResult<Self> {
        if bytes[0..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(offset, "invalid magic"));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version > LOG_VERSION {
            return Err(CoreError::log_corruption(
                offset,
                format!("unsupported version {version}"),
            ));
        }

        let type_byte = bytes[6];
        let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::log_corruption(offset, format!("unknown record type {type_byte}"))
        })?;

        let payload_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
        Ok(Self {
            record_type,
            payload_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit() -> LogRecord {
        LogRecord::Commit {
            sequence: SequenceNumber::new(3),
            ops: vec![
                LogOp::CreateNamespace {
                    namespace: "tasks".into(),
                },
                LogOp::Put {
                    namespace: "tasks".into(),
                    key: Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 1]),
                    value: Bytes::from_static(b"node"),
                },
                LogOp::SetSequence {
                    namespace: "tasks".into(),
                    value: 1,
                },
            ],
        }
    }

    #[test]
    fn frame_layout() {
        let frame = commit().encode().unwrap();

        assert_eq!(&frame[0..4], b"LDBL");
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), LOG_VERSION);
        assert_eq!(frame[6], RecordType::Commit.as_byte());

        let len = u32::from_le_bytes([frame[7], frame[8], frame[9], frame[10]]) as usize;
        assert_eq!(frame.len(), HEADER_SIZE + len + CRC_SIZE);

        let body_end = frame.len() - CRC_SIZE;
        let stored = u32::from_le_bytes(frame[body_end..].try_into().unwrap());
        assert_eq!(stored, crc32fast::hash(&frame[..body_end]));
    }

    #[test]
    fn payload_decodes_back() {
        let record = commit();
        let frame = record.encode().unwrap();
        let payload = &frame[HEADER_SIZE..frame.len() - CRC_SIZE];

        let decoded = LogRecord::decode_payload(RecordType::Commit, payload, 0).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut frame = commit().encode().unwrap();
        frame[0] = b'X';
        let err = Header::parse(&frame[..HEADER_SIZE], 40).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { offset: 40, .. }));
    }

    #[test]
    fn header_rejects_future_version() {
        let mut frame = commit().encode().unwrap();
        frame[4..6].copy_from_slice(&(LOG_VERSION + 1).to_le_bytes());
        assert!(Header::parse(&frame[..HEADER_SIZE], 0).is_err());
    }

    #[test]
    fn header_rejects_unknown_type() {
        let mut frame = commit().encode().unwrap();
        frame[6] = 0x7f;
        let err = Header::parse(&frame[..HEADER_SIZE], 0).unwrap_err();
        assert!(err.to_string().contains("unknown record type 127"));
    }

    #[test]
    fn garbage_payload_is_corruption() {
        let err = LogRecord::decode_payload(RecordType::Commit, &[0xff, 0x00], 9).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn record_type_bytes() {
        assert_eq!(RecordType::from_byte(1), Some(RecordType::Commit));
        assert_eq!(RecordType::from_byte(2), Some(RecordType::Checkpoint));
        assert_eq!(RecordType::from_byte(0), None);
    }
}

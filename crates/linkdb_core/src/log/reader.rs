//! Streaming commit log reader.

use super::record::{Header, LogRecord};
use super::{CRC_SIZE, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use linkdb_storage::StorageBackend;

/// Iterator over the records of a commit log.
///
/// Reads one record at a time from the backend, so memory stays bounded by
/// the largest record. Yields `(offset, record)` pairs.
///
/// A torn tail ends iteration without an error; [`Self::valid_len`] then
/// reports where the last complete record ended. Corruption ends iteration
/// with an error.
pub struct LogReader<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> LogReader<'a> {
    /// Creates a reader positioned at the start of the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            backend,
            total_size: backend.size()?,
            offset: 0,
            finished: false,
        })
    }

    /// Returns the end offset of the last complete record read so far.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.offset
    }

    /// Returns true if bytes remain past [`Self::valid_len`].
    #[must_use]
    pub fn has_torn_tail(&self) -> bool {
        self.finished && self.offset < self.total_size
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        let remaining = self.total_size - start;

        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header_bytes = self.backend.read_at(start, HEADER_SIZE)?;
        let header = Header::parse(&header_bytes, start)?;

        let frame_len = (HEADER_SIZE + CRC_SIZE) as u64 + header.payload_len as u64;
        if remaining < frame_len {
            return Ok(None);
        }

        let rest = self
            .backend
            .read_at(start + HEADER_SIZE as u64, header.payload_len + CRC_SIZE)?;
        let (payload, crc_bytes) = rest.split_at(header.payload_len);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_bytes);
        hasher.update(payload);
        let actual = hasher.finalize();
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                offset: start,
                expected,
                actual,
            });
        }

        let record = LogRecord::decode_payload(header.record_type, payload, start)?;
        self.offset = start + frame_len;
        Ok(Some((start, record)))
    }
}

impl Iterator for LogReader<'_> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for LogReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReader")
            .field("total_size", &self.total_size)
            .field("offset", &self.offset)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogOp;
    use crate::types::SequenceNumber;
    use linkdb_storage::InMemoryBackend;

    fn record(seq: u64) -> LogRecord {
        LogRecord::Commit {
            sequence: SequenceNumber::new(seq),
            ops: vec![LogOp::CreateNamespace {
                namespace: format!("ns{seq}"),
            }],
        }
    }

    fn log_of(records: &[LogRecord]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| r.encode().unwrap())
            .collect()
    }

    #[test]
    fn empty_log_yields_nothing() {
        let backend = InMemoryBackend::new();
        let mut reader = LogReader::new(&backend).unwrap();
        assert!(reader.next().is_none());
        assert!(!reader.has_torn_tail());
    }

    #[test]
    fn reads_records_with_offsets() {
        let first = record(1).encode().unwrap();
        let backend = InMemoryBackend::with_data(log_of(&[record(1), record(2)]));

        let items: Vec<_> = LogReader::new(&backend)
            .unwrap()
            .collect::<CoreResult<_>>()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], (0, record(1)));
        assert_eq!(items[1], (first.len() as u64, record(2)));
    }

    #[test]
    fn torn_payload_is_end_of_log() {
        let mut data = log_of(&[record(1), record(2)]);
        let complete = record(1).encode().unwrap().len() as u64;
        data.truncate(data.len() - 3);
        let backend = InMemoryBackend::with_data(data);

        let mut reader = LogReader::new(&backend).unwrap();
        assert_eq!(reader.next().unwrap().unwrap().1, record(1));
        assert!(reader.next().is_none());
        assert!(reader.has_torn_tail());
        assert_eq!(reader.valid_len(), complete);
    }

    #[test]
    fn torn_header_is_end_of_log() {
        let mut data = log_of(&[record(1)]);
        data.extend_from_slice(&crate::log::LOG_MAGIC);
        let backend = InMemoryBackend::with_data(data);

        let mut reader = LogReader::new(&backend).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert!(reader.has_torn_tail());
    }

    #[test]
    fn flipped_payload_bit_is_checksum_error() {
        let mut data = log_of(&[record(1)]);
        data[HEADER_SIZE + 2] ^= 0x01;
        let backend = InMemoryBackend::with_data(data);

        let mut reader = LogReader::new(&backend).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(CoreError::ChecksumMismatch { offset: 0, .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn garbage_after_valid_record_is_fatal() {
        let mut data = log_of(&[record(1)]);
        data.extend_from_slice(&[0xAB; 32]);
        let backend = InMemoryBackend::with_data(data);

        let results: Vec<_> = LogReader::new(&backend).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CoreError::LogCorruption { .. })
        ));
    }
}

//! Commit log writer and recovery scan.

use super::reader::LogReader;
use super::record::LogRecord;
use crate::error::CoreResult;
use linkdb_storage::StorageBackend;
use parking_lot::Mutex;
use tracing::warn;

/// Append-only commit log over a storage backend.
pub struct CommitLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl CommitLog {
    /// Creates a commit log over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends a record and makes it durable per the sync setting.
    ///
    /// Returns the offset where the record was written.
    ///
    /// On failure the log is cut back to its previous length, so a partly
    /// written frame never sits in front of later records.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or I/O errors occur.
    pub fn append(&self, record: &LogRecord) -> CoreResult<u64> {
        let frame = record.encode()?;

        let mut backend = self.backend.lock();
        let start = backend.size()?;
        let written = backend.append(&frame).and_then(|offset| {
            backend.flush()?;
            if self.sync_on_commit {
                backend.sync()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => Ok(offset),
            Err(e) => {
                if let Err(undo) = backend.truncate(start) {
                    warn!(start, error = %undo, "could not cut back failed commit log append");
                }
                Err(e.into())
            }
        }
    }

    /// Reads every complete record, cutting off a torn tail.
    ///
    /// # Errors
    ///
    /// Returns an error on corruption or I/O failure. The log is left
    /// untouched in that case.
    pub fn recover(&self) -> CoreResult<Vec<LogRecord>> {
        let mut backend = self.backend.lock();

        let (records, torn_at) = {
            let mut reader = LogReader::new(&**backend)?;
            let mut records = Vec::new();
            for item in reader.by_ref() {
                let (_, record) = item?;
                records.push(record);
            }
            let torn_at = reader.has_torn_tail().then(|| reader.valid_len());
            (records, torn_at)
        };

        if let Some(valid_len) = torn_at {
            let size = backend.size()?;
            warn!(
                valid_len,
                discarded = size - valid_len,
                "truncating torn record at end of commit log"
            );
            backend.truncate(valid_len)?;
        }

        Ok(records)
    }

    /// Atomically replaces the whole log with a single record.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement cannot be made durable.
    pub fn rewrite(&self, record: &LogRecord) -> CoreResult<()> {
        let frame = record.encode()?;
        self.backend.lock().replace(&frame)?;
        Ok(())
    }

    /// Flushes and syncs the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Returns the current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

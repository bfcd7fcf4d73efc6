//! In-memory log tail.
//!
//! The tail holds records that have not yet been persisted, oldest first,
//! with strictly increasing LSNs. Flushing drains the longest prefix at or
//! below a target LSN into the storage engine's durable log.

use log::trace;

use crate::core::common::errors::LogError;
use crate::core::common::types::Lsn;
use crate::core::storage::StorageEngine;
use crate::core::wal::{codec, log_record::LogRecord};

/// Append-only buffer of not-yet-persisted log records.
#[derive(Debug, Default)]
pub struct LogTail {
    records: Vec<LogRecord>,
}

impl LogTail {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Push a freshly built record. LSNs must arrive in issue order.
    pub fn append(&mut self, record: LogRecord) {
        debug_assert!(
            self.records.last().map_or(true, |last| last.lsn() < record.lsn()),
            "log tail LSNs must be strictly increasing"
        );
        trace!("tail append {} lsn={}", record.kind(), record.lsn().0);
        self.records.push(record);
    }

    /// Hand every record with `lsn <= max_lsn` to the engine's durable log,
    /// in order, and drop them from the tail. Synchronous: returns only
    /// after the engine has accepted the whole prefix.
    pub fn flush(&mut self, max_lsn: Lsn, engine: &dyn StorageEngine) -> Result<(), LogError> {
        let count = self.records.iter().take_while(|r| r.lsn() <= max_lsn).count();
        for record in self.records.drain(..count) {
            engine.update_log(&codec::serialize_record(&record)?);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The buffered records, oldest first.
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }
}

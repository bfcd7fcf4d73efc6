//! The log manager.
//!
//! Owns the transaction table, the dirty-page table, and the log tail, and
//! drives them through the forward operations (`write`, `commit`, `abort`,
//! `checkpoint`, `page_flushed`) and crash recovery. The manager is
//! single-writer: every operation takes `&mut self`, and callers (the
//! transaction manager, the storage engine's flush callback, the recovery
//! driver) serialize their invocations.
//!
//! Durability rules enforced here:
//! - a transaction's `Commit` record is durable before `commit` returns;
//! - before the storage engine persists a page, every record with
//!   `lsn <= PageLSN` is durable (`page_flushed` runs first);
//! - flushing is strictly prefix-wise in LSN order.

use std::sync::Arc;

use log::{debug, info};

use crate::core::common::errors::LogError;
use crate::core::common::types::{Lsn, PageId, TransactionId};
use crate::core::recovery::{AnalysisPhase, DirtyPageTable, RedoPhase, TransactionTable, UndoPhase};
use crate::core::storage::StorageEngine;
use crate::core::wal::log_record::{LogRecord, TxStatus};
use crate::core::wal::{codec, LogTail};


/// ARIES log manager bound to one storage engine.
#[derive(Default)]
pub struct LogManager {
    tx_table: TransactionTable,
    dirty_page_table: DirtyPageTable,
    tail: LogTail,
    engine: Option<Arc<dyn StorageEngine>>,
}

impl LogManager {
    pub fn new() -> Self {
        Self {
            tx_table: TransactionTable::new(),
            dirty_page_table: DirtyPageTable::new(),
            tail: LogTail::new(),
            engine: None,
        }
    }

    /// Bind the storage engine. The engine outlives the manager; every
    /// other operation fails with [`LogError::EngineNotSet`] until this has
    /// been called.
    pub fn set_storage_engine(&mut self, engine: Arc<dyn StorageEngine>) {
        self.engine = Some(engine);
    }

    fn engine(&self) -> Result<Arc<dyn StorageEngine>, LogError> {
        self.engine.clone().ok_or(LogError::EngineNotSet)
    }

    /// Log a page update for `tx_id` and return its LSN.
    ///
    /// The record lands in the in-memory tail only; no disk I/O happens
    /// here. The transaction gains a table entry on its first write; the
    /// page gains a dirty-page entry unless it already has one (an existing
    /// `rec_lsn` is never lowered on this path).
    pub fn write(
        &mut self,
        tx_id: TransactionId,
        page_id: PageId,
        offset: usize,
        after_image: &[u8],
        before_image: &[u8],
    ) -> Result<Lsn, LogError> {
        let engine = self.engine()?;
        let curr_lsn = engine.next_lsn();

        let prev_lsn = self.tx_table.last_lsn(tx_id);
        if prev_lsn.is_some() {
            self.tx_table.set_last_lsn(tx_id, curr_lsn);
        } else {
            self.tx_table.upsert(tx_id, curr_lsn, TxStatus::InProgress);
        }

        self.dirty_page_table.insert_if_absent(page_id, curr_lsn);

        self.tail.append(LogRecord::Update {
            lsn: curr_lsn,
            prev_lsn,
            tx_id,
            page_id,
            offset,
            before_image: before_image.to_vec(),
            after_image: after_image.to_vec(),
        });

        Ok(curr_lsn)
    }

    /// Commit `tx_id`. The tail is flushed through the `Commit` record
    /// before this returns; that flush is the durability point. The
    /// trailing `End` stays in the tail. A no-op for an unknown or
    /// already-committed transaction.
    pub fn commit(&mut self, tx_id: TransactionId) -> Result<(), LogError> {
        let engine = self.engine()?;
        if self.tx_table.status(tx_id) != Some(TxStatus::InProgress) {
            return Ok(());
        }

        let prev_lsn = self.tx_table.last_lsn(tx_id);
        let commit_lsn = engine.next_lsn();
        self.tail.append(LogRecord::Commit { lsn: commit_lsn, prev_lsn, tx_id });
        self.tx_table.set_last_lsn(tx_id, commit_lsn);
        self.tx_table.mark_committed(tx_id);

        self.tail.flush(commit_lsn, engine.as_ref())?;

        let end_lsn = engine.next_lsn();
        self.tail.append(LogRecord::End { lsn: end_lsn, prev_lsn: Some(commit_lsn), tx_id });
        self.tx_table.remove(tx_id);

        debug!("transaction {} committed at lsn {}", tx_id.0, commit_lsn.0);
        Ok(())
    }

    /// Roll back `tx_id`: log an `Abort`, then undo its chain over the
    /// logical log (persisted log plus the in-memory tail), emitting CLRs.
    /// A no-op for an unknown transaction.
    pub fn abort(&mut self, tx_id: TransactionId) -> Result<(), LogError> {
        let engine = self.engine()?;
        let Some(last_lsn) = self.tx_table.last_lsn(tx_id) else {
            return Ok(());
        };

        let mut logical_log = codec::parse_log(&engine.get_log())?;
        logical_log.extend_from_slice(self.tail.records());

        let abort_lsn = engine.next_lsn();
        self.tail.append(LogRecord::Abort {
            lsn: abort_lsn,
            prev_lsn: Some(last_lsn),
            tx_id,
        });
        self.tx_table.set_last_lsn(tx_id, abort_lsn);

        debug!("transaction {} aborting at lsn {}", tx_id.0, abort_lsn.0);
        UndoPhase::new(
            &mut self.tx_table,
            &mut self.dirty_page_table,
            &mut self.tail,
            engine.as_ref(),
        )
        .run_single(&logical_log, last_lsn);
        Ok(())
    }

    /// Take a fuzzy checkpoint: `CheckpointBegin`, `CheckpointEnd` with
    /// deep copies of both tables, flush through the end record, then
    /// persist the begin LSN as the master record. The master thus always
    /// points at a `CheckpointBegin` whose following `CheckpointEnd`
    /// carries the snapshot Analysis needs.
    pub fn checkpoint(&mut self) -> Result<(), LogError> {
        let engine = self.engine()?;
        let begin_lsn = engine.next_lsn();
        self.tail.append(LogRecord::CheckpointBegin { lsn: begin_lsn });

        let end_lsn = engine.next_lsn();
        self.tail.append(LogRecord::CheckpointEnd {
            lsn: end_lsn,
            begin_lsn,
            active_transactions: self.tx_table.snapshot(),
            dirty_pages: self.dirty_page_table.snapshot(),
        });

        self.tail.flush(end_lsn, engine.as_ref())?;
        engine.store_master(begin_lsn);

        info!("checkpoint complete: begin lsn {}, end lsn {}", begin_lsn.0, end_lsn.0);
        Ok(())
    }

    /// WAL hook. The storage engine calls this **before** writing `page_id`
    /// to disk; the tail is flushed through the page's PageLSN so every
    /// record describing the page is durable first, and the page leaves the
    /// dirty-page table.
    pub fn page_flushed(&mut self, page_id: PageId) -> Result<(), LogError> {
        let engine = self.engine()?;
        if let Some(page_lsn) = engine.page_lsn(page_id) {
            self.tail.flush(page_lsn, engine.as_ref())?;
        }
        self.dirty_page_table.remove(page_id);
        Ok(())
    }

    /// Recover from a crash, given the persisted log. Runs Analysis, Redo,
    /// and Undo in sequence against this manager's tables and tail.
    ///
    /// A refused `page_write` during Redo aborts recovery with
    /// [`LogError::StorageUnavailable`]; re-running recovery from the
    /// persisted log is safe and idempotent.
    pub fn recover(&mut self, log: &str) -> Result<(), LogError> {
        let engine = self.engine()?;
        let records = codec::parse_log(log)?;
        info!("recovery starting over {} log records", records.len());

        AnalysisPhase::new(&mut self.tx_table, &mut self.dirty_page_table)
            .run(&records, engine.get_master());

        RedoPhase::new(
            &mut self.tx_table,
            &self.dirty_page_table,
            &mut self.tail,
            engine.as_ref(),
        )
        .run(&records)?;

        UndoPhase::new(
            &mut self.tx_table,
            &mut self.dirty_page_table,
            &mut self.tail,
            engine.as_ref(),
        )
        .run_full(&records);

        info!("recovery complete");
        Ok(())
    }

    /// The transaction table (primarily for embedders and tests).
    pub fn tx_table(&self) -> &TransactionTable {
        &self.tx_table
    }

    /// The dirty-page table.
    pub fn dirty_page_table(&self) -> &DirtyPageTable {
        &self.dirty_page_table
    }

    /// The not-yet-persisted log tail.
    pub fn tail(&self) -> &LogTail {
        &self.tail
    }
}

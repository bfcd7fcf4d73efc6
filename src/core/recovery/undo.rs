//! Undo phase.
//!
//! Rolls back loser transactions by walking their record chains backward
//! from the largest LSN still to undo. Each undone update produces a
//! compensation record whose after-image is the update's before-image and
//! whose `undo_next_lsn` points at the next record of the chain, so a crash
//! during undo never repeats completed compensation. The same machinery
//! serves `abort`, restricted to one transaction.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info, warn};

use crate::core::common::types::{Lsn, TransactionId};
use crate::core::recovery::tables::{DirtyPageTable, TransactionTable};
use crate::core::storage::StorageEngine;
use crate::core::wal::log_record::LogRecord;
use crate::core::wal::log_tail::LogTail;

/// The Undo pass, emitting CLRs and `End` records into the tail.
pub struct UndoPhase<'a> {
    tx_table: &'a mut TransactionTable,
    dirty_page_table: &'a mut DirtyPageTable,
    tail: &'a mut LogTail,
    engine: &'a dyn StorageEngine,
}

impl<'a> UndoPhase<'a> {
    pub fn new(
        tx_table: &'a mut TransactionTable,
        dirty_page_table: &'a mut DirtyPageTable,
        tail: &'a mut LogTail,
        engine: &'a dyn StorageEngine,
    ) -> Self {
        Self { tx_table, dirty_page_table, tail, engine }
    }

    /// Recovery case: roll back every transaction still in progress.
    pub fn run_full(&mut self, log: &[LogRecord]) {
        let to_undo: BTreeSet<Lsn> = self.tx_table.losers().map(|(_, lsn)| lsn).collect();
        info!("undo starting: {} loser transactions", to_undo.len());
        self.run(log, to_undo);
    }

    /// Abort case: roll back a single transaction, starting from the LSN of
    /// its most recent undoable record (the `Abort` record's back link).
    pub fn run_single(&mut self, log: &[LogRecord], seed: Lsn) {
        self.run(log, BTreeSet::from([seed]));
    }

    /// Drain the to-undo set from its maximum. Each iteration either lowers
    /// the maximum or removes a transaction outright, so the loop
    /// terminates.
    ///
    /// A refused `page_write` returns without touching the tables further;
    /// the driver's policy is to re-run recovery, which is idempotent.
    fn run(&mut self, log: &[LogRecord], mut to_undo: BTreeSet<Lsn>) {
        let by_lsn: HashMap<Lsn, &LogRecord> = log.iter().map(|r| (r.lsn(), r)).collect();

        while let Some(lsn) = to_undo.pop_last() {
            let Some(record) = by_lsn.get(&lsn).copied() else {
                warn!("undo skipped lsn {}: no such record in the log", lsn.0);
                continue;
            };

            match record {
                LogRecord::Update {
                    lsn: update_lsn,
                    prev_lsn,
                    tx_id,
                    page_id,
                    offset,
                    before_image,
                    ..
                } => {
                    let clr_lsn = self.engine.next_lsn();
                    self.tail.append(LogRecord::Compensation {
                        lsn: clr_lsn,
                        prev_lsn: self.tx_table.last_lsn(*tx_id),
                        tx_id: *tx_id,
                        page_id: *page_id,
                        offset: *offset,
                        after_image: before_image.clone(),
                        undo_next_lsn: *prev_lsn,
                    });
                    self.tx_table.set_last_lsn(*tx_id, clr_lsn);

                    // The before-image re-dirties state from the original
                    // update onward.
                    self.dirty_page_table.lower_rec_lsn(*page_id, *update_lsn);

                    if !self.engine.page_write(*page_id, *offset, before_image, clr_lsn) {
                        warn!(
                            "undo halted: page_write refused page {} while undoing lsn {}",
                            page_id.0, update_lsn.0
                        );
                        return;
                    }
                    debug!("undid lsn {} with clr {}", update_lsn.0, clr_lsn.0);

                    match prev_lsn {
                        Some(prev) => {
                            to_undo.insert(*prev);
                        }
                        None => self.finish_transaction(*tx_id),
                    }
                }
                LogRecord::Compensation { tx_id, undo_next_lsn, .. } => match undo_next_lsn {
                    Some(next) => {
                        to_undo.insert(*next);
                    }
                    None => self.finish_transaction(*tx_id),
                },
                // A loser whose newest record is its Abort: the rollback
                // itself was interrupted, so resume from the back link.
                LogRecord::Abort { prev_lsn, tx_id, .. } => match prev_lsn {
                    Some(prev) => {
                        to_undo.insert(*prev);
                    }
                    None => self.finish_transaction(*tx_id),
                },
                other => panic!(
                    "undo reached a {} record at lsn {}: corrupt undo chain",
                    other.kind(),
                    other.lsn().0
                ),
            }
        }
    }

    /// The chain is fully compensated: write the `End` and drop the entry.
    fn finish_transaction(&mut self, tx_id: TransactionId) {
        let end_lsn = self.engine.next_lsn();
        self.tail.append(LogRecord::End {
            lsn: end_lsn,
            prev_lsn: self.tx_table.last_lsn(tx_id),
            tx_id,
        });
        self.tx_table.remove(tx_id);
        debug!("transaction {} fully undone, end at lsn {}", tx_id.0, end_lsn.0);
    }
}

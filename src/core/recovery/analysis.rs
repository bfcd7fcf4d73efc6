//! Analysis phase.
//!
//! Reconstructs the transaction table and dirty-page table as of the crash.
//! When the master record points at a completed checkpoint, the scan adopts
//! the `CheckpointEnd` snapshot and continues from the record after it;
//! otherwise it starts from the beginning of the log with empty tables.

use log::{debug, info, warn};

use crate::core::common::types::Lsn;
use crate::core::recovery::tables::{DirtyPageTable, TransactionTable};
use crate::core::wal::log_record::{LogRecord, TxStatus};

/// What the Analysis scan found, for logging and assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    /// LSN of the `CheckpointEnd` whose snapshot was adopted, if any.
    pub checkpoint_adopted: Option<Lsn>,
    /// Records examined by the forward scan (snapshot rows excluded).
    pub records_scanned: usize,
}

/// The Analysis pass, rebuilding the manager's tables in place.
pub struct AnalysisPhase<'a> {
    tx_table: &'a mut TransactionTable,
    dirty_page_table: &'a mut DirtyPageTable,
}

impl<'a> AnalysisPhase<'a> {
    pub fn new(
        tx_table: &'a mut TransactionTable,
        dirty_page_table: &'a mut DirtyPageTable,
    ) -> Self {
        Self { tx_table, dirty_page_table }
    }

    /// Scan the parsed log, starting from the checkpoint named by `master`
    /// when there is one.
    pub fn run(&mut self, log: &[LogRecord], master: Option<Lsn>) -> AnalysisSummary {
        self.tx_table.clear();
        self.dirty_page_table.clear();

        let mut start = 0;
        let mut checkpoint_adopted = None;

        if let Some(master_lsn) = master {
            match self.adopt_checkpoint(log, master_lsn) {
                Some((end_lsn, resume_at)) => {
                    checkpoint_adopted = Some(end_lsn);
                    start = resume_at;
                    debug!(
                        "analysis adopted checkpoint snapshot at lsn {} ({} transactions, {} dirty pages)",
                        end_lsn.0,
                        self.tx_table.len(),
                        self.dirty_page_table.len()
                    );
                }
                None => {
                    warn!(
                        "master record lsn {} has no matching checkpoint; scanning from the start",
                        master_lsn.0
                    );
                }
            }
        }

        for record in &log[start..] {
            self.scan_record(record);
        }

        let summary =
            AnalysisSummary { checkpoint_adopted, records_scanned: log.len() - start };
        info!(
            "analysis complete: {} transactions ({} losers), {} dirty pages, {} records scanned",
            self.tx_table.len(),
            self.tx_table.losers().count(),
            self.dirty_page_table.len(),
            summary.records_scanned
        );
        summary
    }

    /// Locate the `CheckpointBegin` at `master_lsn`, adopt the snapshot of
    /// the `CheckpointEnd` that follows it, and return that end's LSN plus
    /// the index to resume scanning from.
    fn adopt_checkpoint(&mut self, log: &[LogRecord], master_lsn: Lsn) -> Option<(Lsn, usize)> {
        let begin = log.iter().position(|r| {
            matches!(r, LogRecord::CheckpointBegin { lsn } if *lsn == master_lsn)
        })?;
        let (offset, record) = log[begin + 1..]
            .iter()
            .enumerate()
            .find(|(_, r)| matches!(r, LogRecord::CheckpointEnd { .. }))?;
        if let LogRecord::CheckpointEnd { lsn, active_transactions, dirty_pages, .. } = record {
            self.tx_table.adopt(active_transactions);
            self.dirty_page_table.adopt(dirty_pages);
            Some((*lsn, begin + 1 + offset + 1))
        } else {
            None
        }
    }

    fn scan_record(&mut self, record: &LogRecord) {
        match record {
            LogRecord::End { tx_id, .. } => {
                self.tx_table.remove(*tx_id);
            }
            LogRecord::Update { lsn, tx_id, page_id, .. }
            | LogRecord::Compensation { lsn, tx_id, page_id, .. } => {
                self.tx_table.upsert(*tx_id, *lsn, TxStatus::InProgress);
                self.dirty_page_table.insert_if_absent(*page_id, *lsn);
            }
            LogRecord::Abort { lsn, tx_id, .. } => {
                self.tx_table.upsert(*tx_id, *lsn, TxStatus::InProgress);
            }
            LogRecord::Commit { lsn, tx_id, .. } => {
                self.tx_table.upsert(*tx_id, *lsn, TxStatus::Committed);
            }
            LogRecord::CheckpointBegin { .. } | LogRecord::CheckpointEnd { .. } => {}
        }
    }
}

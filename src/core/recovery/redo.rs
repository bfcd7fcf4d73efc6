//! Redo phase.
//!
//! Repeats history: every update and CLR whose effect is not already on
//! disk is re-applied, so the post-Redo state is exactly the state at crash
//! time. A record is applied only when its page is in the dirty-page table,
//! the entry's `rec_lsn` does not exceed the record's LSN, and the page's
//! PageLSN is older than the record. The PageLSN test makes Redo
//! idempotent. Commits whose `End` was lost get one appended here.

use log::{debug, info};

use crate::core::common::errors::LogError;
use crate::core::common::types::{Lsn, PageId};
use crate::core::recovery::tables::{DirtyPageTable, TransactionTable};
use crate::core::storage::StorageEngine;
use crate::core::wal::log_record::LogRecord;
use crate::core::wal::log_tail::LogTail;

/// The Redo pass, applying after-images through the storage engine.
pub struct RedoPhase<'a> {
    tx_table: &'a mut TransactionTable,
    dirty_page_table: &'a DirtyPageTable,
    tail: &'a mut LogTail,
    engine: &'a dyn StorageEngine,
}

impl<'a> RedoPhase<'a> {
    pub fn new(
        tx_table: &'a mut TransactionTable,
        dirty_page_table: &'a DirtyPageTable,
        tail: &'a mut LogTail,
        engine: &'a dyn StorageEngine,
    ) -> Self {
        Self { tx_table, dirty_page_table, tail, engine }
    }

    /// Scan forward from the smallest `rec_lsn` in the dirty-page table. If
    /// no record carries that exact LSN the scan starts at the first record
    /// at or above it.
    ///
    /// Returns `StorageUnavailable` as soon as the engine refuses a page
    /// write; the caller retries recovery from the persisted log.
    pub fn run(&mut self, log: &[LogRecord]) -> Result<(), LogError> {
        let min_rec_lsn = self.dirty_page_table.min_rec_lsn().unwrap_or(Lsn(0));
        let start = log
            .iter()
            .position(|r| r.lsn() >= min_rec_lsn)
            .unwrap_or(log.len());
        info!(
            "redo starting at lsn {} ({} dirty pages)",
            min_rec_lsn.0,
            self.dirty_page_table.len()
        );

        let mut applied = 0usize;
        for record in &log[start..] {
            match record {
                LogRecord::Update { lsn, page_id, offset, after_image, .. }
                | LogRecord::Compensation { lsn, page_id, offset, after_image, .. } => {
                    if !self.must_apply(*page_id, *lsn) {
                        continue;
                    }
                    if !self.engine.page_write(*page_id, *offset, after_image, *lsn) {
                        return Err(LogError::StorageUnavailable(format!(
                            "page_write refused page {} during redo of lsn {}",
                            page_id.0, lsn.0
                        )));
                    }
                    debug!("redid {} lsn={} on page {}", record.kind(), lsn.0, page_id.0);
                    applied += 1;
                }
                LogRecord::Commit { lsn, tx_id, .. } if self.tx_table.contains(*tx_id) => {
                    // The commit made it to disk but its End did not: finish
                    // the termination the crash interrupted.
                    let end_lsn = self.engine.next_lsn();
                    self.tail.append(LogRecord::End {
                        lsn: end_lsn,
                        prev_lsn: Some(*lsn),
                        tx_id: *tx_id,
                    });
                    self.tx_table.remove(*tx_id);
                }
                _ => {}
            }
        }

        info!("redo complete: {applied} page writes");
        Ok(())
    }

    /// The three-condition test from the ARIES paper. A page that has never
    /// carried a PageLSN compares older than everything.
    fn must_apply(&self, page_id: PageId, lsn: Lsn) -> bool {
        self.dirty_page_table
            .rec_lsn(page_id)
            .map_or(false, |rec_lsn| rec_lsn <= lsn)
            && self.engine.page_lsn(page_id).map_or(true, |page_lsn| page_lsn < lsn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::common::types::TransactionId;
    use crate::core::wal::log_record::TxStatus;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct PageEngine {
        pages: Mutex<HashMap<PageId, (Vec<u8>, Lsn)>>,
        next: Mutex<u64>,
        refuse_writes: bool,
    }

    impl PageEngine {
        fn with_next_lsn(next: u64) -> Self {
            Self { next: Mutex::new(next), ..Self::default() }
        }

        fn set_page(&self, page_id: PageId, bytes: &[u8], lsn: Lsn) {
            self.pages.lock().unwrap().insert(page_id, (bytes.to_vec(), lsn));
        }

        fn page_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
            self.pages.lock().unwrap().get(&page_id).map(|(b, _)| b.clone())
        }
    }

    impl StorageEngine for PageEngine {
        fn next_lsn(&self) -> Lsn {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Lsn(*next)
        }
        fn update_log(&self, _line: &str) {}
        fn get_log(&self) -> String {
            String::new()
        }
        fn store_master(&self, _lsn: Lsn) {}
        fn get_master(&self) -> Option<Lsn> {
            None
        }
        fn page_write(&self, page_id: PageId, offset: usize, bytes: &[u8], lsn: Lsn) -> bool {
            if self.refuse_writes {
                return false;
            }
            let mut pages = self.pages.lock().unwrap();
            let (data, page_lsn) = pages.entry(page_id).or_insert_with(|| (Vec::new(), Lsn(0)));
            if data.len() < offset + bytes.len() {
                data.resize(offset + bytes.len(), 0);
            }
            data[offset..offset + bytes.len()].copy_from_slice(bytes);
            *page_lsn = lsn;
            true
        }
        fn page_lsn(&self, page_id: PageId) -> Option<Lsn> {
            let pages = self.pages.lock().unwrap();
            pages.get(&page_id).map(|(_, lsn)| *lsn).filter(|lsn| *lsn != Lsn(0))
        }
    }

    fn update(lsn: u64, tx: u64, page: u64, after: &[u8]) -> LogRecord {
        LogRecord::Update {
            lsn: Lsn(lsn),
            prev_lsn: None,
            tx_id: TransactionId(tx),
            page_id: PageId(page),
            offset: 0,
            before_image: b"A".to_vec(),
            after_image: after.to_vec(),
        }
    }

    #[test]
    fn applies_only_when_all_three_conditions_hold() {
        let engine = PageEngine::with_next_lsn(10);
        // Page 6's on-disk image already reflects lsn 2.
        engine.set_page(PageId(6), b"Z", Lsn(2));

        let mut dpt = DirtyPageTable::new();
        dpt.insert_if_absent(PageId(5), Lsn(1));
        dpt.insert_if_absent(PageId(6), Lsn(2));

        let log = vec![
            update(1, 1, 5, b"B"),
            update(2, 1, 6, b"C"),
            update(3, 1, 7, b"D"), // page 7 not dirty: skipped
        ];

        let mut tx_table = TransactionTable::new();
        let mut tail = LogTail::new();
        RedoPhase::new(&mut tx_table, &dpt, &mut tail, &engine).run(&log).unwrap();

        assert_eq!(engine.page_bytes(PageId(5)), Some(b"B".to_vec())); // applied
        assert_eq!(engine.page_bytes(PageId(6)), Some(b"Z".to_vec())); // PageLSN current
        assert_eq!(engine.page_bytes(PageId(7)), None); // not in dpt
    }

    #[test]
    fn skips_records_below_rec_lsn() {
        let engine = PageEngine::with_next_lsn(10);
        let mut dpt = DirtyPageTable::new();
        dpt.insert_if_absent(PageId(5), Lsn(3));

        let log = vec![update(2, 1, 5, b"B"), update(3, 1, 5, b"C")];

        let mut tx_table = TransactionTable::new();
        let mut tail = LogTail::new();
        RedoPhase::new(&mut tx_table, &dpt, &mut tail, &engine).run(&log).unwrap();

        // Only lsn 3 applied; the page was reloaded from disk after lsn 2.
        assert_eq!(engine.page_bytes(PageId(5)), Some(b"C".to_vec()));
        assert_eq!(engine.page_lsn(PageId(5)), Some(Lsn(3)));
    }

    #[test]
    fn commit_without_end_gets_terminated() {
        let engine = PageEngine::with_next_lsn(10);
        let mut dpt = DirtyPageTable::new();
        dpt.insert_if_absent(PageId(5), Lsn(1));

        let log = vec![
            update(1, 1, 5, b"B"),
            LogRecord::Commit { lsn: Lsn(2), prev_lsn: Some(Lsn(1)), tx_id: TransactionId(1) },
        ];

        let mut tx_table = TransactionTable::new();
        tx_table.upsert(TransactionId(1), Lsn(2), TxStatus::Committed);
        let mut tail = LogTail::new();
        RedoPhase::new(&mut tx_table, &dpt, &mut tail, &engine).run(&log).unwrap();

        assert!(tx_table.is_empty());
        assert_eq!(tail.len(), 1);
        match &tail.records()[0] {
            LogRecord::End { lsn, prev_lsn, tx_id } => {
                assert_eq!(*lsn, Lsn(11));
                assert_eq!(*prev_lsn, Some(Lsn(2)));
                assert_eq!(*tx_id, TransactionId(1));
            }
            other => panic!("expected End, got {other:?}"),
        }
    }

    #[test]
    fn refused_page_write_aborts_redo() {
        let engine = PageEngine { refuse_writes: true, ..PageEngine::with_next_lsn(10) };
        let mut dpt = DirtyPageTable::new();
        dpt.insert_if_absent(PageId(5), Lsn(1));

        let log = vec![update(1, 1, 5, b"B")];

        let mut tx_table = TransactionTable::new();
        let mut tail = LogTail::new();
        let err = RedoPhase::new(&mut tx_table, &dpt, &mut tail, &engine)
            .run(&log)
            .unwrap_err();
        assert!(matches!(err, LogError::StorageUnavailable(_)));
    }

    #[test]
    fn rerunning_redo_is_idempotent() {
        let engine = PageEngine::with_next_lsn(10);
        let mut dpt = DirtyPageTable::new();
        dpt.insert_if_absent(PageId(5), Lsn(1));

        let log = vec![update(1, 1, 5, b"B")];

        let mut tx_table = TransactionTable::new();
        let mut tail = LogTail::new();
        RedoPhase::new(&mut tx_table, &dpt, &mut tail, &engine).run(&log).unwrap();
        let after_first = engine.page_bytes(PageId(5));
        let lsn_after_first = engine.page_lsn(PageId(5));

        RedoPhase::new(&mut tx_table, &dpt, &mut tail, &engine).run(&log).unwrap();
        assert_eq!(engine.page_bytes(PageId(5)), after_first);
        assert_eq!(engine.page_lsn(PageId(5)), lsn_after_first);
    }
}

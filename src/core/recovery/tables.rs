//! Transaction table and dirty page table.
//!
//! Both tables are owned by the log manager: the forward operations keep
//! them current during normal running, Analysis rebuilds them after a
//! crash, and checkpoints snapshot them into the log.

use std::collections::HashMap;

use crate::core::common::types::{Lsn, PageId, TransactionId};
use crate::core::wal::log_record::{ActiveTransactionInfo, DirtyPageInfo, TxStatus};

/// Per-transaction state tracked by the log manager.
///
/// An entry exists iff the transaction has at least one durable or in-flight
/// record and has not yet produced an `End`; `last_lsn` is the LSN of the
/// most recent record belonging to the transaction in the logical log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionEntry {
    pub last_lsn: Lsn,
    pub status: TxStatus,
}

/// Mapping `TransactionId -> TransactionEntry`.
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    transactions: HashMap<TransactionId, TransactionEntry>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self { transactions: HashMap::new() }
    }

    /// LSN of the most recent record for this transaction, or `None` if the
    /// transaction has no entry.
    pub fn last_lsn(&self, tx_id: TransactionId) -> Option<Lsn> {
        self.transactions.get(&tx_id).map(|e| e.last_lsn)
    }

    /// Update `last_lsn` for an existing entry. A no-op when the
    /// transaction is not present: this never creates entries.
    pub fn set_last_lsn(&mut self, tx_id: TransactionId, lsn: Lsn) {
        if let Some(entry) = self.transactions.get_mut(&tx_id) {
            entry.last_lsn = lsn;
        }
    }

    /// Insert or overwrite an entry outright (first `write` of a
    /// transaction, and the Analysis scan).
    pub fn upsert(&mut self, tx_id: TransactionId, lsn: Lsn, status: TxStatus) {
        self.transactions.insert(tx_id, TransactionEntry { last_lsn: lsn, status });
    }

    /// Flip an existing entry to `Committed`. No-op when absent.
    pub fn mark_committed(&mut self, tx_id: TransactionId) {
        if let Some(entry) = self.transactions.get_mut(&tx_id) {
            entry.status = TxStatus::Committed;
        }
    }

    pub fn status(&self, tx_id: TransactionId) -> Option<TxStatus> {
        self.transactions.get(&tx_id).map(|e| e.status)
    }

    pub fn contains(&self, tx_id: TransactionId) -> bool {
        self.transactions.contains_key(&tx_id)
    }

    pub fn remove(&mut self, tx_id: TransactionId) -> Option<TransactionEntry> {
        self.transactions.remove(&tx_id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransactionId, &TransactionEntry)> {
        self.transactions.iter()
    }

    /// Loser transactions: every entry still `InProgress`.
    pub fn losers(&self) -> impl Iterator<Item = (TransactionId, Lsn)> + '_ {
        self.transactions
            .iter()
            .filter(|(_, e)| e.status == TxStatus::InProgress)
            .map(|(tx_id, e)| (*tx_id, e.last_lsn))
    }

    /// Deep copy for a checkpoint, sorted by transaction id so the
    /// serialized snapshot is deterministic.
    pub fn snapshot(&self) -> Vec<ActiveTransactionInfo> {
        let mut rows: Vec<_> = self
            .transactions
            .iter()
            .map(|(tx_id, e)| ActiveTransactionInfo {
                tx_id: *tx_id,
                last_lsn: e.last_lsn,
                status: e.status,
            })
            .collect();
        rows.sort_by_key(|r| r.tx_id);
        rows
    }

    /// Replace the table's contents with a checkpoint snapshot.
    pub fn adopt(&mut self, snapshot: &[ActiveTransactionInfo]) {
        self.transactions = snapshot
            .iter()
            .map(|r| (r.tx_id, TransactionEntry { last_lsn: r.last_lsn, status: r.status }))
            .collect();
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }
}

/// Mapping `PageId -> rec_lsn`, where `rec_lsn` is the LSN of the first
/// record that dirtied the page since it was last clean on disk.
///
/// An entry exists iff the buffer-resident version of the page may be newer
/// than the on-disk version. `rec_lsn` is never raised once set; undo may
/// lower it when a before-image re-dirties earlier state.
#[derive(Debug, Clone, Default)]
pub struct DirtyPageTable {
    pages: HashMap<PageId, Lsn>,
}

impl DirtyPageTable {
    pub fn new() -> Self {
        Self { pages: HashMap::new() }
    }

    /// Record the first dirtying of a page. Keeps an existing `rec_lsn`
    /// untouched: the forward path and Analysis never lower it.
    pub fn insert_if_absent(&mut self, page_id: PageId, rec_lsn: Lsn) {
        self.pages.entry(page_id).or_insert(rec_lsn);
    }

    /// Monotonic lowering used by undo: set `rec_lsn` when the page is
    /// absent or its current value is greater.
    pub fn lower_rec_lsn(&mut self, page_id: PageId, rec_lsn: Lsn) {
        match self.pages.get_mut(&page_id) {
            Some(existing) if *existing <= rec_lsn => {}
            Some(existing) => *existing = rec_lsn,
            None => {
                self.pages.insert(page_id, rec_lsn);
            }
        }
    }

    pub fn rec_lsn(&self, page_id: PageId) -> Option<Lsn> {
        self.pages.get(&page_id).copied()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }

    pub fn remove(&mut self, page_id: PageId) -> Option<Lsn> {
        self.pages.remove(&page_id)
    }

    /// Starting point for Redo.
    pub fn min_rec_lsn(&self) -> Option<Lsn> {
        self.pages.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PageId, &Lsn)> {
        self.pages.iter()
    }

    /// Deep copy for a checkpoint, sorted by page id.
    pub fn snapshot(&self) -> Vec<DirtyPageInfo> {
        let mut rows: Vec<_> = self
            .pages
            .iter()
            .map(|(page_id, rec_lsn)| DirtyPageInfo { page_id: *page_id, rec_lsn: *rec_lsn })
            .collect();
        rows.sort_by_key(|r| r.page_id);
        rows
    }

    /// Replace the table's contents with a checkpoint snapshot.
    pub fn adopt(&mut self, snapshot: &[DirtyPageInfo]) {
        self.pages = snapshot.iter().map(|r| (r.page_id, r.rec_lsn)).collect();
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_last_lsn_never_creates_entries() {
        let mut table = TransactionTable::new();
        table.set_last_lsn(TransactionId(1), Lsn(10));
        assert!(table.is_empty());
        assert_eq!(table.last_lsn(TransactionId(1)), None);

        table.upsert(TransactionId(1), Lsn(10), TxStatus::InProgress);
        table.set_last_lsn(TransactionId(1), Lsn(20));
        assert_eq!(table.last_lsn(TransactionId(1)), Some(Lsn(20)));
    }

    #[test]
    fn losers_exclude_committed_transactions() {
        let mut table = TransactionTable::new();
        table.upsert(TransactionId(1), Lsn(5), TxStatus::InProgress);
        table.upsert(TransactionId(2), Lsn(6), TxStatus::Committed);
        table.upsert(TransactionId(3), Lsn(7), TxStatus::InProgress);

        let mut losers: Vec<_> = table.losers().collect();
        losers.sort_by_key(|(tx, _)| *tx);
        assert_eq!(losers, vec![(TransactionId(1), Lsn(5)), (TransactionId(3), Lsn(7))]);
    }

    #[test]
    fn mark_committed_is_a_no_op_when_absent() {
        let mut table = TransactionTable::new();
        table.mark_committed(TransactionId(9));
        assert!(table.is_empty());
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let mut table = TransactionTable::new();
        table.upsert(TransactionId(2), Lsn(4), TxStatus::InProgress);
        table.upsert(TransactionId(1), Lsn(3), TxStatus::Committed);

        let snapshot = table.snapshot();
        table.set_last_lsn(TransactionId(2), Lsn(99));
        table.remove(TransactionId(1));

        // Snapshot is untouched by later table mutation, and sorted.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].tx_id, TransactionId(1));
        assert_eq!(snapshot[1].last_lsn, Lsn(4));

        let mut restored = TransactionTable::new();
        restored.adopt(&snapshot);
        assert_eq!(restored.last_lsn(TransactionId(2)), Some(Lsn(4)));
        assert_eq!(restored.status(TransactionId(1)), Some(TxStatus::Committed));
    }

    #[test]
    fn insert_if_absent_never_lowers() {
        let mut table = DirtyPageTable::new();
        table.insert_if_absent(PageId(5), Lsn(10));
        table.insert_if_absent(PageId(5), Lsn(3));
        assert_eq!(table.rec_lsn(PageId(5)), Some(Lsn(10)));
    }

    #[test]
    fn lower_rec_lsn_only_lowers() {
        let mut table = DirtyPageTable::new();
        table.lower_rec_lsn(PageId(5), Lsn(10));
        assert_eq!(table.rec_lsn(PageId(5)), Some(Lsn(10)));

        table.lower_rec_lsn(PageId(5), Lsn(20));
        assert_eq!(table.rec_lsn(PageId(5)), Some(Lsn(10)));

        table.lower_rec_lsn(PageId(5), Lsn(4));
        assert_eq!(table.rec_lsn(PageId(5)), Some(Lsn(4)));
    }

    #[test]
    fn min_rec_lsn_over_all_pages() {
        let mut table = DirtyPageTable::new();
        assert_eq!(table.min_rec_lsn(), None);

        table.insert_if_absent(PageId(1), Lsn(30));
        table.insert_if_absent(PageId(2), Lsn(10));
        table.insert_if_absent(PageId(3), Lsn(20));
        assert_eq!(table.min_rec_lsn(), Some(Lsn(10)));

        table.remove(PageId(2));
        assert_eq!(table.min_rec_lsn(), Some(Lsn(20)));
    }

    #[test]
    fn dirty_page_snapshot_round_trips() {
        let mut table = DirtyPageTable::new();
        table.insert_if_absent(PageId(7), Lsn(2));
        table.insert_if_absent(PageId(3), Lsn(9));

        let snapshot = table.snapshot();
        assert_eq!(snapshot[0].page_id, PageId(3));

        let mut restored = DirtyPageTable::new();
        restored.adopt(&snapshot);
        assert_eq!(restored.rec_lsn(PageId(7)), Some(Lsn(2)));
        assert_eq!(restored.len(), 2);
    }
}

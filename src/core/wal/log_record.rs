//! Log record model.
//!
//! Every entry in the write-ahead log is one variant of [`LogRecord`], a
//! tagged sum carrying per-variant data. Records are immutable plain data:
//! they are created by the log manager, cloned freely (checkpoint snapshots
//! are deep copies by construction), and dispatch is a `match` on the tag.

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::core::common::types::{Lsn, PageId, TransactionId};

/// Status of a transaction, as tracked in the transaction table and carried
/// in checkpoint snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// In progress or rolling back.
    #[serde(rename = "U")]
    InProgress,
    /// Committed, awaiting its `End` record.
    #[serde(rename = "C")]
    Committed,
}

/// One row of the transaction-table snapshot inside a `CheckpointEnd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTransactionInfo {
    pub tx_id: TransactionId,
    pub last_lsn: Lsn,
    pub status: TxStatus,
}

/// One row of the dirty-page-table snapshot inside a `CheckpointEnd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyPageInfo {
    pub page_id: PageId,
    /// LSN of the first record that dirtied this page since it was last
    /// clean on disk.
    pub rec_lsn: Lsn,
}

/// A write-ahead log record.
///
/// `prev_lsn` links a transaction's records into a backward chain that
/// terminates at `None`; checkpoint records belong to no transaction and
/// carry no `tx_id`. Before/after images are opaque byte strings agreed
/// with the storage engine.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LogRecord {
    /// A transactional page update.
    #[serde(rename = "UPDATE")]
    Update {
        lsn: Lsn,
        prev_lsn: Option<Lsn>,
        tx_id: TransactionId,
        page_id: PageId,
        offset: usize,
        #[serde_as(as = "Base64")]
        before_image: Vec<u8>,
        #[serde_as(as = "Base64")]
        after_image: Vec<u8>,
    },
    /// Compensation record: the redo-only undo of a prior update. Its
    /// after-image is the undone update's before-image.
    #[serde(rename = "CLR")]
    Compensation {
        lsn: Lsn,
        prev_lsn: Option<Lsn>,
        tx_id: TransactionId,
        page_id: PageId,
        offset: usize,
        #[serde_as(as = "Base64")]
        after_image: Vec<u8>,
        /// Next record of this transaction still to undo, or `None` when
        /// the chain is fully compensated.
        undo_next_lsn: Option<Lsn>,
    },
    /// The transaction intends to commit; durable once flushed.
    #[serde(rename = "COMMIT")]
    Commit {
        lsn: Lsn,
        prev_lsn: Option<Lsn>,
        tx_id: TransactionId,
    },
    /// The transaction entered rollback.
    #[serde(rename = "ABORT")]
    Abort {
        lsn: Lsn,
        prev_lsn: Option<Lsn>,
        tx_id: TransactionId,
    },
    /// The transaction fully terminated (after commit flush or after undo
    /// completed).
    #[serde(rename = "END")]
    End {
        lsn: Lsn,
        prev_lsn: Option<Lsn>,
        tx_id: TransactionId,
    },
    /// Opens a fuzzy checkpoint.
    #[serde(rename = "BEGIN_CKPT")]
    CheckpointBegin { lsn: Lsn },
    /// Closes a checkpoint, carrying deep copies of both tables.
    #[serde(rename = "END_CKPT")]
    CheckpointEnd {
        lsn: Lsn,
        /// LSN of the matching `CheckpointBegin`; doubles as this record's
        /// back link.
        begin_lsn: Lsn,
        active_transactions: Vec<ActiveTransactionInfo>,
        dirty_pages: Vec<DirtyPageInfo>,
    },
}

impl LogRecord {
    /// The LSN of this record.
    pub fn lsn(&self) -> Lsn {
        match self {
            LogRecord::Update { lsn, .. }
            | LogRecord::Compensation { lsn, .. }
            | LogRecord::Commit { lsn, .. }
            | LogRecord::Abort { lsn, .. }
            | LogRecord::End { lsn, .. }
            | LogRecord::CheckpointBegin { lsn }
            | LogRecord::CheckpointEnd { lsn, .. } => *lsn,
        }
    }

    /// The previous LSN of the owning transaction, or for `CheckpointEnd`
    /// the LSN of the matching `CheckpointBegin`.
    pub fn prev_lsn(&self) -> Option<Lsn> {
        match self {
            LogRecord::Update { prev_lsn, .. }
            | LogRecord::Compensation { prev_lsn, .. }
            | LogRecord::Commit { prev_lsn, .. }
            | LogRecord::Abort { prev_lsn, .. }
            | LogRecord::End { prev_lsn, .. } => *prev_lsn,
            LogRecord::CheckpointBegin { .. } => None,
            LogRecord::CheckpointEnd { begin_lsn, .. } => Some(*begin_lsn),
        }
    }

    /// The owning transaction, if any (checkpoint records have none).
    pub fn tx_id(&self) -> Option<TransactionId> {
        match self {
            LogRecord::Update { tx_id, .. }
            | LogRecord::Compensation { tx_id, .. }
            | LogRecord::Commit { tx_id, .. }
            | LogRecord::Abort { tx_id, .. }
            | LogRecord::End { tx_id, .. } => Some(*tx_id),
            LogRecord::CheckpointBegin { .. } | LogRecord::CheckpointEnd { .. } => None,
        }
    }

    /// The page this record touches, if any.
    pub fn page_id(&self) -> Option<PageId> {
        match self {
            LogRecord::Update { page_id, .. } | LogRecord::Compensation { page_id, .. } => {
                Some(*page_id)
            }
            _ => None,
        }
    }

    /// The record's kind discriminator, as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            LogRecord::Update { .. } => "UPDATE",
            LogRecord::Compensation { .. } => "CLR",
            LogRecord::Commit { .. } => "COMMIT",
            LogRecord::Abort { .. } => "ABORT",
            LogRecord::End { .. } => "END",
            LogRecord::CheckpointBegin { .. } => "BEGIN_CKPT",
            LogRecord::CheckpointEnd { .. } => "END_CKPT",
        }
    }
}

//! Storage engine contract consumed by the log manager.
//!
//! The engine owns page storage, allocates LSNs, persists log bytes and the
//! master (checkpoint) pointer, and performs in-place page writes. The log
//! manager is bound to exactly one engine via
//! [`LogManager::set_storage_engine`](crate::core::log_manager::LogManager::set_storage_engine)
//! and the engine outlives the manager.

use crate::core::common::types::{Lsn, PageId};

/// The interface the log manager requires from the storage engine.
///
/// All methods take `&self`; engines use interior mutability for their
/// counters and buffers. `update_log` and `store_master` block until the
/// data is durable; in this design they either succeed or the process dies,
/// so only `page_write` carries a failure signal.
pub trait StorageEngine {
    /// Allocate and return the next monotonically increasing LSN.
    fn next_lsn(&self) -> Lsn;

    /// Durably append one serialized log record. Returns on durability.
    fn update_log(&self, line: &str);

    /// Return the entire persisted log as a newline-separated sequence of
    /// serialized records.
    fn get_log(&self) -> String;

    /// Durably record `lsn` as the master (checkpoint) pointer.
    fn store_master(&self, lsn: Lsn);

    /// Return the stored master pointer, or `None` if no checkpoint has
    /// ever completed.
    fn get_master(&self) -> Option<Lsn>;

    /// Apply `bytes` at `offset` within the page and set the page's
    /// PageLSN to `new_page_lsn`. Returns `false` to signal failure.
    fn page_write(&self, page_id: PageId, offset: usize, bytes: &[u8], new_page_lsn: Lsn)
        -> bool;

    /// Return the PageLSN of the page in the buffer, or `None` if the page
    /// has never carried one.
    fn page_lsn(&self, page_id: PageId) -> Option<Lsn>;
}

// src/core/wal/mod.rs

pub mod codec;
pub mod log_record;
pub mod log_tail;

pub use log_record::{ActiveTransactionInfo, DirtyPageInfo, LogRecord, TxStatus};
pub use log_tail::LogTail;

#![forbid(unsafe_code)]
#![deny(clippy::correctness, clippy::suspicious, clippy::perf, deprecated)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

//! # Oxilog - an ARIES write-ahead log manager
//!
//! Oxilog is the log manager of a page-oriented transactional storage
//! system. It records every page update in a write-ahead log, enforces the
//! WAL invariant against a pluggable storage engine, provides commit/abort
//! semantics, and reconstructs a consistent state after a crash through the
//! standard ARIES three-pass recovery (Analyze -> Redo -> Undo) with
//! compensation logging.
//!
//! ## Architecture
//!
//! - **Log record layer** (`core::wal`): the tagged [`LogRecord`] sum, its
//!   newline-delimited text codec, and the in-memory log tail.
//! - **Recovery layer** (`core::recovery`): the transaction and dirty-page
//!   tables plus the three ARIES passes.
//! - **Manager** (`core::log_manager`): the forward operations (`write`,
//!   `commit`, `abort`, `checkpoint`, `page_flushed`) and `recover`.
//! - **Storage contract** (`core::storage`): the [`StorageEngine`] trait the
//!   manager consumes; page storage, LSN allocation, and durable log/master
//!   persistence live behind it.
//!
//! The manager is single-writer: all operations take `&mut self` and callers
//! serialize their invocations.

pub mod core;

// Public API exports
pub use crate::core::common::errors::LogError;
pub use crate::core::common::types::{Lsn, PageId, TransactionId};
pub use crate::core::log_manager::LogManager;
pub use crate::core::storage::StorageEngine;
pub use crate::core::wal::log_record::LogRecord;

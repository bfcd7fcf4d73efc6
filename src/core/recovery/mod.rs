//! ARIES recovery.
//!
//! The three phases of the ARIES algorithm, run in sequence by
//! [`LogManager::recover`](crate::core::log_manager::LogManager::recover):
//!
//! 1. **Analysis**: reconstructs the transaction table and dirty-page table
//!    as of the crash, starting from the last completed checkpoint.
//! 2. **Redo**: repeats history, re-applying every update and CLR whose
//!    effect is not already on disk, with the PageLSN test for idempotence.
//! 3. **Undo**: rolls back every loser transaction, emitting compensation
//!    records that are themselves redo-only.
//!
//! The phases operate on the manager's own tables and tail; `Undo` is also
//! entered directly by `abort`, restricted to a single transaction.

pub mod analysis;
pub mod redo;
pub mod tables;
pub mod undo;

pub use analysis::{AnalysisPhase, AnalysisSummary};
pub use redo::RedoPhase;
pub use tables::{DirtyPageTable, TransactionEntry, TransactionTable};
pub use undo::UndoPhase;

pub mod common;
pub mod log_manager;
pub mod recovery; // ARIES analysis/redo/undo
pub mod storage;
pub mod wal;
